// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resource identifiers for RPC destinations.
//!
//! # Long form
//!
//! ```text
//! [//authority]/entity[/major]/resource[.instance][#Message]
//! ```
//!
//! Examples:
//! - `/body.access/1/door.front_left#Door`
//! - `//vcu.vin/petapp/2/rpc.echo`
//!
//! The long form is the canonical string of a [`Uri`]: it is what
//! [`CorrelationTopic`](crate::session::CorrelationTopic) hashes.

use crate::codec::{self, CodecResult, Cursor, CursorMut, Decode, Encode};
use crate::error::{RpcError, RpcResult};
use std::fmt;
use std::str::FromStr;

/// Resource name prefix marking an RPC method.
pub const RPC_RESOURCE_NAME: &str = "rpc";

/// Software entity addressed by a [`Uri`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Entity {
    pub name: String,
    pub version_major: Option<u32>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_major: None,
        }
    }

    pub fn with_version(name: impl Into<String>, version_major: u32) -> Self {
        Self {
            name: name.into(),
            version_major: Some(version_major),
        }
    }
}

/// Resource inside an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Resource {
    pub name: String,
    pub instance: Option<String>,
    pub message: Option<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            message: None,
        }
    }

    /// Resource for RPC method `method` (`rpc.<method>`).
    pub fn rpc_method(method: impl Into<String>) -> Self {
        Self {
            name: RPC_RESOURCE_NAME.to_string(),
            instance: Some(method.into()),
            message: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Resource identifier: optional authority, entity and resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Uri {
    pub authority: Option<String>,
    pub entity: Entity,
    pub resource: Resource,
}

impl Uri {
    pub fn new(entity: Entity, resource: Resource) -> Self {
        Self {
            authority: None,
            entity,
            resource,
        }
    }

    /// Local URI of RPC method `method` on `entity` version `version_major`.
    pub fn rpc_method(entity: impl Into<String>, version_major: u32, method: &str) -> Self {
        Self::new(
            Entity::with_version(entity, version_major),
            Resource::rpc_method(method),
        )
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.authority.is_none() && self.entity.name.is_empty() && self.resource.name.is_empty()
    }

    pub fn is_remote(&self) -> bool {
        self.authority.is_some()
    }

    pub fn is_rpc_method(&self) -> bool {
        self.resource.name == RPC_RESOURCE_NAME && self.resource.instance.is_some()
    }

    /// Canonical long-form string. An empty URI serializes to `""`.
    pub fn to_long_form(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        if let Some(authority) = &self.authority {
            out.push_str("//");
            out.push_str(authority);
        }
        out.push('/');
        out.push_str(&self.entity.name);
        if let Some(major) = self.entity.version_major {
            out.push('/');
            out.push_str(&major.to_string());
        }
        if !self.resource.name.is_empty() {
            out.push('/');
            out.push_str(&self.resource.name);
            if let Some(instance) = &self.resource.instance {
                out.push('.');
                out.push_str(instance);
            }
            if let Some(message) = &self.resource.message {
                out.push('#');
                out.push_str(message);
            }
        }
        out
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_long_form())
    }
}

impl FromStr for Uri {
    type Err = RpcError;

    fn from_str(s: &str) -> RpcResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Uri::default());
        }

        let invalid = |why: &str| RpcError::InvalidUri(format!("'{}': {}", s, why));

        let (authority, rest) = if let Some(remote) = s.strip_prefix("//") {
            match remote.split_once('/') {
                Some((authority, rest)) if !authority.is_empty() => {
                    (Some(authority.to_string()), rest)
                }
                Some(_) => return Err(invalid("empty authority")),
                None => return Err(invalid("missing entity")),
            }
        } else if let Some(local) = s.strip_prefix('/') {
            (None, local)
        } else {
            return Err(invalid("must start with '/'"));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let entity_name = parts.first().copied().unwrap_or_default();
        if entity_name.is_empty() {
            return Err(invalid("missing entity"));
        }

        let (version_major, resource_part) = match parts.len() {
            1 => (None, None),
            2 => match parts[1].parse::<u32>() {
                Ok(major) => (Some(major), None),
                Err(_) => (None, Some(parts[1])),
            },
            3 => {
                let major = parts[1]
                    .parse::<u32>()
                    .map_err(|_| invalid("version is not a number"))?;
                (Some(major), Some(parts[2]))
            }
            _ => return Err(invalid("too many path segments")),
        };

        let resource = match resource_part {
            None | Some("") => Resource::default(),
            Some(part) => parse_resource(part),
        };

        Ok(Uri {
            authority,
            entity: Entity {
                name: entity_name.to_string(),
                version_major,
            },
            resource,
        })
    }
}

fn parse_resource(part: &str) -> Resource {
    let (head, message) = match part.split_once('#') {
        Some((head, message)) => (head, Some(message.to_string())),
        None => (part, None),
    };
    let (name, instance) = match head.split_once('.') {
        Some((name, instance)) => (name, Some(instance.to_string())),
        None => (head, None),
    };
    Resource {
        name: name.to_string(),
        instance,
        message,
    }
}

impl Encode for Uri {
    fn encode(&self, cursor: &mut CursorMut) -> CodecResult<()> {
        cursor.put_str(&self.to_long_form())
    }
}

impl Decode for Uri {
    fn decode(cursor: &mut Cursor<'_>) -> CodecResult<Self> {
        let offset = cursor.offset();
        let raw = cursor.read_string()?;
        raw.parse().map_err(|e: RpcError| codec::CodecError::InvalidValue {
            offset,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_form_local_rpc_method() {
        let uri = Uri::rpc_method("body.access", 1, "UpdateDoor");
        assert_eq!(uri.to_long_form(), "/body.access/1/rpc.UpdateDoor");
        assert!(uri.is_rpc_method());
        assert!(!uri.is_remote());
    }

    #[test]
    fn test_long_form_remote_with_message() {
        let uri = Uri::new(
            Entity::with_version("body.access", 1),
            Resource::new("door")
                .with_instance("front_left")
                .with_message("Door"),
        )
        .with_authority("vcu.vin");
        assert_eq!(
            uri.to_long_form(),
            "//vcu.vin/body.access/1/door.front_left#Door"
        );
    }

    #[test]
    fn test_empty_uri_serializes_to_empty_string() {
        assert_eq!(Uri::default().to_long_form(), "");
        assert_eq!("".parse::<Uri>().expect("empty parses"), Uri::default());
    }

    #[test]
    fn test_parse_matches_long_form() {
        for text in [
            "/petapp",
            "/petapp/2",
            "/petapp/2/rpc.echo",
            "/petapp/rpc.echo",
            "//vcu.vin/petapp/2/door.front#Door",
        ] {
            let uri: Uri = text.parse().expect("valid uri");
            assert_eq!(uri.to_long_form(), text);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("petapp/1".parse::<Uri>().is_err());
        assert!("//".parse::<Uri>().is_err());
        assert!("///petapp".parse::<Uri>().is_err());
        assert!("/petapp/x/rpc.echo".parse::<Uri>().is_err());
        assert!("/a/1/b/c".parse::<Uri>().is_err());
    }

    #[test]
    fn test_uri_codec_uses_long_form() {
        let uri = Uri::rpc_method("petapp", 2, "echo");
        let bytes = uri.to_bytes().expect("encode");
        assert_eq!(&bytes[4..], b"/petapp/2/rpc.echo");
        assert_eq!(Uri::from_bytes(&bytes).expect("decode"), uri);
    }
}
