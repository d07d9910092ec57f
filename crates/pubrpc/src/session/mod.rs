// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport boundary: session manager, shared session and reply channels.
//!
//! The RPC client never talks to the network itself. It acquires one
//! [`Session`] from a [`SessionManager`] on its first `init`, publishes every
//! request through it, and reads replies from the [`ReplyChannel`] it bound
//! to that publish.
//!
//! # Topics
//!
//! Requests are published on a [`CorrelationTopic`] derived from the
//! destination's long-form URI. Two calls to the same destination share the
//! topic; their replies stay apart because each publish carries its own
//! [`ReplySink`].

mod channel;
pub mod loopback;

pub use channel::{ReplyChannel, ReplyEvent, ReplySample, ReplySink};

use crate::config::SessionConfig;
use crate::error::RpcResult;
use crate::uri::Uri;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Transport key for a destination: first 8 bytes (LE) of the MD5 digest of
/// the destination's long-form string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationTopic(u64);

impl CorrelationTopic {
    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_canonical(&uri.to_long_form())
    }

    pub fn from_canonical(canonical: &str) -> Self {
        use md5::{Digest, Md5};
        let digest = Md5::digest(canonical.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(bytes))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Key expression used on the transport.
    pub fn key_expr(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Debug for CorrelationTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationTopic({})", self.0)
    }
}

impl fmt::Display for CorrelationTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Out-of-band metadata published next to a payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attachment {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Attachment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Options for one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Bound on the publish/reply cycle, enforced by the transport.
    pub timeout: Duration,
    pub attachment: Attachment,
}

impl PublishOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            attachment: Attachment::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = attachment;
        self
    }
}

/// Shared transport connection.
pub trait Session: Send + Sync {
    /// Publish `payload` on `topic`, delivering replies into `replies`.
    ///
    /// The session must drop `replies` once no more replies will arrive
    /// (all delivered, error, or `options.timeout` elapsed). On `Err` the
    /// sink has already been dropped and nothing will be delivered.
    fn publish(
        &self,
        topic: &CorrelationTopic,
        payload: &[u8],
        options: PublishOptions,
        replies: ReplySink,
    ) -> RpcResult<()>;
}

/// Owner of the transport session.
pub trait SessionManager: Send + Sync {
    /// Bring the transport up.
    fn init(&self, config: &SessionConfig) -> RpcResult<()>;

    /// The live session, if `init` succeeded.
    fn session(&self) -> Option<Arc<dyn Session>>;

    /// Tear the transport down.
    fn term(&self) -> RpcResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_is_deterministic() {
        let a = Uri::rpc_method("petapp", 1, "echo");
        let b: Uri = "/petapp/1/rpc.echo".parse().expect("valid");
        assert_eq!(CorrelationTopic::from_uri(&a), CorrelationTopic::from_uri(&b));
    }

    #[test]
    fn test_topic_differs_per_destination() {
        let a = CorrelationTopic::from_uri(&Uri::rpc_method("petapp", 1, "echo"));
        let b = CorrelationTopic::from_uri(&Uri::rpc_method("petapp", 1, "ping"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_topic_key_is_decimal() {
        let topic = CorrelationTopic::from_raw(42);
        assert_eq!(topic.key_expr(), "42");
        assert_eq!(topic.to_string(), "42");
        // MD5("") = d41d8cd98f00b204...
        assert_eq!(
            CorrelationTopic::from_canonical("").as_u64(),
            u64::from_le_bytes([0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04])
        );
    }

    #[test]
    fn test_attachment_entries() {
        let mut attachment = Attachment::new();
        assert!(attachment.is_empty());
        attachment.insert("attributes", vec![1, 2]);
        assert_eq!(attachment.get("attributes"), Some(&[1u8, 2][..]));
        assert_eq!(attachment.get("other"), None);
        assert_eq!(attachment.iter().count(), 1);
    }
}
