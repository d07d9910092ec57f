// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML client configuration loader.
//!
//! # Example YAML
//!
//! ```yaml
//! client:
//!   worker_pool_size: 4
//!   request_timeout_ms: 2000
//!   drain_policy: FIRST_NON_EMPTY
//! session:
//!   mode: CLIENT
//!   connect:
//!     - tcp/192.168.1.10:7447
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use super::{ClientConfig, SessionConfig, SessionMode};
use crate::client::DrainPolicy;
use crate::error::{RpcError, RpcResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// YAML configuration loader.
pub struct YamlLoader;

/// Root YAML document structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfigDocument {
    pub client: YamlClient,
    pub session: YamlSession,
}

/// `client:` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlClient {
    pub worker_pool_size: Option<usize>,
    pub request_timeout_ms: Option<u64>,
    pub reply_capacity: Option<usize>,
    /// LAST_NON_EMPTY or FIRST_NON_EMPTY
    pub drain_policy: Option<String>,
}

/// `session:` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlSession {
    /// PEER or CLIENT
    pub mode: Option<String>,
    pub connect: Vec<String>,
    pub listen: Vec<String>,
}

impl YamlLoader {
    /// Load and convert a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RpcResult<ClientConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RpcError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse YAML content into a validated [`ClientConfig`].
    pub fn parse_yaml(content: &str) -> RpcResult<ClientConfig> {
        let doc: YamlConfigDocument = serde_yaml::from_str(content)
            .map_err(|e| RpcError::InvalidConfig(format!("failed to parse YAML: {}", e)))?;
        let config = Self::document_to_config(&doc)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert a parsed document, filling gaps with defaults.
    pub fn document_to_config(doc: &YamlConfigDocument) -> RpcResult<ClientConfig> {
        let mut config = ClientConfig::default();

        if let Some(size) = doc.client.worker_pool_size {
            config.worker_pool_size = size;
        }
        if let Some(ms) = doc.client.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = doc.client.reply_capacity {
            config.reply_capacity = capacity;
        }
        if let Some(ref policy) = doc.client.drain_policy {
            config.drain_policy = match policy.to_uppercase().as_str() {
                "LAST_NON_EMPTY" => DrainPolicy::LastNonEmpty,
                "FIRST_NON_EMPTY" => DrainPolicy::FirstNonEmpty,
                other => {
                    return Err(RpcError::InvalidConfig(format!(
                        "invalid drain_policy: {}",
                        other
                    )))
                }
            };
        }

        let mode = match doc.session.mode.as_deref().map(str::to_uppercase) {
            None => SessionMode::default(),
            Some(ref m) if m == "PEER" => SessionMode::Peer,
            Some(ref m) if m == "CLIENT" => SessionMode::Client,
            Some(other) => {
                return Err(RpcError::InvalidConfig(format!(
                    "invalid session mode: {}",
                    other
                )))
            }
        };
        config.session = SessionConfig {
            mode,
            connect: doc.session.connect.clone(),
            listen: doc.session.listen.clone(),
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
client:
  worker_pool_size: 4
  request_timeout_ms: 2000
  drain_policy: first_non_empty
session:
  mode: CLIENT
  connect:
    - tcp/192.168.1.10:7447
"#;
        let config = YamlLoader::parse_yaml(yaml).expect("valid yaml");
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.request_timeout, Duration::from_millis(2000));
        assert_eq!(config.reply_capacity, 16);
        assert_eq!(config.drain_policy, DrainPolicy::FirstNonEmpty);
        assert_eq!(config.session.mode, SessionMode::Client);
        assert_eq!(config.session.connect, vec!["tcp/192.168.1.10:7447"]);
        assert!(config.session.listen.is_empty());
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = YamlLoader::parse_yaml("{}").expect("empty mapping");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(YamlLoader::parse_yaml("client:\n  drain_policy: RANDOM\n").is_err());
        assert!(YamlLoader::parse_yaml("session:\n  mode: ROUTER\n").is_err());
        assert!(YamlLoader::parse_yaml("client:\n  worker_pool_size: 0\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "client:\n  request_timeout_ms: 750").expect("write yaml");

        let config = YamlLoader::load_from_file(file.path()).expect("load");
        assert_eq!(config.request_timeout, Duration::from_millis(750));

        assert!(YamlLoader::load_from_file("/nonexistent/pubrpc.yaml").is_err());
    }
}
