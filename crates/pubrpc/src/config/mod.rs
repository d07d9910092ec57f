// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pubrpc configuration: constants and per-client settings.
//!
//! All tunables live here. **Do not hardcode them elsewhere.**
//!
//! - **Level 1 (Static)**: compile-time defaults (`DEFAULT_*`, channel capacity).
//! - **Level 2 (Per client)**: [`ClientConfig`] and [`SessionConfig`], fixed once
//!   the client is constructed. They can be built in code, read from YAML
//!   (`config-loaders` feature) or overridden from the environment.

#[cfg(feature = "config-loaders")]
pub mod yaml;

use crate::client::DrainPolicy;
use crate::error::{RpcError, RpcResult};
use std::time::Duration;

/// Worker threads running reply drains.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Transport-level timeout applied to each publish/reply cycle.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Capacity of the per-call reply FIFO.
pub const REPLY_FIFO_CAPACITY: usize = 16;

/// Attachment key under which serialized call attributes travel.
pub const ATTRIBUTES_ATTACHMENT_KEY: &str = "attributes";

/// Environment override for [`ClientConfig::worker_pool_size`].
pub const ENV_POOL_SIZE: &str = "PUBRPC_POOL_SIZE";

/// Environment override for [`ClientConfig::request_timeout`].
pub const ENV_REQUEST_TIMEOUT_MS: &str = "PUBRPC_REQUEST_TIMEOUT_MS";

/// How the session joins the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Peer,
    Client,
}

/// Settings handed to the session manager on the first `init`.
///
/// Empty endpoint lists mean "let the transport decide".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub connect: Vec<String>,
    pub listen: Vec<String>,
}

/// Client settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub worker_pool_size: usize,
    pub request_timeout: Duration,
    pub reply_capacity: usize,
    pub drain_policy: DrainPolicy,
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            reply_capacity: REPLY_FIFO_CAPACITY,
            drain_policy: DrainPolicy::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Same as [`Default`]: 10 workers, 5s timeout, last non-empty reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of drain workers. Must be non-zero.
    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// How long a drain waits for the next reply before giving up.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// [`request_timeout`](Self::request_timeout) in milliseconds.
    pub fn request_timeout_ms(self, timeout_ms: u64) -> Self {
        self.request_timeout(Duration::from_millis(timeout_ms))
    }

    /// Bound of each per-call reply channel.
    pub fn reply_capacity(mut self, capacity: usize) -> Self {
        self.reply_capacity = capacity;
        self
    }

    /// Which reply a drain keeps.
    pub fn drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    /// Options handed to the session manager on `init`.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> RpcResult<()> {
        if self.worker_pool_size == 0 {
            return Err(RpcError::InvalidConfig(
                "worker_pool_size must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(RpcError::InvalidConfig(
                "request_timeout must be non-zero".into(),
            ));
        }
        if self.reply_capacity == 0 {
            return Err(RpcError::InvalidConfig(
                "reply_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Apply `PUBRPC_*` environment overrides.
    pub fn with_env_overrides(self) -> RpcResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> RpcResult<Self> {
        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            self.worker_pool_size = raw.trim().parse().map_err(|_| {
                RpcError::InvalidConfig(format!("{}='{}' is not a count", ENV_POOL_SIZE, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                RpcError::InvalidConfig(format!(
                    "{}='{}' is not a millisecond value",
                    ENV_REQUEST_TIMEOUT_MS, raw
                ))
            })?;
            self.request_timeout = Duration::from_millis(ms);
        }
        Ok(self)
    }
}
