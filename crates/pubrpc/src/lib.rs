// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # pubrpc - Request/reply over a publish/subscribe transport
//!
//! The transport publishes one-way messages with attachments and delivers
//! replies into a per-publish FIFO. pubrpc turns that into a method call:
//! publish a request payload to a method URI, then drain the replies on a
//! worker pool into a single response payload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pubrpc::{Attributes, ClientConfig, Payload, Priority, RpcClient, Uri};
//! use pubrpc::session::loopback::LoopbackSessionManager;
//! use std::sync::Arc;
//!
//! fn main() -> pubrpc::RpcResult<()> {
//!     let manager = Arc::new(LoopbackSessionManager::new());
//!     let client = RpcClient::new(manager, ClientConfig::default().with_env_overrides()?)?;
//!     let guard = client.acquire()?;
//!
//!     let method = Uri::rpc_method("body.access", 1, "UpdateDoor");
//!     let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);
//!     let reply = guard
//!         .invoke_method(&method, &Payload::value(vec![0x01, 0x02]), &attributes)?
//!         .wait();
//!     println!("{} byte reply", reply.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  RpcClient       init/term refcount, invoke_method           |
//! +--------------------------------------------------------------+
//! |  drain           reply channel -> Payload (DrainPolicy)      |
//! |  pool            fixed worker threads, Completion futures    |
//! +--------------------------------------------------------------+
//! |  session         Session / SessionManager traits             |
//! |                  CorrelationTopic, ReplyChannel, loopback    |
//! +--------------------------------------------------------------+
//! |  message / uri / codec   call envelope and wire format       |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`client`] - lifecycle, invocation, reply draining (start here)
//! - [`session`] - transport abstraction and the in-process loopback
//! - [`message`] - attributes, payloads, envelopes
//! - [`config`] - constants, client settings, YAML/env loading
//! - [`observer`] - event reporting (logging by default)

/// RPC client: lifecycle, `invoke_method`, reply drain.
pub mod client;
/// Little-endian binary codec for call envelopes.
pub mod codec;
/// Constants and client/session configuration.
pub mod config;
/// Error and status types.
pub mod error;
/// Call attributes, payloads and reply envelopes.
pub mod message;
/// Client counters.
pub mod metrics;
/// Injectable event observers.
pub mod observer;
/// Worker pool running reply drains.
pub mod pool;
/// Transport abstraction.
pub mod session;
/// Method and entity addressing.
pub mod uri;

pub use client::{ClientGuard, DrainPolicy, PendingReply, RpcClient, RpcClientBuilder};
pub use config::{ClientConfig, SessionConfig, SessionMode};
pub use error::{RpcError, RpcResult, StatusCode};
pub use message::{Attributes, Message, MessageId, MessageType, Payload, PayloadFormat, Priority};
pub use metrics::MetricsSnapshot;
pub use observer::{LogObserver, RpcEvent, RpcObserver};
pub use session::{CorrelationTopic, Session, SessionManager};
pub use uri::Uri;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
