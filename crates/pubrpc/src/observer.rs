// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Observers for RPC client events.
//!
//! Every diagnosable condition on the lifecycle, dispatch and drain paths is
//! reported as an [`RpcEvent`] to the observer installed on the client. The
//! default [`LogObserver`] forwards events to the `log` facade.
//!
//! # Thread Safety
//!
//! Observers are called from caller threads (lifecycle, dispatch) and from
//! worker pool threads (drain). They must be `Send + Sync` and should not
//! block or panic.

use crate::message::MessageType;
use crate::session::CorrelationTopic;
use crate::uri::Uri;
use parking_lot::Mutex;

/// Something worth reporting happened inside the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcEvent {
    /// Session manager or worker pool came up (0 -> 1 transition).
    Initialized { pool_size: usize },
    /// Last reference released, resources torn down.
    Terminated,
    /// Session manager, session or pool could not be brought up or down.
    LifecycleFailed { operation: &'static str, reason: String },
    /// `term` called with no outstanding `init`.
    UnbalancedTerm,
    /// `invoke_method` called on an uninitialized client.
    NotInitialized,
    /// Attributes carried a non-request type.
    WrongMessageType(MessageType),
    /// Serialization of call attributes failed.
    SerializeFailed(String),
    /// Transport refused the publish.
    PublishFailed { topic: CorrelationTopic, reason: String },
    /// Worker pool rejected the drain task.
    ScheduleFailed,
    /// Request published and drain scheduled.
    Dispatched { destination: Uri, topic: CorrelationTopic },
    /// Reply sample carried no bytes.
    EmptyReply,
    /// Reply sample could not be decoded.
    MalformedReply(String),
    /// Reply decoded but its payload was empty.
    EmptyDecodedPayload,
    /// Transport delivered an error reply; draining stopped.
    ErrorReply(String),
    /// Drain finished; `bytes` is the size of the resolved payload.
    DrainCompleted { accepted: usize, bytes: usize },
}

/// Receives [`RpcEvent`]s from a client.
pub trait RpcObserver: Send + Sync {
    fn on_event(&self, event: &RpcEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RpcObserver for LogObserver {
    fn on_event(&self, event: &RpcEvent) {
        match event {
            RpcEvent::Initialized { pool_size } => {
                log::debug!("[rpc-client] initialized (pool_size={})", pool_size);
            }
            RpcEvent::Terminated => log::debug!("[rpc-client] terminated"),
            RpcEvent::LifecycleFailed { operation, reason } => {
                log::error!("[rpc-client] {} failed: {}", operation, reason);
            }
            RpcEvent::UnbalancedTerm => {
                log::error!("[rpc-client] term() called without matching init()");
            }
            RpcEvent::NotInitialized => log::error!("[rpc-client] client is not initialized"),
            RpcEvent::WrongMessageType(found) => {
                log::error!("[rpc-client] Wrong message type = {}", found);
            }
            RpcEvent::SerializeFailed(reason) => {
                log::error!("[rpc-client] attributes serialization failure: {}", reason);
            }
            RpcEvent::PublishFailed { topic, reason } => {
                log::error!("[rpc-client] publish on {} failed: {}", topic, reason);
            }
            RpcEvent::ScheduleFailed => log::error!("[rpc-client] failed to invoke method"),
            RpcEvent::Dispatched { destination, topic } => {
                log::debug!("[rpc-client] request to {} published on {}", destination, topic);
            }
            RpcEvent::EmptyReply => log::error!("[drain] Payload is empty"),
            RpcEvent::MalformedReply(reason) => {
                log::error!("[drain] reply decode failure: {}", reason);
            }
            RpcEvent::EmptyDecodedPayload => log::error!("[drain] Deserialized payload is empty"),
            RpcEvent::ErrorReply(reason) => log::error!("[drain] error received: {}", reason),
            RpcEvent::DrainCompleted { accepted, bytes } => {
                log::trace!("[drain] done (accepted={}, bytes={})", accepted, bytes);
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RpcObserver for NoopObserver {
    fn on_event(&self, _event: &RpcEvent) {}
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RpcEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RpcEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&RpcEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl RpcObserver for RecordingObserver {
    fn on_event(&self, event: &RpcEvent) {
        self.events.lock().push(event.clone());
    }
}
