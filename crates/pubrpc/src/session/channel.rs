// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded reply FIFO shared between the transport and one in-flight call.
//!
//! ```text
//! transport ── ReplySink ──[ bounded FIFO ]── ReplyChannel ── drain task
//! ```
//!
//! The transport owns the [`ReplySink`]; dropping it closes the channel.
//! The consumer owns the [`ReplyChannel`]; dropping it releases the channel
//! and runs the release hook exactly once.

use super::CorrelationTopic;
use crate::codec::{CodecResult, Encode};
use crate::message::Message;
use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use std::fmt;
use std::time::Instant;

/// Successful reply delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySample {
    pub topic: Option<CorrelationTopic>,
    /// Encoded [`Message`] envelope.
    pub payload: Vec<u8>,
}

/// One event on a reply channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    Sample(ReplySample),
    /// Transport-level failure (timeout, remote error). Terminal for the call.
    Error(String),
}

impl ReplyEvent {
    pub fn sample(payload: impl Into<Vec<u8>>) -> Self {
        ReplyEvent::Sample(ReplySample {
            topic: None,
            payload: payload.into(),
        })
    }

    /// Sample carrying `message` in encoded form.
    pub fn message(message: &Message) -> CodecResult<Self> {
        Ok(Self::sample(message.to_bytes()?))
    }

    /// Stamp the topic the sample arrived on, unless it already carries one.
    pub fn with_topic(mut self, topic: CorrelationTopic) -> Self {
        if let ReplyEvent::Sample(sample) = &mut self {
            sample.topic.get_or_insert(topic);
        }
        self
    }

    pub fn error(reason: impl Into<String>) -> Self {
        ReplyEvent::Error(reason.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReplyEvent::Error(_))
    }
}

/// Producing half, handed to the transport with the publish.
pub struct ReplySink {
    sender: Sender<ReplyEvent>,
}

impl ReplySink {
    /// Push without waiting; fails when the FIFO is full or the consumer is gone.
    pub fn try_send(&self, event: ReplyEvent) -> Result<(), ReplyEvent> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(ev) | TrySendError::Disconnected(ev) => ev,
        })
    }

    /// Push, waiting for FIFO space until `deadline`.
    pub fn send_deadline(
        &self,
        event: ReplyEvent,
        deadline: Instant,
    ) -> Result<(), SendTimeoutError<ReplyEvent>> {
        self.sender.send_deadline(event, deadline)
    }

    /// Close the channel: no more replies will arrive.
    pub fn close(self) {}
}

impl fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySink")
            .field("queued", &self.sender.len())
            .finish()
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Consuming half, owned by exactly one invocation.
pub struct ReplyChannel {
    receiver: Receiver<ReplyEvent>,
    capacity: usize,
    on_release: Option<ReleaseHook>,
}

impl ReplyChannel {
    /// Allocate a FIFO holding at most `capacity` undelivered events.
    pub fn bounded(capacity: usize) -> (ReplySink, ReplyChannel) {
        let (sender, receiver) = channel::bounded(capacity);
        (
            ReplySink { sender },
            ReplyChannel {
                receiver,
                capacity,
                on_release: None,
            },
        )
    }

    /// Run `hook` when this channel is released.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Block until the next event, or `None` once the sink is gone and the
    /// FIFO is drained.
    pub fn recv(&self) -> Option<ReplyEvent> {
        self.receiver.recv().ok()
    }

    /// Next event if one is queued, without blocking.
    pub fn try_recv(&self) -> Option<ReplyEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events queued and not yet received.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for ReplyChannel {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl fmt::Debug for ReplyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyChannel")
            .field("capacity", &self.capacity)
            .field("pending", &self.receiver.len())
            .finish()
    }
}
