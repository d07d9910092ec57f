// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Invocation bridge: publish a request, schedule its drain.

use super::{drain, RpcClient};
use crate::codec::Encode;
use crate::config::ATTRIBUTES_ATTACHMENT_KEY;
use crate::error::{RpcError, RpcResult};
use crate::message::{Attributes, MessageType, Payload};
use crate::metrics::ClientMetrics;
use crate::observer::RpcEvent;
use crate::pool::Completion;
use crate::session::{Attachment, CorrelationTopic, PublishOptions, ReplyChannel, ReplySink};
use crate::uri::Uri;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

impl RpcClient {
    /// Publish `payload` to `destination` and return the pending reply.
    ///
    /// Only the publish is synchronous; the reply is drained on the worker
    /// pool. An `Err` means the call was not dispatched and nothing is
    /// pending.
    ///
    /// # Errors
    ///
    /// - `NotInitialized`: no outstanding `init`.
    /// - `WrongMessageType`: `attributes.message_type` is not `Request`.
    /// - `Serialization`: attributes could not be encoded (nothing published).
    /// - `PublishFailed`: the transport refused the publish.
    /// - `Shutdown`: the pool stopped between publish and scheduling.
    pub fn invoke_method(
        &self,
        destination: &Uri,
        payload: &Payload,
        attributes: &Attributes,
    ) -> RpcResult<PendingReply> {
        self.dispatch(destination, payload, attributes)
            .inspect_err(|_| ClientMetrics::bump(&self.metrics.dispatch_failures))
    }

    fn dispatch(
        &self,
        destination: &Uri,
        payload: &Payload,
        attributes: &Attributes,
    ) -> RpcResult<PendingReply> {
        if self.ref_count() == 0 {
            self.observer.on_event(&RpcEvent::NotInitialized);
            return Err(RpcError::NotInitialized);
        }

        if attributes.message_type != MessageType::Request {
            self.observer
                .on_event(&RpcEvent::WrongMessageType(attributes.message_type));
            return Err(RpcError::WrongMessageType(attributes.message_type));
        }

        let Some((session, pool)) = self.resources() else {
            self.observer.on_event(&RpcEvent::NotInitialized);
            return Err(RpcError::NotInitialized);
        };

        let serialized = attributes.to_bytes().map_err(|e| {
            self.observer
                .on_event(&RpcEvent::SerializeFailed(e.to_string()));
            RpcError::from(e)
        })?;

        let topic = CorrelationTopic::from_uri(destination);
        let (sink, channel) = self.allocate_channel();

        let mut attachment = Attachment::new();
        attachment.insert(ATTRIBUTES_ATTACHMENT_KEY, serialized);
        let options = PublishOptions::new(self.config.request_timeout).with_attachment(attachment);

        if let Err(e) = session.publish(&topic, payload.as_bytes(), options, sink) {
            let reason = match e {
                RpcError::PublishFailed(reason) => reason,
                other => other.to_string(),
            };
            self.observer.on_event(&RpcEvent::PublishFailed {
                topic,
                reason: reason.clone(),
            });
            drop(channel);
            return Err(RpcError::PublishFailed(reason));
        }

        let policy = self.config.drain_policy;
        let observer = Arc::clone(&self.observer);
        let metrics = Arc::clone(&self.metrics);
        let completion = pool
            .submit(move || drain::handle_reply(channel, policy, observer.as_ref(), &metrics))
            .inspect_err(|_| self.observer.on_event(&RpcEvent::ScheduleFailed))?;

        ClientMetrics::bump(&self.metrics.calls_dispatched);
        self.observer.on_event(&RpcEvent::Dispatched {
            destination: destination.clone(),
            topic,
        });
        Ok(PendingReply { completion })
    }

    fn allocate_channel(&self) -> (ReplySink, ReplyChannel) {
        let (sink, channel) = ReplyChannel::bounded(self.config.reply_capacity);
        ClientMetrics::bump(&self.metrics.channels_allocated);
        let metrics = Arc::clone(&self.metrics);
        let channel =
            channel.with_release_hook(move || ClientMetrics::bump(&metrics.channels_released));
        (sink, channel)
    }
}

/// Reply of a dispatched call.
///
/// Resolves to the drained payload. An empty payload means no usable reply
/// arrived before the transport closed the channel (timeout, error reply,
/// only malformed replies); it is not a positive empty answer.
#[derive(Debug)]
pub struct PendingReply {
    completion: Completion<Payload>,
}

impl PendingReply {
    /// Block until the drain finishes.
    ///
    /// On a thread driving an async runtime this does not block: the call
    /// is logged and resolves to the empty payload. `.await` there instead.
    pub fn wait(self) -> Payload {
        resolve(self.completion.wait())
    }

    /// Block for at most `timeout`; `None` if the drain is still running.
    ///
    /// The reply stays pending after `None` and can be waited on again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Payload> {
        self.completion.wait_timeout(timeout).map(resolve)
    }

    /// `None` while the drain is still running.
    pub fn try_wait(&mut self) -> Option<Payload> {
        self.completion.try_wait().map(resolve)
    }
}

impl Future for PendingReply {
    type Output = Payload;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Payload> {
        Pin::new(&mut self.completion).poll(cx).map(resolve)
    }
}

fn resolve(result: RpcResult<Payload>) -> Payload {
    result.unwrap_or_else(|e| {
        log::error!("[rpc-client] reply lost: {}", e);
        Payload::default()
    })
}
