// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply drainer: turns a reply channel into one response payload.
//!
//! Runs on a worker pool thread, one task per in-flight call.
//!
//! | Event                               | Action                    |
//! |-------------------------------------|---------------------------|
//! | error                               | stop, keep accumulated    |
//! | sample, no bytes                    | skip                      |
//! | sample, undecodable envelope        | skip                      |
//! | sample, envelope with empty payload | skip                      |
//! | sample, non-empty payload           | accept (see [`DrainPolicy`]) |
//!
//! With nothing accepted the result is the empty payload, which callers
//! must read as "no answer", not as an empty value.

use crate::codec::Decode;
use crate::message::{Message, Payload};
use crate::metrics::ClientMetrics;
use crate::observer::{RpcEvent, RpcObserver};
use crate::session::{ReplyChannel, ReplyEvent};

/// Which accepted reply becomes the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Keep draining until the channel closes; the last accepted reply wins.
    #[default]
    LastNonEmpty,
    /// Stop at the first accepted reply.
    FirstNonEmpty,
}

/// Drain `channel` to completion and release it.
pub fn handle_reply(
    channel: ReplyChannel,
    policy: DrainPolicy,
    observer: &dyn RpcObserver,
    metrics: &ClientMetrics,
) -> Payload {
    drain(&channel, policy, observer, metrics)
}

pub(crate) fn drain(
    channel: &ReplyChannel,
    policy: DrainPolicy,
    observer: &dyn RpcObserver,
    metrics: &ClientMetrics,
) -> Payload {
    let mut response = Payload::default();
    let mut accepted = 0usize;

    while let Some(event) = channel.recv() {
        let sample = match event {
            ReplyEvent::Sample(sample) => sample,
            ReplyEvent::Error(reason) => {
                ClientMetrics::bump(&metrics.error_replies);
                observer.on_event(&RpcEvent::ErrorReply(reason));
                break;
            }
        };

        match decode_reply(&sample.payload) {
            Ok(payload) => {
                ClientMetrics::bump(&metrics.replies_accepted);
                accepted += 1;
                response = payload;
                if policy == DrainPolicy::FirstNonEmpty {
                    break;
                }
            }
            Err(skipped) => {
                ClientMetrics::bump(&metrics.replies_skipped);
                observer.on_event(&skipped);
            }
        }
    }

    ClientMetrics::bump(&metrics.drains_completed);
    observer.on_event(&RpcEvent::DrainCompleted {
        accepted,
        bytes: response.len(),
    });
    response
}

fn decode_reply(bytes: &[u8]) -> Result<Payload, RpcEvent> {
    if bytes.is_empty() {
        return Err(RpcEvent::EmptyReply);
    }
    let message = Message::from_bytes(bytes).map_err(|e| RpcEvent::MalformedReply(e.to_string()))?;
    if message.payload.is_empty() {
        return Err(RpcEvent::EmptyDecodedPayload);
    }
    Ok(Payload::value(message.payload.data))
}
