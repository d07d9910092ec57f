// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! [`LoopbackSessionManager`] hands out a [`LoopbackSession`] that routes
//! each publish to the responder declared on its topic. Replies are pushed
//! into the publish's own sink from a short-lived delivery thread, so the
//! caller's publish never blocks on the responder.
//!
//! # Timeouts
//!
//! The delivery thread enforces `PublishOptions::timeout`: a responder that
//! answers after the deadline, or a consumer that leaves the FIFO full past
//! it, gets a `ReplyEvent::Error("timeout")` and the channel is closed.
//!
//! # Failure injection
//!
//! The manager can be told to fail `init`, withhold the session, fail
//! `term` or refuse publishes, which is what the lifecycle and dispatch
//! tests rely on.

use super::{CorrelationTopic, PublishOptions, ReplyEvent, ReplySink, Session, SessionManager};
use crate::codec::Decode;
use crate::config::{SessionConfig, ATTRIBUTES_ATTACHMENT_KEY};
use crate::error::{RpcError, RpcResult};
use crate::message::Attributes;
use crate::uri::Uri;
use crossbeam::channel::SendTimeoutError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Request as seen by a responder.
#[derive(Debug, Clone)]
pub struct LoopbackRequest {
    pub topic: CorrelationTopic,
    pub payload: Vec<u8>,
    /// Decoded `attributes` attachment, when present and well-formed.
    pub attributes: Option<Attributes>,
}

/// Produces the reply events for one request.
pub trait Responder: Send + Sync {
    fn respond(&self, request: &LoopbackRequest) -> Vec<ReplyEvent>;
}

impl<F> Responder for F
where
    F: Fn(&LoopbackRequest) -> Vec<ReplyEvent> + Send + Sync,
{
    fn respond(&self, request: &LoopbackRequest) -> Vec<ReplyEvent> {
        self(request)
    }
}

/// Routing table and counters shared by a manager and its sessions.
#[derive(Default)]
struct Bus {
    responders: DashMap<CorrelationTopic, Arc<dyn Responder>>,
    published: AtomicUsize,
    fail_publish: AtomicBool,
    deliveries_in_flight: AtomicUsize,
}

/// Session handed out by [`LoopbackSessionManager`].
pub struct LoopbackSession {
    bus: Arc<Bus>,
    open: AtomicBool,
}

impl LoopbackSession {
    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// False once the manager has closed this session.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Session for LoopbackSession {
    fn publish(
        &self,
        topic: &CorrelationTopic,
        payload: &[u8],
        options: PublishOptions,
        replies: ReplySink,
    ) -> RpcResult<()> {
        if !self.is_open() {
            return Err(RpcError::PublishFailed("session closed".into()));
        }
        if self.bus.fail_publish.load(Ordering::Relaxed) {
            return Err(RpcError::PublishFailed("publish refused by transport".into()));
        }
        self.bus.published.fetch_add(1, Ordering::Relaxed);

        let Some(responder) = self.bus.responders.get(topic).map(|r| Arc::clone(r.value()))
        else {
            log::debug!("[loopback] no responder on {}, closing replies", topic);
            replies.close();
            return Ok(());
        };

        let attributes = options
            .attachment
            .get(ATTRIBUTES_ATTACHMENT_KEY)
            .and_then(|raw| match Attributes::from_bytes(raw) {
                Ok(attrs) => Some(attrs),
                Err(e) => {
                    log::debug!("[loopback] undecodable attributes attachment: {}", e);
                    None
                }
            });
        let request = LoopbackRequest {
            topic: *topic,
            payload: payload.to_vec(),
            attributes,
        };

        let deadline = Instant::now() + options.timeout;
        let in_flight = InFlight::enter(&self.bus);
        let spawned = std::thread::Builder::new()
            .name("pubrpc-loopback".to_string())
            .spawn(move || {
                let _in_flight = in_flight;
                let topic = request.topic;
                let delivered = catch_unwind(AssertUnwindSafe(|| {
                    deliver(responder.as_ref(), &request, replies, deadline);
                }));
                if delivered.is_err() {
                    log::error!("[loopback] responder on {} panicked, replies closed", topic);
                }
            });

        // On spawn failure the closure, and with it the in-flight mark, is dropped.
        if let Err(e) = spawned {
            return Err(RpcError::PublishFailed(format!(
                "failed to spawn delivery thread: {}",
                e
            )));
        }
        Ok(())
    }
}

/// One running delivery thread, counted on the bus until dropped.
struct InFlight(Arc<Bus>);

impl InFlight {
    fn enter(bus: &Arc<Bus>) -> Self {
        bus.deliveries_in_flight.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(bus))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.deliveries_in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

fn deliver(
    responder: &dyn Responder,
    request: &LoopbackRequest,
    replies: ReplySink,
    deadline: Instant,
) {
    let events = responder.respond(request);

    if Instant::now() >= deadline {
        log::debug!("[loopback] responder on {} missed the deadline", request.topic);
        // Best effort: a full FIFO just closes without the error marker.
        let _ = replies.try_send(ReplyEvent::error("timeout"));
        return;
    }

    for event in events {
        match replies.send_deadline(event.with_topic(request.topic), deadline) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                log::debug!(
                    "[loopback] reply FIFO on {} stayed full past deadline",
                    request.topic
                );
                let _ = replies.try_send(ReplyEvent::error("timeout"));
                return;
            }
            Err(SendTimeoutError::Disconnected(_)) => return,
        }
    }
}

/// Session manager for the in-process transport.
pub struct LoopbackSessionManager {
    bus: Arc<Bus>,
    session: Mutex<Option<Arc<LoopbackSession>>>,
    last_config: Mutex<Option<SessionConfig>>,
    inits: AtomicUsize,
    terms: AtomicUsize,
    fail_init: AtomicBool,
    withhold_session: AtomicBool,
    fail_term: AtomicBool,
}

impl Default for LoopbackSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackSessionManager {
    /// Empty bus, no responders, every fault switch off.
    pub fn new() -> Self {
        Self {
            bus: Arc::new(Bus::default()),
            session: Mutex::new(None),
            last_config: Mutex::new(None),
            inits: AtomicUsize::new(0),
            terms: AtomicUsize::new(0),
            fail_init: AtomicBool::new(false),
            withhold_session: AtomicBool::new(false),
            fail_term: AtomicBool::new(false),
        }
    }

    /// Route requests for `destination` to `responder`, replacing any previous one.
    pub fn declare_responder<R>(&self, destination: &Uri, responder: R)
    where
        R: Responder + 'static,
    {
        let topic = CorrelationTopic::from_uri(destination);
        log::debug!("[loopback] responder for {} on {}", destination, topic);
        self.bus.responders.insert(topic, Arc::new(responder));
    }

    /// Stop answering `destination`. Returns whether a responder was removed.
    /// 
    /// Deliveries already running finish normally.
    pub fn undeclare_responder(&self, destination: &Uri) -> bool {
        self.bus
            .responders
            .remove(&CorrelationTopic::from_uri(destination))
            .is_some()
    }

    /// Make the next `init` calls fail.
    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::Relaxed);
    }

    /// `init` succeeds but no session is handed out.
    pub fn set_withhold_session(&self, withhold: bool) {
        self.withhold_session.store(withhold, Ordering::Relaxed);
    }

    /// Make `term` report failure (the session is still dropped).
    pub fn set_fail_term(&self, fail: bool) {
        self.fail_term.store(fail, Ordering::Relaxed);
    }

    /// Refuse every publish with `PublishFailed`.
    pub fn set_fail_publish(&self, fail: bool) {
        self.bus.fail_publish.store(fail, Ordering::Relaxed);
    }

    /// Successful `init` calls.
    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::Relaxed)
    }

    /// Successful `term` calls.
    pub fn term_count(&self) -> usize {
        self.terms.load(Ordering::Relaxed)
    }

    /// Publishes accepted by any session of this manager.
    pub fn published(&self) -> usize {
        self.bus.published.load(Ordering::Relaxed)
    }

    /// Delivery threads still running.
    pub fn deliveries_in_flight(&self) -> usize {
        self.bus.deliveries_in_flight.load(Ordering::Acquire)
    }

    /// Whether a session is currently held (between `init` and `term`).
    pub fn is_active(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Configuration passed to the most recent `init`.
    pub fn last_config(&self) -> Option<SessionConfig> {
        self.last_config.lock().clone()
    }
}

impl SessionManager for LoopbackSessionManager {
    fn init(&self, config: &SessionConfig) -> RpcResult<()> {
        if self.fail_init.load(Ordering::Relaxed) {
            return Err(RpcError::Unavailable("loopback init refused".into()));
        }

        let mut session = self.session.lock();
        if session.is_none() {
            *session = Some(Arc::new(LoopbackSession {
                bus: Arc::clone(&self.bus),
                open: AtomicBool::new(true),
            }));
        }
        *self.last_config.lock() = Some(config.clone());
        self.inits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn session(&self) -> Option<Arc<dyn Session>> {
        if self.withhold_session.load(Ordering::Relaxed) {
            return None;
        }
        self.session
            .lock()
            .as_ref()
            .map(|s| Arc::clone(s) as Arc<dyn Session>)
    }

    fn term(&self) -> RpcResult<()> {
        if let Some(session) = self.session.lock().take() {
            session.close();
        }
        if self.fail_term.load(Ordering::Relaxed) {
            return Err(RpcError::Unavailable("loopback term failed".into()));
        }
        self.terms.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
