// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC client: request/reply on top of one-way publish.
//!
//! # Overview
//!
//! The transport only knows how to publish. [`RpcClient`] turns a publish
//! into a call:
//!
//! 1. the request payload is published on the destination's
//!    [`CorrelationTopic`](crate::session::CorrelationTopic), with the
//!    serialized call attributes attached;
//! 2. a bounded reply channel is bound to that publish;
//! 3. a drain task on the worker pool reads the channel until the
//!    transport closes it and resolves the caller's [`PendingReply`].
//!
//! # Lifecycle
//!
//! The session and the worker pool are shared by every user of a client
//! and reference counted: the first [`RpcClient::init`] brings them up, the
//! matching last [`RpcClient::term`] tears them down. [`ClientGuard`] wraps
//! the pair in RAII form.
//!
//! ```text
//! ref_count  0 ──init──▶ 1 ──init──▶ 2 ──term──▶ 1 ──term──▶ 0
//! state      Uninit      Ready(session, pool)             Uninit
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use pubrpc::client::RpcClient;
//! use pubrpc::config::ClientConfig;
//! use pubrpc::message::{Attributes, Payload, Priority};
//! use pubrpc::session::loopback::LoopbackSessionManager;
//! use pubrpc::uri::Uri;
//! use std::sync::Arc;
//!
//! # fn main() -> pubrpc::RpcResult<()> {
//! let manager = Arc::new(LoopbackSessionManager::new());
//! let client = RpcClient::new(manager, ClientConfig::default())?;
//! let guard = client.acquire()?;
//!
//! let method = Uri::rpc_method("petapp", 1, "echo");
//! let attributes = Attributes::request(method.clone(), Priority::Cs4, 1000);
//! let reply = guard.invoke_method(&method, &Payload::value(vec![1, 2]), &attributes)?;
//! let payload = reply.wait();
//! # Ok(())
//! # }
//! ```

pub mod drain;
mod invoke;

pub use drain::{handle_reply, DrainPolicy};
pub use invoke::PendingReply;

use crate::config::ClientConfig;
use crate::error::{RpcError, RpcResult};
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::observer::{LogObserver, RpcEvent, RpcObserver};
use crate::pool::WorkerPool;
use crate::session::{Session, SessionManager};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared resources, present only while the client is initialized.
enum ClientState {
    Uninitialized,
    Ready {
        session: Arc<dyn Session>,
        pool: Arc<WorkerPool>,
    },
}

/// Reference-counted RPC client.
pub struct RpcClient {
    config: ClientConfig,
    manager: Arc<dyn SessionManager>,
    observer: Arc<dyn RpcObserver>,
    metrics: Arc<ClientMetrics>,
    /// Outstanding `init` calls. Only moves 0 -> 1 and 1 -> 0 under `state`.
    ref_count: AtomicUsize,
    state: Mutex<ClientState>,
}

/// Builder for [`RpcClient`].
pub struct RpcClientBuilder {
    manager: Arc<dyn SessionManager>,
    config: ClientConfig,
    observer: Arc<dyn RpcObserver>,
}

impl RpcClientBuilder {
    /// Replace the default configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive lifecycle and call events instead of the log observer.
    pub fn observer(mut self, observer: Arc<dyn RpcObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Validate the configuration and create the client (uninitialized).
    pub fn build(self) -> RpcResult<Arc<RpcClient>> {
        self.config.validate()?;
        Ok(Arc::new(RpcClient {
            config: self.config,
            manager: self.manager,
            observer: self.observer,
            metrics: Arc::new(ClientMetrics::new()),
            ref_count: AtomicUsize::new(0),
            state: Mutex::new(ClientState::Uninitialized),
        }))
    }
}

impl RpcClient {
    /// Start building a client bound to `manager`.
    pub fn builder(manager: Arc<dyn SessionManager>) -> RpcClientBuilder {
        RpcClientBuilder {
            manager,
            config: ClientConfig::default(),
            observer: Arc::new(LogObserver),
        }
    }

    /// Client logging through [`LogObserver`].
    pub fn new(manager: Arc<dyn SessionManager>, config: ClientConfig) -> RpcResult<Arc<Self>> {
        Self::builder(manager).config(config).build()
    }

    /// Take a reference on the shared session and pool, creating them on
    /// the first call.
    ///
    /// # Errors
    ///
    /// `RpcError::Unavailable` when the session manager cannot start, has no
    /// session to hand out, or the worker pool cannot be spawned. The count
    /// is left unchanged.
    pub fn init(&self) -> RpcResult<()> {
        // Fast path: never increments from 0, so it cannot race a teardown.
        if self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > 0).then(|| n + 1)
            })
            .is_ok()
        {
            return Ok(());
        }

        let mut state = self.state.lock();
        if self.ref_count.load(Ordering::Acquire) > 0 {
            self.ref_count.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        *state = self.bring_up()?;
        self.ref_count.store(1, Ordering::Release);
        self.observer.on_event(&RpcEvent::Initialized {
            pool_size: self.config.worker_pool_size,
        });
        Ok(())
    }

    fn bring_up(&self) -> RpcResult<ClientState> {
        if let Err(e) = self.manager.init(&self.config.session) {
            return Err(self.lifecycle_failed("session manager init", e));
        }

        let Some(session) = self.manager.session() else {
            self.rollback_manager();
            return Err(self.lifecycle_failed("session acquire", "no session available"));
        };

        let pool = Arc::new(WorkerPool::new(self.config.worker_pool_size));
        if let Err(e) = pool.start() {
            drop(session);
            self.rollback_manager();
            return Err(self.lifecycle_failed("worker pool start", e));
        }

        Ok(ClientState::Ready { session, pool })
    }

    fn rollback_manager(&self) {
        if let Err(e) = self.manager.term() {
            log::warn!("[rpc-client] rollback of session manager failed: {}", e);
        }
    }

    /// Release one reference; the last one tears down pool and session.
    ///
    /// Queued drain tasks finish before the pool stops.
    ///
    /// # Errors
    ///
    /// - `RpcError::NotInitialized` when there is no reference to release.
    /// - `RpcError::Unavailable` when the session manager fails to stop; the
    ///   client is uninitialized regardless.
    pub fn term(&self) -> RpcResult<()> {
        let mut state = self.state.lock();

        if self.ref_count.load(Ordering::Acquire) == 0 {
            self.observer.on_event(&RpcEvent::UnbalancedTerm);
            return Err(RpcError::NotInitialized);
        }
        if self.ref_count.fetch_sub(1, Ordering::AcqRel) != 1 {
            return Ok(());
        }

        if let ClientState::Ready { session, pool } =
            std::mem::replace(&mut *state, ClientState::Uninitialized)
        {
            pool.shutdown();
            drop(session);
        }

        if let Err(e) = self.manager.term() {
            return Err(self.lifecycle_failed("session manager term", e));
        }
        self.observer.on_event(&RpcEvent::Terminated);
        Ok(())
    }

    /// [`init`](Self::init) now, [`term`](Self::term) when the guard drops.
    pub fn acquire(self: &Arc<Self>) -> RpcResult<ClientGuard> {
        self.init()?;
        Ok(ClientGuard {
            client: Arc::clone(self),
        })
    }

    /// Outstanding `init` calls not yet balanced by `term`.
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    /// True while at least one `init` is outstanding.
    pub fn is_initialized(&self) -> bool {
        self.ref_count() > 0
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Point-in-time copy of the client counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn lifecycle_failed(&self, operation: &'static str, reason: impl fmt::Display) -> RpcError {
        let reason = reason.to_string();
        self.observer.on_event(&RpcEvent::LifecycleFailed {
            operation,
            reason: reason.clone(),
        });
        RpcError::Unavailable(format!("{}: {}", operation, reason))
    }

    /// Session and pool, if initialized.
    fn resources(&self) -> Option<(Arc<dyn Session>, Arc<WorkerPool>)> {
        match &*self.state.lock() {
            ClientState::Ready { session, pool } => Some((Arc::clone(session), Arc::clone(pool))),
            ClientState::Uninitialized => None,
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        let state = std::mem::replace(self.state.get_mut(), ClientState::Uninitialized);
        if let ClientState::Ready { session, pool } = state {
            log::warn!(
                "[rpc-client] dropped with {} outstanding init(s), tearing down",
                self.ref_count.load(Ordering::Acquire)
            );
            pool.shutdown();
            drop(session);
            if let Err(e) = self.manager.term() {
                log::error!("[rpc-client] session manager term failed on drop: {}", e);
            }
        }
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("ref_count", &self.ref_count())
            .field("config", &self.config)
            .finish()
    }
}

/// One reference on an [`RpcClient`], released on drop.
pub struct ClientGuard {
    client: Arc<RpcClient>,
}

impl ClientGuard {
    /// The guarded client, for handing to other threads.
    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }
}

impl Deref for ClientGuard {
    type Target = RpcClient;

    fn deref(&self) -> &RpcClient {
        &self.client
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        if let Err(e) = self.client.term() {
            log::error!("[rpc-client] term on guard drop failed: {}", e);
        }
    }
}
