// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size worker pool for reply drains.
//!
//! Jobs go through an unbounded crossbeam queue to `size` named threads.
//! Each submission hands back a [`Completion`] that resolves when the job
//! returns, either by blocking ([`Completion::wait`],
//! [`Completion::wait_timeout`]) or as a `Future`.
//!
//! `shutdown` closes the queue, lets the workers finish every job already
//! queued, and joins them.

use crate::error::{RpcError, RpcResult};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll, Wake, Waker};
use std::thread::{JoinHandle, Thread};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

/// Fixed-size thread pool.
pub struct WorkerPool {
    size: usize,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    /// Create a pool of `size` workers. No thread runs until [`start`](Self::start).
    pub fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().sender.is_some()
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.state.lock().sender.as_ref().map_or(0, Sender::len)
    }

    /// Spawn the worker threads. Calling it on a running pool is a no-op.
    pub fn start(&self) -> RpcResult<()> {
        if self.size == 0 {
            return Err(RpcError::InvalidConfig("worker pool size must be at least 1".into()));
        }

        let mut state = self.state.lock();
        if state.sender.is_some() {
            return Ok(());
        }

        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(self.size);
        for index in 0..self.size {
            let receiver = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("pubrpc-worker-{}", index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            log::error!("[pool] job panicked, worker continues");
                        }
                    }
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    drop(sender);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(RpcError::Unavailable(format!(
                        "failed to spawn worker {}: {}",
                        index, e
                    )));
                }
            }
        }

        log::debug!("[pool] started {} workers", self.size);
        state.sender = Some(sender);
        state.workers = workers;
        Ok(())
    }

    /// Queue `job` and return its completion handle.
    pub fn submit<T, F>(&self, job: F) -> RpcResult<Completion<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let boxed: Job = Box::new(move || {
            // Receiver may have been dropped; the job still ran.
            let _ = tx.send(job());
        });

        let state = self.state.lock();
        let sender = state.sender.as_ref().ok_or(RpcError::Shutdown)?;
        sender.send(boxed).map_err(|_| RpcError::Shutdown)?;
        Ok(Completion { receiver: Some(rx) })
    }

    /// Stop accepting jobs, run what is queued, join the workers.
    pub fn shutdown(&self) {
        let workers = {
            let mut state = self.state.lock();
            state.sender = None;
            std::mem::take(&mut state.workers)
        };
        if workers.is_empty() {
            return;
        }

        let current = std::thread::current().id();
        for worker in workers {
            // A job shutting its own pool down cannot join itself.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                log::error!("[pool] worker thread panicked during shutdown");
            }
        }
        log::debug!("[pool] stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Result of a submitted job.
///
/// Resolves by blocking ([`wait`](Self::wait),
/// [`wait_timeout`](Self::wait_timeout)) or as a `Future`. The blocking
/// forms refuse to run on a thread driving an async runtime and report
/// `RpcError::Internal` instead; `.await` the completion there.
#[derive(Debug)]
pub struct Completion<T> {
    /// `None` once the result has been handed out.
    receiver: Option<oneshot::Receiver<T>>,
}

impl<T> Completion<T> {
    /// Block until the job returns.
    pub fn wait(mut self) -> RpcResult<T> {
        ensure_blocking_allowed()?;
        self.block_until(None).unwrap_or_else(|| Err(lost_job()))
    }

    /// Block for at most `timeout`. `None` if the job is still running;
    /// the completion stays usable.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<RpcResult<T>> {
        if let Err(e) = ensure_blocking_allowed() {
            return Some(Err(e));
        }
        self.block_until(Some(Instant::now() + timeout))
    }

    /// Non-blocking check: `None` while the job is still pending.
    pub fn try_wait(&mut self) -> Option<RpcResult<T>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Some(Err(already_resolved()));
        };
        let result = match receiver.try_recv() {
            Ok(value) => Ok(value),
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(lost_job()),
        };
        self.receiver = None;
        Some(result)
    }

    fn poll_result(&mut self, cx: &mut Context<'_>) -> Poll<RpcResult<T>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(Err(already_resolved()));
        };
        let result = ready!(Pin::new(receiver).poll(cx)).map_err(|_| lost_job());
        self.receiver = None;
        Poll::Ready(result)
    }

    /// Park the current thread until the result arrives or `deadline` passes.
    fn block_until(&mut self, deadline: Option<Instant>) -> Option<RpcResult<T>> {
        let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            if let Poll::Ready(result) = self.poll_result(&mut cx) {
                return Some(result);
            }
            match deadline {
                None => std::thread::park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    std::thread::park_timeout(deadline - now);
                }
            }
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = RpcResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.poll_result(cx)
    }
}

/// Unparks the waiting thread when the job completes.
struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

fn ensure_blocking_allowed() -> RpcResult<()> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(RpcError::Internal(
            "blocking wait called from inside an async runtime, await the completion instead"
                .into(),
        ));
    }
    Ok(())
}

fn lost_job() -> RpcError {
    RpcError::Internal("job dropped before completing".into())
}

fn already_resolved() -> RpcError {
    RpcError::Internal("completion already resolved".into())
}
