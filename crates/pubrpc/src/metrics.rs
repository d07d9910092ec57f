// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client counters.
//!
//! All fields use relaxed atomics: consumers only need monotonic snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated along the dispatch and drain paths.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    pub calls_dispatched: AtomicU64,
    pub dispatch_failures: AtomicU64,
    pub channels_allocated: AtomicU64,
    pub channels_released: AtomicU64,
    pub replies_accepted: AtomicU64,
    pub replies_skipped: AtomicU64,
    pub error_replies: AtomicU64,
    pub drains_completed: AtomicU64,
}

/// Point-in-time copy of [`ClientMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub calls_dispatched: u64,
    pub dispatch_failures: u64,
    pub channels_allocated: u64,
    pub channels_released: u64,
    pub replies_accepted: u64,
    pub replies_skipped: u64,
    pub error_replies: u64,
    pub drains_completed: u64,
}

impl MetricsSnapshot {
    /// Reply channels allocated but not yet released.
    pub fn channels_in_flight(&self) -> u64 {
        self.channels_allocated.saturating_sub(self.channels_released)
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_dispatched: self.calls_dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            channels_allocated: self.channels_allocated.load(Ordering::Relaxed),
            channels_released: self.channels_released.load(Ordering::Relaxed),
            replies_accepted: self.replies_accepted.load(Ordering::Relaxed),
            replies_skipped: self.replies_skipped.load(Ordering::Relaxed),
            error_replies: self.error_replies.load(Ordering::Relaxed),
            drains_completed: self.drains_completed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_bumps() {
        let metrics = ClientMetrics::new();
        ClientMetrics::bump(&metrics.channels_allocated);
        ClientMetrics::bump(&metrics.channels_allocated);
        ClientMetrics::bump(&metrics.channels_released);

        let snap = metrics.snapshot();
        assert_eq!(snap.channels_allocated, 2);
        assert_eq!(snap.channels_in_flight(), 1);
        assert_eq!(snap.calls_dispatched, 0);
    }
}
