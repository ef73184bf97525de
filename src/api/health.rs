//! Shared health state for the /health endpoint.
//! Updated by the leaderboard snapshotter.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Shared health metrics. Updated by background tasks, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Millisecond timestamp of the last successful snapshot (0 = none).
    pub last_snapshot_at_ms: AtomicI64,
    /// Snapshot runs completed since startup.
    pub snapshots_taken: AtomicU64,
    /// Snapshot runs that failed since startup.
    pub snapshot_failures: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_snapshot(&self, taken_at_ms: i64) {
        self.last_snapshot_at_ms.store(taken_at_ms, Ordering::Relaxed);
        self.snapshots_taken.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_snapshot_at_ms(&self) -> i64 {
        self.last_snapshot_at_ms.load(Ordering::Relaxed)
    }

    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken.load(Ordering::Relaxed)
    }

    pub fn snapshot_failures(&self) -> u64 {
        self.snapshot_failures.load(Ordering::Relaxed)
    }
}
