use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::db::{now_ms, queries};
use crate::engine::build_leaderboard;
use crate::error::Result;
use crate::state::RosterStore;

/// Background task that records the leaderboard at a fixed interval.
/// Computes every seller's rank and total prize from the roster store and
/// appends one `leaderboard_snapshots` row per seller, then prunes old rows.
pub struct LeaderboardSnapshotter {
    pool: sqlx::SqlitePool,
    store: Arc<RosterStore>,
    health: Arc<HealthState>,
    interval_secs: u64,
    retention: i64,
}

impl LeaderboardSnapshotter {
    pub fn new(
        pool: sqlx::SqlitePool,
        store: Arc<RosterStore>,
        health: Arc<HealthState>,
        interval_secs: u64,
        retention: i64,
    ) -> Self {
        Self { pool, store, health, interval_secs, retention }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            if let Err(e) = self.snapshot().await {
                self.health.record_snapshot_failure();
                error!("Snapshot error: {e}");
            }
        }
    }

    async fn snapshot(&self) -> Result<usize> {
        let sellers = self.store.all_sellers();
        if sellers.is_empty() {
            debug!("Snapshot skipped: no sellers");
            return Ok(0);
        }

        let goals = self.store.goals();
        let sprint = self.store.active_sprint();
        let board = build_leaderboard(&sellers, &goals, sprint.as_ref());

        let taken_at = now_ms();
        queries::insert_snapshots(&self.pool, &board, taken_at).await?;
        let pruned = queries::prune_snapshots(&self.pool, self.retention).await?;
        self.health.record_snapshot(taken_at);

        info!(sellers = board.len(), pruned, "Leaderboard snapshot stored");
        Ok(board.len())
    }
}
