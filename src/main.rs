mod api;
mod config;
mod db;
mod engine;
mod error;
mod history;
mod state;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::queries;
use crate::error::Result;
use crate::history::LeaderboardSnapshotter;
use crate::state::RosterStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- In-memory roster store ---
    let store = RosterStore::new();
    store.add_sellers(queries::list_sellers(&pool).await?);
    store.add_sprints(queries::list_sprints(&pool).await?);
    match queries::load_goals(&pool).await? {
        Some(goals) => store.set_goals(goals),
        None => {
            warn!("No goal configuration saved yet: every prize evaluates to 0 until PUT /goals")
        }
    }

    let active_sprints = store.sprints().iter().filter(|s| s.is_active).count();
    if active_sprints > 1 {
        warn!(active_sprints, "More than one sprint flagged active; the first one is used");
    }
    info!(
        sellers = store.seller_count(),
        sprints = store.sprints().len(),
        active_sprint = %store.active_sprint().map(|s| s.id).unwrap_or_else(|| "none".to_string()),
        "Roster loaded"
    );

    let health = Arc::new(HealthState::new());

    // --- Spawn tasks ---

    // Leaderboard snapshotter (background)
    let snapshotter = LeaderboardSnapshotter::new(
        pool.clone(),
        Arc::clone(&store),
        Arc::clone(&health),
        cfg.snapshot_interval_secs,
        cfg.snapshot_retention,
    );
    tokio::spawn(async move { snapshotter.run().await });

    // HTTP API server
    let api_state = ApiState::new(pool.clone(), store, health);
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
