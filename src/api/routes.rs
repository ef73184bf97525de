use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::api::health::HealthState;
use crate::config::{HISTORY_DEFAULT_LIMIT, HISTORY_MAX_LIMIT};
use crate::db::{now_ms, queries};
use crate::engine::{award_top_scorer, build_leaderboard, calculate_seller_prizes};
use crate::error::{AppError, Result};
use crate::state::RosterStore;
use crate::types::{
    ClosedCycle, DailySprint, Goals, LeaderboardSnapshot, Seller, SellerMetrics, SellerWithPrizes,
};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub store: Arc<RosterStore>,
    pub health: Arc<HealthState>,
    /// Held from a database write until the store mirrors it, so the cache
    /// applies writes in the order the database committed them.
    writes: Arc<Mutex<()>>,
}

impl ApiState {
    pub fn new(pool: sqlx::SqlitePool, store: Arc<RosterStore>, health: Arc<HealthState>) -> Self {
        Self { pool, store, health, writes: Arc::new(Mutex::new(())) }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/sellers", get(list_sellers).post(create_seller))
        .route("/sellers/:id", get(get_seller).delete(delete_seller))
        .route("/sellers/:id/metrics", put(put_metrics))
        .route("/sellers/:id/extra-points", post(add_extra_points))
        .route("/sellers/:id/history", get(get_seller_history))
        .route("/goals", get(get_goals).put(put_goals))
        .route("/sprints", get(list_sprints).post(create_sprint))
        .route("/sprints/:id", axum::routing::delete(delete_sprint))
        .route("/sprints/:id/activate", post(activate_sprint))
        .route("/sprints/:id/deactivate", post(deactivate_sprint))
        .route("/leaderboard", get(get_leaderboard))
        .route("/cycles/close", post(close_cycle))
        .route("/cycles/:id", get(get_cycle))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / query structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct ExtraPointsRequest {
    pub amount: f64,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub sellers: usize,
    pub active_sprint_id: Option<String>,
    pub last_snapshot_at_ms: Option<i64>,
    pub snapshots_taken: u64,
    pub snapshot_failures: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub active_sprint: Option<DailySprint>,
    pub top_scorer_id: Option<String>,
    pub sellers: Vec<SellerWithPrizes>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_snapshot_at_ms();
    Json(HealthResponse {
        status: "ok",
        sellers: state.store.seller_count(),
        active_sprint_id: state.store.active_sprint().map(|s| s.id),
        last_snapshot_at_ms: (last > 0).then_some(last),
        snapshots_taken: state.health.snapshots_taken(),
        snapshot_failures: state.health.snapshot_failures(),
    })
}

// --- sellers ---

async fn list_sellers(State(state): State<ApiState>) -> Json<Vec<Seller>> {
    Json(state.store.all_sellers())
}

async fn create_seller(
    State(state): State<ApiState>,
    Json(seller): Json<Seller>,
) -> Result<(StatusCode, Json<Seller>)> {
    seller.validate()?;
    let _writes = state.writes.lock().await;
    queries::insert_seller(&state.pool, &seller).await?;
    state.store.upsert_seller(seller.clone());
    info!(seller_id = %seller.id, "Seller created");
    Ok((StatusCode::CREATED, Json(seller)))
}

async fn get_seller(
    State(state): State<ApiState>,
    Path(seller_id): Path<String>,
) -> Result<Json<SellerWithPrizes>> {
    let seller = state
        .store
        .get_seller(&seller_id)
        .ok_or_else(|| AppError::NotFound(format!("seller {seller_id}")))?;
    let all = state.store.all_sellers();
    let goals = state.store.goals();
    let sprint = state.store.active_sprint();
    Ok(Json(calculate_seller_prizes(&seller, &all, &goals, sprint.as_ref())))
}

async fn put_metrics(
    State(state): State<ApiState>,
    Path(seller_id): Path<String>,
    Json(metrics): Json<SellerMetrics>,
) -> Result<Json<Seller>> {
    metrics.validate()?;
    let _writes = state.writes.lock().await;
    let seller = queries::update_metrics(&state.pool, &seller_id, &metrics).await?;
    state.store.upsert_seller(seller.clone());
    Ok(Json(seller))
}

async fn add_extra_points(
    State(state): State<ApiState>,
    Path(seller_id): Path<String>,
    Json(req): Json<ExtraPointsRequest>,
) -> Result<Json<Seller>> {
    if !req.amount.is_finite() {
        return Err(AppError::Validation("amount must be a finite number".to_string()));
    }
    let _writes = state.writes.lock().await;
    let seller = queries::add_extra_points(&state.pool, &seller_id, req.amount).await?;
    state.store.upsert_seller(seller.clone());
    info!(seller_id = %seller_id, amount = req.amount, "Extra points awarded");
    Ok(Json(seller))
}

async fn delete_seller(
    State(state): State<ApiState>,
    Path(seller_id): Path<String>,
) -> Result<StatusCode> {
    let _writes = state.writes.lock().await;
    queries::delete_seller(&state.pool, &seller_id).await?;
    state.store.remove_seller(&seller_id);
    info!(seller_id = %seller_id, "Seller deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_seller_history(
    State(state): State<ApiState>,
    Path(seller_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<LeaderboardSnapshot>>> {
    if state.store.get_seller(&seller_id).is_none() {
        return Err(AppError::NotFound(format!("seller {seller_id}")));
    }
    let limit = params.limit.unwrap_or(HISTORY_DEFAULT_LIMIT).clamp(1, HISTORY_MAX_LIMIT);
    let history = queries::seller_history(&state.pool, &seller_id, limit).await?;
    Ok(Json(history))
}

// --- goals ---

async fn get_goals(State(state): State<ApiState>) -> Json<Goals> {
    Json(state.store.goals())
}

async fn put_goals(State(state): State<ApiState>, Json(goals): Json<Goals>) -> Result<Json<Goals>> {
    goals.validate()?;
    let _writes = state.writes.lock().await;
    queries::save_goals(&state.pool, &goals).await?;
    state.store.set_goals(goals);
    info!("Goals updated");
    Ok(Json(goals))
}

// --- sprints ---

async fn list_sprints(State(state): State<ApiState>) -> Json<Vec<DailySprint>> {
    Json(state.store.sprints())
}

async fn create_sprint(
    State(state): State<ApiState>,
    Json(sprint): Json<DailySprint>,
) -> Result<(StatusCode, Json<DailySprint>)> {
    sprint.validate()?;
    let _writes = state.writes.lock().await;
    let created = queries::insert_sprint(&state.pool, &sprint).await?;
    state.store.upsert_sprint(created.clone());
    info!(sprint_id = %created.id, tiers = created.tiers.len(), "Sprint created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn activate_sprint(
    State(state): State<ApiState>,
    Path(sprint_id): Path<String>,
) -> Result<Json<Vec<DailySprint>>> {
    let _writes = state.writes.lock().await;
    queries::set_sprint_active(&state.pool, &sprint_id, true).await?;
    state.store.set_sprint_active(&sprint_id, true);
    info!(sprint_id = %sprint_id, "Sprint activated");
    Ok(Json(state.store.sprints()))
}

async fn deactivate_sprint(
    State(state): State<ApiState>,
    Path(sprint_id): Path<String>,
) -> Result<Json<Vec<DailySprint>>> {
    let _writes = state.writes.lock().await;
    queries::set_sprint_active(&state.pool, &sprint_id, false).await?;
    state.store.set_sprint_active(&sprint_id, false);
    info!(sprint_id = %sprint_id, "Sprint deactivated");
    Ok(Json(state.store.sprints()))
}

async fn delete_sprint(
    State(state): State<ApiState>,
    Path(sprint_id): Path<String>,
) -> Result<StatusCode> {
    let _writes = state.writes.lock().await;
    queries::delete_sprint(&state.pool, &sprint_id).await?;
    state.store.remove_sprint(&sprint_id);
    Ok(StatusCode::NO_CONTENT)
}

// --- leaderboard & cycles ---

async fn get_leaderboard(State(state): State<ApiState>) -> Json<LeaderboardResponse> {
    let sellers = state.store.all_sellers();
    let goals = state.store.goals();
    let active_sprint = state.store.active_sprint();

    let mut board = build_leaderboard(&sellers, &goals, active_sprint.as_ref());
    let top_scorer_id = award_top_scorer(&mut board, &goals);

    Json(LeaderboardResponse { active_sprint, top_scorer_id, sellers: board })
}

/// Archives the current leaderboard and starts a fresh cycle. The database
/// computes what is archived; the store is then reloaded from it.
async fn close_cycle(State(state): State<ApiState>) -> Result<(StatusCode, Json<ClosedCycle>)> {
    let _writes = state.writes.lock().await;
    let closed = queries::close_cycle(&state.pool, now_ms()).await?;

    state.store.replace_sellers(queries::list_sellers(&state.pool).await?);
    state.store.replace_sprints(queries::list_sprints(&state.pool).await?);

    Ok((StatusCode::CREATED, Json(closed)))
}

async fn get_cycle(
    State(state): State<ApiState>,
    Path(cycle_id): Path<i64>,
) -> Result<Json<ClosedCycle>> {
    Ok(Json(queries::load_cycle(&state.pool, cycle_id).await?))
}
