use sqlx::SqlitePool;
use tracing::info;

use crate::config::GOALS_ID;
use crate::db::models::{CycleResultRow, CycleRow, SellerRow, SnapshotRow, SprintRow};
use crate::db::now_ms;
use crate::engine::{active_sprint, award_top_scorer, build_leaderboard};
use crate::error::{AppError, Result};
use crate::types::{
    ClosedCycle, DailySprint, Goals, LeaderboardSnapshot, Seller, SellerMetrics, SellerWithPrizes,
};

const SELLER_COLUMNS: &str =
    "id, name, email, sales_value, ticket_average, pa, points, extra_points";

// ---------------------------------------------------------------------------
// Sellers
// ---------------------------------------------------------------------------

pub async fn list_sellers(pool: &SqlitePool) -> Result<Vec<Seller>> {
    let rows: Vec<SellerRow> =
        sqlx::query_as(&format!("SELECT {SELLER_COLUMNS} FROM sellers ORDER BY created_at, id"))
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(Seller::from).collect())
}

pub async fn get_seller(pool: &SqlitePool, id: &str) -> Result<Seller> {
    let row: Option<SellerRow> =
        sqlx::query_as(&format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    row.map(Seller::from)
        .ok_or_else(|| AppError::NotFound(format!("seller {id}")))
}

pub async fn insert_seller(pool: &SqlitePool, seller: &Seller) -> Result<()> {
    let now = now_ms();
    let m = &seller.metrics;
    let result = sqlx::query(
        r#"
        INSERT INTO sellers (
            id, name, email, sales_value, ticket_average, pa, points, extra_points,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&seller.id)
    .bind(&seller.name)
    .bind(&seller.email)
    .bind(m.sales_value)
    .bind(m.ticket_average)
    .bind(m.pa)
    .bind(m.points)
    .bind(m.extra_points)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AppError::Conflict(format!("seller {} already exists", seller.id)))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_metrics(
    pool: &SqlitePool,
    id: &str,
    metrics: &SellerMetrics,
) -> Result<Seller> {
    let affected = sqlx::query(
        r#"
        UPDATE sellers
        SET sales_value = ?, ticket_average = ?, pa = ?, points = ?, extra_points = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(metrics.sales_value)
    .bind(metrics.ticket_average)
    .bind(metrics.pa)
    .bind(metrics.points)
    .bind(metrics.extra_points)
    .bind(now_ms())
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound(format!("seller {id}")));
    }
    get_seller(pool, id).await
}

/// Adds `amount` (which may be negative) to a seller's extra points, never
/// letting the balance drop below zero.
pub async fn add_extra_points(pool: &SqlitePool, id: &str, amount: f64) -> Result<Seller> {
    let affected = sqlx::query(
        "UPDATE sellers SET extra_points = MAX(0, extra_points + ?), updated_at = ? WHERE id = ?",
    )
    .bind(amount)
    .bind(now_ms())
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound(format!("seller {id}")));
    }
    get_seller(pool, id).await
}

/// Removes a seller together with its leaderboard history. Archived cycle
/// results are kept.
pub async fn delete_seller(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    let affected = sqlx::query("DELETE FROM sellers WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound(format!("seller {id}")));
    }
    sqlx::query("DELETE FROM leaderboard_snapshots WHERE seller_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// The stored goal configuration, or `None` before an administrator saved one.
pub async fn load_goals(pool: &SqlitePool) -> Result<Option<Goals>> {
    let config: Option<String> = sqlx::query_scalar("SELECT config FROM goals WHERE id = ?")
        .bind(GOALS_ID)
        .fetch_optional(pool)
        .await?;
    match config {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub async fn save_goals(pool: &SqlitePool, goals: &Goals) -> Result<()> {
    let config = serde_json::to_string(goals)?;
    sqlx::query(
        r#"
        INSERT INTO goals (id, config, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            config = excluded.config,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(GOALS_ID)
    .bind(config)
    .bind(now_ms())
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Sprints
// ---------------------------------------------------------------------------

pub async fn list_sprints(pool: &SqlitePool) -> Result<Vec<DailySprint>> {
    let rows: Vec<SprintRow> = sqlx::query_as(
        "SELECT id, title, participant_ids, tiers, is_active FROM sprints ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(DailySprint::try_from).collect()
}

/// Stores a new sprint. Sprints are always created inactive.
pub async fn insert_sprint(pool: &SqlitePool, sprint: &DailySprint) -> Result<DailySprint> {
    let participant_ids = serde_json::to_string(&sprint.participant_ids)?;
    let tiers = serde_json::to_string(&sprint.tiers)?;
    let result = sqlx::query(
        r#"
        INSERT INTO sprints (id, title, participant_ids, tiers, is_active, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&sprint.id)
    .bind(&sprint.title)
    .bind(participant_ids)
    .bind(tiers)
    .bind(now_ms())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(DailySprint { is_active: false, ..sprint.clone() }),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AppError::Conflict(format!("sprint {} already exists", sprint.id)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Activates or deactivates a sprint. Activation deactivates every other
/// sprint in the same transaction, so at most one is active afterwards.
pub async fn set_sprint_active(pool: &SqlitePool, id: &str, active: bool) -> Result<()> {
    let mut tx = pool.begin().await?;

    if active {
        sqlx::query("UPDATE sprints SET is_active = 0 WHERE id != ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    let affected = sqlx::query("UPDATE sprints SET is_active = ? WHERE id = ?")
        .bind(i64::from(active))
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if affected == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("sprint {id}")));
    }
    tx.commit().await?;
    Ok(())
}

pub async fn delete_sprint(pool: &SqlitePool, id: &str) -> Result<()> {
    let affected = sqlx::query("DELETE FROM sprints WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound(format!("sprint {id}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Leaderboard history
// ---------------------------------------------------------------------------

pub async fn insert_snapshots(
    pool: &SqlitePool,
    leaderboard: &[SellerWithPrizes],
    taken_at: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    for entry in leaderboard {
        sqlx::query(
            r#"
            INSERT INTO leaderboard_snapshots (seller_id, rank, total_prize, sales_value, taken_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.seller.id)
        .bind(i64::from(entry.rank))
        .bind(entry.total_prize)
        .bind(entry.seller.metrics.sales_value)
        .bind(taken_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Keeps the newest `retention` snapshots per seller. Returns rows deleted.
pub async fn prune_snapshots(pool: &SqlitePool, retention: i64) -> Result<u64> {
    let deleted = sqlx::query(
        r#"
        DELETE FROM leaderboard_snapshots
        WHERE id IN (
            SELECT id FROM (
                SELECT id, ROW_NUMBER() OVER (
                    PARTITION BY seller_id ORDER BY taken_at DESC, id DESC
                ) AS rn
                FROM leaderboard_snapshots
            )
            WHERE rn > ?
        )
        "#,
    )
    .bind(retention)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(deleted)
}

/// Snapshots for one seller, newest first.
pub async fn seller_history(
    pool: &SqlitePool,
    seller_id: &str,
    limit: i64,
) -> Result<Vec<LeaderboardSnapshot>> {
    let rows: Vec<SnapshotRow> = sqlx::query_as(
        r#"
        SELECT seller_id, rank, total_prize, sales_value, taken_at
        FROM leaderboard_snapshots
        WHERE seller_id = ?
        ORDER BY taken_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(seller_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(LeaderboardSnapshot::from).collect())
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

/// Closes the current cycle in one transaction: computes the leaderboard from
/// the stored sellers, sprints and goals, archives it, zeroes the archived
/// sellers' metrics and deactivates all sprints.
///
/// The cycle row is written first so the transaction holds the write lock
/// before anything is read; no metric update can land between the archive and
/// the reset.
pub async fn close_cycle(pool: &SqlitePool, closed_at: i64) -> Result<ClosedCycle> {
    let mut tx = pool.begin().await?;

    let cycle_id = sqlx::query("INSERT INTO cycles (closed_at, top_scorer_id) VALUES (?, NULL)")
        .bind(closed_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    let seller_rows: Vec<SellerRow> =
        sqlx::query_as(&format!("SELECT {SELLER_COLUMNS} FROM sellers ORDER BY created_at, id"))
            .fetch_all(&mut *tx)
            .await?;
    let sellers: Vec<Seller> = seller_rows.into_iter().map(Seller::from).collect();

    let sprint_rows: Vec<SprintRow> = sqlx::query_as(
        "SELECT id, title, participant_ids, tiers, is_active FROM sprints ORDER BY created_at, id",
    )
    .fetch_all(&mut *tx)
    .await?;
    let sprints = sprint_rows
        .into_iter()
        .map(DailySprint::try_from)
        .collect::<Result<Vec<_>>>()?;

    let config: Option<String> = sqlx::query_scalar("SELECT config FROM goals WHERE id = ?")
        .bind(GOALS_ID)
        .fetch_optional(&mut *tx)
        .await?;
    let goals: Goals = match config {
        Some(json) => serde_json::from_str(&json)?,
        None => Goals::default(),
    };

    let mut leaderboard = build_leaderboard(&sellers, &goals, active_sprint(&sprints));
    let top_scorer_id = award_top_scorer(&mut leaderboard, &goals);

    sqlx::query("UPDATE cycles SET top_scorer_id = ? WHERE id = ?")
        .bind(top_scorer_id.as_deref())
        .bind(cycle_id)
        .execute(&mut *tx)
        .await?;

    for entry in &leaderboard {
        let s = &entry.seller;
        let m = &s.metrics;
        sqlx::query(
            r#"
            INSERT INTO cycle_results (
                cycle_id, seller_id, name, email, rank,
                sales_value, ticket_average, pa, points, extra_points,
                prize_sales_value, prize_ticket_average, prize_pa, prize_points,
                sprint_prize, top_scorer_bonus, total_prize
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(cycle_id)
        .bind(&s.id)
        .bind(&s.name)
        .bind(&s.email)
        .bind(i64::from(entry.rank))
        .bind(m.sales_value)
        .bind(m.ticket_average)
        .bind(m.pa)
        .bind(m.points)
        .bind(m.extra_points)
        .bind(entry.prizes.sales_value)
        .bind(entry.prizes.ticket_average)
        .bind(entry.prizes.pa)
        .bind(entry.prizes.points)
        .bind(entry.sprint_prize)
        .bind(entry.top_scorer_bonus)
        .bind(entry.total_prize)
        .execute(&mut *tx)
        .await?;

        // only what was archived is reset
        sqlx::query(
            r#"
            UPDATE sellers
            SET sales_value = 0, ticket_average = 0, pa = 0, points = 0, extra_points = 0,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(closed_at)
        .bind(&s.id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE sprints SET is_active = 0")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(cycle_id, archived = leaderboard.len(), top_scorer = ?top_scorer_id, "Cycle closed");

    Ok(ClosedCycle { id: cycle_id, closed_at, top_scorer_id, results: leaderboard })
}

pub async fn load_cycle(pool: &SqlitePool, cycle_id: i64) -> Result<ClosedCycle> {
    let cycle: CycleRow =
        sqlx::query_as("SELECT id, closed_at, top_scorer_id FROM cycles WHERE id = ?")
            .bind(cycle_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cycle {cycle_id}")))?;

    let rows: Vec<CycleResultRow> = sqlx::query_as(
        r#"
        SELECT seller_id, name, email, rank,
               sales_value, ticket_average, pa, points, extra_points,
               prize_sales_value, prize_ticket_average, prize_pa, prize_points,
               sprint_prize, top_scorer_bonus, total_prize
        FROM cycle_results
        WHERE cycle_id = ?
        ORDER BY rank, seller_id
        "#,
    )
    .bind(cycle_id)
    .fetch_all(pool)
    .await?;

    Ok(ClosedCycle {
        id: cycle.id,
        closed_at: cycle.closed_at,
        top_scorer_id: cycle.top_scorer_id,
        results: rows.into_iter().map(SellerWithPrizes::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;
    use crate::types::{GoalLevels, GoalTier, PointsGoals, SalesValueGoals, SprintTier};

    fn seller(id: &str, sales_value: f64) -> Seller {
        Seller {
            id: id.to_string(),
            name: format!("Seller {id}"),
            email: String::new(),
            metrics: SellerMetrics { sales_value, points: 10.0, ..SellerMetrics::default() },
        }
    }

    fn sprint(id: &str) -> DailySprint {
        DailySprint {
            id: id.to_string(),
            title: format!("Sprint {id}"),
            participant_ids: vec!["a".to_string()],
            tiers: vec![SprintTier { goal: 100.0, prize: 10.0, label: "first".to_string() }],
            is_active: true,
        }
    }

    #[tokio::test]
    async fn seller_crud_round_trip() {
        let pool = connect_memory().await.unwrap();
        insert_seller(&pool, &seller("a", 100.0)).await.unwrap();
        insert_seller(&pool, &seller("b", 200.0)).await.unwrap();

        let dup = insert_seller(&pool, &seller("a", 1.0)).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        let metrics = SellerMetrics { sales_value: 5_000.0, pa: 2.5, ..SellerMetrics::default() };
        let updated = update_metrics(&pool, "a", &metrics).await.unwrap();
        assert_eq!(updated.metrics, metrics);

        delete_seller(&pool, "b").await.unwrap();
        let all = list_sellers(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "a");

        assert!(matches!(get_seller(&pool, "b").await, Err(AppError::NotFound(_))));
        assert!(matches!(
            update_metrics(&pool, "zz", &metrics).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn extra_points_never_go_negative() {
        let pool = connect_memory().await.unwrap();
        insert_seller(&pool, &seller("a", 0.0)).await.unwrap();

        let s = add_extra_points(&pool, "a", 15.0).await.unwrap();
        assert_eq!(s.metrics.extra_points, 15.0);
        let s = add_extra_points(&pool, "a", -40.0).await.unwrap();
        assert_eq!(s.metrics.extra_points, 0.0);
    }

    #[tokio::test]
    async fn goals_upsert_and_reload() {
        let pool = connect_memory().await.unwrap();
        assert!(load_goals(&pool).await.unwrap().is_none());

        let mut goals = Goals {
            sales_value: SalesValueGoals {
                levels: GoalLevels {
                    metinha: Some(GoalTier::new(10.0, 1.0)),
                    ..GoalLevels::default()
                },
                performance_bonus: None,
            },
            ..Goals::default()
        };
        save_goals(&pool, &goals).await.unwrap();
        goals.points.top_scorer_prize = Some(99.0);
        save_goals(&pool, &goals).await.unwrap();

        assert_eq!(load_goals(&pool).await.unwrap(), Some(goals));
    }

    #[tokio::test]
    async fn activating_a_sprint_deactivates_the_rest() {
        let pool = connect_memory().await.unwrap();
        let created = insert_sprint(&pool, &sprint("s1")).await.unwrap();
        assert!(!created.is_active);
        insert_sprint(&pool, &sprint("s2")).await.unwrap();

        set_sprint_active(&pool, "s1", true).await.unwrap();
        set_sprint_active(&pool, "s2", true).await.unwrap();

        let sprints = list_sprints(&pool).await.unwrap();
        let active: Vec<&str> =
            sprints.iter().filter(|s| s.is_active).map(|s| s.id.as_str()).collect();
        assert_eq!(active, vec!["s2"]);
        assert_eq!(sprints[0].tiers.len(), 1);

        set_sprint_active(&pool, "s2", false).await.unwrap();
        assert!(list_sprints(&pool).await.unwrap().iter().all(|s| !s.is_active));

        assert!(matches!(
            set_sprint_active(&pool, "missing", true).await,
            Err(AppError::NotFound(_))
        ));
        // the failed activation must not have touched the others
        set_sprint_active(&pool, "s1", true).await.unwrap();
        assert!(matches!(
            set_sprint_active(&pool, "missing", true).await,
            Err(AppError::NotFound(_))
        ));
        let still_active = list_sprints(&pool).await.unwrap();
        assert!(still_active.iter().any(|s| s.id == "s1" && s.is_active));
    }

    #[tokio::test]
    async fn history_is_pruned_per_seller() {
        let pool = connect_memory().await.unwrap();
        let roster = vec![seller("a", 300.0), seller("b", 100.0)];
        let board = build_leaderboard(&roster, &Goals::default(), None);
        for t in 1..=5 {
            insert_snapshots(&pool, &board, t).await.unwrap();
        }

        let deleted = prune_snapshots(&pool, 3).await.unwrap();
        assert_eq!(deleted, 4);

        let history = seller_history(&pool, "a", 10).await.unwrap();
        assert_eq!(history.iter().map(|h| h.taken_at).collect::<Vec<_>>(), vec![5, 4, 3]);
        assert!(history.iter().all(|h| h.rank == 1));
        assert_eq!(seller_history(&pool, "b", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closing_a_cycle_archives_and_resets() {
        let pool = connect_memory().await.unwrap();
        insert_seller(&pool, &seller("a", 300.0)).await.unwrap();
        insert_seller(&pool, &seller("b", 500.0)).await.unwrap();
        insert_sprint(&pool, &sprint("s1")).await.unwrap();
        set_sprint_active(&pool, "s1", true).await.unwrap();
        let goals = Goals {
            points: PointsGoals { top_scorer_prize: Some(50.0), ..PointsGoals::default() },
            ..Goals::default()
        };
        save_goals(&pool, &goals).await.unwrap();
        add_extra_points(&pool, "a", 5.0).await.unwrap();

        let roster = list_sellers(&pool).await.unwrap();
        let sprints = list_sprints(&pool).await.unwrap();
        let mut expected = build_leaderboard(&roster, &goals, active_sprint(&sprints));
        award_top_scorer(&mut expected, &goals);

        let closed = close_cycle(&pool, 42).await.unwrap();
        assert_eq!(closed.top_scorer_id.as_deref(), Some("a"));
        assert_eq!(closed.results, expected);

        let cycle = load_cycle(&pool, closed.id).await.unwrap();
        assert_eq!(cycle, closed);

        for s in list_sellers(&pool).await.unwrap() {
            assert_eq!(s.metrics, SellerMetrics::default());
        }
        assert!(list_sprints(&pool).await.unwrap().iter().all(|s| !s.is_active));
        assert!(matches!(load_cycle(&pool, closed.id + 1).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn closing_a_cycle_archives_the_latest_metrics() {
        let pool = connect_memory().await.unwrap();
        insert_seller(&pool, &seller("a", 100.0)).await.unwrap();

        // a stale read taken before the update must not decide what is archived
        let stale = list_sellers(&pool).await.unwrap();
        assert_eq!(stale[0].metrics.sales_value, 100.0);
        let metrics = SellerMetrics { sales_value: 9_000.0, ..SellerMetrics::default() };
        update_metrics(&pool, "a", &metrics).await.unwrap();

        let closed = close_cycle(&pool, 7).await.unwrap();
        assert_eq!(closed.results.len(), 1);
        assert_eq!(closed.results[0].seller.metrics.sales_value, 9_000.0);

        let archived = load_cycle(&pool, closed.id).await.unwrap();
        assert_eq!(archived.results[0].seller.metrics.sales_value, 9_000.0);
        assert_eq!(get_seller(&pool, "a").await.unwrap().metrics.sales_value, 0.0);
    }

    #[tokio::test]
    async fn deleting_a_seller_drops_its_history() {
        let pool = connect_memory().await.unwrap();
        insert_seller(&pool, &seller("a", 100.0)).await.unwrap();
        insert_seller(&pool, &seller("b", 50.0)).await.unwrap();
        let roster = list_sellers(&pool).await.unwrap();
        let board = build_leaderboard(&roster, &Goals::default(), None);
        insert_snapshots(&pool, &board, 1).await.unwrap();
        insert_snapshots(&pool, &board, 2).await.unwrap();

        delete_seller(&pool, "a").await.unwrap();
        insert_seller(&pool, &seller("a", 0.0)).await.unwrap();

        assert!(seller_history(&pool, "a", 10).await.unwrap().is_empty());
        assert_eq!(seller_history(&pool, "b", 10).await.unwrap().len(), 2);
        assert!(matches!(delete_seller(&pool, "zz").await, Err(AppError::NotFound(_))));
    }
}
