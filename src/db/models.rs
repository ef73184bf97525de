//! Database row types matching `migrations/0001_initial.sql`.
//! Used by sqlx for typed queries, converted into domain types at the edge.

use crate::error::Result;
use crate::types::{
    DailySprint, LeaderboardSnapshot, MetricPrizes, Seller, SellerMetrics, SellerWithPrizes,
};

#[derive(Debug, sqlx::FromRow)]
pub struct SellerRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub sales_value: f64,
    pub ticket_average: f64,
    pub pa: f64,
    pub points: f64,
    pub extra_points: f64,
}

impl From<SellerRow> for Seller {
    fn from(r: SellerRow) -> Self {
        Seller {
            id: r.id,
            name: r.name,
            email: r.email,
            metrics: SellerMetrics {
                sales_value: r.sales_value,
                ticket_average: r.ticket_average,
                pa: r.pa,
                points: r.points,
                extra_points: r.extra_points,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SprintRow {
    pub id: String,
    pub title: String,
    /// JSON array of seller ids.
    pub participant_ids: String,
    /// JSON array of `SprintTier`.
    pub tiers: String,
    pub is_active: i64,
}

impl TryFrom<SprintRow> for DailySprint {
    type Error = crate::error::AppError;

    fn try_from(r: SprintRow) -> Result<Self> {
        Ok(DailySprint {
            id: r.id,
            title: r.title,
            participant_ids: serde_json::from_str(&r.participant_ids)?,
            tiers: serde_json::from_str(&r.tiers)?,
            is_active: r.is_active != 0,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub seller_id: String,
    pub rank: i64,
    pub total_prize: f64,
    pub sales_value: f64,
    pub taken_at: i64,
}

impl From<SnapshotRow> for LeaderboardSnapshot {
    fn from(r: SnapshotRow) -> Self {
        LeaderboardSnapshot {
            seller_id: r.seller_id,
            rank: r.rank.max(0) as u32,
            total_prize: r.total_prize,
            sales_value: r.sales_value,
            taken_at: r.taken_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CycleRow {
    pub id: i64,
    pub closed_at: i64,
    pub top_scorer_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CycleResultRow {
    pub seller_id: String,
    pub name: String,
    pub email: String,
    pub rank: i64,
    pub sales_value: f64,
    pub ticket_average: f64,
    pub pa: f64,
    pub points: f64,
    pub extra_points: f64,
    pub prize_sales_value: f64,
    pub prize_ticket_average: f64,
    pub prize_pa: f64,
    pub prize_points: f64,
    pub sprint_prize: f64,
    pub top_scorer_bonus: f64,
    pub total_prize: f64,
}

impl From<CycleResultRow> for SellerWithPrizes {
    fn from(r: CycleResultRow) -> Self {
        SellerWithPrizes {
            seller: Seller {
                id: r.seller_id,
                name: r.name,
                email: r.email,
                metrics: SellerMetrics {
                    sales_value: r.sales_value,
                    ticket_average: r.ticket_average,
                    pa: r.pa,
                    points: r.points,
                    extra_points: r.extra_points,
                },
            },
            prizes: MetricPrizes {
                sales_value: r.prize_sales_value,
                ticket_average: r.prize_ticket_average,
                pa: r.prize_pa,
                points: r.prize_points,
            },
            sprint_prize: r.sprint_prize,
            top_scorer_bonus: r.top_scorer_bonus,
            total_prize: r.total_prize,
            rank: r.rank.max(0) as u32,
        }
    }
}
