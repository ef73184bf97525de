use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Seller
// ---------------------------------------------------------------------------

/// Raw performance metrics accumulated over the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SellerMetrics {
    pub sales_value: f64,
    pub ticket_average: f64,
    /// Items per transaction.
    pub pa: f64,
    pub points: f64,
    /// Bonus points from sprints, courses and manual awards.
    pub extra_points: f64,
}

impl SellerMetrics {
    /// Points that count towards the points goal: base plus extra.
    pub fn total_points(&self) -> f64 {
        self.points + self.extra_points
    }

    /// Admin-side validation: every metric finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("salesValue", self.sales_value),
            ("ticketAverage", self.ticket_average),
            ("pa", self.pa),
            ("points", self.points),
            ("extraPoints", self.extra_points),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub metrics: SellerMetrics,
}

impl Seller {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation("seller id must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("seller name must not be empty".to_string()));
        }
        self.metrics.validate()
    }
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLevel {
    Metinha,
    Meta,
    Metona,
    Lendaria,
}

impl std::fmt::Display for TierLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TierLevel::Metinha => "metinha",
            TierLevel::Meta => "meta",
            TierLevel::Metona => "metona",
            TierLevel::Lendaria => "lendaria",
        };
        write!(f, "{s}")
    }
}

/// One goal tier: the minimum metric value and the prize for reaching it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalTier {
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub prize: f64,
}

impl GoalTier {
    pub fn new(threshold: f64, prize: f64) -> Self {
        Self { threshold, prize }
    }

    /// A tier with a zero (or negative, or NaN) threshold is not configured.
    pub fn is_configured(&self) -> bool {
        self.threshold > 0.0
    }
}

/// The four ordered tiers of one metric. Any of them may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalLevels {
    pub metinha: Option<GoalTier>,
    pub meta: Option<GoalTier>,
    pub metona: Option<GoalTier>,
    pub lendaria: Option<GoalTier>,
}

impl GoalLevels {
    pub fn new(metinha: GoalTier, meta: GoalTier, metona: GoalTier, lendaria: GoalTier) -> Self {
        Self {
            metinha: Some(metinha),
            meta: Some(meta),
            metona: Some(metona),
            lendaria: Some(lendaria),
        }
    }

    /// Tiers from highest to lowest, including unset ones.
    pub fn descending(&self) -> [(TierLevel, Option<GoalTier>); 4] {
        [
            (TierLevel::Lendaria, self.lendaria),
            (TierLevel::Metona, self.metona),
            (TierLevel::Meta, self.meta),
            (TierLevel::Metinha, self.metinha),
        ]
    }

    /// Configured tiers from lowest to highest.
    pub fn configured(&self) -> Vec<(TierLevel, GoalTier)> {
        let mut tiers: Vec<_> = self
            .descending()
            .into_iter()
            .filter_map(|(level, tier)| tier.filter(GoalTier::is_configured).map(|t| (level, t)))
            .collect();
        tiers.reverse();
        tiers
    }

    fn validate(&self, metric: &str) -> Result<()> {
        for (level, tier) in self.descending() {
            let Some(tier) = tier else { continue };
            if !tier.threshold.is_finite() || tier.threshold < 0.0 {
                return Err(AppError::Validation(format!(
                    "{metric}.{level}: threshold must be a non-negative number"
                )));
            }
            if !tier.prize.is_finite() || tier.prize < 0.0 {
                return Err(AppError::Validation(format!(
                    "{metric}.{level}: prize must be a non-negative number"
                )));
            }
        }
        for pair in self.configured().windows(2) {
            let (low_level, low) = pair[0];
            let (high_level, high) = pair[1];
            if high.threshold <= low.threshold {
                return Err(AppError::Validation(format!(
                    "{metric}: {high_level} threshold ({}) must be greater than \
                     {low_level} threshold ({})",
                    high.threshold,
                    low.threshold
                )));
            }
        }
        Ok(())
    }
}

/// Uncapped repeating bonus: `floor(value / per) * prize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBonus {
    pub per: f64,
    pub prize: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesValueGoals {
    #[serde(flatten)]
    pub levels: GoalLevels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_bonus: Option<PerformanceBonus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsGoals {
    #[serde(flatten)]
    pub levels: GoalLevels,
    /// Flat bonus for the single highest-scoring seller. Applied by
    /// `engine::award_top_scorer`, never by the per-seller calculation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_scorer_prize: Option<f64>,
}

/// A goal structure the prize engine can evaluate.
pub trait MetricGoal {
    fn levels(&self) -> &GoalLevels;

    fn performance_bonus(&self) -> Option<&PerformanceBonus> {
        None
    }
}

impl MetricGoal for GoalLevels {
    fn levels(&self) -> &GoalLevels {
        self
    }
}

impl MetricGoal for SalesValueGoals {
    fn levels(&self) -> &GoalLevels {
        &self.levels
    }

    fn performance_bonus(&self) -> Option<&PerformanceBonus> {
        self.performance_bonus.as_ref()
    }
}

impl MetricGoal for PointsGoals {
    fn levels(&self) -> &GoalLevels {
        &self.levels
    }
}

/// The active goal configuration. Every field defaults to "nothing
/// configured" so an empty document deserializes to a usable value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Goals {
    pub sales_value: SalesValueGoals,
    pub ticket_average: GoalLevels,
    pub pa: GoalLevels,
    pub points: PointsGoals,
}

impl Goals {
    /// Admin-side validation. The engine itself accepts anything.
    pub fn validate(&self) -> Result<()> {
        self.sales_value.levels.validate("salesValue")?;
        self.ticket_average.validate("ticketAverage")?;
        self.pa.validate("pa")?;
        self.points.levels.validate("points")?;

        if let Some(bonus) = &self.sales_value.performance_bonus {
            if !bonus.per.is_finite() || bonus.per <= 0.0 {
                return Err(AppError::Validation(
                    "salesValue.performanceBonus.per must be greater than zero".to_string(),
                ));
            }
            if !bonus.prize.is_finite() || bonus.prize < 0.0 {
                return Err(AppError::Validation(
                    "salesValue.performanceBonus.prize must be a non-negative number".to_string(),
                ));
            }
        }
        if let Some(prize) = self.points.top_scorer_prize {
            if !prize.is_finite() || prize < 0.0 {
                return Err(AppError::Validation(
                    "points.topScorerPrize must be a non-negative number".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintTier {
    /// Sales value required.
    pub goal: f64,
    /// Points awarded.
    pub prize: f64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySprint {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub tiers: Vec<SprintTier>,
    #[serde(default)]
    pub is_active: bool,
}

impl DailySprint {
    pub fn has_participant(&self, seller_id: &str) -> bool {
        self.participant_ids.iter().any(|p| p == seller_id)
    }

    /// Admin-side validation of a new sprint.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation("sprint id must not be empty".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("sprint title must not be empty".to_string()));
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if !tier.goal.is_finite() || tier.goal < 0.0 {
                return Err(AppError::Validation(format!(
                    "tiers[{i}].goal must be a non-negative number"
                )));
            }
            if !tier.prize.is_finite() || tier.prize < 0.0 {
                return Err(AppError::Validation(format!(
                    "tiers[{i}].prize must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Prize results
// ---------------------------------------------------------------------------

/// Prize earned per metric family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPrizes {
    pub sales_value: f64,
    pub ticket_average: f64,
    pub pa: f64,
    pub points: f64,
}

impl MetricPrizes {
    pub fn sum(&self) -> f64 {
        self.sales_value + self.ticket_average + self.pa + self.points
    }
}

/// A seller augmented with everything derived at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerWithPrizes {
    #[serde(flatten)]
    pub seller: Seller,
    pub prizes: MetricPrizes,
    pub sprint_prize: f64,
    /// Set only by the explicit top-scorer step.
    #[serde(default)]
    pub top_scorer_bonus: f64,
    pub total_prize: f64,
    /// 1-based position by sales value.
    pub rank: u32,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSnapshot {
    pub seller_id: String,
    pub rank: u32,
    pub total_prize: f64,
    pub sales_value: f64,
    /// Millisecond UTC epoch timestamp.
    pub taken_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedCycle {
    pub id: i64,
    /// Millisecond UTC epoch timestamp.
    pub closed_at: i64,
    pub top_scorer_id: Option<String>,
    pub results: Vec<SellerWithPrizes>,
}
