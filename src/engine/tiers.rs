use crate::types::MetricGoal;

/// Prize for a single metric value against its goal tiers.
///
/// Only the highest reached tier pays out; tiers are not cumulative. A value
/// exactly on a threshold reaches that tier. Unset or zero-threshold tiers are
/// skipped. A performance bonus with a positive step adds
/// `floor(value / per) * prize` whether or not any tier was reached.
///
/// Negative and NaN values are evaluated as 0. Never fails: an unconfigured
/// goal simply yields 0.
pub fn calculate_prize_for_metric<G: MetricGoal + ?Sized>(seller_value: f64, goal: &G) -> f64 {
    let value = if seller_value > 0.0 { seller_value } else { 0.0 };

    let base = goal
        .levels()
        .descending()
        .into_iter()
        .filter_map(|(_, tier)| tier)
        .find(|tier| tier.is_configured() && tier.threshold <= value)
        .map_or(0.0, |tier| tier.prize);

    let bonus = match goal.performance_bonus() {
        Some(b) if b.per > 0.0 && b.per.is_finite() => (value / b.per).floor() * b.prize,
        _ => 0.0,
    };

    (base + bonus).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GoalLevels, GoalTier, PerformanceBonus, SalesValueGoals};

    fn sales_levels() -> GoalLevels {
        GoalLevels::new(
            GoalTier::new(10_000.0, 100.0),
            GoalTier::new(15_000.0, 150.0),
            GoalTier::new(20_000.0, 200.0),
            GoalTier::new(25_000.0, 300.0),
        )
    }

    fn with_bonus(per: f64, prize: f64) -> SalesValueGoals {
        SalesValueGoals {
            levels: sales_levels(),
            performance_bonus: Some(PerformanceBonus { per, prize }),
        }
    }

    #[test]
    fn highest_tier_only_not_cumulative() {
        assert_eq!(calculate_prize_for_metric(25_000.0, &sales_levels()), 300.0);
    }

    #[test]
    fn performance_bonus_stacks_on_tier() {
        assert_eq!(calculate_prize_for_metric(25_000.0, &with_bonus(1_000.0, 50.0)), 1_550.0);
    }

    #[test]
    fn below_all_tiers_pays_nothing() {
        assert_eq!(calculate_prize_for_metric(5_000.0, &sales_levels()), 0.0);
    }

    #[test]
    fn bonus_applies_without_any_tier() {
        assert_eq!(calculate_prize_for_metric(5_000.0, &with_bonus(1_000.0, 50.0)), 250.0);
        // 5500 / 1000 floors to 5 steps
        assert_eq!(calculate_prize_for_metric(5_500.0, &with_bonus(1_000.0, 50.0)), 250.0);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let levels = sales_levels();
        assert_eq!(calculate_prize_for_metric(15_000.0, &levels), 150.0);
        assert_eq!(calculate_prize_for_metric(14_999.99, &levels), 100.0);
        assert_eq!(calculate_prize_for_metric(10_000.0, &levels), 100.0);
    }

    #[test]
    fn middle_value_picks_its_tier() {
        assert_eq!(calculate_prize_for_metric(21_000.0, &sales_levels()), 200.0);
    }

    #[test]
    fn unset_and_zero_tiers_are_skipped() {
        let mut levels = sales_levels();
        levels.lendaria = None;
        levels.metona = Some(GoalTier::new(0.0, 999.0));
        assert_eq!(calculate_prize_for_metric(50_000.0, &levels), 150.0);
    }

    #[test]
    fn empty_configuration_yields_zero() {
        assert_eq!(calculate_prize_for_metric(1_000_000.0, &GoalLevels::default()), 0.0);
        assert_eq!(calculate_prize_for_metric(1_000_000.0, &SalesValueGoals::default()), 0.0);
    }

    #[test]
    fn negative_and_nan_values_count_as_zero() {
        let goals = with_bonus(1_000.0, 50.0);
        assert_eq!(calculate_prize_for_metric(-30_000.0, &goals), 0.0);
        assert_eq!(calculate_prize_for_metric(f64::NAN, &goals), 0.0);
    }

    #[test]
    fn non_positive_bonus_step_is_ignored() {
        assert_eq!(calculate_prize_for_metric(25_000.0, &with_bonus(0.0, 50.0)), 300.0);
        assert_eq!(calculate_prize_for_metric(25_000.0, &with_bonus(-10.0, 50.0)), 300.0);
    }

    #[test]
    fn prize_equals_exactly_one_tier_or_zero() {
        let levels = sales_levels();
        let prizes: Vec<f64> = levels.configured().iter().map(|(_, t)| t.prize).collect();
        for step in 0..60 {
            let value = step as f64 * 500.0;
            let prize = calculate_prize_for_metric(value, &levels);
            assert!(
                prize == 0.0 || prizes.contains(&prize),
                "value={value} produced non-tier prize {prize}"
            );
        }
    }

    #[test]
    fn prize_is_monotonic_in_value() {
        let goals = with_bonus(750.0, 20.0);
        let mut previous = 0.0;
        for step in 0..200 {
            let value = step as f64 * 173.0;
            let prize = calculate_prize_for_metric(value, &goals);
            assert!(prize >= previous, "prize dropped at value={value}: {previous} -> {prize}");
            previous = prize;
        }
    }
}
