use std::collections::HashMap;

use crate::engine::sprint::calculate_sprint_prize;
use crate::engine::tiers::calculate_prize_for_metric;
use crate::types::{DailySprint, Goals, MetricPrizes, Seller, SellerWithPrizes};

/// Full prize breakdown and rank for one seller.
///
/// `all_sellers` is only used for the rank. Points goals are evaluated against
/// `points + extra_points`. The total is the four metric prizes plus the sprint
/// prize; the top-scorer bonus is never included here (see [`award_top_scorer`]).
pub fn calculate_seller_prizes(
    seller: &Seller,
    all_sellers: &[Seller],
    goals: &Goals,
    active_sprint: Option<&DailySprint>,
) -> SellerWithPrizes {
    let rank = rank_sellers(all_sellers)
        .get(seller.id.as_str())
        .copied()
        .unwrap_or_else(|| rank_outside_roster(seller, all_sellers));
    with_prizes(seller, rank, goals, active_sprint)
}

/// Every seller's prizes, ordered by rank.
pub fn build_leaderboard(
    all_sellers: &[Seller],
    goals: &Goals,
    active_sprint: Option<&DailySprint>,
) -> Vec<SellerWithPrizes> {
    let ranks = rank_sellers(all_sellers);
    let mut board: Vec<SellerWithPrizes> = all_sellers
        .iter()
        .map(|s| {
            let rank = ranks.get(s.id.as_str()).copied().unwrap_or(0);
            with_prizes(s, rank, goals, active_sprint)
        })
        .collect();
    board.sort_by_key(|entry| entry.rank);
    board
}

/// 1-based rank of every seller id by descending sales value.
///
/// The sort is stable, so equal sales keep their input order. When an id
/// appears more than once the best position is kept.
pub fn rank_sellers(all_sellers: &[Seller]) -> HashMap<&str, u32> {
    let mut order: Vec<&Seller> = all_sellers.iter().collect();
    order.sort_by(|a, b| {
        sort_value(b.metrics.sales_value).total_cmp(&sort_value(a.metrics.sales_value))
    });

    let mut ranks = HashMap::with_capacity(order.len());
    for (i, s) in order.into_iter().enumerate() {
        ranks.entry(s.id.as_str()).or_insert(i as u32 + 1);
    }
    ranks
}

/// Apply the points `top_scorer_prize` to the single seller with the most
/// `points + extra_points`. Ties go to the earliest entry.
///
/// Returns the winner's id, or `None` when the prize is not configured, the
/// board is empty, or nobody has scored.
pub fn award_top_scorer(leaderboard: &mut [SellerWithPrizes], goals: &Goals) -> Option<String> {
    let prize = goals.points.top_scorer_prize.filter(|p| *p > 0.0)?;

    let mut top: Option<(usize, f64)> = None;
    for (i, entry) in leaderboard.iter().enumerate() {
        let score = entry.seller.metrics.total_points();
        if score > top.map_or(0.0, |(_, best)| best) {
            top = Some((i, score));
        }
    }
    let (index, _) = top?;

    let winner = &mut leaderboard[index];
    winner.top_scorer_bonus = prize;
    winner.total_prize += prize;
    Some(winner.seller.id.clone())
}

fn with_prizes(
    seller: &Seller,
    rank: u32,
    goals: &Goals,
    active_sprint: Option<&DailySprint>,
) -> SellerWithPrizes {
    let m = &seller.metrics;
    let prizes = MetricPrizes {
        sales_value: calculate_prize_for_metric(m.sales_value, &goals.sales_value),
        ticket_average: calculate_prize_for_metric(m.ticket_average, &goals.ticket_average),
        pa: calculate_prize_for_metric(m.pa, &goals.pa),
        points: calculate_prize_for_metric(m.total_points(), &goals.points),
    };
    let sprint_prize = calculate_sprint_prize(seller, active_sprint);

    SellerWithPrizes {
        seller: seller.clone(),
        total_prize: prizes.sum() + sprint_prize,
        prizes,
        sprint_prize,
        top_scorer_bonus: 0.0,
        rank,
    }
}

/// Rank a seller would take if inserted after everyone with equal sales.
fn rank_outside_roster(seller: &Seller, all_sellers: &[Seller]) -> u32 {
    let value = sort_value(seller.metrics.sales_value);
    let ahead = all_sellers
        .iter()
        .filter(|s| sort_value(s.metrics.sales_value) >= value)
        .count();
    ahead as u32 + 1
}

/// NaN and -0.0 both sort as 0.0, so they tie with a plain zero.
fn sort_value(v: f64) -> f64 {
    if v.is_nan() || v == 0.0 {
        0.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        GoalLevels, GoalTier, PerformanceBonus, PointsGoals, SalesValueGoals, SellerMetrics,
        SprintTier,
    };

    fn seller(id: &str, sales_value: f64) -> Seller {
        Seller {
            id: id.to_string(),
            name: format!("Seller {id}"),
            email: format!("{id}@store.test"),
            metrics: SellerMetrics { sales_value, ..SellerMetrics::default() },
        }
    }

    fn goals() -> Goals {
        Goals {
            sales_value: SalesValueGoals {
                levels: GoalLevels::new(
                    GoalTier::new(10_000.0, 100.0),
                    GoalTier::new(15_000.0, 150.0),
                    GoalTier::new(20_000.0, 200.0),
                    GoalTier::new(25_000.0, 300.0),
                ),
                performance_bonus: None,
            },
            ticket_average: GoalLevels::new(
                GoalTier::new(100.0, 10.0),
                GoalTier::new(150.0, 20.0),
                GoalTier::new(200.0, 30.0),
                GoalTier::new(250.0, 40.0),
            ),
            pa: GoalLevels::new(
                GoalTier::new(1.5, 5.0),
                GoalTier::new(2.0, 10.0),
                GoalTier::new(2.5, 15.0),
                GoalTier::new(3.0, 20.0),
            ),
            points: PointsGoals {
                levels: GoalLevels::new(
                    GoalTier::new(50.0, 25.0),
                    GoalTier::new(100.0, 50.0),
                    GoalTier::new(150.0, 75.0),
                    GoalTier::new(200.0, 100.0),
                ),
                top_scorer_prize: Some(500.0),
            },
        }
    }

    fn sprint_for(ids: &[&str]) -> DailySprint {
        DailySprint {
            id: "sp".to_string(),
            title: "Weekend".to_string(),
            participant_ids: ids.iter().map(|i| i.to_string()).collect(),
            tiers: vec![
                SprintTier { goal: 200.0, prize: 50.0, label: "1".to_string() },
                SprintTier { goal: 400.0, prize: 100.0, label: "2".to_string() },
                SprintTier { goal: 600.0, prize: 150.0, label: "3".to_string() },
            ],
            is_active: true,
        }
    }

    #[test]
    fn ranks_by_descending_sales() {
        let roster = vec![seller("a", 30_000.0), seller("b", 10_000.0), seller("c", 20_000.0)];
        let ranks: Vec<u32> = roster
            .iter()
            .map(|s| calculate_seller_prizes(s, &roster, &Goals::default(), None).rank)
            .collect();
        assert_eq!(ranks, vec![1, 3, 2]);
    }

    #[test]
    fn equal_sales_keep_input_order() {
        let roster = vec![seller("a", 5.0), seller("b", 9.0), seller("c", 5.0)];
        let ranks = rank_sellers(&roster);
        assert_eq!(ranks["b"], 1);
        assert_eq!(ranks["a"], 2);
        assert_eq!(ranks["c"], 3);
    }

    #[test]
    fn negative_zero_sales_tie_with_zero_in_input_order() {
        let roster = vec![seller("a", -0.0), seller("b", 0.0), seller("c", f64::NAN)];
        let ranks = rank_sellers(&roster);
        assert_eq!(ranks["a"], 1);
        assert_eq!(ranks["b"], 2);
        assert_eq!(ranks["c"], 3);
    }

    #[test]
    fn seller_missing_from_roster_ranks_after_ties() {
        let roster = vec![seller("a", 30.0), seller("b", 20.0)];
        let outsider = seller("z", 20.0);
        let result = calculate_seller_prizes(&outsider, &roster, &Goals::default(), None);
        assert_eq!(result.rank, 3);
    }

    #[test]
    fn total_sums_metrics_and_sprint() {
        let mut s = seller("a", 450.0);
        s.metrics = SellerMetrics {
            sales_value: 25_000.0,
            ticket_average: 180.0,
            pa: 3.2,
            points: 80.0,
            extra_points: 30.0,
        };
        let mut sp = sprint_for(&["a"]);
        sp.tiers.push(SprintTier { goal: 20_000.0, prize: 400.0, label: "big".to_string() });

        let roster = vec![s.clone()];
        let result = calculate_seller_prizes(&s, &roster, &goals(), Some(&sp));

        assert_eq!(result.prizes.sales_value, 300.0);
        assert_eq!(result.prizes.ticket_average, 20.0);
        assert_eq!(result.prizes.pa, 20.0);
        // 80 + 30 extra reaches the 100 tier
        assert_eq!(result.prizes.points, 50.0);
        assert_eq!(result.sprint_prize, 400.0);
        assert_eq!(result.top_scorer_bonus, 0.0);
        assert_eq!(result.total_prize, 300.0 + 20.0 + 20.0 + 50.0 + 400.0);
        assert_eq!(result.rank, 1);
        assert_eq!(result.seller, s);
    }

    #[test]
    fn sprint_prize_scenario() {
        let s = seller("a", 450.0);
        let roster = vec![s.clone()];
        let sp = sprint_for(&["a"]);
        let result = calculate_seller_prizes(&s, &roster, &Goals::default(), Some(&sp));
        assert_eq!(result.sprint_prize, 100.0);
        assert_eq!(result.total_prize, 100.0);
    }

    #[test]
    fn non_participant_total_excludes_sprint() {
        let s = seller("b", 10_000.0);
        let roster = vec![s.clone()];
        let result = calculate_seller_prizes(&s, &roster, &goals(), Some(&sprint_for(&["a"])));
        assert_eq!(result.sprint_prize, 0.0);
        assert_eq!(result.total_prize, 100.0);
    }

    #[test]
    fn unconfigured_goals_degrade_to_zero() {
        let s = seller("a", 99_999.0);
        let result = calculate_seller_prizes(&s, &[], &Goals::default(), None);
        assert_eq!(result.prizes, MetricPrizes::default());
        assert_eq!(result.total_prize, 0.0);
        assert_eq!(result.rank, 1);
    }

    #[test]
    fn calculation_is_idempotent() {
        let roster = vec![seller("a", 12_345.0), seller("b", 22_000.0)];
        let mut g = goals();
        g.sales_value.performance_bonus = Some(PerformanceBonus { per: 1_000.0, prize: 7.5 });
        let sp = sprint_for(&["a", "b"]);

        let first = calculate_seller_prizes(&roster[0], &roster, &g, Some(&sp));
        let second = calculate_seller_prizes(&roster[0], &roster, &g, Some(&sp));
        assert_eq!(first, second);
        assert_eq!(first.total_prize.to_bits(), second.total_prize.to_bits());
    }

    #[test]
    fn leaderboard_is_ordered_by_rank() {
        let roster = vec![seller("a", 30_000.0), seller("b", 10_000.0), seller("c", 20_000.0)];
        let board = build_leaderboard(&roster, &goals(), None);
        let ids: Vec<&str> = board.iter().map(|e| e.seller.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(board[0].prizes.sales_value, 300.0);
    }

    #[test]
    fn leaderboard_matches_single_seller_calculation() {
        let roster = vec![seller("a", 18_000.0), seller("b", 26_000.0), seller("c", 9_000.0)];
        let g = goals();
        let sp = sprint_for(&["c"]);
        let board = build_leaderboard(&roster, &g, Some(&sp));
        for s in &roster {
            let single = calculate_seller_prizes(s, &roster, &g, Some(&sp));
            let entry = board.iter().find(|e| e.seller.id == s.id).unwrap();
            assert_eq!(&single, entry);
        }
    }

    #[test]
    fn top_scorer_bonus_goes_to_highest_points() {
        let mut roster = vec![seller("a", 1.0), seller("b", 2.0), seller("c", 3.0)];
        roster[0].metrics.points = 120.0;
        roster[1].metrics.points = 100.0;
        roster[1].metrics.extra_points = 40.0;
        roster[2].metrics.points = 10.0;

        let g = goals();
        let mut board = build_leaderboard(&roster, &g, None);
        let before: f64 = board.iter().map(|e| e.total_prize).sum();

        let winner = award_top_scorer(&mut board, &g);
        assert_eq!(winner.as_deref(), Some("b"));

        let b = board.iter().find(|e| e.seller.id == "b").unwrap();
        assert_eq!(b.top_scorer_bonus, 500.0);
        let after: f64 = board.iter().map(|e| e.total_prize).sum();
        assert_eq!(after - before, 500.0);
        assert_eq!(board.iter().filter(|e| e.top_scorer_bonus > 0.0).count(), 1);
    }

    #[test]
    fn top_scorer_tie_goes_to_earliest_entry() {
        let mut roster = vec![seller("a", 2.0), seller("b", 1.0)];
        roster[0].metrics.points = 70.0;
        roster[1].metrics.points = 70.0;
        let g = goals();
        let mut board = build_leaderboard(&roster, &g, None);
        assert_eq!(award_top_scorer(&mut board, &g).as_deref(), Some("a"));
    }

    #[test]
    fn top_scorer_requires_prize_and_score() {
        let roster = vec![seller("a", 1.0)];
        let mut g = goals();
        let mut board = build_leaderboard(&roster, &g, None);
        // nobody has points
        assert!(award_top_scorer(&mut board, &g).is_none());

        board[0].seller.metrics.points = 10.0;
        g.points.top_scorer_prize = None;
        assert!(award_top_scorer(&mut board, &g).is_none());
        assert!(award_top_scorer(&mut [], &goals()).is_none());
        assert_eq!(board[0].top_scorer_bonus, 0.0);
    }
}
