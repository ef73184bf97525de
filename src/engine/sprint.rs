use crate::types::{DailySprint, Seller};

/// Sprint prize for one seller.
///
/// Zero when there is no active sprint or the seller is not a participant.
/// Otherwise the prize of the reached tier with the highest goal; reaching a
/// higher tier replaces, never adds to, the lower ones.
pub fn calculate_sprint_prize(seller: &Seller, active_sprint: Option<&DailySprint>) -> f64 {
    let Some(sprint) = active_sprint else {
        return 0.0;
    };
    if !sprint.has_participant(&seller.id) {
        return 0.0;
    }

    let sales = seller.metrics.sales_value;
    sprint
        .tiers
        .iter()
        .filter(|tier| tier.goal <= sales)
        // equal goals: the later tier wins
        .max_by(|a, b| a.goal.total_cmp(&b.goal))
        .map_or(0.0, |tier| tier.prize)
}

/// The sprint currently running, if any. With more than one flagged active
/// the first in the given order wins.
pub fn active_sprint(sprints: &[DailySprint]) -> Option<&DailySprint> {
    sprints.iter().find(|s| s.is_active)
}
