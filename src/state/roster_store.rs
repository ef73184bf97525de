use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::engine;
use crate::types::{DailySprint, Goals, Seller};

// ---------------------------------------------------------------------------
// RosterStore
// ---------------------------------------------------------------------------

/// Insertion sequence paired with the cached value. Rank ties and the
/// "first active sprint" rule both depend on a stable order, which a DashMap
/// does not give on iteration.
#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    value: T,
}

/// In-memory cache of everything the prize engine needs, loaded from the
/// database at startup and updated after each successful write.
///
/// The engine never sees this type; callers take plain snapshots
/// (`all_sellers`, `goals`, `sprints`) and pass those in.
pub struct RosterStore {
    /// seller_id → seller
    sellers: DashMap<String, Entry<Seller>>,
    /// sprint_id → sprint
    sprints: DashMap<String, Entry<DailySprint>>,
    goals: RwLock<Goals>,
    next_seq: AtomicU64,
}

impl RosterStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    // --- sellers ---

    /// Insert or replace. A replaced seller keeps its original position.
    pub fn upsert_seller(&self, seller: Seller) {
        let seq = self.sellers.get(&seller.id).map(|e| e.seq).unwrap_or_else(|| self.seq());
        self.sellers.insert(seller.id.clone(), Entry { seq, value: seller });
    }

    pub fn add_sellers(&self, sellers: Vec<Seller>) {
        for seller in sellers {
            self.upsert_seller(seller);
        }
    }

    /// Make the cached roster exactly `sellers`: ids missing from it are
    /// dropped, surviving ids keep their position.
    pub fn replace_sellers(&self, sellers: Vec<Seller>) {
        let keep: HashSet<String> = sellers.iter().map(|s| s.id.clone()).collect();
        self.sellers.retain(|id, _| keep.contains(id));
        self.add_sellers(sellers);
    }

    pub fn remove_seller(&self, seller_id: &str) -> Option<Seller> {
        self.sellers.remove(seller_id).map(|(_, e)| e.value)
    }

    pub fn get_seller(&self, seller_id: &str) -> Option<Seller> {
        self.sellers.get(seller_id).map(|e| e.value.clone())
    }

    /// All sellers in insertion order.
    pub fn all_sellers(&self) -> Vec<Seller> {
        let mut entries: Vec<Entry<Seller>> =
            self.sellers.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.value).collect()
    }

    pub fn seller_count(&self) -> usize {
        self.sellers.len()
    }

    // --- goals ---

    pub fn goals(&self) -> Goals {
        self.goals.read().map(|g| *g).unwrap_or_default()
    }

    pub fn set_goals(&self, goals: Goals) {
        if let Ok(mut g) = self.goals.write() {
            *g = goals;
        }
    }

    // --- sprints ---

    pub fn upsert_sprint(&self, sprint: DailySprint) {
        let seq = self.sprints.get(&sprint.id).map(|e| e.seq).unwrap_or_else(|| self.seq());
        self.sprints.insert(sprint.id.clone(), Entry { seq, value: sprint });
    }

    pub fn add_sprints(&self, sprints: Vec<DailySprint>) {
        for sprint in sprints {
            self.upsert_sprint(sprint);
        }
    }

    /// Same as [`RosterStore::replace_sellers`], for sprints.
    pub fn replace_sprints(&self, sprints: Vec<DailySprint>) {
        let keep: HashSet<String> = sprints.iter().map(|s| s.id.clone()).collect();
        self.sprints.retain(|id, _| keep.contains(id));
        self.add_sprints(sprints);
    }

    pub fn remove_sprint(&self, sprint_id: &str) -> Option<DailySprint> {
        self.sprints.remove(sprint_id).map(|(_, e)| e.value)
    }

    /// Mirror of the database rule: activating one sprint deactivates all others.
    pub fn set_sprint_active(&self, sprint_id: &str, active: bool) {
        for mut entry in self.sprints.iter_mut() {
            let sprint = &mut entry.value_mut().value;
            if sprint.id == sprint_id {
                sprint.is_active = active;
            } else if active {
                sprint.is_active = false;
            }
        }
    }

    /// All sprints in insertion order.
    pub fn sprints(&self) -> Vec<DailySprint> {
        let mut entries: Vec<Entry<DailySprint>> =
            self.sprints.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.value).collect()
    }

    pub fn active_sprint(&self) -> Option<DailySprint> {
        engine::active_sprint(&self.sprints()).cloned()
    }
}

impl Default for RosterStore {
    fn default() -> Self {
        Self {
            sellers: DashMap::new(),
            sprints: DashMap::new(),
            goals: RwLock::new(Goals::default()),
            next_seq: AtomicU64::new(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
