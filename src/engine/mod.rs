//! Prize calculation engine.
//!
//! Pure functions of (seller, roster, goals, active sprint). Nothing in here
//! touches the store, the database or the clock.

pub mod seller;
pub mod sprint;
pub mod tiers;

pub use seller::{award_top_scorer, build_leaderboard, calculate_seller_prizes};
pub use sprint::active_sprint;
