pub mod snapshotter;

pub use snapshotter::LeaderboardSnapshotter;
