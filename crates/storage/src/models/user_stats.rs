use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Aggregate statistics for one (user, ruleset) pair. One row, created lazily
/// on the first processed event, mutated only under a row lock inside a single
/// transaction per processing unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserStats {
    pub user_id: i64,
    pub ruleset_id: i16,
    pub playcount: i32,
    pub play_time: i64,
    pub total_score: i64,
    pub ranked_score: i64,
    pub count_300: i64,
    pub count_100: i64,
    pub count_50: i64,
    pub count_miss: i64,
    pub accuracy_total: f64,
    pub accuracy_count: i64,
    /// Normalised accuracy in [0, 100], recomputed by the performance
    /// processor from the weighted best-score set.
    pub accuracy: f64,
    pub rank_count_xh: i32,
    pub rank_count_x: i32,
    pub rank_count_sh: i32,
    pub rank_count_s: i32,
    pub rank_count_a: i32,
    pub rating: f64,
    /// Position in the ruleset-wide rating ordering. Not touched by per-score
    /// processing; refreshed in bulk by `repository::user_stats::recompute_ranks`.
    pub rating_rank: i32,
    pub country: String,
    pub last_update: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
}

impl UserStats {
    pub fn zeroed(user_id: i64, ruleset_id: i16, country: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            ruleset_id,
            playcount: 0,
            play_time: 0,
            total_score: 0,
            ranked_score: 0,
            count_300: 0,
            count_100: 0,
            count_50: 0,
            count_miss: 0,
            accuracy_total: 0.0,
            accuracy_count: 0,
            accuracy: 0.0,
            rank_count_xh: 0,
            rank_count_x: 0,
            rank_count_sh: 0,
            rank_count_s: 0,
            rank_count_a: 0,
            rating: 0.0,
            rating_rank: 0,
            country,
            last_update: now,
            last_played: now,
        }
    }
}
