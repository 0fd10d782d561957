use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Durable record of the pipeline version that last applied a score to the
/// user aggregates. A history row at the current version makes any replay of
/// the same score a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProcessHistory {
    pub score_id: i64,
    pub processed_version: i16,
    pub processed_at: DateTime<Utc>,
}
