use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Client build record. Scores attached to a build with
/// `allow_performance = false` never contribute to rating aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Build {
    pub build_id: i32,
    pub allow_performance: bool,
}
