use std::time::Duration;

use sqlx::PgPool;

use crate::error::Result;

/// Samples how far the read replica trails the primary. Without a configured
/// replica the lag reads as zero and the controller only ever speeds up.
pub struct ReplicationMonitor {
    replica: Option<PgPool>,
}

impl ReplicationMonitor {
    pub fn new(replica: Option<PgPool>) -> Self {
        Self { replica }
    }

    pub async fn sample(&self) -> Result<Duration> {
        let Some(replica) = &self.replica else {
            return Ok(Duration::ZERO);
        };

        let seconds: f64 = sqlx::query_scalar(
            "SELECT COALESCE(EXTRACT(EPOCH FROM (now() - pg_last_xact_replay_timestamp())), 0)::float8",
        )
        .fetch_one(replica)
        .await?;

        Ok(Duration::from_secs_f64(seconds.max(0.0)))
    }
}
