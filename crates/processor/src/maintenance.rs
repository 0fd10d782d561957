//! Bulk maintenance entry points built on the partitioned executor.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use storage::repository::{builds, scores, user_stats};
use tracing::info;

use crate::batch::{BatchItemProcessor, PartitionedExecutor, PgBatchContext};
use crate::error::Result;
use crate::performance::aggregate_performance;

/// Recomputes one user's total rating and normalised accuracy from their full
/// score set, under the aggregate row lock.
pub struct RatingRecompute {
    ruleset_id: i16,
    builds: Arc<HashMap<i32, bool>>,
}

#[async_trait]
impl BatchItemProcessor<i64, PgBatchContext> for RatingRecompute {
    async fn process(&self, ctx: &mut PgBatchContext, user_id: &i64) -> Result<()> {
        let tx = ctx.tx()?;

        let Some(mut stats) =
            user_stats::get_or_create_for_update(tx, *user_id, self.ruleset_id).await?
        else {
            return Ok(());
        };

        let ranked = scores::user_ranked_scores(tx, *user_id, self.ruleset_id).await?;
        let aggregate = aggregate_performance(&ranked, &self.builds);

        stats.rating = aggregate.total;
        stats.accuracy = aggregate.accuracy;
        stats.last_update = Utc::now();
        user_stats::persist(tx, &stats).await?;

        Ok(())
    }
}

/// Re-derives every user's rating for one ruleset. Returns how many users
/// were processed; on cancellation the count reflects partial completion.
pub async fn recompute_all_ratings(
    pool: &PgPool,
    ruleset_id: i16,
    workers: usize,
    batch_size: usize,
    cancel: Arc<AtomicBool>,
) -> Result<u64> {
    let user_ids = user_stats::user_ids_for_ruleset(pool, ruleset_id).await?;
    info!(users = user_ids.len(), ruleset_id, "recomputing ratings");

    let builds = Arc::new(builds::load_all(pool).await?);
    let processed = Arc::new(AtomicU64::new(0));

    let reporter = spawn_progress_reporter(Arc::clone(&processed), user_ids.len() as u64);

    let result = PartitionedExecutor::new(workers)
        .batch_size(batch_size)
        .run(
            user_ids,
            || PgBatchContext::new(pool.clone()),
            Arc::new(RatingRecompute {
                ruleset_id,
                builds: Arc::clone(&builds),
            }),
            cancel,
            Arc::clone(&processed),
        )
        .await;

    reporter.abort();
    let count = processed.load(Ordering::SeqCst);
    result?;

    // Ranks are only meaningful relative to every other row, so they are
    // re-derived once after the per-user pass rather than inside it.
    let ranked = user_stats::recompute_ranks(pool, ruleset_id).await?;

    info!(processed = count, ranked, ruleset_id, "rating recompute finished");
    Ok(count)
}

fn spawn_progress_reporter(
    processed: Arc<AtomicU64>,
    total: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        interval.tick().await;
        loop {
            interval.tick().await;
            info!(
                processed = processed.load(Ordering::SeqCst),
                total,
                "progress"
            );
        }
    })
}
