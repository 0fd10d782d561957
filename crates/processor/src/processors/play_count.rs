use async_trait::async_trait;
use sqlx::PgPool;
use storage::models::{ScoreEvent, UserStats};
use storage::repository::beatmaps;

use crate::error::Result;

use super::{ProcessingContext, ScoreProcessor};

/// Counts every submitted play, passing or not. The cross-user beatmap
/// playcount is bumped post-commit so it cannot roll back with the per-user
/// transaction.
pub struct PlayCountProcessor;

impl PlayCountProcessor {
    pub fn add(stats: &mut UserStats) {
        stats.playcount += 1;
    }

    pub fn remove(stats: &mut UserStats) {
        stats.playcount -= 1;
    }
}

#[async_trait]
impl ScoreProcessor for PlayCountProcessor {
    fn name(&self) -> &'static str {
        "play_count"
    }

    fn runs_on_failed(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        _event: &mut ScoreEvent,
        stats: &mut UserStats,
        _ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        Self::add(stats);
        Ok(())
    }

    async fn revert(
        &self,
        _event: &mut ScoreEvent,
        stats: &mut UserStats,
        _previous_version: i16,
        _ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        Self::remove(stats);
        Ok(())
    }

    async fn apply_global(&self, event: &ScoreEvent, pool: &PgPool) -> Result<()> {
        beatmaps::increment_playcount(pool, event.beatmap_id).await?;
        Ok(())
    }
}
