use async_trait::async_trait;
use storage::models::{DifficultyAttributeKey, RulesetId, ScoreEvent, UserStats};
use tracing::debug;

use crate::error::Result;
use crate::performance::aggregate_performance;
use crate::rulesets::{difficulty_mod_bitmask, ruleset_for};

use super::{ProcessingContext, ScoreProcessor};

/// Computes and stamps the score's rating, persists it to the score-rating
/// table, then recomputes the user's total from their full score set.
///
/// Missing inputs (unknown beatmap, unranked status, absent difficulty
/// attributes, ruleset declining to rate) are not errors: the score simply
/// contributes nothing. Runs after every other processor.
pub struct PerformanceProcessor;

#[async_trait]
impl ScoreProcessor for PerformanceProcessor {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn order(&self) -> i32 {
        i32::MAX
    }

    async fn apply(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        if let Some(rating) = self.compute_rating(event, ctx).await? {
            event.rating = Some(rating);
            ctx.upsert_rating(event.id, rating).await?;
        }

        self.update_user_totals(event, stats, ctx).await
    }

    async fn revert(
        &self,
        event: &mut ScoreEvent,
        _stats: &mut UserStats,
        _previous_version: i16,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        // Drop the stale rating; the apply that follows on the upgrade path
        // recomputes both the rating and the user totals from scratch. If
        // the new logic declines to rate this score, nothing lingers.
        ctx.delete_rating(event.id).await?;
        event.rating = None;
        Ok(())
    }
}

impl PerformanceProcessor {
    async fn compute_rating(
        &self,
        event: &ScoreEvent,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Option<f64>> {
        let Ok(ruleset_id) = RulesetId::try_from(event.ruleset_id) else {
            return Ok(None);
        };

        let Some(beatmap) = ctx.beatmap(event.beatmap_id).await? else {
            debug!(score_id = event.id, beatmap_id = event.beatmap_id, "beatmap unknown, not rating");
            return Ok(None);
        };
        if !beatmap.is_ranked() {
            return Ok(None);
        }

        let key = DifficultyAttributeKey::new(
            event.beatmap_id,
            event.ruleset_id,
            difficulty_mod_bitmask(&event.mods),
        );
        let Some(attributes) = ctx.difficulty_attributes(&key).await? else {
            debug!(score_id = event.id, "difficulty attributes missing, not rating");
            return Ok(None);
        };

        Ok(ruleset_for(ruleset_id).compute_rating(event, &attributes))
    }

    async fn update_user_totals(
        &self,
        event: &ScoreEvent,
        stats: &mut UserStats,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        let ranked = ctx.user_ranked_scores(event.user_id, event.ruleset_id).await?;
        let aggregate = aggregate_performance(&ranked, ctx.builds);

        stats.rating = aggregate.total;
        stats.accuracy = aggregate.accuracy;
        Ok(())
    }
}
