use async_trait::async_trait;
use storage::models::{ScoreEvent, UserStats};

use crate::error::Result;

use super::{ProcessingContext, ScoreProcessor};

/// Adds a score's value to the user's total, and to the ranked total when the
/// beatmap's status qualifies. The beatmap status is read through the shared
/// cache inside the event's transaction, so apply and revert observe the same
/// status.
pub struct TotalScoreProcessor;

impl TotalScoreProcessor {
    pub fn add(event: &ScoreEvent, stats: &mut UserStats, beatmap_ranked: bool) {
        stats.total_score += event.total_score;
        if beatmap_ranked {
            stats.ranked_score += event.total_score;
        }
    }

    pub fn remove(event: &ScoreEvent, stats: &mut UserStats, beatmap_ranked: bool) {
        stats.total_score -= event.total_score;
        if beatmap_ranked {
            stats.ranked_score -= event.total_score;
        }
    }
}

#[async_trait]
impl ScoreProcessor for TotalScoreProcessor {
    fn name(&self) -> &'static str {
        "total_score"
    }

    async fn apply(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        let ranked = ctx
            .beatmap(event.beatmap_id)
            .await?
            .map(|b| b.is_ranked())
            .unwrap_or(false);
        Self::add(event, stats, ranked);
        Ok(())
    }

    async fn revert(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        _previous_version: i16,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        let ranked = ctx
            .beatmap(event.beatmap_id)
            .await?
            .map(|b| b.is_ranked())
            .unwrap_or(false);
        Self::remove(event, stats, ranked);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{empty_stats, passing_event};
    use super::*;

    #[test]
    fn ranked_beatmap_feeds_both_totals() {
        let event = passing_event();
        let mut stats = empty_stats();

        TotalScoreProcessor::add(&event, &mut stats, true);
        assert_eq!(stats.total_score, event.total_score);
        assert_eq!(stats.ranked_score, event.total_score);
    }

    #[test]
    fn unranked_beatmap_feeds_only_the_total() {
        let event = passing_event();
        let mut stats = empty_stats();

        TotalScoreProcessor::add(&event, &mut stats, false);
        assert_eq!(stats.total_score, event.total_score);
        assert_eq!(stats.ranked_score, 0);
    }

    #[test]
    fn revert_undoes_apply() {
        let event = passing_event();
        let mut stats = empty_stats();
        let before = stats.clone();

        TotalScoreProcessor::add(&event, &mut stats, true);
        TotalScoreProcessor::remove(&event, &mut stats, true);
        assert_eq!(stats, before);
    }
}
