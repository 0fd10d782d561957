use async_trait::async_trait;
use storage::models::{ScoreEvent, UserStats};

use crate::error::Result;

use super::{ProcessingContext, ScoreProcessor};

/// Accumulates time spent in gameplay. Events without a start timestamp
/// contribute nothing; negative or absurd spans are clamped so a clock-skewed
/// client cannot distort the aggregate.
pub struct PlayTimeProcessor;

const MAX_PLAY_SECONDS: i64 = 24 * 60 * 60;

impl PlayTimeProcessor {
    fn seconds(event: &ScoreEvent) -> i64 {
        match event.started_at {
            Some(started) => (event.ended_at - started)
                .num_seconds()
                .clamp(0, MAX_PLAY_SECONDS),
            None => 0,
        }
    }

    pub fn add(event: &ScoreEvent, stats: &mut UserStats) {
        stats.play_time += Self::seconds(event);
    }

    pub fn remove(event: &ScoreEvent, stats: &mut UserStats) {
        stats.play_time -= Self::seconds(event);
    }
}

#[async_trait]
impl ScoreProcessor for PlayTimeProcessor {
    fn name(&self) -> &'static str {
        "play_time"
    }

    fn runs_on_failed(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        _ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        Self::add(event, stats);
        Ok(())
    }

    async fn revert(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        _previous_version: i16,
        _ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        Self::remove(event, stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::super::test_support::{empty_stats, passing_event};
    use super::*;

    #[test]
    fn accumulates_elapsed_seconds() {
        let event = passing_event();
        let mut stats = empty_stats();

        PlayTimeProcessor::add(&event, &mut stats);
        assert_eq!(stats.play_time, 200);
    }

    #[test]
    fn revert_undoes_apply() {
        let event = passing_event();
        let mut stats = empty_stats();
        let before = stats.clone();

        PlayTimeProcessor::add(&event, &mut stats);
        PlayTimeProcessor::remove(&event, &mut stats);
        assert_eq!(stats, before);
    }

    #[test]
    fn clamps_negative_and_oversized_spans() {
        let mut event = passing_event();
        let mut stats = empty_stats();

        event.started_at = Some(event.ended_at + Duration::seconds(30));
        PlayTimeProcessor::add(&event, &mut stats);
        assert_eq!(stats.play_time, 0);

        event.started_at = Some(event.ended_at - Duration::days(30));
        PlayTimeProcessor::add(&event, &mut stats);
        assert_eq!(stats.play_time, MAX_PLAY_SECONDS);
    }

    #[test]
    fn missing_start_contributes_nothing() {
        let mut event = passing_event();
        event.started_at = None;
        let mut stats = empty_stats();

        PlayTimeProcessor::add(&event, &mut stats);
        assert_eq!(stats.play_time, 0);
    }
}
