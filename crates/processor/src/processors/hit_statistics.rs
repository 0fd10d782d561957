use async_trait::async_trait;
use storage::models::{HitResult, ScoreEvent, UserStats};

use crate::error::Result;

use super::{ProcessingContext, ScoreProcessor};

/// Folds a score's judgement counts into the per-user counters and maintains
/// the running accuracy sums. Tick and bonus results are not counted.
pub struct HitStatisticsProcessor;

impl HitStatisticsProcessor {
    pub fn add(event: &ScoreEvent, stats: &mut UserStats) {
        Self::fold(event, stats, 1);
        stats.accuracy_total += event.accuracy;
        stats.accuracy_count += 1;
    }

    pub fn remove(event: &ScoreEvent, stats: &mut UserStats) {
        Self::fold(event, stats, -1);
        stats.accuracy_total -= event.accuracy;
        stats.accuracy_count -= 1;
    }

    fn fold(event: &ScoreEvent, stats: &mut UserStats, sign: i64) {
        for (&result, &count) in &event.statistics {
            if !result.is_basic() {
                continue;
            }
            let delta = sign * i64::from(count);
            match result {
                HitResult::Perfect | HitResult::Great => stats.count_300 += delta,
                HitResult::Good | HitResult::Ok => stats.count_100 += delta,
                HitResult::Meh => stats.count_50 += delta,
                HitResult::Miss => stats.count_miss += delta,
                _ => {}
            }
        }
    }
}

#[async_trait]
impl ScoreProcessor for HitStatisticsProcessor {
    fn name(&self) -> &'static str {
        "hit_statistics"
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
