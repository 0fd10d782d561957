use async_trait::async_trait;
use storage::models::{ScoreEvent, ScoreRank, UserStats};

use crate::error::Result;

use super::{ProcessingContext, ScoreProcessor};

/// Maintains the per-tier rank counters. Only passing scores reach this
/// processor; ranks below A carry no counter.
pub struct RankCountProcessor;

impl RankCountProcessor {
    pub fn adjust(event: &ScoreEvent, stats: &mut UserStats, delta: i32) {
        match event.rank {
            ScoreRank::XH => stats.rank_count_xh += delta,
            ScoreRank::X => stats.rank_count_x += delta,
            ScoreRank::SH => stats.rank_count_sh += delta,
            ScoreRank::S => stats.rank_count_s += delta,
            ScoreRank::A => stats.rank_count_a += delta,
            ScoreRank::B | ScoreRank::C | ScoreRank::D => {}
        }
    }
}

#[async_trait]
impl ScoreProcessor for RankCountProcessor {
    fn name(&self) -> &'static str {
        "rank_counts"
    }

    async fn apply(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        _ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        Self::adjust(event, stats, 1);
        Ok(())
    }

    async fn revert(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        _previous_version: i16,
        _ctx: &mut ProcessingContext<'_>,
    ) -> Result<()> {
        Self::adjust(event, stats, -1);
        Ok(())
    }
}
