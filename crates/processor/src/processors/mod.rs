//! The ordered set of stat mutators making up the processing pipeline.
//!
//! Processors are registered explicitly in [`ProcessorRegistry::new`] rather
//! than discovered; the registration order plus each processor's `order()`
//! fully determines execution order. Revert runs in the SAME order as apply.
//! That mirrors the upstream behaviour exactly and changing it would alter
//! numeric outcomes for historical reprocessing, so treat it as a fixed
//! contract.

pub mod hit_statistics;
pub mod performance;
pub mod play_count;
pub mod play_time;
pub mod rank_counts;
pub mod total_score;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use storage::models::{
    Beatmap, DifficultyAttributeKey, DifficultyAttributes, RankedScore, ScoreEvent, UserStats,
};

use crate::error::Result;
use crate::store::ScoreStore;

pub use hit_statistics::HitStatisticsProcessor;
pub use performance::PerformanceProcessor;
pub use play_count::PlayCountProcessor;
pub use play_time::PlayTimeProcessor;
pub use rank_counts::RankCountProcessor;
pub use total_score::TotalScoreProcessor;

/// Bumped whenever any processor's logic changes in a way that affects
/// aggregate output. Events stamped with an older version are reverted at
/// their recorded version and re-applied at this one.
pub const PIPELINE_VERSION: i16 = 11;

pub type DeferredAction = Box<dyn FnOnce() + Send>;

/// Per-event working state handed to each processor: the event's store (an
/// open transaction in production), the build permission map and the
/// deferred-action list drained only after the transaction commits.
pub struct ProcessingContext<'a> {
    store: &'a mut dyn ScoreStore,
    pub builds: &'a HashMap<i32, bool>,
    deferred: Vec<DeferredAction>,
}

impl<'a> ProcessingContext<'a> {
    pub fn new(store: &'a mut dyn ScoreStore, builds: &'a HashMap<i32, bool>) -> Self {
        Self {
            store,
            builds,
            deferred: Vec::new(),
        }
    }

    pub async fn beatmap(&mut self, beatmap_id: i64) -> Result<Option<Beatmap>> {
        self.store.beatmap(beatmap_id).await
    }

    pub async fn difficulty_attributes(
        &mut self,
        key: &DifficultyAttributeKey,
    ) -> Result<Option<DifficultyAttributes>> {
        self.store.difficulty_attributes(key).await
    }

    pub async fn upsert_rating(&mut self, score_id: i64, rating: f64) -> Result<()> {
        self.store.upsert_rating(score_id, rating).await
    }

    pub async fn delete_rating(&mut self, score_id: i64) -> Result<()> {
        self.store.delete_rating(score_id).await
    }

    pub async fn user_ranked_scores(
        &mut self,
        user_id: i64,
        ruleset_id: i16,
    ) -> Result<Vec<RankedScore>> {
        self.store.user_ranked_scores(user_id, ruleset_id).await
    }

    /// Queues an action to run after the owning transaction commits. Never
    /// executed if the transaction aborts.
    pub fn defer(&mut self, action: impl FnOnce() + Send + 'static) {
        self.deferred.push(Box::new(action));
    }

    pub fn into_deferred(self) -> Vec<DeferredAction> {
        self.deferred
    }
}

#[async_trait]
pub trait ScoreProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first, on apply AND on revert.
    fn order(&self) -> i32 {
        0
    }

    /// Whether this processor runs for non-passing scores.
    fn runs_on_failed(&self) -> bool {
        false
    }

    /// Whether this processor runs for scores converted from legacy tables.
    fn runs_on_legacy(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()>;

    /// Undoes this event's contribution as recorded under `previous_version`.
    async fn revert(
        &self,
        event: &mut ScoreEvent,
        stats: &mut UserStats,
        previous_version: i16,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<()>;

    /// Runs after the owning transaction has committed, for effects that must
    /// not roll back with it (cross-user counters). Best-effort.
    async fn apply_global(&self, _event: &ScoreEvent, _pool: &PgPool) -> Result<()> {
        Ok(())
    }
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn ScoreProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        let mut processors: Vec<Box<dyn ScoreProcessor>> = vec![
            Box::new(PlayCountProcessor),
            Box::new(PlayTimeProcessor),
            Box::new(HitStatisticsProcessor),
            Box::new(TotalScoreProcessor),
            Box::new(RankCountProcessor),
            Box::new(PerformanceProcessor),
        ];
        // Stable sort keeps registration order for equal keys.
        processors.sort_by_key(|p| p.order());
        Self { processors }
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn ScoreProcessor> {
        self.processors.iter().map(|p| p.as_ref())
    }

    /// The active subset for one event: everything for a pass, only the
    /// `runs_on_failed` processors otherwise, with legacy scores additionally
    /// filtered by `runs_on_legacy`.
    pub fn applicable(&self, event: &ScoreEvent) -> Vec<&dyn ScoreProcessor> {
        self.processors
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| event.passed || p.runs_on_failed())
            .filter(|p| !event.legacy || p.runs_on_legacy())
            .collect()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::passing_event;
    use super::*;

    #[test]
    fn performance_runs_last() {
        let registry = ProcessorRegistry::new();
        let last = registry.all().last().map(|p| p.name());
        assert_eq!(last, Some("performance"));
    }

    #[test]
    fn failed_scores_select_only_failure_safe_processors() {
        let registry = ProcessorRegistry::new();
        let mut event = passing_event();
        event.passed = false;

        let names: Vec<&str> = registry.applicable(&event).iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["play_count", "play_time"]);
    }

    #[test]
    fn passing_scores_select_every_processor() {
        let registry = ProcessorRegistry::new();
        let event = passing_event();
        assert_eq!(registry.applicable(&event).len(), registry.all().count());
    }
}
