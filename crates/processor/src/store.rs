//! Transaction-scoped store access for the processing pipeline.
//!
//! The pipeline mutates aggregates through this trait rather than a concrete
//! transaction, the same seam `batch` uses for its contexts: the sequencing
//! of revert, apply and the atomic bookkeeping writes can then be exercised
//! against an in-memory store.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use storage::StoreCaches;
use storage::models::{
    Beatmap, DifficultyAttributeKey, DifficultyAttributes, RankedScore, UserStats,
};
use storage::repository::{process_history, scores, user_stats};

use crate::error::Result;

/// Everything the pipeline reads or writes inside one event's transaction.
#[async_trait]
pub trait ScoreStore: Send {
    async fn beatmap(&mut self, beatmap_id: i64) -> Result<Option<Beatmap>>;

    async fn difficulty_attributes(
        &mut self,
        key: &DifficultyAttributeKey,
    ) -> Result<Option<DifficultyAttributes>>;

    async fn upsert_rating(&mut self, score_id: i64, rating: f64) -> Result<()>;

    async fn delete_rating(&mut self, score_id: i64) -> Result<()>;

    async fn user_ranked_scores(
        &mut self,
        user_id: i64,
        ruleset_id: i16,
    ) -> Result<Vec<RankedScore>>;

    async fn persist_user_stats(&mut self, stats: &UserStats) -> Result<()>;

    async fn upsert_history(&mut self, score_id: i64, version: i16) -> Result<()>;

    async fn mark_preserved(&mut self, score_id: i64) -> Result<()>;
}

/// The Postgres store: one open transaction plus the process-lifetime caches.
pub struct PgScoreStore<'a, 'c> {
    tx: &'a mut Transaction<'c, Postgres>,
    caches: &'a StoreCaches,
}

impl<'a, 'c> PgScoreStore<'a, 'c> {
    pub fn new(tx: &'a mut Transaction<'c, Postgres>, caches: &'a StoreCaches) -> Self {
        Self { tx, caches }
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore<'_, '_> {
    async fn beatmap(&mut self, beatmap_id: i64) -> Result<Option<Beatmap>> {
        Ok(self.caches.beatmap(self.tx, beatmap_id).await?)
    }

    async fn difficulty_attributes(
        &mut self,
        key: &DifficultyAttributeKey,
    ) -> Result<Option<DifficultyAttributes>> {
        Ok(self.caches.difficulty_attributes(self.tx, key).await?)
    }

    async fn upsert_rating(&mut self, score_id: i64, rating: f64) -> Result<()> {
        Ok(scores::upsert_rating(self.tx, score_id, rating).await?)
    }

    async fn delete_rating(&mut self, score_id: i64) -> Result<()> {
        Ok(scores::delete_rating(self.tx, score_id).await?)
    }

    async fn user_ranked_scores(
        &mut self,
        user_id: i64,
        ruleset_id: i16,
    ) -> Result<Vec<RankedScore>> {
        Ok(scores::user_ranked_scores(self.tx, user_id, ruleset_id).await?)
    }

    async fn persist_user_stats(&mut self, stats: &UserStats) -> Result<()> {
        Ok(user_stats::persist(self.tx, stats).await?)
    }

    async fn upsert_history(&mut self, score_id: i64, version: i16) -> Result<()> {
        Ok(process_history::upsert(self.tx, score_id, version).await?)
    }

    async fn mark_preserved(&mut self, score_id: i64) -> Result<()> {
        Ok(scores::mark_preserved(self.tx, score_id).await?)
    }
}
