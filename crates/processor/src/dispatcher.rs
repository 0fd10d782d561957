//! Queue-side entry point: one message in, one transaction, one outcome out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use storage::StoreCaches;
use storage::models::{ProcessHistory, ScoreEvent, UserStats};
use storage::repository::{builds, process_history, user_stats};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::notify::Notifier;
use crate::processors::{
    DeferredAction, PIPELINE_VERSION, ProcessingContext, ProcessorRegistry,
};
use crate::store::{PgScoreStore, ScoreStore};

/// The inbound message shape. Delivery is at-least-once; the embedded history
/// (when the producer already knows it) saves one lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreMessage {
    pub event: ScoreEvent,
    #[serde(default)]
    pub process_history: Option<ProcessHistory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First-time application at the current pipeline version.
    Applied,
    /// An older version's effects were reverted and re-applied.
    Upgraded,
    /// Already processed at (or beyond) the current version; no writes.
    Skipped,
    /// Unsupported ruleset: no aggregate exists and none will. Not retryable.
    NoStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryDecision {
    Fresh,
    Upgrade(i16),
    Skip,
}

fn decide(history: Option<&ProcessHistory>) -> HistoryDecision {
    match history {
        None => HistoryDecision::Fresh,
        Some(h) if h.processed_version >= PIPELINE_VERSION => HistoryDecision::Skip,
        Some(h) => HistoryDecision::Upgrade(h.processed_version),
    }
}

/// The transactional core: revert (on upgrade), apply, stamp the aggregate
/// timestamps, then write the aggregate row, the history row and the
/// preserved flag through the same store so all of it commits or none does.
/// Returns the deferred actions for the caller to run after commit.
async fn run_pipeline(
    registry: &ProcessorRegistry,
    store: &mut dyn ScoreStore,
    builds: &HashMap<i32, bool>,
    event: &mut ScoreEvent,
    decision: HistoryDecision,
    stats: &mut UserStats,
) -> Result<Vec<DeferredAction>> {
    let mut ctx = ProcessingContext::new(&mut *store, builds);

    if let HistoryDecision::Upgrade(previous_version) = decision {
        for processor in registry.applicable(event) {
            processor
                .revert(event, stats, previous_version, &mut ctx)
                .await?;
        }
    }

    for processor in registry.applicable(event) {
        processor.apply(event, stats, &mut ctx).await?;
    }

    stats.last_played = stats.last_played.max(event.ended_at);
    stats.last_update = Utc::now();

    let deferred = ctx.into_deferred();

    store.persist_user_stats(stats).await?;
    store.upsert_history(event.id, PIPELINE_VERSION).await?;
    if event.passed {
        store.mark_preserved(event.id).await?;
    }

    Ok(deferred)
}

pub struct ScoreStatisticsDispatcher {
    pool: PgPool,
    registry: ProcessorRegistry,
    caches: Arc<StoreCaches>,
    builds: HashMap<i32, bool>,
    notifier: Arc<dyn Notifier>,
}

impl ScoreStatisticsDispatcher {
    /// Loads the (small) build table once; everything else is per-event.
    pub async fn new(pool: PgPool, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let builds = builds::load_all(&pool).await?;
        info!(builds = builds.len(), version = PIPELINE_VERSION, "dispatcher ready");
        Ok(Self {
            pool,
            registry: ProcessorRegistry::new(),
            caches: Arc::new(StoreCaches::new()),
            builds,
            notifier,
        })
    }

    /// Processes one queue message. Any error before commit aborts the
    /// transaction and propagates so the transport redelivers; redelivery is
    /// safe because an up-to-date history row short-circuits to `Skipped`.
    pub async fn process(&self, message: &mut ScoreMessage) -> Result<Outcome> {
        let event = &mut message.event;
        let mut tx = self.pool.begin().await?;

        let history = match &message.process_history {
            Some(h) => Some(h.clone()),
            None => process_history::get(&mut tx, event.id).await?,
        };

        let decision = decide(history.as_ref());
        if decision == HistoryDecision::Skip {
            debug!(score_id = event.id, "already at current version, skipping");
            return Ok(Outcome::Skipped);
        }

        let Some(mut stats) =
            user_stats::get_or_create_for_update(&mut tx, event.user_id, event.ruleset_id).await?
        else {
            warn!(
                score_id = event.id,
                ruleset_id = event.ruleset_id,
                "unsupported ruleset, dropping event"
            );
            return Ok(Outcome::NoStats);
        };

        let deferred = {
            let mut store = PgScoreStore::new(&mut tx, &self.caches);
            run_pipeline(
                &self.registry,
                &mut store,
                &self.builds,
                event,
                decision,
                &mut stats,
            )
            .await?
        };

        tx.commit().await?;

        // Everything below is best-effort; the aggregates are already durable.
        for action in deferred {
            action();
        }

        for processor in self.registry.applicable(event) {
            if let Err(e) = processor.apply_global(event, &self.pool).await {
                warn!(score_id = event.id, processor = processor.name(), error = %e, "apply_global failed");
            }
        }

        if event.passed {
            if let Err(e) = self.notifier.reindex(event.id).await {
                warn!(score_id = event.id, error = %e, "reindex notification failed");
            }
        }
        if let Err(e) = self.notifier.score_processed(event.id, PIPELINE_VERSION).await {
            warn!(score_id = event.id, error = %e, "processed notification failed");
        }

        Ok(match decision {
            HistoryDecision::Fresh => Outcome::Applied,
            _ => Outcome::Upgraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use storage::models::{
        Beatmap, DifficultyAttributeKey, DifficultyAttributes, RankedScore,
    };

    use super::*;
    use crate::performance::{BONUS_BASE, BONUS_DECAY};
    use crate::processors::test_support::{empty_stats, passing_event};

    fn history(version: i16) -> ProcessHistory {
        ProcessHistory {
            score_id: 1,
            processed_version: version,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn no_history_means_fresh_apply() {
        assert_eq!(decide(None), HistoryDecision::Fresh);
    }

    #[test]
    fn current_version_short_circuits() {
        assert_eq!(decide(Some(&history(PIPELINE_VERSION))), HistoryDecision::Skip);
    }

    #[test]
    fn newer_version_also_short_circuits() {
        // A rolled-back deploy must not revert with mismatched logic.
        assert_eq!(
            decide(Some(&history(PIPELINE_VERSION + 1))),
            HistoryDecision::Skip
        );
    }

    #[test]
    fn older_version_upgrades_at_the_recorded_version() {
        assert_eq!(
            decide(Some(&history(PIPELINE_VERSION - 3))),
            HistoryDecision::Upgrade(PIPELINE_VERSION - 3)
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum RatingOp {
        Upsert(i64),
        Delete(i64),
    }

    /// In-memory stand-in for one event's transaction, recording every write
    /// the pipeline makes.
    #[derive(Default)]
    struct MemScoreStore {
        beatmaps: HashMap<i64, Beatmap>,
        attributes: HashMap<DifficultyAttributeKey, DifficultyAttributes>,
        scores: Vec<RankedScore>,
        history: HashMap<i64, i16>,
        preserved: Vec<i64>,
        persisted: Option<UserStats>,
        rating_ops: Vec<RatingOp>,
    }

    #[async_trait]
    impl ScoreStore for MemScoreStore {
        async fn beatmap(&mut self, beatmap_id: i64) -> Result<Option<Beatmap>> {
            Ok(self.beatmaps.get(&beatmap_id).cloned())
        }

        async fn difficulty_attributes(
            &mut self,
            key: &DifficultyAttributeKey,
        ) -> Result<Option<DifficultyAttributes>> {
            Ok(self.attributes.get(key).cloned())
        }

        async fn upsert_rating(&mut self, score_id: i64, rating: f64) -> Result<()> {
            self.rating_ops.push(RatingOp::Upsert(score_id));
            for score in &mut self.scores {
                if score.score_id == score_id {
                    score.rating = Some(rating);
                }
            }
            Ok(())
        }

        async fn delete_rating(&mut self, score_id: i64) -> Result<()> {
            self.rating_ops.push(RatingOp::Delete(score_id));
            for score in &mut self.scores {
                if score.score_id == score_id {
                    score.rating = None;
                }
            }
            Ok(())
        }

        async fn user_ranked_scores(
            &mut self,
            _user_id: i64,
            _ruleset_id: i16,
        ) -> Result<Vec<RankedScore>> {
            Ok(self.scores.clone())
        }

        async fn persist_user_stats(&mut self, stats: &UserStats) -> Result<()> {
            self.persisted = Some(stats.clone());
            Ok(())
        }

        async fn upsert_history(&mut self, score_id: i64, version: i16) -> Result<()> {
            self.history.insert(score_id, version);
            Ok(())
        }

        async fn mark_preserved(&mut self, score_id: i64) -> Result<()> {
            self.preserved.push(score_id);
            Ok(())
        }
    }

    /// A ranked beatmap with stored difficulty attributes, plus the event's
    /// own score row as the ranked-score query would return it pre-rating.
    fn seeded_store() -> MemScoreStore {
        let mut store = MemScoreStore::default();
        store.beatmaps.insert(
            2301,
            Beatmap {
                beatmap_id: 2301,
                approved: 1,
                hit_objects: 107,
                difficulty_rating: 5.2,
                playcount: 0,
            },
        );
        store.attributes.insert(
            DifficultyAttributeKey::new(2301, 0, 0),
            DifficultyAttributes::from_rows([
                ("star_rating".to_owned(), 5.2),
                ("max_combo".to_owned(), 600.0),
            ]),
        );
        store.scores.push(RankedScore {
            score_id: 4001,
            beatmap_id: 2301,
            accuracy: 0.98,
            rating: None,
            legacy: false,
            build_id: Some(5),
            beatmap_status: 1,
        });
        store
    }

    fn permitted_builds() -> HashMap<i32, bool> {
        HashMap::from([(5, true)])
    }

    #[tokio::test]
    async fn passing_score_feeds_every_aggregate_and_the_bookkeeping() {
        let registry = ProcessorRegistry::new();
        let mut store = seeded_store();
        let builds = permitted_builds();
        let mut event = passing_event();
        let mut stats = empty_stats();

        let deferred = run_pipeline(
            &registry,
            &mut store,
            &builds,
            &mut event,
            HistoryDecision::Fresh,
            &mut stats,
        )
        .await
        .unwrap();

        assert_eq!(stats.playcount, 1);
        assert_eq!(stats.play_time, 200);
        assert_eq!(stats.count_300, 100);
        assert_eq!(stats.count_100, 4);
        assert_eq!(stats.count_miss, 2);
        assert_eq!(stats.total_score, event.total_score);
        assert_eq!(stats.ranked_score, event.total_score);
        assert_eq!(stats.rank_count_s, 1);

        let rating = event.rating.expect("ranked play should be rated");
        assert!(rating > 0.0);
        let bonus = BONUS_BASE * (1.0 - BONUS_DECAY.powi(1));
        assert!((stats.rating - (rating + bonus)).abs() < 1e-9);

        assert_eq!(store.history.get(&4001), Some(&PIPELINE_VERSION));
        assert_eq!(store.preserved, vec![4001]);
        assert_eq!(store.persisted.as_ref(), Some(&stats));
        assert_eq!(store.rating_ops, vec![RatingOp::Upsert(4001)]);
        assert!(deferred.is_empty());
    }

    #[tokio::test]
    async fn upgrade_reverts_at_the_recorded_version_then_reapplies() {
        let registry = ProcessorRegistry::new();
        let mut store = seeded_store();
        let builds = permitted_builds();
        let mut event = passing_event();
        let mut stats = empty_stats();

        run_pipeline(
            &registry,
            &mut store,
            &builds,
            &mut event,
            HistoryDecision::Fresh,
            &mut stats,
        )
        .await
        .unwrap();
        let once = stats.clone();
        store.rating_ops.clear();

        run_pipeline(
            &registry,
            &mut store,
            &builds,
            &mut event,
            HistoryDecision::Upgrade(PIPELINE_VERSION - 1),
            &mut stats,
        )
        .await
        .unwrap();

        // Revert plus re-apply lands on the single-application totals.
        assert_eq!(stats.playcount, once.playcount);
        assert_eq!(stats.count_300, once.count_300);
        assert_eq!(stats.total_score, once.total_score);
        assert_eq!(stats.accuracy_count, once.accuracy_count);
        assert!((stats.rating - once.rating).abs() < 1e-9);

        // The stale rating is dropped before the fresh one is written.
        assert_eq!(
            store.rating_ops,
            vec![RatingOp::Delete(4001), RatingOp::Upsert(4001)]
        );
        assert_eq!(store.history.get(&4001), Some(&PIPELINE_VERSION));
    }

    #[tokio::test]
    async fn failed_score_only_counts_play_activity_and_is_not_preserved() {
        let registry = ProcessorRegistry::new();
        let mut store = seeded_store();
        let builds = permitted_builds();
        let mut event = passing_event();
        event.passed = false;
        let mut stats = empty_stats();

        run_pipeline(
            &registry,
            &mut store,
            &builds,
            &mut event,
            HistoryDecision::Fresh,
            &mut stats,
        )
        .await
        .unwrap();

        assert_eq!(stats.playcount, 1);
        assert_eq!(stats.play_time, 200);
        assert_eq!(stats.count_300, 0);
        assert_eq!(stats.total_score, 0);
        assert!(event.rating.is_none());
        assert!(store.rating_ops.is_empty());
        assert!(store.preserved.is_empty());
        assert_eq!(store.history.get(&4001), Some(&PIPELINE_VERSION));
    }
}
