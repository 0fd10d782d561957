//! The import loop: fetch a batch past the watermark, convert, insert through
//! per-beatmap workers, persist the watermark, throttle against replica lag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use sqlx::PgPool;
use storage::repository::{CounterRepository, scores};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{ImporterError, Result};
use crate::legacy::{self, LegacyScoreRow};
use crate::rate::{BatchSizeController, RateAdjustment, SAMPLE_INTERVAL};
use crate::replication::ReplicationMonitor;

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportSummary {
    pub inserted: u64,
    pub batches: u64,
    pub last_legacy_id: i64,
}

pub struct LegacyScoreImporter {
    pool: PgPool,
    monitor: ReplicationMonitor,
    controller: BatchSizeController,
    ruleset_id: i16,
    workers: usize,
}

/// Scores for one beatmap must always flow through the same insertion worker:
/// newly assigned ids then stay monotonic within a beatmap, which downstream
/// tie-breaking relies on when timestamps collide at second resolution.
pub fn worker_for(beatmap_id: i64, workers: usize) -> usize {
    (beatmap_id.rem_euclid(workers.max(1) as i64)) as usize
}

/// Counter name holding the highest fully-imported legacy id per ruleset.
pub fn watermark_key(ruleset_id: i16) -> String {
    format!("legacy_import_watermark_{ruleset_id}")
}

impl LegacyScoreImporter {
    pub fn new(
        pool: PgPool,
        monitor: ReplicationMonitor,
        ruleset_id: i16,
        workers: usize,
    ) -> Self {
        Self {
            pool,
            monitor,
            controller: BatchSizeController::new(),
            ruleset_id,
            workers: workers.max(1),
        }
    }

    /// Runs until the source is exhausted or cancellation is requested. Any
    /// worker fault aborts the whole import; the operator resumes from the
    /// persisted watermark.
    pub async fn run(&mut self, cancel: Arc<AtomicBool>) -> Result<ImportSummary> {
        let counters = CounterRepository::new(self.pool.clone());
        let watermark_key = watermark_key(self.ruleset_id);

        let mut summary = ImportSummary::default();
        let mut watermark = counters.get(&watermark_key).await?.unwrap_or(0);
        let mut last_sample = Instant::now();

        info!(
            ruleset_id = self.ruleset_id,
            watermark,
            workers = self.workers,
            "starting legacy import"
        );

        loop {
            if cancel.load(Ordering::SeqCst) {
                info!(watermark, "cancellation requested, stopping after watermark");
                break;
            }

            let rows = legacy::fetch_batch(
                &self.pool,
                self.ruleset_id,
                watermark,
                self.controller.size() as i64,
            )
            .await?;

            let Some(last_row) = rows.last() else {
                break;
            };
            let batch_last = last_row.legacy_id;

            summary.inserted += self.insert_batch(rows).await?;
            summary.batches += 1;

            watermark = batch_last;
            summary.last_legacy_id = watermark;
            counters.set(&watermark_key, watermark).await?;

            info!(
                inserted = summary.inserted,
                watermark,
                batch_size = self.controller.size(),
                "batch committed"
            );

            if last_sample.elapsed() >= SAMPLE_INTERVAL {
                self.throttle().await?;
                last_sample = Instant::now();
            }
        }

        info!(
            inserted = summary.inserted,
            batches = summary.batches,
            "legacy import finished"
        );
        Ok(summary)
    }

    /// Routes the batch to per-beatmap workers and waits for all of them.
    /// Rows are inserted in (beatmap, legacy id) order within each worker.
    async fn insert_batch(&self, rows: Vec<LegacyScoreRow>) -> Result<u64> {
        let mut groups: Vec<Vec<LegacyScoreRow>> =
            (0..self.workers).map(|_| Vec::new()).collect();
        for row in rows {
            groups[worker_for(row.beatmap_id, self.workers)].push(row);
        }

        let mut tasks: JoinSet<Result<u64>> = JoinSet::new();
        for mut group in groups.into_iter().filter(|g| !g.is_empty()) {
            group.sort_by_key(|row| (row.beatmap_id, row.legacy_id));
            let pool = self.pool.clone();
            tasks.spawn(async move { insert_group(pool, group).await });
        }

        let mut inserted = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(count)) => inserted += count,
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(ImporterError::Worker(e.to_string()));
                }
            }
        }

        Ok(inserted)
    }

    async fn throttle(&mut self) -> Result<()> {
        let lag = self.monitor.sample().await?;
        match self.controller.observe(lag) {
            RateAdjustment::Increased { batch_size } => {
                info!(lag_secs = lag.as_secs_f64(), batch_size, "replica healthy");
            }
            RateAdjustment::Reduced { batch_size } => {
                warn!(lag_secs = lag.as_secs_f64(), batch_size, "replica lagging, slowing down");
            }
            RateAdjustment::Panicked { batch_size, pause } => {
                warn!(
                    lag_secs = lag.as_secs_f64(),
                    batch_size,
                    pause_secs = pause.as_secs_f64(),
                    "replica badly lagging, pausing import"
                );
                tokio::time::sleep(pause).await;
            }
        }
        Ok(())
    }
}

/// One worker's share of a batch, inserted inside a single transaction so a
/// fault leaves no partial slice behind. Rows already present (a replay after
/// a crash between a sibling's commit and the watermark write) insert as
/// no-ops, so resuming from the watermark never aborts on duplicates.
async fn insert_group(pool: PgPool, rows: Vec<LegacyScoreRow>) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = Vec::with_capacity(rows.len());
    for row in &rows {
        let event = legacy::convert(row)?;
        inserted.push(scores::insert_imported(&mut tx, &event, row.legacy_id).await?);
    }
    tx.commit().await?;
    Ok(newly_inserted(&inserted))
}

fn newly_inserted(ids: &[Option<i64>]) -> u64 {
    ids.iter().filter(|id| id.is_some()).count() as u64
}
