//! Generic partitioned-concurrency batch executor.
//!
//! Work items are split round-robin across N workers. Each worker owns one
//! store context (for Postgres: a dedicated connection for the lifetime of
//! each transaction) and commits every `batch_size` items plus once at
//! partition end. Used by every bulk/backfill entry point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::task::JoinSet;

use crate::error::{ProcessorError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Transaction boundary seam. Keeping it a trait lets the exactly-once and
/// cancellation behaviour be exercised without a store.
#[async_trait]
pub trait BatchContext: Send {
    async fn begin(&mut self) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
}

/// One worker's Postgres context. `Pool::begin` checks a connection out of
/// the pool for the duration of the transaction, so concurrent workers never
/// share a connection.
pub struct PgBatchContext {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgBatchContext {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    pub fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(ProcessorError::NoOpenTransaction)
    }
}

#[async_trait]
impl BatchContext for PgBatchContext {
    async fn begin(&mut self) -> Result<()> {
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}

/// The per-item work. Implementations capture whatever shared state they
/// need; they run on each worker via `Arc`.
#[async_trait]
pub trait BatchItemProcessor<T, C: BatchContext>: Send + Sync {
    async fn process(&self, ctx: &mut C, item: &T) -> Result<()>;
}

/// Round-robin split. Every item lands in exactly one partition.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut partitions: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (index, item) in items.into_iter().enumerate() {
        partitions[index % workers].push(item);
    }
    partitions
}

pub struct PartitionedExecutor {
    pub workers: usize,
    pub batch_size: usize,
}

impl PartitionedExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Runs `processor` over every item. Cancellation is cooperative and
    /// checked once per item: the in-flight item finishes, the trailing
    /// partial batch commits, and the caller reads `processed` to see how far
    /// the run got. The first worker error aborts the whole run; commits
    /// already made by other partitions stand.
    pub async fn run<T, C, P>(
        &self,
        items: Vec<T>,
        mut make_context: impl FnMut() -> C,
        processor: Arc<P>,
        cancel: Arc<AtomicBool>,
        processed: Arc<AtomicU64>,
    ) -> Result<()>
    where
        T: Send + 'static,
        C: BatchContext + 'static,
        P: BatchItemProcessor<T, C> + 'static,
    {
        let batch_size = self.batch_size.max(1);
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for items in partition(items, self.workers) {
            if items.is_empty() {
                continue;
            }

            let mut ctx = make_context();
            let processor = Arc::clone(&processor);
            let cancel = Arc::clone(&cancel);
            let processed = Arc::clone(&processed);

            tasks.spawn(async move {
                let mut in_batch = 0usize;
                // Items are consumed by value; holding a borrowing iterator
                // across the awaits would demand `T: Sync` of every caller.
                for item in items {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    if in_batch == 0 {
                        ctx.begin().await?;
                    }
                    processor.process(&mut ctx, &item).await?;
                    processed.fetch_add(1, Ordering::SeqCst);
                    in_batch += 1;
                    if in_batch >= batch_size {
                        ctx.commit().await?;
                        in_batch = 0;
                    }
                }
                if in_batch > 0 {
                    ctx.commit().await?;
                }
                Ok(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(ProcessorError::Worker(e.to_string()));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// In-memory stand-in: effects stage in the open "transaction" and only
    /// become visible on commit.
    #[derive(Default)]
    struct MemContext {
        staged: Vec<u64>,
        committed: Arc<Mutex<Vec<u64>>>,
        begins: Arc<AtomicU64>,
        commits: Arc<AtomicU64>,
    }

    #[async_trait]
    impl BatchContext for MemContext {
        async fn begin(&mut self) -> Result<()> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.committed
                .lock()
                .unwrap()
                .append(&mut self.staged);
            Ok(())
        }
    }

    struct StageItem;

    #[async_trait]
    impl BatchItemProcessor<u64, MemContext> for StageItem {
        async fn process(&self, ctx: &mut MemContext, item: &u64) -> Result<()> {
            ctx.staged.push(*item);
            Ok(())
        }
    }

    struct FailOn {
        value: u64,
    }

    #[async_trait]
    impl BatchItemProcessor<u64, MemContext> for FailOn {
        async fn process(&self, ctx: &mut MemContext, item: &u64) -> Result<()> {
            if *item == self.value {
                return Err(ProcessorError::Worker("synthetic failure".into()));
            }
            ctx.staged.push(*item);
            Ok(())
        }
    }

    #[test]
    fn partition_covers_every_item_exactly_once() {
        for workers in 1..=16 {
            for count in [0usize, 1, 7, 100, 1317] {
                let parts = partition((0..count as u64).collect(), workers);
                assert_eq!(parts.len(), workers.max(1));
                let mut all: Vec<u64> = parts.into_iter().flatten().collect();
                all.sort_unstable();
                assert_eq!(all, (0..count as u64).collect::<Vec<_>>());
            }
        }
    }

    #[tokio::test]
    async fn every_item_is_processed_exactly_once() {
        for workers in [1usize, 2, 5, 16] {
            let committed = Arc::new(Mutex::new(Vec::new()));
            let processed = Arc::new(AtomicU64::new(0));
            let count = 10_000u64;

            PartitionedExecutor::new(workers)
                .batch_size(50)
                .run(
                    (1..=count).collect(),
                    || MemContext {
                        committed: Arc::clone(&committed),
                        ..MemContext::default()
                    },
                    Arc::new(StageItem),
                    Arc::new(AtomicBool::new(false)),
                    Arc::clone(&processed),
                )
                .await
                .unwrap();

            assert_eq!(processed.load(Ordering::SeqCst), count);
            let mut all = committed.lock().unwrap().clone();
            all.sort_unstable();
            assert_eq!(all.len() as u64, count);
            assert_eq!(all.iter().sum::<u64>(), count * (count + 1) / 2);
        }
    }

    #[tokio::test]
    async fn trailing_partial_batch_commits() {
        let committed = Arc::new(Mutex::new(Vec::new()));
        let commits = Arc::new(AtomicU64::new(0));
        let processed = Arc::new(AtomicU64::new(0));

        PartitionedExecutor::new(1)
            .batch_size(4)
            .run(
                (1..=10u64).collect(),
                || MemContext {
                    committed: Arc::clone(&committed),
                    commits: Arc::clone(&commits),
                    ..MemContext::default()
                },
                Arc::new(StageItem),
                Arc::new(AtomicBool::new(false)),
                processed,
            )
            .await
            .unwrap();

        // 4 + 4 + 2: the final short batch still commits.
        assert_eq!(commits.load(Ordering::SeqCst), 3);
        assert_eq!(committed.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn pre_cancelled_run_processes_nothing() {
        let committed = Arc::new(Mutex::new(Vec::new()));
        let processed = Arc::new(AtomicU64::new(0));
        let cancel = Arc::new(AtomicBool::new(true));

        PartitionedExecutor::new(4)
            .run(
                (1..=100u64).collect(),
                || MemContext {
                    committed: Arc::clone(&committed),
                    ..MemContext::default()
                },
                Arc::new(StageItem),
                cancel,
                Arc::clone(&processed),
            )
            .await
            .unwrap();

        assert_eq!(processed.load(Ordering::SeqCst), 0);
        assert!(committed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn worker_failure_aborts_the_run_but_keeps_prior_commits() {
        let committed = Arc::new(Mutex::new(Vec::new()));
        let processed = Arc::new(AtomicU64::new(0));

        let result = PartitionedExecutor::new(1)
            .batch_size(2)
            .run(
                (1..=10u64).collect(),
                || MemContext {
                    committed: Arc::clone(&committed),
                    ..MemContext::default()
                },
                Arc::new(FailOn { value: 5 }),
                Arc::new(AtomicBool::new(false)),
                processed,
            )
            .await;

        assert!(matches!(result, Err(ProcessorError::Worker(_))));
        // Items 1..=4 committed in two full batches; 5 aborted its batch.
        assert_eq!(*committed.lock().unwrap(), vec![1, 2, 3, 4]);
    }
}
