use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{debug, error};

use crate::configuration::{ExecutionLimits, KeyOutcome, Operation, OperationContext};
use crate::stats::{PhaseStats, PhaseStatsFactory, ShardedStats};
use crate::store::StoreError;

/// Everything needed to drive one operation over a set of keys.
pub struct Configuration {
    /// Integer ids of the targeted documents, in dispatch order.
    pub keys: Vec<u64>,

    pub limits: ExecutionLimits,

    pub operation: Arc<dyn Operation>,
}

/// What a completed run did.
pub struct RunReport {
    /// Keys for which a final outcome is known.
    pub processed: u64,
    pub done: u64,
    pub missing: u64,

    /// Ids of the missing keys, in ascending order.
    pub missing_keys: Vec<u64>,

    /// How many times a batch of results was drained.
    pub batches: u64,

    pub elapsed: Duration,
    pub stats: PhaseStats,
}

// When an operation ID equal or larger to this value is issued, the producer
// stops feeding the workers. `ask_to_stop` sets the operation_counter to this
// value; it is large enough to be unreachable and small enough not to overflow
// when ids are issued after the stop.
const INVALID_OP_ID_THRESHOLD: u64 = 1u64 << 63u64;

type KeyResult = (u64, Result<KeyOutcome, StoreError>);

// Represents shareable state and configuration of the workers.
struct WorkerContext {
    operation_counter: AtomicU64,
    operation: Arc<dyn Operation>,
    max_retries: u32,
    retry_backoff: Duration,
    stats: ShardedStats,
}

impl WorkerContext {
    fn new(config: &Configuration) -> Result<Self> {
        Ok(Self {
            operation_counter: AtomicU64::new(0),
            operation: Arc::clone(&config.operation),
            max_retries: config.limits.max_retries,
            retry_backoff: config.limits.retry_backoff,
            stats: ShardedStats::new(Arc::new(PhaseStatsFactory::new()?)),
        })
    }

    // Prevents more keys from being dispatched or retried
    fn ask_to_stop(&self) {
        self.operation_counter
            .store(INVALID_OP_ID_THRESHOLD, Ordering::Relaxed);
    }

    fn is_stopped(&self) -> bool {
        self.operation_counter.load(Ordering::Relaxed) >= INVALID_OP_ID_THRESHOLD
    }

    // Issues the next operation id. If the context got a signal to stop,
    // it will return `None`.
    fn issue_operation_id(&self) -> Option<u64> {
        let id = self.operation_counter.fetch_add(1, Ordering::Relaxed);
        (id < INVALID_OP_ID_THRESHOLD).then_some(id)
    }

    // Feeds the queue until all keys are dispatched or the run is stopped.
    // Blocks while the queue is full.
    async fn produce(&self, keys: Vec<u64>, queue: async_channel::Sender<(u64, u64)>) {
        for key_id in keys {
            let Some(op_id) = self.issue_operation_id() else {
                break;
            };
            if queue.send((op_id, key_id)).await.is_err() {
                break;
            }
        }
    }

    async fn run_worker(
        &self,
        queue: async_channel::Receiver<(u64, u64)>,
        results: async_channel::Sender<KeyResult>,
    ) {
        while let Ok((op_id, key_id)) = queue.recv().await {
            if self.is_stopped() {
                break;
            }
            let result = self.execute_with_retries(op_id, key_id).await;
            if results.send((key_id, result)).await.is_err() {
                break;
            }
        }
    }

    async fn execute_with_retries(
        &self,
        op_id: u64,
        key_id: u64,
    ) -> Result<KeyOutcome, StoreError> {
        let mut ctx = OperationContext {
            operation_id: op_id,
            key_id,
            attempt: 0,
        };
        loop {
            let start = Instant::now();
            let result = self.operation.execute(&ctx).await;
            self.stats
                .get_shard_mut()
                .account_attempt(start.elapsed(), &result);

            let err = match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if !err.is_retryable() || self.is_stopped() => return Err(err),
                Err(err) => err,
            };
            if ctx.attempt >= self.max_retries {
                return self.operation.on_retries_exhausted(&ctx, err);
            }

            debug!(key_id, attempt = ctx.attempt, error = %err, "retrying");
            self.stats.get_shard_mut().account_retry();
            ctx.attempt += 1;
            if !self.retry_backoff.is_zero() {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }
    }
}

// Accumulates drained results.
#[derive(Default)]
struct Collector {
    processed: u64,
    done: u64,
    missing_keys: Vec<u64>,
    batches: u64,
    first_error: Option<anyhow::Error>,
}

impl Collector {
    fn drain(&mut self, batch: &mut Vec<KeyResult>, ctx: &WorkerContext) {
        if batch.is_empty() {
            return;
        }
        self.batches += 1;
        debug!(batch = self.batches, size = batch.len(), "draining results");

        for (key_id, result) in batch.drain(..) {
            self.processed += 1;
            match result {
                Ok(KeyOutcome::Done) => self.done += 1,
                Ok(KeyOutcome::Missing) => self.missing_keys.push(key_id),
                Err(err) => {
                    error!(key_id, error = %err, "operation failed");
                    if self.first_error.is_none() {
                        self.first_error =
                            Some(anyhow::Error::new(err).context(format!("key {key_id} failed")));
                        ctx.ask_to_stop();
                    }
                }
            }
        }
    }
}

/// Executes the operation once for every key.
///
/// Keys are pushed into a queue of `queue_depth` entries, consumed by
/// `concurrency` workers. Results are gathered in batches of `batch_size`.
/// Returns when all keys are processed, or fails on the first key which
/// could not be processed, or when the deadline elapses.
pub async fn run(config: Configuration) -> Result<RunReport> {
    let start_time = Instant::now();
    let limits = config.limits.clone();
    let ctx = Arc::new(WorkerContext::new(&config)?);

    let (queue_tx, queue_rx) = async_channel::bounded(limits.queue_depth.max(1));
    let (results_tx, results_rx) = async_channel::bounded(limits.batch_size.max(1));

    let ctx_clone = Arc::clone(&ctx);
    let (producer, _producer_handle) =
        async move { ctx_clone.produce(config.keys, queue_tx).await }.remote_handle();
    tokio::task::spawn(producer);

    // Spawn as many worker tasks as the concurrency allows
    let mut worker_handles = (0..limits.concurrency.max(1))
        .map(|_| {
            let ctx_clone = Arc::clone(&ctx);
            let queue_rx = queue_rx.clone();
            let results_tx = results_tx.clone();
            let (fut, handle) =
                async move { ctx_clone.run_worker(queue_rx, results_tx).await }.remote_handle();
            tokio::task::spawn(fut);
            handle
        })
        .collect::<FuturesUnordered<_>>();
    drop(queue_rx);
    drop(results_tx);

    let mut collector = Collector::default();
    let collect = async {
        let mut batch = Vec::with_capacity(limits.batch_size.max(1));
        while let Ok(result) = results_rx.recv().await {
            batch.push(result);
            if batch.len() >= limits.batch_size.max(1) {
                collector.drain(&mut batch, &ctx);
            }
        }
        collector.drain(&mut batch, &ctx);
    };

    let timed_out = tokio::time::timeout(limits.deadline, collect)
        .await
        .is_err();
    if timed_out {
        ctx.ask_to_stop();
        // Dropping the handles cancels the workers
        return Err(anyhow::anyhow!(
            "phase did not complete within {:?}, {} keys processed",
            limits.deadline,
            collector.processed
        ));
    }
    while worker_handles.next().await.is_some() {}

    if let Some(err) = collector.first_error {
        return Err(err);
    }

    let stats = ctx.stats.get_combined_and_clear();
    let mut missing_keys = collector.missing_keys;
    missing_keys.sort_unstable();

    Ok(RunReport {
        processed: collector.processed,
        done: collector.done,
        missing: missing_keys.len() as u64,
        missing_keys,
        batches: collector.batches,
        elapsed: start_time.elapsed(),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    use ntest::timeout;

    use super::*;

    fn make_test_cfg(keys: std::ops::Range<u64>, op: impl Operation + 'static) -> Configuration {
        Configuration {
            keys: keys.collect(),
            limits: ExecutionLimits {
                concurrency: 10,
                queue_depth: 16,
                batch_size: 100,
                ..Default::default()
            },
            operation: Arc::new(op),
        }
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_run_to_completion() {
        struct Op(Arc<AtomicU64>);

        #[async_trait]
        impl Operation for Op {
            async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
                self.0.fetch_add(ctx.key_id, Ordering::SeqCst);
                Ok(KeyOutcome::Done)
            }
        }

        let counter = Arc::new(AtomicU64::new(0));
        let report = run(make_test_cfg(0..1000, Op(counter.clone())))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 499500);
        assert_eq!(report.processed, 1000);
        assert_eq!(report.done, 1000);
        assert_eq!(report.missing, 0);
        assert_eq!(report.batches, 10);
        assert_eq!(report.stats.attempts, 1000);
        assert_eq!(report.stats.retries, 0);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_run_to_error() {
        struct Op(Arc<AtomicU64>);

        #[async_trait]
        impl Operation for Op {
            async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
                if ctx.key_id == 500 {
                    return Err(StoreError::Malformed {
                        key: ctx.key_id.to_string(),
                        reason: "failure".into(),
                    });
                }
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(KeyOutcome::Done)
            }
        }

        let counter = Arc::new(AtomicU64::new(0));
        let mut cfg = make_test_cfg(0..100_000, Op(counter.clone()));
        cfg.limits.concurrency = 1;

        let err = run(cfg).await.err().unwrap();
        assert!(err.to_string().contains("key 500"));
        // Malformed errors are not retried, and the run stops shortly after
        assert!(counter.load(Ordering::SeqCst) < 100_000);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_retries() {
        // Fails the first three attempts of every key
        struct Op;

        #[async_trait]
        impl Operation for Op {
            async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
                if ctx.attempt < 3 {
                    return Err(StoreError::Transient("busy".into()));
                }
                Ok(KeyOutcome::Done)
            }
        }

        let report = run(make_test_cfg(0..50, Op)).await.unwrap();
        assert_eq!(report.done, 50);
        assert_eq!(report.stats.retries, 150);
        assert_eq!(report.stats.attempts, 200);
        assert_eq!(report.stats.errors, 150);
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_retries_exhausted() {
        struct Op {
            tolerate: bool,
            attempts: AtomicU64,
        }

        #[async_trait]
        impl Operation for Op {
            async fn execute(&self, ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                if ctx.key_id % 10 == 3 {
                    return Err(StoreError::NotFound(ctx.key_id.to_string()));
                }
                Ok(KeyOutcome::Done)
            }

            fn on_retries_exhausted(
                &self,
                _ctx: &OperationContext,
                err: StoreError,
            ) -> Result<KeyOutcome, StoreError> {
                if self.tolerate {
                    Ok(KeyOutcome::Missing)
                } else {
                    Err(err)
                }
            }
        }

        let mut cfg = make_test_cfg(
            0..30,
            Op {
                tolerate: true,
                attempts: AtomicU64::new(0),
            },
        );
        cfg.limits.max_retries = 2;
        let report = run(cfg).await.unwrap();
        assert_eq!(report.done, 27);
        assert_eq!(report.missing_keys, vec![3, 13, 23]);
        // The first attempt and two retries for each missing key
        assert_eq!(report.stats.attempts, 27 + 3 * 3);

        let mut cfg = make_test_cfg(
            0..30,
            Op {
                tolerate: false,
                attempts: AtomicU64::new(0),
            },
        );
        cfg.limits.max_retries = 2;
        assert!(run(cfg).await.is_err());
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_run_to_deadline() {
        struct Op;

        #[async_trait]
        impl Operation for Op {
            async fn execute(&self, _ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(KeyOutcome::Done)
            }
        }

        let mut cfg = make_test_cfg(0..1_000_000, Op);
        cfg.limits.deadline = Duration::from_millis(100);

        let err = run(cfg).await.err().unwrap();
        assert!(err.to_string().contains("did not complete"));
    }

    #[tokio::test]
    #[timeout(10000)]
    async fn test_empty_key_set() {
        struct Op;

        #[async_trait]
        impl Operation for Op {
            async fn execute(&self, _ctx: &OperationContext) -> Result<KeyOutcome, StoreError> {
                unreachable!()
            }
        }

        let report = run(make_test_cfg(0..0, Op)).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.batches, 0);
    }
}
