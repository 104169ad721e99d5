//! Worker pool for checking a batch of orders against the accrual service.
//!
//! Each call to [`WorkerPool::dispatch`] starts one *wave*: the batch is
//! loaded into a bounded queue sized to the batch, N workers drain it
//! concurrently, and successful outcomes stream out through a results
//! channel that closes once every worker has stopped.
//!
//! # Features
//!
//! - Configurable number of workers (never more than the batch size)
//! - Cooperative cancellation of the rest of the wave on backpressure
//! - "First busy wins": only the first `Busy` of a wave sets the poll interval
//! - Per-wave statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::accrual::{AccrualApi, CheckOutcome};
use crate::orders::Order;

use super::backoff::BackoffController;

/// Default number of concurrent workers per wave.
pub const DEFAULT_WORKERS: usize = 5;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks to spawn per wave.
    pub num_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_WORKERS,
        }
    }
}

impl WorkerPoolConfig {
    /// Creates a new configuration with the specified number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self { num_workers }
    }
}

/// Statistics for one wave.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Workers spawned for the wave.
    pub num_workers: usize,
    /// Orders handed to the wave.
    pub batch_size: usize,
    /// Inquiries started.
    pub inquiries: u64,
    /// Inquiries that produced an updated order.
    pub succeeded: u64,
    /// Inquiries that failed transiently.
    pub failed: u64,
    /// In-flight inquiries dropped because the wave was cancelled.
    pub abandoned: u64,
    /// Orders never inquired about because the wave was cancelled.
    pub skipped: u64,
    /// Retry delay honored from the first `Busy` outcome, if any.
    pub retry_after: Option<Duration>,
}

impl PoolStats {
    /// Returns true if backpressure cut the wave short.
    pub fn was_throttled(&self) -> bool {
        self.retry_after.is_some()
    }

    /// Returns the success rate of started inquiries as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.inquiries == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.inquiries as f64) * 100.0
    }
}

/// Shared state for tracking wave statistics.
struct SharedPoolStats {
    inquiries: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    retry_after: OnceLock<Duration>,
}

impl SharedPoolStats {
    fn new() -> Self {
        Self {
            inquiries: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            retry_after: OnceLock::new(),
        }
    }

    fn record_inquiry(&self) {
        self.inquiries.fetch_add(1, Ordering::SeqCst);
    }

    fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }

    /// Records the wave's retry delay. Returns false if another worker got there first.
    fn claim_busy(&self, retry_after: Duration) -> bool {
        self.retry_after.set(retry_after).is_ok()
    }

    fn to_pool_stats(&self, num_workers: usize, batch_size: usize) -> PoolStats {
        let inquiries = self.inquiries.load(Ordering::SeqCst);

        PoolStats {
            num_workers,
            batch_size,
            inquiries,
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            abandoned: self.abandoned.load(Ordering::SeqCst),
            skipped: (batch_size as u64).saturating_sub(inquiries),
            retry_after: self.retry_after.get().copied(),
        }
    }
}

/// Pool that fans a batch of orders out to concurrent workers.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    client: Arc<dyn AccrualApi>,
    backoff: Arc<BackoffController>,
}

impl WorkerPool {
    /// Creates a new worker pool.
    ///
    /// # Arguments
    ///
    /// * `config` - Pool configuration
    /// * `client` - Accrual service used by every worker
    /// * `backoff` - Poll interval updated when the service pushes back
    pub fn new(
        config: WorkerPoolConfig,
        client: Arc<dyn AccrualApi>,
        backoff: Arc<BackoffController>,
    ) -> Self {
        Self {
            config,
            client,
            backoff,
        }
    }

    /// Returns the configured number of workers.
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Returns the shared backoff controller.
    pub fn backoff(&self) -> &Arc<BackoffController> {
        &self.backoff
    }

    /// Starts a wave over `orders`.
    ///
    /// Must be called from within a tokio runtime. Results are available on
    /// the returned [`Wave`] as soon as each inquiry succeeds.
    pub fn dispatch(&self, orders: Vec<Order>) -> Wave {
        let batch_size = orders.len();
        let capacity = batch_size.max(1);

        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        for order in orders {
            // Capacity matches the batch, so the queue never fills.
            if let Err(e) = queue_tx.try_send(order) {
                error!(error = %e, "Failed to enqueue order");
            }
        }
        drop(queue_tx);

        let (results_tx, results_rx) = mpsc::channel(capacity);
        let queue = Arc::new(Mutex::new(queue_rx));
        let cancellation = CancellationToken::new();
        let stats = Arc::new(SharedPoolStats::new());
        let num_workers = self.config.num_workers.min(batch_size).max(1);

        let handles: Vec<JoinHandle<()>> = (0..num_workers)
            .map(|i| {
                let worker = Worker {
                    id: format!("worker-{}", i),
                    queue: Arc::clone(&queue),
                    client: Arc::clone(&self.client),
                    backoff: Arc::clone(&self.backoff),
                    cancellation: cancellation.clone(),
                    results: results_tx.clone(),
                    stats: Arc::clone(&stats),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        // Workers hold the only senders; the channel closes when the last one stops.
        drop(results_tx);

        let supervisor = tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Worker task panicked");
                }
            }
            stats.to_pool_stats(num_workers, batch_size)
        });

        Wave {
            results: results_rx,
            cancellation,
            supervisor,
        }
    }
}

/// A running wave of inquiries.
pub struct Wave {
    results: mpsc::Receiver<Order>,
    cancellation: CancellationToken,
    supervisor: JoinHandle<PoolStats>,
}

impl Wave {
    /// Waits for the next updated order. Returns `None` once every worker has stopped.
    pub async fn next_result(&mut self) -> Option<Order> {
        self.results.recv().await
    }

    /// Stops the wave: no new inquiries start and in-flight ones are abandoned.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true once the wave has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Waits for all workers and returns the wave statistics.
    ///
    /// Any results not yet taken are discarded.
    pub async fn finish(self) -> PoolStats {
        drop(self.results);
        match self.supervisor.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Wave supervisor failed");
                PoolStats::default()
            }
        }
    }

    /// Drains every result, then returns them with the wave statistics.
    pub async fn collect(mut self) -> (Vec<Order>, PoolStats) {
        let mut orders = Vec::new();
        while let Some(order) = self.next_result().await {
            orders.push(order);
        }
        let stats = self.finish().await;
        (orders, stats)
    }
}

/// A single worker draining the wave's queue.
struct Worker {
    id: String,
    queue: Arc<Mutex<mpsc::Receiver<Order>>>,
    client: Arc<dyn AccrualApi>,
    backoff: Arc<BackoffController>,
    cancellation: CancellationToken,
    results: mpsc::Sender<Order>,
    stats: Arc<SharedPoolStats>,
}

impl Worker {
    /// Main worker loop.
    ///
    /// Pulls orders until the queue is empty or the wave is cancelled.
    async fn run(self) {
        debug!(worker_id = %self.id, "Worker started");

        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                queue.recv().await
            };

            let Some(order) = next else {
                break;
            };

            if self.cancellation.is_cancelled() {
                debug!(worker_id = %self.id, "Wave cancelled, stopping");
                break;
            }

            self.stats.record_inquiry();

            let outcome = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    self.stats.record_abandoned();
                    debug!(
                        worker_id = %self.id,
                        order = %order.number,
                        "Abandoned in-flight inquiry"
                    );
                    break;
                }
                outcome = self.client.inquire(&order) => outcome,
            };

            match outcome {
                CheckOutcome::Success(updated) => {
                    self.stats.record_success();
                    if self.results.send(updated).await.is_err() {
                        debug!(worker_id = %self.id, "Results receiver dropped, stopping");
                        break;
                    }
                }
                CheckOutcome::Busy { retry_after } => {
                    if self.stats.claim_busy(retry_after) {
                        warn!(
                            worker_id = %self.id,
                            order = %order.number,
                            retry_after_secs = retry_after.as_secs(),
                            "Accrual service is busy, backing off"
                        );
                        self.backoff.set_interval(retry_after);
                    }
                    self.cancellation.cancel();
                    break;
                }
                CheckOutcome::Fail(e) => {
                    self.stats.record_failure();
                    warn!(
                        worker_id = %self.id,
                        order = %order.number,
                        error = %e,
                        "Order check failed, will retry next cycle"
                    );
                }
            }
        }

        debug!(worker_id = %self.id, "Worker stopped");
    }
}
