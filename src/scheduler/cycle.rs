//! One reconciliation pass: fetch pending orders, check them, persist results.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::storage::OrderStore;

use super::worker_pool::{PoolStats, WorkerPool};

/// Summary of one call to [`ReconciliationCycle::run_once`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Pending orders fetched from the store.
    pub pending: usize,
    /// Updated orders written back.
    pub persisted: usize,
    /// Updated orders the store refused; they stay pending.
    pub persist_failures: usize,
    /// The pending-order fetch itself failed.
    pub fetch_failed: bool,
    /// Statistics from the worker pool, if a wave ran.
    pub pool: PoolStats,
}

/// Orchestrates fetch, fan-out and persistence for a single tick.
pub struct ReconciliationCycle {
    store: Arc<dyn OrderStore>,
    pool: WorkerPool,
}

impl ReconciliationCycle {
    /// Creates a cycle over `store` using `pool` for inquiries.
    pub fn new(store: Arc<dyn OrderStore>, pool: WorkerPool) -> Self {
        Self { store, pool }
    }

    /// Returns the worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Runs one pass.
    ///
    /// Never fails: store and per-order errors are logged and reflected in
    /// the report, and the affected orders are picked up again next pass.
    pub async fn run_once(&self) -> CycleReport {
        let orders = match self.store.fetch_pending().await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "Failed to fetch pending orders");
                return CycleReport {
                    fetch_failed: true,
                    ..Default::default()
                };
            }
        };

        let mut report = CycleReport {
            pending: orders.len(),
            ..Default::default()
        };

        if orders.is_empty() {
            debug!("No pending orders");
            return report;
        }

        let mut wave = self.pool.dispatch(orders);

        while let Some(order) = wave.next_result().await {
            match self.store.process(&order).await {
                Ok(()) => {
                    report.persisted += 1;
                    info!(
                        order = %order.number,
                        status = %order.status,
                        accrual = %order.accrual,
                        "Order processed"
                    );
                }
                Err(e) => {
                    report.persist_failures += 1;
                    error!(order = %order.number, error = %e, "Failed to update order");
                }
            }
        }

        report.pool = wave.finish().await;

        info!(
            pending = report.pending,
            persisted = report.persisted,
            persist_failures = report.persist_failures,
            failed = report.pool.failed,
            skipped = report.pool.skipped,
            throttled = report.pool.was_throttled(),
            "Reconciliation cycle complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accrual::{AccrualApi, CheckOutcome};
    use crate::error::AccrualError;
    use crate::orders::{Order, OrderStatus};
    use crate::scheduler::backoff::BackoffController;
    use crate::scheduler::worker_pool::WorkerPoolConfig;
    use crate::storage::{FailurePoint, InMemoryOrderStore, StoreError};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Maps order numbers to fixed outcomes.
    struct FixedClient {
        calls: AtomicUsize,
    }

    impl FixedClient {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AccrualApi for FixedClient {
        async fn inquire(&self, order: &Order) -> CheckOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match order.number.as_str() {
                "A" => CheckOutcome::Success(order.transitioned(OrderStatus::Processed, dec!(500))),
                "B" => CheckOutcome::Success(order.invalidated()),
                "C" => CheckOutcome::Busy {
                    retry_after: Duration::from_secs(5),
                },
                "D" => CheckOutcome::Fail(AccrualError::UnexpectedStatus(503)),
                _ => CheckOutcome::Success(order.transitioned(OrderStatus::Processing, Decimal::ZERO)),
            }
        }
    }

    fn cycle(
        store: Arc<InMemoryOrderStore>,
        client: Arc<FixedClient>,
    ) -> (ReconciliationCycle, Arc<BackoffController>) {
        let backoff = Arc::new(BackoffController::new(Duration::from_secs(10)));
        let pool = WorkerPool::new(WorkerPoolConfig::new(5), client, Arc::clone(&backoff));
        (ReconciliationCycle::new(store, pool), backoff)
    }

    #[tokio::test]
    async fn test_empty_store_is_a_no_op() {
        let store = Arc::new(InMemoryOrderStore::new());
        let client = Arc::new(FixedClient::new());
        let (cycle, _) = cycle(store, client.clone());

        let report = cycle.run_once().await;

        assert_eq!(report, CycleReport::default());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_processed_order_credits_balance() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(Order::new("A", 1)).unwrap();
        let (cycle, _) = cycle(store.clone(), Arc::new(FixedClient::new()));

        let report = cycle.run_once().await;

        assert_eq!(report.pending, 1);
        assert_eq!(report.persisted, 1);
        let stored = store.order("A").unwrap();
        assert_eq!(stored.status, OrderStatus::Processed);
        assert_eq!(stored.accrual, dec!(500));
        assert_eq!(store.balance(1).current, dec!(500));
    }

    #[tokio::test]
    async fn test_unknown_order_becomes_invalid() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(Order::new("B", 1)).unwrap();
        let (cycle, _) = cycle(store.clone(), Arc::new(FixedClient::new()));

        cycle.run_once().await;

        let stored = store.order("B").unwrap();
        assert_eq!(stored.status, OrderStatus::Invalid);
        assert_eq!(stored.accrual, Decimal::ZERO);
        assert_eq!(store.balance(1).current, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_busy_leaves_order_and_sets_interval() {
        let store = Arc::new(InMemoryOrderStore::new());
        store
            .insert(Order::new("C", 1).with_status(OrderStatus::Processing))
            .unwrap();
        let (cycle, backoff) = cycle(store.clone(), Arc::new(FixedClient::new()));

        let report = cycle.run_once().await;

        assert_eq!(report.persisted, 0);
        assert!(report.pool.was_throttled());
        assert_eq!(store.order("C").unwrap().status, OrderStatus::Processing);
        assert_eq!(backoff.current_interval(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_failed_check_stays_pending() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(Order::new("D", 1)).unwrap();
        store.insert(Order::new("A", 2)).unwrap();
        let (cycle, _) = cycle(store.clone(), Arc::new(FixedClient::new()));

        let report = cycle.run_once().await;

        assert_eq!(report.pool.failed, 1);
        assert_eq!(report.persisted, 1);
        assert_eq!(store.order("D").unwrap().status, OrderStatus::New);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_contained() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(Order::new("A", 1)).unwrap();
        store.fail_at(FailurePoint::FetchPending);
        let client = Arc::new(FixedClient::new());
        let (cycle, _) = cycle(store, client.clone());

        let report = cycle.run_once().await;

        assert!(report.fetch_failed);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_stop_other_orders() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(Order::new("A", 1)).unwrap();
        store.insert(Order::new("B", 1)).unwrap();
        store.insert(Order::new("E", 1)).unwrap();
        store.fail_at(FailurePoint::BalanceCredit);
        let (cycle, _) = cycle(store.clone(), Arc::new(FixedClient::new()));

        let report = cycle.run_once().await;

        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.persisted, 2);
        assert_eq!(store.order("A").unwrap().status, OrderStatus::New);
        assert_eq!(store.order("B").unwrap().status, OrderStatus::Invalid);
        assert_eq!(store.order("E").unwrap().status, OrderStatus::Processing);
        assert_eq!(store.balance(1).current, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(Order::new("A", 1)).unwrap();
        store.insert(Order::new("B", 1)).unwrap();
        let (cycle, _) = cycle(store.clone(), Arc::new(FixedClient::new()));

        cycle.run_once().await;
        let second = cycle.run_once().await;

        assert_eq!(second.pending, 0);
        assert_eq!(store.balance(1).current, dec!(500));
    }

    #[tokio::test]
    async fn test_store_errors_counted_not_raised() {
        struct BrokenStore;

        #[async_trait]
        impl OrderStore for BrokenStore {
            async fn fetch_pending(&self) -> Result<Vec<Order>, StoreError> {
                let mut order = Order::new("A", 1);
                order.id = 1;
                Ok(vec![order])
            }

            async fn process(&self, _order: &Order) -> Result<(), StoreError> {
                Err(StoreError::Transaction("disk full".to_string()))
            }
        }

        let backoff = Arc::new(BackoffController::new(Duration::from_secs(10)));
        let pool = WorkerPool::new(
            WorkerPoolConfig::new(5),
            Arc::new(FixedClient::new()),
            backoff,
        );
        let cycle = ReconciliationCycle::new(Arc::new(BrokenStore), pool);

        let report = cycle.run_once().await;
        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.persisted, 0);
    }
}
