//! In-memory order store.
//!
//! Implements the full [`OrderStore`] contract without a database. Writes
//! are staged and committed together under one lock, and failures can be
//! injected at each step to exercise the atomicity guarantee.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::orders::{Balance, Order, OrderStatus};

use super::store::{OrderStore, StoreError};

/// Step at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// `fetch_pending` fails before reading anything.
    FetchPending,
    /// `process` fails while updating the order row.
    OrderUpdate,
    /// `process` fails after the order update, while crediting the balance.
    BalanceCredit,
}

#[derive(Default)]
struct State {
    next_id: i64,
    orders: BTreeMap<i64, Order>,
    balances: HashMap<i64, Balance>,
    failures: HashSet<FailurePoint>,
}

/// Thread-safe order store backed by in-process maps.
#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<State>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a new order, assigning its id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the order number is taken.
    pub fn insert(&self, mut order: Order) -> Result<Order, StoreError> {
        let mut state = self.lock();
        if state.orders.values().any(|o| o.number == order.number) {
            return Err(StoreError::Duplicate(order.number));
        }

        state.next_id += 1;
        order.id = state.next_id;
        state.orders.insert(order.id, order.clone());
        state
            .balances
            .entry(order.user_id)
            .or_insert_with(|| Balance::empty(order.user_id));

        Ok(order)
    }

    /// Looks up an order by number.
    pub fn order(&self, number: &str) -> Option<Order> {
        self.lock()
            .orders
            .values()
            .find(|o| o.number == number)
            .cloned()
    }

    /// Returns a user's orders, newest first.
    pub fn orders_for_user(&self, user_id: i64) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        orders
    }

    /// Returns a user's balance; empty if the user has never been credited.
    pub fn balance(&self, user_id: i64) -> Balance {
        self.lock()
            .balances
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Balance::empty(user_id))
    }

    /// Makes every subsequent call reaching `point` fail until cleared.
    pub fn fail_at(&self, point: FailurePoint) {
        self.lock().failures.insert(point);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn fetch_pending(&self) -> Result<Vec<Order>, StoreError> {
        let state = self.lock();
        if state.failures.contains(&FailurePoint::FetchPending) {
            return Err(StoreError::ConnectionFailed(
                "injected fetch failure".to_string(),
            ));
        }

        Ok(state
            .orders
            .values()
            .filter(|o| o.status.is_pending())
            .cloned()
            .collect())
    }

    async fn process(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.lock();

        let current = state
            .orders
            .get(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("order id {}", order.id)))?;

        if !current.status.is_pending() {
            debug!(order = %order.number, status = %current.status, "Order already final, skipping");
            return Ok(());
        }

        if state.failures.contains(&FailurePoint::OrderUpdate) {
            return Err(StoreError::Transaction(
                "injected order update failure".to_string(),
            ));
        }

        let mut staged_order = current.clone();
        staged_order.status = order.status;
        staged_order.accrual = if order.status == OrderStatus::Processed {
            order.accrual
        } else {
            Decimal::ZERO
        };

        let staged_balance = if order.status == OrderStatus::Processed {
            if state.failures.contains(&FailurePoint::BalanceCredit) {
                return Err(StoreError::Transaction(
                    "injected balance credit failure".to_string(),
                ));
            }

            let mut balance = state
                .balances
                .get(&staged_order.user_id)
                .cloned()
                .unwrap_or_else(|| Balance::empty(staged_order.user_id));
            balance.current += staged_order.accrual;
            Some(balance)
        } else {
            None
        };

        // Commit.
        state.orders.insert(staged_order.id, staged_order);
        if let Some(balance) = staged_balance {
            state.balances.insert(balance.user_id, balance);
        }

        Ok(())
    }
}
