//! The order store contract consumed by the scheduler.

use async_trait::async_trait;
use thiserror::Error;

use crate::orders::{Order, ParseStatusError};

use super::migrations::MigrationError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection to the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// A stored row could not be turned back into an order.
    #[error("Corrupt order row: {0}")]
    Decode(#[from] ParseStatusError),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A stored order number already exists.
    #[error("Order '{0}' already exists")]
    Duplicate(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Transaction aborted; nothing was written.
    #[error("Transaction error: {0}")]
    Transaction(String),
}

/// Persistence capability the reconciliation cycle depends on.
///
/// Implementations must make `process` atomic: the order update and, for
/// `PROCESSED` orders, the balance credit either both land or neither does.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns every order in status `NEW` or `PROCESSING`, in any order.
    async fn fetch_pending(&self) -> Result<Vec<Order>, StoreError>;

    /// Persists the order's new status and accrual, crediting the owner's
    /// balance when the new status is `PROCESSED`.
    ///
    /// Orders that are no longer pending are left untouched, so replaying a
    /// result is harmless.
    async fn process(&self, order: &Order) -> Result<(), StoreError>;
}
