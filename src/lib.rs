//! accrual-sync: reconciles pending loyalty orders against an external
//! accrual service.
//!
//! A periodic scheduler fetches pending orders, checks each one with the
//! accrual service through a bounded worker pool, backs off when the
//! service rate-limits, and writes the results back (crediting balances)
//! through a transactional order store.

// Core modules
pub mod accrual;
pub mod cli;
pub mod config;
pub mod error;
pub mod orders;
pub mod scheduler;
pub mod storage;

// Re-export commonly used types
pub use error::{AccrualError, ConfigError};
pub use orders::{Order, OrderStatus};
pub use storage::{OrderStore, StoreError};
