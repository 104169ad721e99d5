//! Reconciliation scheduler.
//!
//! This module drives pending orders to their final state:
//!
//! - **BackoffController**: poll interval shared by the driver and the workers
//! - **WorkerPool**: N workers checking a batch against the accrual service
//! - **ReconciliationCycle**: fetch pending orders, fan out, persist results
//! - **TickDriver**: runs a cycle after every poll interval
//!
//! # Architecture
//!
//! ```text
//!   ┌────────────┐   interval   ┌──────────────────┐
//!   │ TickDriver │◄─────────────┤ BackoffController│◄──────────┐
//!   └─────┬──────┘              └──────────────────┘           │ Busy
//!         │ run_once                                           │
//!   ┌─────▼──────────────┐  pending   ┌────────────┐           │
//!   │ ReconciliationCycle├───────────►│ WorkerPool ├──► Worker 1..N ──► AccrualApi
//!   └─────┬──────────────┘            └─────┬──────┘
//!         │ process                         │ updated orders
//!   ┌─────▼──────┐                          │
//!   │ OrderStore │◄─────────────────────────┘
//!   └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use accrual_sync::accrual::AccrualClient;
//! use accrual_sync::scheduler::{
//!     BackoffController, ReconciliationCycle, TickDriver, WorkerPool, WorkerPoolConfig,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! let backoff = Arc::new(BackoffController::new(Duration::from_secs(10)));
//! let client = Arc::new(AccrualClient::new("localhost:8080", Duration::from_secs(30))?);
//! let pool = WorkerPool::new(WorkerPoolConfig::new(5), client, Arc::clone(&backoff));
//! let driver = TickDriver::new(ReconciliationCycle::new(store, pool), backoff);
//!
//! driver.run(CancellationToken::new()).await;
//! ```
//!
//! # Delivery
//!
//! At-least-once: an order left pending by a failure or by backpressure is
//! simply fetched again on the next cycle, and the store ignores results for
//! orders that are already final.

pub mod backoff;
pub mod cycle;
pub mod driver;
pub mod worker_pool;

// Re-export main types for convenience
pub use backoff::BackoffController;
pub use cycle::{CycleReport, ReconciliationCycle};
pub use driver::TickDriver;
pub use worker_pool::{PoolStats, Wave, WorkerPool, WorkerPoolConfig, DEFAULT_WORKERS};
