//! Error types for accrual-sync operations.
//!
//! Defines the error types shared across subsystems:
//! - Accrual service inquiries
//! - Scheduler configuration
//!
//! Storage errors live next to the stores in [`crate::storage`].

use thiserror::Error;

/// Errors that can occur while asking the accrual service about an order.
///
/// None of these are fatal: the order stays pending and is retried on the
/// next cycle.
#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Failed to decode accrual response: {0}")]
    Decode(String),

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(u16),

    #[error("Negative accrual {amount} reported for order '{order}'")]
    NegativeAccrual { order: String, amount: String },
}

impl AccrualError {
    /// Returns the HTTP status code for unexpected-status failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AccrualError::UnexpectedStatus(code) => Some(*code),
            _ => None,
        }
    }
}

/// Errors raised while validating scheduler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing accrual system address")]
    MissingAccrualAddress,

    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Request timeout must be greater than zero")]
    ZeroRequestTimeout,
}
