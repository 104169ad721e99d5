//! Scheduler configuration.

use std::time::Duration;

use crate::accrual::{normalize_base_url, DEFAULT_REQUEST_TIMEOUT};
use crate::error::ConfigError;
use crate::scheduler::DEFAULT_WORKERS;

/// Default interval between reconciliation cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Settings the surrounding process hands to the scheduler at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Accrual service base address, scheme-normalized.
    pub accrual_address: String,
    /// Concurrent inquiries per cycle.
    pub workers: usize,
    /// Wait between cycles when the service is not pushing back.
    pub poll_interval: Duration,
    /// Deadline for a single inquiry.
    pub request_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            accrual_address: String::new(),
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    /// Creates a configuration for the accrual service at `address`.
    pub fn new(address: &str) -> Self {
        Self::default().with_accrual_address(address)
    }

    /// Sets and normalizes the accrual service address.
    pub fn with_accrual_address(mut self, address: &str) -> Self {
        self.accrual_address = if address.trim().is_empty() {
            String::new()
        } else {
            normalize_base_url(address)
        };
        self
    }

    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the base poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the per-inquiry timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks that the configuration can start a scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accrual_address.is_empty() {
            return Err(ConfigError::MissingAccrualAddress);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(())
    }
}
