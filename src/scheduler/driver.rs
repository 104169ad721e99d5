//! Timer loop that fires a reconciliation cycle after every poll interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::backoff::BackoffController;
use super::cycle::ReconciliationCycle;

/// Drives [`ReconciliationCycle::run_once`] forever.
///
/// The wait before each cycle is read fresh from the backoff controller,
/// so a delay recorded during one cycle governs the very next wait. After
/// that wait the controller is reset, which makes a backoff last one wait.
pub struct TickDriver {
    cycle: ReconciliationCycle,
    backoff: Arc<BackoffController>,
}

impl TickDriver {
    /// Creates a driver for `cycle`.
    pub fn new(cycle: ReconciliationCycle, backoff: Arc<BackoffController>) -> Self {
        Self { cycle, backoff }
    }

    /// Returns the backoff controller.
    pub fn backoff(&self) -> &Arc<BackoffController> {
        &self.backoff
    }

    /// Loops until `shutdown` is cancelled. Returns the number of cycles run.
    ///
    /// A cycle already running when shutdown is requested is allowed to finish.
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        info!(
            base_interval_secs = self.backoff.base_interval().as_secs(),
            "Scheduler started"
        );

        let mut cycles = 0u64;
        loop {
            let wait = self.backoff.current_interval();
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for next cycle");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            self.backoff.reset();
            self.cycle.run_once().await;
            cycles += 1;
        }

        info!(cycles = cycles, "Scheduler stopped");
        cycles
    }
}
