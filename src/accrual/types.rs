//! Wire types for the accrual service and the per-order check outcome.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::AccrualError;
use crate::orders::{Order, OrderStatus};

/// Status reported by the accrual service for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// Accepted by the service but not yet calculated.
    Registered,
    /// Calculation in progress.
    Processing,
    /// The service refused the order; no accrual will follow.
    Invalid,
    /// Calculation finished; `accrual` is final.
    Processed,
}

impl AccrualStatus {
    /// Maps the external status onto the local order lifecycle.
    pub fn to_order_status(self) -> OrderStatus {
        match self {
            AccrualStatus::Registered | AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

/// Body of a `200 OK` from `GET /api/orders/{number}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
}

impl AccrualResponse {
    /// Applies this response to `order`, producing the updated order.
    ///
    /// Negative amounts are rejected; a missing amount counts as zero.
    pub fn apply_to(&self, order: &Order) -> Result<Order, AccrualError> {
        let amount = self.accrual.unwrap_or(Decimal::ZERO);
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AccrualError::NegativeAccrual {
                order: order.number.clone(),
                amount: amount.to_string(),
            });
        }

        Ok(order.transitioned(self.status.to_order_status(), amount))
    }
}

/// Result of one inquiry about one order.
#[derive(Debug)]
pub enum CheckOutcome {
    /// The service answered; carries the order as it should now be stored.
    Success(Order),
    /// Transient failure; the order is left alone until the next cycle.
    Fail(AccrualError),
    /// The service is rate limiting; wait `retry_after` before polling again.
    Busy { retry_after: Duration },
}

impl CheckOutcome {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Success(_))
    }

    /// Returns true for `Busy`.
    pub fn is_busy(&self) -> bool {
        matches!(self, CheckOutcome::Busy { .. })
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Success(order) => write!(f, "success ({})", order.status),
            CheckOutcome::Fail(err) => write!(f, "fail ({})", err),
            CheckOutcome::Busy { retry_after } => {
                write!(f, "busy (retry after {}s)", retry_after.as_secs())
            }
        }
    }
}
