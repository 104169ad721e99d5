//! Order, status and balance types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a status string is not one of the known values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown order status '{0}'")]
pub struct ParseStatusError(pub String);

/// Lifecycle state of an order.
///
/// `New` and `Processing` are pending; `Invalid` and `Processed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// All statuses the scheduler polls the accrual service for.
    pub const PENDING: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

    /// Returns the upper-case form used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    /// Returns true if the order still needs reconciling.
    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Processing)
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A loyalty order awaiting or past reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier.
    pub id: i64,

    /// Externally visible order number, unique across all users.
    pub number: String,

    /// Owner of the order; credited when the order is processed.
    pub user_id: i64,

    /// Current lifecycle state.
    pub status: OrderStatus,

    /// Accrued points. Zero unless `status` is `Processed`.
    pub accrual: Decimal,

    /// When the order was submitted.
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new, not-yet-stored order in status `NEW`.
    ///
    /// The id is zero until the store assigns one.
    pub fn new(number: impl Into<String>, user_id: i64) -> Self {
        Self {
            id: 0,
            number: number.into(),
            user_id,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            uploaded_at: Utc::now(),
        }
    }

    /// Sets the order status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns a copy moved to `status` with `accrual` applied.
    ///
    /// The amount is kept only for `Processed`; every other status carries zero.
    pub fn transitioned(&self, status: OrderStatus, accrual: Decimal) -> Self {
        let accrual = if status == OrderStatus::Processed {
            accrual
        } else {
            Decimal::ZERO
        };

        Self {
            status,
            accrual,
            ..self.clone()
        }
    }

    /// Returns a copy forced into `INVALID` with no accrual.
    pub fn invalidated(&self) -> Self {
        self.transitioned(OrderStatus::Invalid, Decimal::ZERO)
    }
}

/// A user's loyalty balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: i64,
    pub current: Decimal,
    pub withdrawn: Decimal,
}

impl Balance {
    /// An empty balance for `user_id`.
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            current: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Invalid,
            OrderStatus::Processed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
            assert_eq!(status.to_string(), status.as_str());
        }
    }

    #[test]
    fn test_status_parse_unknown() {
        let err = "REGISTERED".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, ParseStatusError("REGISTERED".to_string()));
    }

    #[test]
    fn test_status_serde_uppercase() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");

        let status: OrderStatus = serde_json::from_str("\"PROCESSED\"").unwrap();
        assert_eq!(status, OrderStatus::Processed);
    }

    #[test]
    fn test_pending_states() {
        assert!(OrderStatus::New.is_pending());
        assert!(OrderStatus::Processing.is_pending());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::Processed.is_terminal());
        assert!(OrderStatus::PENDING.iter().all(OrderStatus::is_pending));
    }

    #[test]
    fn test_new_order_defaults() {
        let order = Order::new("79927398713", 7);
        assert_eq!(order.id, 0);
        assert_eq!(order.user_id, 7);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.accrual, Decimal::ZERO);
    }

    #[test]
    fn test_transition_keeps_accrual_only_when_processed() {
        let order = Order::new("79927398713", 1);

        let processed = order.transitioned(OrderStatus::Processed, dec!(729.98));
        assert_eq!(processed.status, OrderStatus::Processed);
        assert_eq!(processed.accrual, dec!(729.98));

        let processing = order.transitioned(OrderStatus::Processing, dec!(10));
        assert_eq!(processing.status, OrderStatus::Processing);
        assert_eq!(processing.accrual, Decimal::ZERO);
    }

    #[test]
    fn test_invalidated_clears_accrual() {
        let order = Order::new("79927398713", 1).transitioned(OrderStatus::Processed, dec!(5));
        let invalid = order.invalidated();
        assert_eq!(invalid.status, OrderStatus::Invalid);
        assert_eq!(invalid.accrual, Decimal::ZERO);
        assert_eq!(invalid.number, order.number);
    }
}
