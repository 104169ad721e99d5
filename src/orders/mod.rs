//! Order records and their lifecycle states.
//!
//! Orders are created by the submission path in status `NEW` and are only
//! ever advanced by the reconciliation scheduler.

pub mod types;

pub use types::{Balance, Order, OrderStatus, ParseStatusError};
