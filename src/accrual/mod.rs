//! Accrual service integration.
//!
//! - **AccrualApi**: the seam the scheduler calls through
//! - **AccrualClient**: reqwest implementation against `GET /api/orders/{number}`
//! - **CheckOutcome**: `Success`, `Fail` or `Busy` for a single inquiry
//!
//! # Response classification
//!
//! | Response | Outcome |
//! |----------|---------|
//! | `200` + body | `Success` with status and accrual from the body |
//! | `204` | `Success` with the order forced to `INVALID` |
//! | `429` | `Busy` with `Retry-After` seconds (default 60) |
//! | transport or decode error, any other code | `Fail` |

pub mod client;
pub mod types;

pub use client::{
    normalize_base_url, retry_after, AccrualApi, AccrualClient, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_AFTER,
};
pub use types::{AccrualResponse, AccrualStatus, CheckOutcome};
