//! HTTP client for the external accrual service.
//!
//! One inquiry per order: `GET {base}/api/orders/{number}`. The raw
//! response is classified into a [`CheckOutcome`]; nothing here touches
//! local state.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::AccrualError;
use crate::orders::Order;

use super::types::{AccrualResponse, CheckOutcome};

/// Delay used when a `429` carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can tell the scheduler what happened to an order.
///
/// The HTTP client is the production implementation; tests substitute
/// scripted doubles.
#[async_trait]
pub trait AccrualApi: Send + Sync {
    /// Asks about `order` and returns its classified outcome.
    async fn inquire(&self, order: &Order) -> CheckOutcome;
}

/// Accrual service client over reqwest.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    http_client: Client,
    base_url: String,
}

impl AccrualClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// The address is normalized with [`normalize_base_url`].
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AccrualError> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AccrualError::ClientBuild(e.to_string()))?;

        Ok(Self::with_client(http_client, base_url))
    }

    /// Creates a client around an existing reqwest client.
    pub fn with_client(http_client: Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: normalize_base_url(base_url),
        }
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the inquiry URL for an order number.
    pub fn order_url(&self, number: &str) -> String {
        format!(
            "{}/api/orders/{}",
            self.base_url,
            urlencoding::encode(number)
        )
    }

    async fn classify(&self, order: &Order, response: reqwest::Response) -> CheckOutcome {
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => CheckOutcome::Busy {
                retry_after: retry_after(response.headers()),
            },
            StatusCode::NO_CONTENT => {
                debug!(order = %order.number, "Order unknown to accrual service");
                CheckOutcome::Success(order.invalidated())
            }
            StatusCode::OK => {
                let body: AccrualResponse = match response.json().await {
                    Ok(body) => body,
                    Err(e) => {
                        error!(order = %order.number, error = %e, "Failed to decode accrual response");
                        return CheckOutcome::Fail(AccrualError::Decode(e.to_string()));
                    }
                };

                if body.order != order.number {
                    warn!(
                        order = %order.number,
                        reported = %body.order,
                        "Accrual response names a different order"
                    );
                }

                match body.apply_to(order) {
                    Ok(updated) => CheckOutcome::Success(updated),
                    Err(e) => {
                        error!(order = %order.number, error = %e, "Rejected accrual response");
                        CheckOutcome::Fail(e)
                    }
                }
            }
            status => {
                error!(
                    order = %order.number,
                    status = status.as_u16(),
                    "Unexpected response from accrual service"
                );
                CheckOutcome::Fail(AccrualError::UnexpectedStatus(status.as_u16()))
            }
        }
    }
}

#[async_trait]
impl AccrualApi for AccrualClient {
    async fn inquire(&self, order: &Order) -> CheckOutcome {
        let url = self.order_url(&order.number);

        let response = match self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(order = %order.number, error = %e, "Failed to reach accrual service");
                return CheckOutcome::Fail(AccrualError::Transport(e.to_string()));
            }
        };

        self.classify(order, response).await
    }
}

/// Adds `http://` when no scheme is given and trims trailing slashes.
pub fn normalize_base_url(address: &str) -> String {
    let address = address.trim();
    let with_scheme = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    with_scheme.trim_end_matches('/').to_string()
}

/// Reads `Retry-After` as whole seconds, falling back to [`DEFAULT_RETRY_AFTER`].
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
