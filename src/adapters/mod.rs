// Adapters layer: concrete sources and sinks for the ledger and processor data.

pub mod paypal_api;
pub mod paypal_csv;
pub mod ynab;

pub use paypal_api::PayPalApiClient;
pub use paypal_csv::PayPalCsvSource;
pub use ynab::YnabClient;

use crate::utils::error::{MatcherError, Result};

/// Turns a non-2xx response into `HttpStatusError`, keeping the body for diagnostics.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("Request to {} failed with {}: {}", url, status, body);
    Err(MatcherError::HttpStatusError {
        status: status.as_u16(),
        url,
        body,
    })
}
