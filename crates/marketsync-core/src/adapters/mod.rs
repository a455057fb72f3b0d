//! Provider adapters, one [`ProviderClient`](crate::ProviderClient) per
//! provider and dataset.

mod alphavantage;
mod finnhub;
mod fmp;

use std::time::Duration;

use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest};
use crate::provider::SourceError;
use crate::throttling::RateBudget;
use crate::ProviderId;

pub use alphavantage::AlphaVantageQuoteClient;
pub use finnhub::{FinnhubPeersClient, FinnhubQuoteClient};
pub use fmp::FmpPeersClient;

/// Spends one unit of `budget`, waiting for it if the budget allows, then
/// sends `request` and returns the 2xx body.
pub(crate) async fn fetch_body(
    provider: ProviderId,
    http_client: &dyn HttpClient,
    budget: &RateBudget,
    request: HttpRequest,
) -> Result<String, SourceError> {
    if let Err(wait) = budget.reserve().await {
        return Err(budget_exhausted(provider, wait));
    }
    send(provider, http_client, request).await
}

/// Like [`fetch_body`] but never waits for budget. Used for optional calls
/// that should not delay the one they decorate.
pub(crate) async fn fetch_body_now(
    provider: ProviderId,
    http_client: &dyn HttpClient,
    budget: &RateBudget,
    request: HttpRequest,
) -> Result<String, SourceError> {
    if let Err(wait) = budget.acquire() {
        return Err(budget_exhausted(provider, wait));
    }
    send(provider, http_client, request).await
}

fn budget_exhausted(provider: ProviderId, wait: Duration) -> SourceError {
    SourceError::rate_limited(format!(
        "{provider} request budget exhausted; retry in {:.2}s",
        wait.as_secs_f64()
    ))
}

async fn send(
    provider: ProviderId,
    http_client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<String, SourceError> {
    tracing::debug!(provider = %provider, url = %request.redacted_url(), "provider request");

    let response = http_client.execute(request).await.map_err(|e| {
        let label = match e.kind() {
            HttpErrorKind::Timeout => "timed out",
            HttpErrorKind::Connect | HttpErrorKind::Other => "transport error",
        };
        SourceError::transport(format!("{provider} {label}: {}", e.message()))
    })?;

    if !response.is_success() {
        return Err(SourceError::upstream_status(provider, response.status));
    }

    Ok(response.body)
}

pub(crate) fn join_url(base_url: &str, path_and_query: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path_and_query)
}
