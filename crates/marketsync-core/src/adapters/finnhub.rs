use std::sync::Arc;

use crate::adapters::{fetch_body, fetch_body_now, join_url};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::payload::{parse_finnhub_peers, parse_finnhub_profile, parse_finnhub_quote, SourceRecord};
use crate::provider::{FetchFuture, ProviderClient, SourceError};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::RateBudget;
use crate::{Dataset, ProviderId, Symbol};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io";

/// Transport state common to both Finnhub clients. Use `with_budget` to make
/// peers and quotes draw on one per-key budget.
#[derive(Clone)]
struct FinnhubTransport {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    base_url: String,
    budget: RateBudget,
    timeout_ms: u64,
}

impl FinnhubTransport {
    fn new(http_client: Arc<dyn HttpClient>, api_key: String, policy: &ProviderPolicy) -> Self {
        Self {
            http_client,
            auth: HttpAuth::Header {
                name: String::from("X-Finnhub-Token"),
                value: api_key,
            },
            base_url: String::from(DEFAULT_BASE_URL),
            budget: RateBudget::from_policy(policy),
            timeout_ms: policy.request_timeout_ms(),
        }
    }

    fn request(&self, path: &str, symbol: &Symbol) -> HttpRequest {
        let url = join_url(
            &self.base_url,
            &format!("{path}?symbol={}", urlencoding::encode(symbol.as_str())),
        );
        HttpRequest::get(url)
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn get(&self, path: &str, symbol: &Symbol) -> Result<String, SourceError> {
        let request = self.request(path, symbol);
        fetch_body(
            ProviderId::Finnhub,
            self.http_client.as_ref(),
            &self.budget,
            request,
        )
        .await
    }

    async fn get_now(&self, path: &str, symbol: &Symbol) -> Result<String, SourceError> {
        let request = self.request(path, symbol);
        fetch_body_now(
            ProviderId::Finnhub,
            self.http_client.as_ref(),
            &self.budget,
            request,
        )
        .await
    }
}

/// Finnhub similar-symbols client.
#[derive(Clone)]
pub struct FinnhubPeersClient {
    transport: FinnhubTransport,
}

impl FinnhubPeersClient {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, &ProviderPolicy::finnhub_default())
    }

    pub fn with_policy(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            transport: FinnhubTransport::new(http_client, api_key.into(), policy),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.transport.base_url = base_url.into();
        self
    }

    pub fn with_budget(mut self, budget: RateBudget) -> Self {
        self.transport.budget = budget;
        self
    }
}

impl ProviderClient for FinnhubPeersClient {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
    }

    fn dataset(&self) -> Dataset {
        Dataset::Peers
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            let body = self.transport.get("/api/v1/stock/peers", symbol).await?;
            parse_finnhub_peers(&body, symbol)
        })
    }
}

/// Finnhub quote client. A successful quote is followed by a profile lookup
/// for the company name; the profile call never fails the quote.
#[derive(Clone)]
pub struct FinnhubQuoteClient {
    transport: FinnhubTransport,
}

impl FinnhubQuoteClient {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, &ProviderPolicy::finnhub_default())
    }

    pub fn with_policy(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            transport: FinnhubTransport::new(http_client, api_key.into(), policy),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.transport.base_url = base_url.into();
        self
    }

    pub fn with_budget(mut self, budget: RateBudget) -> Self {
        self.transport.budget = budget;
        self
    }

    /// Skipped rather than queued when the budget has no cell to spare, so
    /// the name never costs the next symbol its quote.
    async fn company_name(&self, symbol: &Symbol) -> Option<String> {
        match self.transport.get_now("/api/v1/stock/profile2", symbol).await {
            Ok(body) => parse_finnhub_profile(&body).name,
            Err(error) => {
                tracing::debug!(
                    symbol = %symbol,
                    code = error.code(),
                    "finnhub profile unavailable; quote kept without company name"
                );
                None
            }
        }
    }
}

impl ProviderClient for FinnhubQuoteClient {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
    }

    fn dataset(&self) -> Dataset {
        Dataset::Quote
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            let body = self.transport.get("/api/v1/quote", symbol).await?;
            let Some(mut quote) = parse_finnhub_quote(&body, symbol)? else {
                return Ok(Vec::new());
            };
            quote.company_name = self.company_name(symbol).await;
            Ok(vec![SourceRecord::Quote(quote)])
        })
    }
}
