use std::sync::Arc;

use crate::adapters::{fetch_body, join_url};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::payload::{parse_alphavantage_quote, SourceRecord};
use crate::provider::{FetchFuture, ProviderClient};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::RateBudget;
use crate::{Dataset, ProviderId, Symbol};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Alpha Vantage `GLOBAL_QUOTE` client (free tier: 5 calls per minute).
#[derive(Clone)]
pub struct AlphaVantageQuoteClient {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    base_url: String,
    budget: RateBudget,
    timeout_ms: u64,
}

impl AlphaVantageQuoteClient {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, &ProviderPolicy::alphavantage_default())
    }

    pub fn with_policy(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            http_client,
            auth: HttpAuth::QueryParam {
                name: String::from("apikey"),
                value: api_key.into(),
            },
            base_url: String::from(DEFAULT_BASE_URL),
            budget: RateBudget::from_policy(policy),
            timeout_ms: policy.request_timeout_ms(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ProviderClient for AlphaVantageQuoteClient {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn dataset(&self) -> Dataset {
        Dataset::Quote
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = join_url(
                &self.base_url,
                &format!(
                    "/query?function=GLOBAL_QUOTE&symbol={}",
                    urlencoding::encode(symbol.as_str())
                ),
            );
            let request = HttpRequest::get(url)
                .with_auth(&self.auth)
                .with_timeout_ms(self.timeout_ms);
            let body = fetch_body(
                ProviderId::Alphavantage,
                self.http_client.as_ref(),
                &self.budget,
                request,
            )
            .await?;
            Ok(parse_alphavantage_quote(&body, symbol)?
                .map(SourceRecord::Quote)
                .into_iter()
                .collect())
        })
    }
}
