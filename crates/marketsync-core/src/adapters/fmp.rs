use std::sync::Arc;

use crate::adapters::{fetch_body, join_url};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::payload::parse_fmp_peers;
use crate::provider::{FetchFuture, ProviderClient};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::RateBudget;
use crate::{Dataset, ProviderId, Symbol};

pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com";

/// Financial Modeling Prep similar-symbols client. Unlike Finnhub it returns
/// company names and logos alongside each peer.
#[derive(Clone)]
pub struct FmpPeersClient {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    base_url: String,
    budget: RateBudget,
    timeout_ms: u64,
}

impl FmpPeersClient {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, &ProviderPolicy::fmp_default())
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

impl ProviderClient for FmpPeersClient {
    fn id(&self) -> ProviderId {
        ProviderId::Fmp
    }

    fn dataset(&self) -> Dataset {
        Dataset::Peers
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = join_url(
                &self.base_url,
                &format!(
                    "/stable/stock-peers?symbol={}",
                    urlencoding::encode(symbol.as_str())
                ),
            );
            let request = HttpRequest::get(url)
                .with_auth(&self.auth)
                .with_timeout_ms(self.timeout_ms);
            let body = fetch_body(ProviderId::Fmp, self.http_client.as_ref(), &self.budget, request)
                .await?;
            parse_fmp_peers(&body, symbol)
        })
    }
}
