use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{AlphaVantageQuoteClient, FinnhubPeersClient, FinnhubQuoteClient, FmpPeersClient};
use crate::aggregate::DEFAULT_OUTCOME_CAP;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::ProviderClient;
use crate::provider_policy::ProviderPolicy;
use crate::resolver::ProviderResolver;
use crate::source::parse_provider_order;
use crate::throttling::RateBudget;
use crate::{ConfigError, Dataset, JobKind, ProviderId};

pub const DEFAULT_PEER_PROVIDERS: &str = "finnhub,fmp";
pub const DEFAULT_QUOTE_PROVIDERS: &str = "finnhub,alphavantage";

/// Process-wide pipeline limits, fixed at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Upper bound on one provider call. Unlike the per-request timeouts in
    /// [`ProviderPolicy`], it covers the budget wait plus the sequential
    /// quote and profile requests.
    pub provider_timeout: Duration,
    /// Upper bound on one store call.
    pub store_timeout: Duration,
    /// Optional wall-clock budget for a whole run.
    pub run_deadline: Option<Duration>,
    /// Per-symbol outcomes echoed in a summary.
    pub outcome_cap: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            provider_timeout: ProviderPolicy::finnhub_default().worst_case_fetch(),
            store_timeout: Duration::from_secs(5),
            run_deadline: None,
            outcome_cap: DEFAULT_OUTCOME_CAP,
        }
    }
}

/// Provider chains for both datasets.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    peers: ProviderResolver,
    quotes: ProviderResolver,
}

impl ProviderRegistry {
    pub fn new(peers: ProviderResolver, quotes: ProviderResolver) -> Self {
        Self { peers, quotes }
    }

    pub fn resolver_for(&self, job: JobKind) -> &ProviderResolver {
        match job.dataset() {
            Dataset::Peers => &self.peers,
            Dataset::Quote => &self.quotes,
        }
    }
}

/// Builds a [`ProviderRegistry`] from explicit keys and preference orders.
///
/// # Environment Variables
///
/// | Setting | Primary Env Var | Fallback Env Var |
/// |---------|-----------------|------------------|
/// | Finnhub key | `MARKETSYNC_FINNHUB_API_KEY` | `FINNHUB_API_KEY` |
/// | FMP key | `MARKETSYNC_FMP_API_KEY` | `FMP_API_KEY` |
/// | Alpha Vantage key | `MARKETSYNC_ALPHAVANTAGE_API_KEY` | `ALPHAVANTAGE_API_KEY` |
/// | Peers order | `MARKETSYNC_PEER_PROVIDERS` | default `finnhub,fmp` |
/// | Quote order | `MARKETSYNC_QUOTE_PROVIDERS` | default `finnhub,alphavantage` |
///
/// # Example
///
/// ```rust,ignore
/// use marketsync_core::ProviderRegistryBuilder;
///
/// let registry = ProviderRegistryBuilder::from_env()?
///     .with_provider_timeout(std::time::Duration::from_secs(8))
///     .build()?;
/// ```
pub struct ProviderRegistryBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    api_keys: HashMap<ProviderId, String>,
    base_urls: HashMap<ProviderId, String>,
    peer_order: Vec<ProviderId>,
    quote_order: Vec<ProviderId>,
    provider_timeout: Duration,
}

impl Default for ProviderRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistryBuilder {
    /// Builder with default orders and no API keys.
    pub fn new() -> Self {
        Self {
            http_client: None,
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
            peer_order: vec![ProviderId::Finnhub, ProviderId::Fmp],
            quote_order: vec![ProviderId::Finnhub, ProviderId::Alphavantage],
            provider_timeout: PipelineSettings::default().provider_timeout,
        }
    }

    /// Reads keys and orders from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();
        for provider in ProviderId::ALL {
            let upper = provider.as_str().to_ascii_uppercase();
            let key = lookup(&format!("MARKETSYNC_{upper}_API_KEY"))
                .or_else(|| lookup(&format!("{upper}_API_KEY")));
            if let Some(key) = key {
                builder = builder.with_api_key(provider, key);
            }
        }

        let peers = lookup("MARKETSYNC_PEER_PROVIDERS")
            .unwrap_or_else(|| String::from(DEFAULT_PEER_PROVIDERS));
        let quotes = lookup("MARKETSYNC_QUOTE_PROVIDERS")
            .unwrap_or_else(|| String::from(DEFAULT_QUOTE_PROVIDERS));
        Ok(builder
            .with_peer_order(parse_provider_order(&peers)?)
            .with_quote_order(parse_provider_order(&quotes)?))
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Blank keys are ignored.
    pub fn with_api_key(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        let key = key.into();
        if key.trim().is_empty() {
            self.api_keys.remove(&provider);
        } else {
            self.api_keys.insert(provider, key.trim().to_owned());
        }
        self
    }

    /// Points a provider at another host, e.g. a local stub.
    pub fn with_base_url(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn with_peer_order(mut self, order: Vec<ProviderId>) -> Self {
        self.peer_order = order;
        self
    }

    pub fn with_quote_order(mut self, order: Vec<ProviderId>) -> Self {
        self.quote_order = order;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    fn validate(order: &[ProviderId], dataset: Dataset) -> Result<(), ConfigError> {
        match order.iter().find(|provider| !provider.serves(dataset)) {
            Some(provider) => Err(ConfigError::UnsupportedDataset {
                provider: provider.as_str(),
                dataset: dataset.as_str(),
            }),
            None => Ok(()),
        }
    }

    /// Builds both chains.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedDataset`] when an order names a
    /// provider without an adapter for that dataset. Providers without a key
    /// are skipped with a warning; an empty chain is not an error here.
    pub fn build(self) -> Result<ProviderRegistry, ConfigError> {
        Self::validate(&self.peer_order, Dataset::Peers)?;
        Self::validate(&self.quote_order, Dataset::Quote)?;

        let http_client = self
            .http_client
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let finnhub_budget = RateBudget::from_policy(&ProviderPolicy::finnhub_default());

        let peers = self.chain(Dataset::Peers, &self.peer_order, &http_client, &finnhub_budget);
        let quotes = self.chain(Dataset::Quote, &self.quote_order, &http_client, &finnhub_budget);

        Ok(ProviderRegistry::new(
            ProviderResolver::new(Dataset::Peers, peers, self.provider_timeout),
            ProviderResolver::new(Dataset::Quote, quotes, self.provider_timeout),
        ))
    }

    fn chain(
        &self,
        dataset: Dataset,
        order: &[ProviderId],
        http_client: &Arc<dyn HttpClient>,
        finnhub_budget: &RateBudget,
    ) -> Vec<Arc<dyn ProviderClient>> {
        let mut chain: Vec<Arc<dyn ProviderClient>> = Vec::with_capacity(order.len());
        for &provider in order {
            let Some(key) = self.api_keys.get(&provider).cloned() else {
                tracing::warn!(
                    provider = %provider,
                    dataset = %dataset,
                    "no API key configured; provider left out of the chain"
                );
                continue;
            };
            let http_client = Arc::clone(http_client);
            let base_url = self.base_urls.get(&provider);
            let client: Arc<dyn ProviderClient> = match (provider, dataset) {
                (ProviderId::Finnhub, Dataset::Peers) => {
                    let client = FinnhubPeersClient::new(http_client, key).with_budget(finnhub_budget.clone());
                    Arc::new(match base_url {
                        Some(url) => client.with_base_url(url.clone()),
                        None => client,
                    })
                }
                (ProviderId::Finnhub, Dataset::Quote) => {
                    let client = FinnhubQuoteClient::new(http_client, key).with_budget(finnhub_budget.clone());
                    Arc::new(match base_url {
                        Some(url) => client.with_base_url(url.clone()),
                        None => client,
                    })
                }
                (ProviderId::Fmp, Dataset::Peers) => {
                    let client = FmpPeersClient::new(http_client, key);
                    Arc::new(match base_url {
                        Some(url) => client.with_base_url(url.clone()),
                        None => client,
                    })
                }
                (ProviderId::Alphavantage, Dataset::Quote) => {
                    let client = AlphaVantageQuoteClient::new(http_client, key);
                    Arc::new(match base_url {
                        Some(url) => client.with_base_url(url.clone()),
                        None => client,
                    })
                }
                (ProviderId::Fmp, Dataset::Quote) | (ProviderId::Alphavantage, Dataset::Peers) => {
                    continue;
                }
            };
            chain.push(client);
        }
        chain
    }
}

impl std::fmt::Debug for ProviderRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keyed: Vec<ProviderId> = self.api_keys.keys().copied().collect();
        keyed.sort();
        f.debug_struct("ProviderRegistryBuilder")
            .field("keyed_providers", &keyed)
            .field("peer_order", &self.peer_order)
            .field("quote_order", &self.quote_order)
            .field("provider_timeout", &self.provider_timeout)
            .finish_non_exhaustive()
    }
}
