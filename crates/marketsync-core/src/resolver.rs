use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::payload::SourceRecord;
use crate::provider::{ProviderClient, SourceErrorKind};
use crate::{Dataset, ProviderId, Symbol};

/// Records resolved for one symbol, with the provider that supplied them.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub provider: ProviderId,
    pub records: Vec<SourceRecord>,
    pub latency_ms: u64,
}

/// Why no provider supplied records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// At least one provider answered, none with data.
    NoData,
    /// Nobody answered and at least one provider was out of request budget.
    RateLimited,
}

enum Attempt {
    Answered(Vec<SourceRecord>),
    RateLimited,
    Failed,
}

/// Ordered provider chain for one dataset.
///
/// All providers are queried concurrently for the same symbol; the first
/// provider in preference order with a non-empty result wins. Errors and
/// timeouts count as empty.
#[derive(Clone)]
pub struct ProviderResolver {
    dataset: Dataset,
    chain: Vec<Arc<dyn ProviderClient>>,
    provider_timeout: Duration,
}

impl ProviderResolver {
    pub fn new(
        dataset: Dataset,
        chain: Vec<Arc<dyn ProviderClient>>,
        provider_timeout: Duration,
    ) -> Self {
        let mut seen = Vec::with_capacity(chain.len());
        let chain = chain
            .into_iter()
            .filter(|client| {
                if client.dataset() != dataset || seen.contains(&client.id()) {
                    return false;
                }
                seen.push(client.id());
                true
            })
            .collect();
        Self {
            dataset,
            chain,
            provider_timeout,
        }
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn source_chain(&self) -> Vec<ProviderId> {
        self.chain.iter().map(|client| client.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Resolves `symbol` against the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Unresolved::RateLimited`] when every provider failed and
    /// one of them refused on its budget, otherwise [`Unresolved::NoData`].
    pub async fn resolve(&self, symbol: &Symbol) -> Result<Resolution, Unresolved> {
        let started = Instant::now();
        let attempts = self
            .chain
            .iter()
            .map(|client| self.attempt(client.as_ref(), symbol));
        let results = join_all(attempts).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let mut answered = false;
        let mut rate_limited = false;
        for (client, attempt) in self.chain.iter().zip(results) {
            match attempt {
                Attempt::Answered(records) if !records.is_empty() => {
                    return Ok(Resolution {
                        provider: client.id(),
                        records,
                        latency_ms,
                    });
                }
                Attempt::Answered(_) => answered = true,
                Attempt::RateLimited => rate_limited = true,
                Attempt::Failed => {}
            }
        }
        if rate_limited && !answered {
            Err(Unresolved::RateLimited)
        } else {
            Err(Unresolved::NoData)
        }
    }

    async fn attempt(&self, client: &dyn ProviderClient, symbol: &Symbol) -> Attempt {
        match tokio::time::timeout(self.provider_timeout, client.fetch(symbol)).await {
            Ok(Ok(records)) => Attempt::Answered(records),
            Ok(Err(error)) => {
                tracing::warn!(
                    provider = %client.id(),
                    dataset = %client.dataset(),
                    symbol = %symbol,
                    code = error.code(),
                    error = error.message(),
                    "provider degraded to empty result"
                );
                if error.kind() == SourceErrorKind::RateLimited {
                    Attempt::RateLimited
                } else {
                    Attempt::Failed
                }
            }
            Err(_) => {
                tracing::warn!(
                    provider = %client.id(),
                    symbol = %symbol,
                    timeout_ms = self.provider_timeout.as_millis() as u64,
                    "provider timed out; treated as empty"
                );
                Attempt::Failed
            }
        }
    }
}

impl std::fmt::Debug for ProviderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResolver")
            .field("dataset", &self.dataset)
            .field("chain", &self.source_chain())
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}
