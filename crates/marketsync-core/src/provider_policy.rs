use std::time::Duration;

use crate::ProviderId;

/// Longest a request waits for its provider's budget before it is refused.
pub const DEFAULT_BUDGET_WAIT: Duration = Duration::from_secs(2);

/// Free-tier request budget for one upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub request_timeout: Duration,
    pub budget_wait: Duration,
}

impl ProviderPolicy {
    pub fn finnhub_default() -> Self {
        Self {
            provider_id: ProviderId::Finnhub,
            quota_window: Duration::from_secs(60),
            quota_limit: 60,
            request_timeout: Duration::from_secs(5),
            budget_wait: DEFAULT_BUDGET_WAIT,
        }
    }

    pub fn fmp_default() -> Self {
        Self {
            provider_id: ProviderId::Fmp,
            quota_window: Duration::from_secs(60),
            quota_limit: 10,
            request_timeout: Duration::from_secs(5),
            budget_wait: DEFAULT_BUDGET_WAIT,
        }
    }

    pub fn alphavantage_default() -> Self {
        Self {
            provider_id: ProviderId::Alphavantage,
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
            request_timeout: Duration::from_secs(5),
            budget_wait: DEFAULT_BUDGET_WAIT,
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Finnhub => Self::finnhub_default(),
            ProviderId::Fmp => Self::fmp_default(),
            ProviderId::Alphavantage => Self::alphavantage_default(),
        }
    }

    pub fn with_quota(mut self, quota_limit: u32) -> Self {
        self.quota_limit = quota_limit;
        self
    }

    pub fn with_window(mut self, quota_window: Duration) -> Self {
        self.quota_window = quota_window;
        self
    }

    pub fn with_budget_wait(mut self, budget_wait: Duration) -> Self {
        self.budget_wait = budget_wait;
        self
    }

    /// Longest one client fetch can take: a budget wait followed by two
    /// sequential requests (the Finnhub quote and its profile lookup).
    pub fn worst_case_fetch(&self) -> Duration {
        self.budget_wait + self.request_timeout * 2
    }

    pub fn request_timeout_ms(&self) -> u64 {
        u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphavantage_policy_matches_free_tier() {
        let policy = ProviderPolicy::alphavantage_default();

        assert_eq!(policy.provider_id, ProviderId::Alphavantage);
        assert_eq!(policy.quota_window, Duration::from_secs(60));
        assert_eq!(policy.quota_limit, 5);
    }

    #[test]
    fn every_provider_has_a_policy() {
        for provider in ProviderId::ALL {
            let policy = ProviderPolicy::default_for(provider);
            assert_eq!(policy.provider_id, provider);
            assert!(policy.quota_limit > 0);
            assert_eq!(policy.request_timeout_ms(), 5_000);
        }
    }

    #[test]
    fn worst_case_fetch_covers_wait_and_two_requests() {
        let policy = ProviderPolicy::finnhub_default();
        assert_eq!(policy.worst_case_fetch(), Duration::from_secs(12));

        let tight = policy.with_budget_wait(Duration::ZERO);
        assert_eq!(tight.worst_case_fetch(), Duration::from_secs(10));
    }
}
