use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::provider_policy::ProviderPolicy;

/// Per-provider request budget. A denied call reports how long until the
/// next cell frees up so the caller can surface it as a rate-limit error.
///
/// `reserve` waits for a cell when one frees up within `max_wait`;
/// `acquire` never waits.
#[derive(Clone)]
pub struct RateBudget {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
    max_wait: Duration,
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

impl RateBudget {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let clock = DefaultClock::default();
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct_with_clock(quota, &clock)),
            clock,
            max_wait: Duration::ZERO,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(policy.quota_window, policy.quota_limit).with_max_wait(policy.budget_wait)
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Takes one cell of budget, or returns the wait until one is available.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Takes one cell of budget, waiting up to `max_wait` for it. A cell
    /// further away than that is refused at once with the wait it needs.
    pub async fn reserve(&self) -> Result<(), Duration> {
        let wait = match self.acquire() {
            Ok(()) => return Ok(()),
            Err(wait) => wait,
        };
        if wait > self.max_wait {
            return Err(wait);
        }
        tokio::time::timeout(self.max_wait, self.limiter.until_ready())
            .await
            .map_err(|_| wait)
    }
}

impl std::fmt::Debug for RateBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateBudget")
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
