use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::payload::SourceRecord;
use crate::{Dataset, ProviderId, Symbol};

/// Provider failure category. The resolver treats every kind as "no answer";
/// only `RateLimited` changes the symbol status when nobody answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Network failure or request timeout.
    Transport,
    /// Non-2xx response.
    UpstreamStatus,
    /// Body is not the expected shape.
    Malformed,
    /// Local request budget exhausted.
    RateLimited,
}

/// Structured provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn upstream_status(provider: ProviderId, status: u16) -> Self {
        Self {
            kind: SourceErrorKind::UpstreamStatus,
            message: format!("{provider} returned status {status}"),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::UpstreamStatus => "source.upstream_status",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::RateLimited => "source.rate_limited",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<SourceRecord>, SourceError>> + Send + 'a>>;

/// One external endpoint for one dataset.
pub trait ProviderClient: Send + Sync {
    /// Returns the provider identifier stamped on produced records.
    fn id(&self) -> ProviderId;

    /// Returns the dataset this client serves.
    fn dataset(&self) -> Dataset;

    /// Fetches raw records for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the transport fails, the provider
    /// answers with a non-2xx status, the body cannot be parsed, or the
    /// local rate budget is exhausted. An `Ok(vec![])` means the provider
    /// answered but had nothing for the symbol.
    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> FetchFuture<'a>;
}
