use thiserror::Error;

/// Validation and contract errors exposed by `marketsync-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of finnhub, fmp, alphavantage")]
    InvalidProvider { value: String },
    #[error("invalid job '{value}', expected one of peers, watchlist")]
    InvalidJob { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must not be empty")]
    EmptyField { field: &'static str },
}

/// Configuration errors raised while wiring providers at process start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("provider '{provider}' does not serve the '{dataset}' dataset")]
    UnsupportedDataset {
        provider: &'static str,
        dataset: &'static str,
    },
}
