use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in records and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Finnhub,
    Fmp,
    Alphavantage,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Finnhub, Self::Fmp, Self::Alphavantage];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finnhub => "finnhub",
            Self::Fmp => "fmp",
            Self::Alphavantage => "alphavantage",
        }
    }

    /// Whether this provider has an adapter for `dataset`.
    pub const fn serves(self, dataset: Dataset) -> bool {
        match (self, dataset) {
            (Self::Finnhub, _) => true,
            (Self::Fmp, Dataset::Peers) => true,
            (Self::Alphavantage, Dataset::Quote) => true,
            (Self::Fmp, Dataset::Quote) | (Self::Alphavantage, Dataset::Peers) => false,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "finnhub" => Ok(Self::Finnhub),
            "fmp" | "financialmodelingprep" => Ok(Self::Fmp),
            "alphavantage" => Ok(Self::Alphavantage),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Kind of data a provider endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Similar symbols of a ticker.
    Peers,
    /// Price, percent change and display name of a ticker.
    Quote,
}

impl Dataset {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Peers => "peers",
            Self::Quote => "quote",
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a comma separated preference list, keeping the first occurrence of
/// each provider.
pub fn parse_provider_order(value: &str) -> Result<Vec<ProviderId>, ValidationError> {
    let mut order = Vec::new();
    for part in value.split(',').filter(|part| !part.trim().is_empty()) {
        let provider = part.parse::<ProviderId>()?;
        if !order.contains(&provider) {
            order.push(provider);
        }
    }
    Ok(order)
}
