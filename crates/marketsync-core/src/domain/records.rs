use serde::{Deserialize, Serialize};

use crate::{ProviderId, Symbol, UtcDateTime, ValidationError};

/// Storable similar-symbol record, keyed by `(symbol, peer_of, provider)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub symbol: Symbol,
    pub name: String,
    pub logo: String,
    pub peer_of: Symbol,
    pub provider: ProviderId,
    pub fetched_at: UtcDateTime,
    /// `YYYY-MM-DD` of `fetched_at`.
    pub as_of_date: String,
}

/// Storable price enrichment for one watchlist item, keyed by `item_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEnrichment {
    pub item_id: String,
    pub symbol: Symbol,
    pub price: f64,
    pub percent_change: Option<f64>,
    pub company_name: String,
    pub provider: ProviderId,
    pub updated_at: UtcDateTime,
}

impl WatchlistEnrichment {
    pub fn new(
        item_id: impl Into<String>,
        symbol: Symbol,
        price: f64,
        percent_change: Option<f64>,
        company_name: impl Into<String>,
        provider: ProviderId,
        updated_at: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        let item_id = item_id.into();
        if item_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "item_id" });
        }
        validate_finite("price", price)?;
        if let Some(change) = percent_change {
            validate_finite("percent_change", change)?;
        }

        Ok(Self {
            item_id,
            symbol,
            price,
            percent_change,
            company_name: company_name.into(),
            provider,
            updated_at,
        })
    }
}

/// Any record the pipeline persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Peer(PeerRecord),
    WatchlistEnrichment(WatchlistEnrichment),
}

impl CanonicalRecord {
    /// Natural key rendered as a stable string, for logs and in-memory stores.
    pub fn natural_key(&self) -> String {
        match self {
            Self::Peer(peer) => format!("peer:{}:{}:{}", peer.symbol, peer.peer_of, peer.provider),
            Self::WatchlistEnrichment(item) => format!("watchlist:{}", item.item_id),
        }
    }
}

/// A watchlist entry referencing a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub item_id: String,
    pub user_id: String,
    pub symbol: Symbol,
}

pub(crate) fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aapl() -> Symbol {
        Symbol::parse("AAPL").expect("valid")
    }

    #[test]
    fn enrichment_rejects_non_finite_price() {
        let err = WatchlistEnrichment::new(
            "item-1",
            aapl(),
            f64::NAN,
            None,
            "Apple",
            ProviderId::Finnhub,
            UtcDateTime::now(),
        )
        .expect_err("nan price");
        assert_eq!(err, ValidationError::NonFiniteValue { field: "price" });
    }

    #[test]
    fn enrichment_rejects_blank_item_id() {
        let err = WatchlistEnrichment::new(
            " ",
            aapl(),
            1.0,
            Some(0.5),
            "Apple",
            ProviderId::Finnhub,
            UtcDateTime::now(),
        )
        .expect_err("blank id");
        assert_eq!(err, ValidationError::EmptyField { field: "item_id" });
    }

    #[test]
    fn natural_keys_follow_record_kind() {
        let record = CanonicalRecord::Peer(PeerRecord {
            symbol: Symbol::parse("MSFT").expect("valid"),
            name: String::from("Microsoft"),
            logo: String::new(),
            peer_of: aapl(),
            provider: ProviderId::Fmp,
            fetched_at: UtcDateTime::now(),
            as_of_date: String::from("2026-01-05"),
        });
        assert_eq!(record.natural_key(), "peer:MSFT:AAPL:fmp");
    }
}
