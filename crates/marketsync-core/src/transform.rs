use thiserror::Error;

use crate::domain::validate_finite;
use crate::payload::{PeerPayload, QuotePayload, SourceRecord};
use crate::{
    CanonicalRecord, PeerRecord, ProviderId, Symbol, UtcDateTime, ValidationError,
    WatchlistEnrichment,
};

/// Per-record transform failure. Counted against the symbol, never fatal to
/// the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("invalid {field} '{value}': {source}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        #[source]
        source: ValidationError,
    },
    #[error("{field} '{value}' does not match requested symbol '{requested}'")]
    RequestMismatch {
        field: &'static str,
        value: String,
        requested: String,
    },
    #[error("peer record for '{symbol}' lists itself as its own peer")]
    SelfPeer { symbol: String },
    #[error("quote record for '{symbol}' has no watchlist item to attach to")]
    MissingItemId { symbol: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Values stamped onto every record produced for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub requested: &'a Symbol,
    pub provider: ProviderId,
    /// Watchlist item the quote is attached to.
    pub item_id: Option<&'a str>,
    pub now: UtcDateTime,
}

fn identifier(field: &'static str, value: &str) -> Result<Symbol, TransformError> {
    Symbol::parse(value).map_err(|source| TransformError::InvalidIdentifier {
        field,
        value: value.to_owned(),
        source,
    })
}

/// Converts a provider payload into its storable shape.
///
/// Identifiers are revalidated, absent display fields get defaults (name
/// falls back to the symbol, logo to an empty string), and timestamps come
/// from `context.now`.
pub fn transform(
    record: &SourceRecord,
    context: &TransformContext<'_>,
) -> Result<CanonicalRecord, TransformError> {
    match record {
        SourceRecord::Peer(peer) => transform_peer(peer, context).map(CanonicalRecord::Peer),
        SourceRecord::Quote(quote) => {
            transform_quote(quote, context).map(CanonicalRecord::WatchlistEnrichment)
        }
    }
}

fn ensure_requested(
    field: &'static str,
    value: &Symbol,
    context: &TransformContext<'_>,
) -> Result<(), TransformError> {
    if value == context.requested {
        return Ok(());
    }
    Err(TransformError::RequestMismatch {
        field,
        value: value.to_string(),
        requested: context.requested.to_string(),
    })
}

fn transform_peer(peer: &PeerPayload, context: &TransformContext<'_>) -> Result<PeerRecord, TransformError> {
    let symbol = identifier("symbol", &peer.symbol)?;
    let peer_of = identifier("peer_of", &peer.peer_of)?;
    ensure_requested("peer_of", &peer_of, context)?;
    if symbol == peer_of {
        return Err(TransformError::SelfPeer {
            symbol: symbol.to_string(),
        });
    }

    let name = peer
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| symbol.to_string(), str::to_owned);

    Ok(PeerRecord {
        name,
        logo: peer.logo.clone().unwrap_or_default(),
        symbol,
        peer_of,
        provider: context.provider,
        fetched_at: context.now,
        as_of_date: context.now.date_string(),
    })
}

fn transform_quote(
    quote: &QuotePayload,
    context: &TransformContext<'_>,
) -> Result<WatchlistEnrichment, TransformError> {
    let symbol = identifier("symbol", &quote.symbol)?;
    ensure_requested("symbol", &symbol, context)?;
    let Some(item_id) = context.item_id else {
        return Err(TransformError::MissingItemId {
            symbol: symbol.to_string(),
        });
    };
    validate_finite("price", quote.price)?;

    let company_name = quote
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| symbol.to_string(), str::to_owned);

    Ok(WatchlistEnrichment::new(
        item_id,
        symbol,
        quote.price,
        quote.percent_change,
        company_name,
        context.provider,
        context.now,
    )?)
}
