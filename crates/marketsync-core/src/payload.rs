//! Provider payloads.
//!
//! Upstream JSON is untrusted: each parser walks a [`serde_json::Value`],
//! checks every field's type, and produces [`SourceRecord`] values. Anything
//! that is not the expected shape becomes a `malformed` [`SourceError`];
//! optional fields of the wrong type are dropped.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::provider::SourceError;
use crate::Symbol;

/// Raw record returned by a provider, before transformation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRecord {
    Peer(PeerPayload),
    Quote(QuotePayload),
}

impl SourceRecord {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Peer(peer) => &peer.symbol,
            Self::Quote(quote) => &quote.symbol,
        }
    }
}

/// One similar symbol. Identifiers are unvalidated provider strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerPayload {
    pub symbol: String,
    pub peer_of: String,
    pub name: Option<String>,
    pub logo: Option<String>,
}

/// Price snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotePayload {
    pub symbol: String,
    pub price: f64,
    pub percent_change: Option<f64>,
    pub company_name: Option<String>,
}

/// Display fields from a company profile lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePayload {
    pub name: Option<String>,
}

fn parse_json(provider: &str, body: &str) -> Result<Value, SourceError> {
    serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("{provider} body is not JSON: {e}")))
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn finite_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn same_ticker(candidate: &str, requested: &Symbol) -> bool {
    candidate.trim().eq_ignore_ascii_case(requested.as_str())
}

fn push_peer(out: &mut Vec<SourceRecord>, requested: &Symbol, peer: PeerPayload) {
    if same_ticker(&peer.symbol, requested) {
        return;
    }
    let duplicate = out
        .iter()
        .any(|existing| existing.symbol().trim().eq_ignore_ascii_case(peer.symbol.trim()));
    if !duplicate {
        out.push(SourceRecord::Peer(peer));
    }
}

/// Finnhub `/stock/peers`: a JSON array of ticker strings.
pub fn parse_finnhub_peers(body: &str, requested: &Symbol) -> Result<Vec<SourceRecord>, SourceError> {
    let value = parse_json("finnhub", body)?;
    let Value::Array(entries) = value else {
        return Err(SourceError::malformed("finnhub peers body is not an array"));
    };

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::String(symbol) = entry else {
            continue;
        };
        push_peer(
            &mut out,
            requested,
            PeerPayload {
                symbol,
                peer_of: requested.as_str().to_owned(),
                name: None,
                logo: None,
            },
        );
    }
    Ok(out)
}

/// FMP `/stable/stock-peers`: a JSON array of `{symbol, companyName, image}`.
pub fn parse_fmp_peers(body: &str, requested: &Symbol) -> Result<Vec<SourceRecord>, SourceError> {
    let value = parse_json("fmp", body)?;
    let Value::Array(entries) = value else {
        return Err(SourceError::malformed("fmp peers body is not an array"));
    };

    let mut out = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(object) = entry.as_object() else {
            continue;
        };
        let Some(symbol) = object.get("symbol").and_then(Value::as_str) else {
            continue;
        };
        push_peer(
            &mut out,
            requested,
            PeerPayload {
                symbol: symbol.to_owned(),
                peer_of: requested.as_str().to_owned(),
                name: non_blank(object.get("companyName")),
                logo: non_blank(object.get("image")),
            },
        );
    }
    Ok(out)
}

/// Finnhub `/quote`: `{c, dp, ...}`. `c == 0` with no `dp` is how Finnhub
/// answers for unknown tickers, so it yields `None`.
pub fn parse_finnhub_quote(body: &str, requested: &Symbol) -> Result<Option<QuotePayload>, SourceError> {
    let value = parse_json("finnhub", body)?;
    let Value::Object(object) = value else {
        return Err(SourceError::malformed("finnhub quote body is not an object"));
    };

    let price = match object.get("c") {
        None | Some(Value::Null) => return Ok(None),
        Some(raw) => finite_number(Some(raw))
            .ok_or_else(|| SourceError::malformed("finnhub quote price is not a finite number"))?,
    };
    let percent_change = finite_number(object.get("dp"));

    if price == 0.0 && percent_change.is_none() {
        return Ok(None);
    }

    Ok(Some(QuotePayload {
        symbol: requested.as_str().to_owned(),
        price,
        percent_change,
        company_name: None,
    }))
}

/// Finnhub `/stock/profile2`. Lenient: any problem yields an empty profile.
pub fn parse_finnhub_profile(body: &str) -> ProfilePayload {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
        return ProfilePayload::default();
    };
    ProfilePayload {
        name: non_blank(object.get("name")),
    }
}

/// Alpha Vantage `GLOBAL_QUOTE`. Numbers arrive as strings; the percent
/// change carries a trailing `%`. A `Note`/`Information` body is the
/// provider's throttle notice.
pub fn parse_alphavantage_quote(
    body: &str,
    requested: &Symbol,
) -> Result<Option<QuotePayload>, SourceError> {
    let value = parse_json("alphavantage", body)?;
    let Value::Object(object) = value else {
        return Err(SourceError::malformed("alphavantage body is not an object"));
    };

    let Some(quote) = object.get("Global Quote") else {
        if let Some(notice) = non_blank(object.get("Note")).or_else(|| non_blank(object.get("Information"))) {
            return Err(SourceError::rate_limited(format!("alphavantage notice: {notice}")));
        }
        if let Some(message) = non_blank(object.get("Error Message")) {
            return Err(SourceError::malformed(format!("alphavantage error: {message}")));
        }
        return Err(SourceError::malformed("alphavantage body has no 'Global Quote'"));
    };
    let Value::Object(quote) = quote else {
        return Err(SourceError::malformed("alphavantage 'Global Quote' is not an object"));
    };
    if quote.is_empty() {
        return Ok(None);
    }

    let price = numeric_string(quote, "05. price")
        .ok_or_else(|| SourceError::malformed("alphavantage price is missing or not numeric"))?;
    let percent_change = quote
        .get("10. change percent")
        .and_then(Value::as_str)
        .and_then(|raw| parse_finite(raw.trim().trim_end_matches('%')));
    let symbol = non_blank(quote.get("01. symbol")).unwrap_or_else(|| requested.as_str().to_owned());

    Ok(Some(QuotePayload {
        symbol,
        price,
        percent_change,
        company_name: None,
    }))
}

fn numeric_string(object: &Map<String, Value>, key: &str) -> Option<f64> {
    match object.get(key)? {
        Value::String(raw) => parse_finite(raw.trim()),
        other => finite_number(Some(other)),
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid")
    }

    #[test]
    fn finnhub_peers_drop_self_duplicates_and_non_strings() {
        let records =
            parse_finnhub_peers(r#"["AAPL","MSFT",42,"msft","GOOGL"]"#, &sym("AAPL")).expect("ok");
        let symbols: Vec<&str> = records.iter().map(SourceRecord::symbol).collect();
        assert_eq!(symbols, vec!["MSFT", "GOOGL"]);
    }

    #[test]
    fn finnhub_peers_reject_non_array() {
        let err = parse_finnhub_peers(r#"{"error":"x"}"#, &sym("AAPL")).expect_err("object");
        assert_eq!(err.code(), "source.malformed");
    }

    #[test]
    fn fmp_peers_keep_optional_fields_when_well_typed() {
        let body = r#"[
            {"symbol":"MSFT","companyName":"Microsoft","image":"https://img/msft.png"},
            {"symbol":"GOOGL","companyName":7},
            {"companyName":"no symbol"}
        ]"#;
        let records = parse_fmp_peers(body, &sym("AAPL")).expect("ok");
        assert_eq!(
            records,
            vec![
                SourceRecord::Peer(PeerPayload {
                    symbol: String::from("MSFT"),
                    peer_of: String::from("AAPL"),
                    name: Some(String::from("Microsoft")),
                    logo: Some(String::from("https://img/msft.png")),
                }),
                SourceRecord::Peer(PeerPayload {
                    symbol: String::from("GOOGL"),
                    peer_of: String::from("AAPL"),
                    name: None,
                    logo: None,
                }),
            ]
        );
    }

    #[test]
    fn finnhub_unknown_ticker_quote_is_empty() {
        let quote = parse_finnhub_quote(r#"{"c":0,"d":null,"dp":null}"#, &sym("ZZZZ")).expect("ok");
        assert_eq!(quote, None);
    }

    #[test]
    fn finnhub_quote_requires_numeric_price() {
        let err = parse_finnhub_quote(r#"{"c":"12.5"}"#, &sym("AAPL")).expect_err("string price");
        assert_eq!(err.code(), "source.malformed");

        let quote = parse_finnhub_quote(r#"{"c":189.5,"dp":-0.42}"#, &sym("AAPL"))
            .expect("ok")
            .expect("some");
        assert_eq!(quote.price, 189.5);
        assert_eq!(quote.percent_change, Some(-0.42));
    }

    #[test]
    fn finnhub_profile_is_lenient() {
        assert_eq!(parse_finnhub_profile("not json"), ProfilePayload::default());
        assert_eq!(parse_finnhub_profile(r#"{"name":"  "}"#).name, None);
        let profile = parse_finnhub_profile(r#"{"name":"Apple Inc","logo":"https://img"}"#);
        assert_eq!(profile.name.as_deref(), Some("Apple Inc"));
    }

    #[test]
    fn alphavantage_quote_parses_string_numbers() {
        let body = r#"{"Global Quote":{"01. symbol":"IBM","05. price":"171.2300","10. change percent":"1.2345%"}}"#;
        let quote = parse_alphavantage_quote(body, &sym("IBM"))
            .expect("ok")
            .expect("some");
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, 171.23);
        assert_eq!(quote.percent_change, Some(1.2345));
    }

    #[test]
    fn alphavantage_notice_and_empty_quote() {
        let err = parse_alphavantage_quote(r#"{"Note":"Thank you for using Alpha Vantage"}"#, &sym("IBM"))
            .expect_err("notice");
        assert_eq!(err.code(), "source.rate_limited");

        let empty = parse_alphavantage_quote(r#"{"Global Quote":{}}"#, &sym("IBM")).expect("ok");
        assert_eq!(empty, None);
    }
}
