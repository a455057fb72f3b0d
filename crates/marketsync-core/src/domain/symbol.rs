use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 20;

/// Normalized market symbol/ticker: uppercase, 1-20 characters of
/// `[A-Z0-9._-]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Trim, uppercase and validate arbitrary input.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_uppercase()
                || ch.is_ascii_digit()
                || matches!(ch, '.' | '_' | '-');
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    /// Keep the valid entries of a raw list, preserving order.
    pub fn parse_all<I, S>(inputs: I) -> (Vec<Self>, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for input in inputs {
            match Self::parse(input.as_ref()) {
                Ok(symbol) => valid.push(symbol),
                Err(_) => rejected.push(input.as_ref().to_owned()),
            }
        }
        (valid, rejected)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_symbol() {
        let parsed = Symbol::parse(" brk.b ").expect("symbol should parse");
        assert_eq!(parsed.as_str(), "BRK.B");
    }

    #[test]
    fn accepts_leading_digits_and_separators() {
        for input in ["7203.T", "BF_B", "RDS-A", "9"] {
            assert!(Symbol::parse(input).is_ok(), "{input} should be valid");
        }
    }

    #[test]
    fn rejects_blank_and_overlong_input() {
        assert_eq!(Symbol::parse("   "), Err(ValidationError::EmptySymbol));
        let err = Symbol::parse(&"A".repeat(21)).expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolTooLong { len: 21, .. }));
        assert!(Symbol::parse(&"A".repeat(20)).is_ok());
    }

    #[test]
    fn rejects_invalid_chars() {
        let err = Symbol::parse("bad symbol!").expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::SymbolInvalidChar { ch: ' ', index: 3 }
        ));
        assert!(Symbol::parse("AAPL$").is_err());
        assert!(Symbol::parse("€").is_err());
    }

    #[test]
    fn every_input_either_parses_to_a_valid_symbol_or_errors() {
        let long = "a".repeat(25);
        let inputs = [
            "", " ", "a", "aapl", "AAPL ", "\tmsft\n", "ß", "x.y-z_1", "€", "A B", &long, "İ",
            "-", "..", "0",
        ];
        for input in inputs {
            if let Ok(symbol) = Symbol::parse(input) {
                let s = symbol.as_str();
                assert!(!s.is_empty() && s.chars().count() <= MAX_SYMBOL_LEN);
                assert!(s
                    .chars()
                    .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ".-_".contains(ch)));
            }
        }
    }

    #[test]
    fn parse_all_splits_valid_and_rejected() {
        let (valid, rejected) = Symbol::parse_all(["AAPL", "bad symbol!", "msft"]);
        assert_eq!(
            valid.iter().map(Symbol::as_str).collect::<Vec<_>>(),
            vec!["AAPL", "MSFT"]
        );
        assert_eq!(rejected, vec!["bad symbol!".to_string()]);
    }
}
