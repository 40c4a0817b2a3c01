use crate::error::{IntakeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which identifier shape a backend hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Monotonic sequence assigned by the relational backend.
    Numeric,
    /// Random high-entropy token; spreads records evenly across partitions.
    Token,
}

/// Identifier of a cart or an order.
///
/// Serializes untagged, so a numeric id renders as a JSON number and a token
/// as a JSON string. Raw strings coming from the outside are resolved into a
/// variant once, with [`Id::parse`], and travel typed from there on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Numeric(i64),
    Token(String),
}

impl Id {
    /// Resolves a raw identifier according to the configured backend.
    pub fn parse(raw: &str, kind: IdKind) -> Result<Self> {
        let raw = raw.trim();
        match kind {
            IdKind::Numeric => raw.parse::<i64>().map(Id::Numeric).map_err(|_| {
                IntakeError::validation(format!("invalid cart ID '{raw}' (expected integer)"))
            }),
            IdKind::Token if raw.is_empty() => {
                Err(IntakeError::validation("invalid cart ID (empty token)"))
            }
            IdKind::Token => Ok(Id::Token(raw.to_string())),
        }
    }

    /// Generates a fresh random token.
    pub fn new_token() -> Self {
        Id::Token(Uuid::new_v4().to_string())
    }

    pub fn kind(&self) -> IdKind {
        match self {
            Id::Numeric(_) => IdKind::Numeric,
            Id::Token(_) => IdKind::Token,
        }
    }

    pub fn as_numeric(&self) -> Result<i64> {
        match self {
            Id::Numeric(value) => Ok(*value),
            Id::Token(_) => Err(IntakeError::validation(
                "invalid cart ID type for relational store (expected integer)",
            )),
        }
    }

    pub fn as_token(&self) -> Result<&str> {
        match self {
            Id::Token(value) => Ok(value),
            Id::Numeric(_) => Err(IntakeError::validation(
                "invalid cart ID type for document store (expected string token)",
            )),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Numeric(value) => write!(f, "{value}"),
            Id::Token(value) => f.write_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        assert_eq!(Id::parse("42", IdKind::Numeric).unwrap(), Id::Numeric(42));
        assert!(matches!(
            Id::parse("abc", IdKind::Numeric),
            Err(IntakeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_token() {
        let id = Id::parse("1f0c-token", IdKind::Token).unwrap();
        assert_eq!(id, Id::Token("1f0c-token".to_string()));
        // Digits are a valid token too; the backend decides the shape.
        assert_eq!(
            Id::parse("42", IdKind::Token).unwrap(),
            Id::Token("42".to_string())
        );
        assert!(Id::parse("  ", IdKind::Token).is_err());
    }

    #[test]
    fn test_variant_mismatch_is_validation() {
        assert!(matches!(
            Id::Numeric(1).as_token(),
            Err(IntakeError::ValidationError(_))
        ));
        assert!(matches!(
            Id::Token("x".into()).as_numeric(),
            Err(IntakeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_untagged_json_shape() {
        assert_eq!(serde_json::to_string(&Id::Numeric(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&Id::Token("ab".into())).unwrap(),
            "\"ab\""
        );
        let back: Id = serde_json::from_str("\"ab\"").unwrap();
        assert_eq!(back, Id::Token("ab".into()));
    }

    #[test]
    fn test_new_tokens_are_unique() {
        assert_ne!(Id::new_token(), Id::new_token());
        assert_eq!(Id::new_token().kind(), IdKind::Token);
    }
}
