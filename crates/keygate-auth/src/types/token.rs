//! Token domain type.
//!
//! A token's authoritative state lives in two places with different
//! latency/durability trade-offs: the in-memory state cache (fast,
//! volatile, TTL-bounded) and the credential store (durable, eventually
//! written for inserts, synchronously written for revocations).

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Length of a generated token identifier (32 random bytes, hex-encoded).
pub const TOKEN_ID_LEN: usize = 64;

/// Kind of issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Reusable token, valid for one hour.
    Normal,
    /// Single-use token, valid for thirty minutes. Automatically revoked
    /// after its first successful validation.
    OneTime,
}

impl TokenKind {
    /// Returns the kind as a string, as persisted in the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::OneTime => "one_time",
        }
    }

    /// Parses a persisted kind string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "one_time" => Some(Self::OneTime),
            _ => None,
        }
    }

    /// Returns the fixed credential lifetime for this kind.
    ///
    /// These constants are deliberately not client-configurable.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        match self {
            Self::Normal => Duration::hours(1),
            Self::OneTime => Duration::minutes(30),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issued token as tracked by the engine and the credential store.
///
/// The signed credential string itself is never stored; the record is
/// keyed by the random token identifier carried in the credential's
/// `jti` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Random, unguessable, fixed-length token identifier.
    pub token_id: String,

    /// Kind of token (normal or one-time).
    pub kind: TokenKind,

    /// Client this token was issued to.
    pub client_id: String,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the credential's own validity window ends.
    ///
    /// This is the token's expiry claim, independent of any cache
    /// freshness TTL.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the token has been revoked. Once `true`, never reset.
    pub revoked: bool,

    /// When the token was revoked (None = not revoked).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,
}

impl Token {
    /// Creates a new unrevoked token record issued now.
    #[must_use]
    pub fn issue(token_id: impl Into<String>, kind: TokenKind, client_id: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            token_id: token_id.into(),
            kind,
            client_id: client_id.into(),
            issued_at: now,
            expires_at: now + kind.lifetime(),
            revoked: false,
            revoked_at: None,
        }
    }

    /// Generates a cryptographically secure random token identifier.
    ///
    /// Returns 256 bits of OS randomness encoded as lowercase hex
    /// ([`TOKEN_ID_LEN`] characters).
    #[must_use]
    pub fn generate_id() -> String {
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Returns `true` if the credential's own validity window has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(TokenKind::parse("normal"), Some(TokenKind::Normal));
        assert_eq!(TokenKind::parse("one_time"), Some(TokenKind::OneTime));
        assert_eq!(TokenKind::parse("refresh"), None);
        assert_eq!(TokenKind::Normal.as_str(), "normal");
        assert_eq!(TokenKind::OneTime.to_string(), "one_time");
    }

    #[test]
    fn test_kind_lifetimes() {
        assert_eq!(TokenKind::Normal.lifetime(), Duration::hours(1));
        assert_eq!(TokenKind::OneTime.lifetime(), Duration::minutes(30));
    }

    #[test]
    fn test_generate_id_is_fixed_length_and_unique() {
        let a = Token::generate_id();
        let b = Token::generate_id();
        assert_eq!(a.len(), TOKEN_ID_LEN);
        assert_eq!(b.len(), TOKEN_ID_LEN);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_issue_sets_expiry_from_kind() {
        let token = Token::issue(Token::generate_id(), TokenKind::OneTime, "c1");
        assert!(!token.revoked);
        assert!(token.revoked_at.is_none());
        assert_eq!(token.expires_at - token.issued_at, Duration::minutes(30));
        assert!(!token.is_expired());
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&TokenKind::OneTime).unwrap();
        assert_eq!(json, "\"one_time\"");
        let kind: TokenKind = serde_json::from_str("\"normal\"").unwrap();
        assert_eq!(kind, TokenKind::Normal);
    }
}
