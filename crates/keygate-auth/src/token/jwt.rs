//! JWT credential signing and verification.
//!
//! Credentials are signed with a single shared symmetric key using the
//! HMAC family (HS256, HS384, HS512). Verification pins the algorithm to
//! the configured one and rejects any credential whose header names a
//! different algorithm before signature checking, closing the
//! algorithm-confusion hole.

use std::fmt;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::TokenKind;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token is not yet valid (`nbf` in the future).
    #[error("Token not yet valid")]
    NotYetValid,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token names a signing algorithm outside the HMAC family or
    /// different from the configured one.
    #[error("Unexpected signing algorithm: {algorithm}")]
    UnexpectedAlgorithm {
        /// The algorithm named in the token header.
        algorithm: String,
    },

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a time-window validation error.
    #[must_use]
    pub fn is_time_window_error(&self) -> bool {
        matches!(self, Self::Expired | Self::NotYetValid)
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm => Self::UnexpectedAlgorithm {
                algorithm: "unknown".to_string(),
            },
            ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => {
                Self::invalid_claims(err.to_string())
            }
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256 (default).
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }

    /// Returns `true` if the `jsonwebtoken` algorithm belongs to the
    /// HMAC family.
    #[must_use]
    pub fn is_hmac(algorithm: Algorithm) -> bool {
        matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        )
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Access token claims carried in a signed credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Issuer (this server's URL).
    pub iss: String,

    /// Subject (client id).
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Not-before time (Unix timestamp).
    pub nbf: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Token id (unique identifier for state lookup and revocation).
    pub jti: String,

    /// Token kind (normal or one-time).
    pub kind: TokenKind,

    /// Space-separated granted scopes.
    pub scope: String,
}

impl AccessTokenClaims {
    /// Builds a claim set issued now.
    ///
    /// # Arguments
    /// * `issuer` - The server's issuer URL
    /// * `client_id` - The subject client
    /// * `token_id` - The random token identifier (`jti`)
    /// * `kind` - Token kind; determines the expiry
    /// * `scopes` - The client's allowed scopes
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        token_id: impl Into<String>,
        kind: TokenKind,
        scopes: &[String],
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            iss: issuer.into(),
            sub: client_id.into(),
            exp: (now + kind.lifetime()).unix_timestamp(),
            nbf: now.unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: token_id.into(),
            kind,
            scope: scopes.join(" "),
        }
    }

    /// Returns the granted scopes as a list.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }

    /// Returns `true` if the claim set carries the given scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Service for signing and verifying HMAC credentials.
///
/// Thread-safe (`Send + Sync`); shared across async tasks.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: SigningAlgorithm,
    issuer: String,
}

impl JwtService {
    /// Creates a new JWT service from a shared secret.
    ///
    /// # Arguments
    /// * `secret` - The symmetric HMAC key bytes
    /// * `algorithm` - The HMAC variant to sign and accept
    /// * `issuer` - The issuer claim value
    #[must_use]
    pub fn new(secret: &[u8], algorithm: SigningAlgorithm, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            issuer: issuer.into(),
        }
    }

    /// Signs a claim set into a compact JWT string.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode(&self, claims: &AccessTokenClaims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm.to_jwt_algorithm());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Verifies and decodes a credential.
    ///
    /// The header algorithm is checked against the HMAC family before any
    /// signature work; the signature, issuer, and time window are then
    /// validated.
    ///
    /// # Errors
    /// Returns an error if the header names a non-HMAC or unexpected
    /// algorithm, the signature is invalid, or the claims fail
    /// validation.
    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        self.decode_with_validation(token, true)
    }

    /// Verifies a credential without enforcing its expiry.
    ///
    /// Used by revocation, so an already-expired credential can still be
    /// revoked. The signature is still validated.
    ///
    /// # Errors
    /// Returns an error if decoding fails for any reason other than
    /// expiry.
    pub fn decode_allow_expired(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        self.decode_with_validation(token, false)
    }

    fn decode_with_validation(
        &self,
        token: &str,
        validate_exp: bool,
    ) -> Result<AccessTokenClaims, JwtError> {
        let header = decode_header(token).map_err(|e| JwtError::decoding_error(e.to_string()))?;
        if !SigningAlgorithm::is_hmac(header.alg) {
            return Err(JwtError::UnexpectedAlgorithm {
                algorithm: format!("{:?}", header.alg),
            });
        }

        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = validate_exp;
        // Every issued claim set carries nbf; the expiry-exempt path used
        // by revocation skips time-window checks entirely.
        validation.validate_nbf = validate_exp;

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }

    /// Returns the configured signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

// ============================================================================
// Tests
// ============================================================================
