//! Token engine configuration.
//!
//! This module provides configuration types for the token lifecycle
//! engine: signing, cache freshness, batch persistence, and store
//! timeout bounds. Credential lifetimes are fixed per token kind and
//! intentionally absent here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::token::jwt::SigningAlgorithm;

/// Root configuration for the token lifecycle engine.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.signing]
/// secret = "change-me"
///
/// [auth.tokens]
/// state_cache_ttl = "1h"
/// sweep_interval = "10m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Server issuer URL (used in token `iss` claim).
    pub issuer: String,

    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Token state cache configuration.
    pub tokens: TokenStateConfig,

    /// Batch persistence configuration.
    pub batch: BatchConfig,

    /// Credential store timeout bounds.
    pub store: StoreTimeoutConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            signing: SigningConfig::default(),
            tokens: TokenStateConfig::default(),
            batch: BatchConfig::default(),
            store: StoreTimeoutConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is unusable (empty signing secret,
    /// zero batch size, zero cache TTL).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "issuer".to_string(),
            });
        }
        if self.signing.secret.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "signing.secret".to_string(),
            });
        }
        if self.batch.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.max_batch_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.tokens.state_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "tokens.state_cache_ttl".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Sets the issuer URL.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the HMAC signing secret.
    #[must_use]
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing.secret = secret.into();
        self
    }

    /// Sets the HMAC signing algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.signing.algorithm = algorithm;
        self
    }
}

/// Token signing configuration.
///
/// The engine signs and verifies credentials with a single shared
/// symmetric key. Only HMAC algorithms are supported.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Shared HMAC signing secret.
    pub secret: String,

    /// HMAC signing algorithm.
    pub algorithm: SigningAlgorithm,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: SigningAlgorithm::HS256,
        }
    }
}

/// Token state cache configuration.
///
/// The state cache TTL bounds how long a cached revocation/kind entry
/// is trusted. Credential lifetimes themselves are fixed per token kind
/// ([`crate::types::TokenKind::lifetime`]) and deliberately not
/// configurable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenStateConfig {
    /// Freshness TTL of token state cache entries.
    #[serde(with = "humantime_serde")]
    pub state_cache_ttl: Duration,

    /// Interval between background sweeps of expired cache entries.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for TokenStateConfig {
    fn default() -> Self {
        Self {
            state_cache_ttl: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(600),   // 10 minutes
        }
    }
}

/// Batch persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Buffer size that triggers an immediate flush.
    pub max_batch_size: usize,

    /// Interval between unconditional timer flushes.
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Credential store timeout bounds.
///
/// Every store operation carries a bounded timeout so a slow or
/// unreachable store surfaces as a storage error instead of a hang.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreTimeoutConfig {
    /// Timeout for bulk cache population reads.
    #[serde(with = "humantime_serde")]
    pub bulk_load: Duration,

    /// Timeout for point lookups.
    #[serde(with = "humantime_serde")]
    pub lookup: Duration,

    /// Timeout for transactional writes.
    #[serde(with = "humantime_serde")]
    pub write: Duration,
}

impl Default for StoreTimeoutConfig {
    fn default() -> Self {
        Self {
            bulk_load: Duration::from_secs(300), // 5 minutes
            lookup: Duration::from_secs(5),
            write: Duration::from_secs(10),
        }
    }
}

/// Errors that can occur while validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required value is missing or empty.
    #[error("Missing configuration value: {field}")]
    MissingValue {
        /// The configuration field path.
        field: String,
    },

    /// A value is present but unusable.
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue {
        /// The configuration field path.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        AuthConfig {
            signing: SigningConfig {
                secret: "test-secret".to_string(),
                algorithm: SigningAlgorithm::HS256,
            },
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = AuthConfig::default();
        assert_eq!(config.tokens.state_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.tokens.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.batch.max_batch_size, 1000);
        assert_eq!(config.batch.flush_interval, Duration::from_secs(5));
        assert_eq!(config.store.bulk_load, Duration::from_secs(300));
    }

    #[test]
    fn test_validate_accepts_good_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = AuthConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { field } if field == "signing.secret"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = valid_config();
        config.batch.max_batch_size = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_builder_setters() {
        let config = AuthConfig::default()
            .with_issuer("https://auth.example.com")
            .with_signing_secret("s")
            .with_algorithm(SigningAlgorithm::HS512);
        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.signing.algorithm, SigningAlgorithm::HS512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_humantime_durations() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "issuer": "https://auth.example.com",
            "signing": { "secret": "s" },
            "tokens": {
                "state_cache_ttl": "2h",
                "sweep_interval": "15m"
            }
        }))
        .unwrap();

        assert_eq!(config.tokens.state_cache_ttl, Duration::from_secs(7200));
        assert_eq!(config.tokens.sweep_interval, Duration::from_secs(900));
        // Untouched sections keep their defaults
        assert_eq!(config.batch.max_batch_size, 1000);
        assert_eq!(config.store.write, Duration::from_secs(10));
    }
}
