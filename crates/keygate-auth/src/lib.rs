//! # Keygate Auth
//!
//! Token lifecycle and consistency engine for machine clients.
//!
//! The engine issues signed HMAC credentials, validates and authorizes
//! them against registered endpoints, and revokes them durably. Token
//! state is split between an in-memory TTL cache (fast path) and a
//! pluggable credential store (durable path); freshly issued tokens
//! reach the store asynchronously through a batching writer.
//!
//! ## Modules
//!
//! - [`batch`] - Batched persistence of issued tokens
//! - [`cache`] - In-memory client, endpoint, and token state caches
//! - [`config`] - Engine configuration
//! - [`error`] - Error types
//! - [`runtime`] - Composition root and background task lifecycle
//! - [`storage`] - Storage traits implemented by backends
//! - [`token`] - JWT signing/verification and the lifecycle engine
//! - [`types`] - Domain types (clients, endpoints, tokens)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keygate_auth::prelude::*;
//!
//! let mut config = AuthConfig::default();
//! config.signing.secret = "change-me".to_string();
//!
//! let runtime = AuthRuntime::start(config, clients, endpoints, tokens).await?;
//! let service = runtime.service();
//!
//! let issued = service.issue("client-1", "secret", TokenKind::Normal).await?;
//! let claims = service.validate(&issued.access_token).await?;
//! service.authorize(&claims, "/orders").await?;
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod runtime;
pub mod storage;
pub mod token;
pub mod types;

pub use batch::{BatchWriterHandle, TokenBatchWriter};
pub use cache::{ClientCache, EndpointCache, SweeperHandle, TokenStateCache};
pub use config::{AuthConfig, BatchConfig, ConfigError, SigningConfig, StoreTimeoutConfig, TokenStateConfig};
pub use error::{AuthError, ErrorCategory};
pub use runtime::AuthRuntime;
pub use storage::{ClientStorage, EndpointStorage, TokenStorage};
pub use token::{AccessTokenClaims, IssuedToken, JwtError, JwtService, SigningAlgorithm, TokenService};
pub use types::{Client, Endpoint, Token, TokenKind};

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::config::AuthConfig;
    pub use crate::error::AuthError;
    pub use crate::runtime::AuthRuntime;
    pub use crate::storage::{ClientStorage, EndpointStorage, TokenStorage};
    pub use crate::token::{AccessTokenClaims, IssuedToken, TokenService};
    pub use crate::types::{Client, Endpoint, Token, TokenKind};
    pub use crate::AuthResult;
}
