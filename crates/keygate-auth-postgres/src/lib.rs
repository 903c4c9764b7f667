//! PostgreSQL credential store backend for keygate-auth.
//!
//! Provides durable storage for:
//!
//! - Registered machine clients (`clients` table)
//! - Protected endpoints (`endpoints` table)
//! - Issued token state (`tokens` table)
//!
//! The tables use plain typed columns; [`PostgresCredentialStore::ensure_schema`]
//! creates them if they do not exist.
//!
//! # Example
//!
//! ```ignore
//! use keygate_auth_postgres::PostgresCredentialStore;
//!
//! let store = PostgresCredentialStore::connect("postgres://localhost/keygate").await?;
//! store.ensure_schema().await?;
//!
//! let runtime = AuthRuntime::start(
//!     config,
//!     store.clients(),
//!     store.endpoints(),
//!     store.tokens(),
//! )
//! .await?;
//! ```

pub mod client;
pub mod endpoint;
pub mod token;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use client::PostgresClientStore;
pub use endpoint::PostgresEndpointStore;
pub use token::PostgresTokenStore;

use keygate_auth::AuthError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored value could not be interpreted.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A caller-supplied value is unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an `InvalidRow` error.
    #[must_use]
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => AuthError::not_found(what),
            StorageError::InvalidInput(message) => AuthError::invalid_request(message),
            other => AuthError::storage(other.to_string()),
        }
    }
}

/// Result type for credential store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Rejects empty identifiers before they reach a query.
pub(crate) fn ensure_id(value: &str, what: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::invalid_input(format!(
            "{what} must not be empty"
        )));
    }
    Ok(())
}

// =============================================================================
// PostgreSQL Credential Store
// =============================================================================

/// PostgreSQL credential store.
///
/// Holds a connection pool and hands out Arc-owning storage adapters
/// for each entity, ready to be used as `Arc<dyn ...Storage>` by the
/// engine runtime.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    /// Create a new store with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new store by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new().connect(database_url).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Create the store tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        use sqlx_core::query::query;

        query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                client_id TEXT PRIMARY KEY,
                secret_hash TEXT NOT NULL,
                access_token_lifetime BIGINT,
                scopes TEXT[] NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        query(
            r#"
            CREATE TABLE IF NOT EXISTS endpoints (
                url TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                method TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        query(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                token_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                client_id TEXT NOT NULL,
                issued_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT FALSE,
                revoked_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        query("CREATE INDEX IF NOT EXISTS tokens_expires_at_idx ON tokens (expires_at)")
            .execute(self.pool.as_ref())
            .await?;

        tracing::info!("Credential store schema ensured");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get an Arc-owning client storage adapter.
    #[must_use]
    pub fn clients(&self) -> Arc<PostgresClientStore> {
        Arc::new(PostgresClientStore::new(Arc::clone(&self.pool)))
    }

    /// Get an Arc-owning endpoint storage adapter.
    #[must_use]
    pub fn endpoints(&self) -> Arc<PostgresEndpointStore> {
        Arc::new(PostgresEndpointStore::new(Arc::clone(&self.pool)))
    }

    /// Get an Arc-owning token storage adapter.
    #[must_use]
    pub fn tokens(&self) -> Arc<PostgresTokenStore> {
        Arc::new(PostgresTokenStore::new(Arc::clone(&self.pool)))
    }
}

// =============================================================================
// Tests
// =============================================================================
