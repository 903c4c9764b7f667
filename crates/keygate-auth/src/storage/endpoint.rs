//! Endpoint storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Endpoint;

/// Storage operations for protected endpoints.
///
/// Endpoints are read-only from the engine's perspective; the store is
/// the source of truth for which scope each endpoint requires.
#[async_trait]
pub trait EndpointStorage: Send + Sync {
    /// Loads all endpoints for bulk cache population.
    ///
    /// Implementations tolerate individual malformed rows: a row that
    /// fails to parse is logged and skipped, never aborting the load.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails or times out.
    async fn load_all(&self) -> AuthResult<Vec<Endpoint>>;

    /// Finds an endpoint by its URL.
    ///
    /// Returns `None` if no endpoint is registered for the URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or the storage operation
    /// fails.
    async fn find_by_url(&self, url: &str) -> AuthResult<Option<Endpoint>>;
}
