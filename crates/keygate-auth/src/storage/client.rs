//! Client storage trait.
//!
//! Defines the interface for client credential persistence. Implementations
//! are provided by storage backends (e.g., PostgreSQL).

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage operations for registered clients.
///
/// # Example
///
/// ```ignore
/// use keygate_auth::storage::ClientStorage;
///
/// async fn example(storage: &impl ClientStorage) {
///     if let Some(client) = storage.find_by_client_id("reporting-batch").await? {
///         println!("client has {} scopes", client.scopes.len());
///     }
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Loads all registered clients for bulk cache population.
    ///
    /// Implementations tolerate individual malformed rows: a row that
    /// fails to parse is logged and skipped, never aborting the load.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails or times out.
    async fn load_all(&self) -> AuthResult<Vec<Client>>;

    /// Finds a client by its client id.
    ///
    /// Returns `None` if the client doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is empty or the storage
    /// operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;
}
