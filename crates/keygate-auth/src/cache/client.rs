//! In-memory cache of client credential records.
//!
//! Read-mostly: many concurrent readers, occasional writers. No eviction
//! policy; the key space is administratively bounded, so unbounded growth
//! is accepted.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::ClientStorage;
use crate::types::Client;

/// Read-through cache, client id to client credential record.
#[derive(Default)]
pub struct ClientCache {
    entries: RwLock<HashMap<String, Client>>,
}

impl ClientCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a client by id.
    pub async fn get(&self, client_id: &str) -> Option<Client> {
        self.entries.read().await.get(client_id).cloned()
    }

    /// Stores a client record, overwriting any existing entry.
    ///
    /// `None` is a logged no-op: absent records are never cached.
    pub async fn set(&self, client_id: &str, client: Option<Client>) {
        let Some(client) = client else {
            tracing::warn!(client_id, "Ignoring attempt to cache absent client record");
            return;
        };
        self.entries
            .write()
            .await
            .insert(client_id.to_string(), client);
    }

    /// Removes a client entry unconditionally.
    pub async fn invalidate(&self, client_id: &str) {
        self.entries.write().await.remove(client_id);
    }

    /// Removes all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Returns the number of cached clients.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Populates the cache from storage, row by row.
    ///
    /// The load is bounded by `timeout`; a timeout surfaces as a storage
    /// error and leaves previously cached entries untouched.
    ///
    /// # Returns
    ///
    /// Returns the number of clients loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the bulk read fails or exceeds the timeout.
    pub async fn populate(
        &self,
        storage: &dyn ClientStorage,
        timeout: Duration,
    ) -> AuthResult<usize> {
        let clients = tokio::time::timeout(timeout, storage.load_all())
            .await
            .map_err(|_| AuthError::storage("Client bulk load timed out"))??;

        let count = clients.len();
        let mut entries = self.entries.write().await;
        for client in clients {
            entries.insert(client.client_id.clone(), client);
        }
        drop(entries);

        tracing::info!(clients = count, "Client cache populated");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MockClientStorage {
        clients: Vec<Client>,
    }

    #[async_trait]
    impl ClientStorage for MockClientStorage {
        async fn load_all(&self) -> AuthResult<Vec<Client>> {
            Ok(self.clients.clone())
        }

        async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
            Ok(self
                .clients
                .iter()
                .find(|c| c.client_id == client_id)
                .cloned())
        }
    }

    fn client(id: &str) -> Client {
        Client {
            client_id: id.to_string(),
            secret_hash: Client::hash_secret("secret"),
            access_token_lifetime: None,
            scopes: vec!["read:x".to_string()],
        }
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = ClientCache::new();
        assert!(cache.get("c1").await.is_none());

        cache.set("c1", Some(client("c1"))).await;
        assert_eq!(cache.get("c1").await.unwrap().client_id, "c1");
        assert_eq!(cache.len().await, 1);

        cache.invalidate("c1").await;
        assert!(cache.get("c1").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_none_is_noop() {
        let cache = ClientCache::new();
        cache.set("c1", Some(client("c1"))).await;

        cache.set("c2", None).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("c2").await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ClientCache::new();
        cache.set("c1", Some(client("c1"))).await;
        cache.set("c2", Some(client("c2"))).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_populate() {
        let storage = MockClientStorage {
            clients: vec![client("c1"), client("c2")],
        };
        let cache = ClientCache::new();

        let loaded = cache
            .populate(&storage, Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("c2").await.is_some());
    }
}
