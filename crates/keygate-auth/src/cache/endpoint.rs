//! In-memory cache of endpoint scope mappings.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::EndpointStorage;
use crate::types::Endpoint;

/// Read-through cache, endpoint URL to required-scope record.
///
/// Same contract as [`crate::cache::ClientCache`]: no eviction, absent
/// records are never cached, safe for many concurrent readers.
#[derive(Default)]
pub struct EndpointCache {
    entries: RwLock<HashMap<String, Endpoint>>,
}

impl EndpointCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an endpoint by URL.
    pub async fn get(&self, url: &str) -> Option<Endpoint> {
        self.entries.read().await.get(url).cloned()
    }

    /// Stores an endpoint record, overwriting any existing entry.
    ///
    /// `None` is a logged no-op: absent records are never cached.
    pub async fn set(&self, url: &str, endpoint: Option<Endpoint>) {
        let Some(endpoint) = endpoint else {
            tracing::warn!(url, "Ignoring attempt to cache absent endpoint record");
            return;
        };
        self.entries.write().await.insert(url.to_string(), endpoint);
    }

    /// Removes an endpoint entry unconditionally.
    pub async fn invalidate(&self, url: &str) {
        self.entries.write().await.remove(url);
    }

    /// Removes all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Returns the number of cached endpoints.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Populates the cache from storage, row by row.
    ///
    /// # Returns
    ///
    /// Returns the number of endpoints loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the bulk read fails or exceeds the timeout.
    pub async fn populate(
        &self,
        storage: &dyn EndpointStorage,
        timeout: Duration,
    ) -> AuthResult<usize> {
        let endpoints = tokio::time::timeout(timeout, storage.load_all())
            .await
            .map_err(|_| AuthError::storage("Endpoint bulk load timed out"))??;

        let count = endpoints.len();
        let mut entries = self.entries.write().await;
        for endpoint in endpoints {
            entries.insert(endpoint.url.clone(), endpoint);
        }
        drop(entries);

        tracing::info!(endpoints = count, "Endpoint cache populated");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MockEndpointStorage {
        endpoints: Vec<Endpoint>,
    }

    #[async_trait]
    impl EndpointStorage for MockEndpointStorage {
        async fn load_all(&self) -> AuthResult<Vec<Endpoint>> {
            Ok(self.endpoints.clone())
        }

        async fn find_by_url(&self, url: &str) -> AuthResult<Option<Endpoint>> {
            Ok(self.endpoints.iter().find(|e| e.url == url).cloned())
        }
    }

    fn endpoint(url: &str, scope: &str) -> Endpoint {
        Endpoint {
            url: url.to_string(),
            scope: scope.to_string(),
            method: "GET".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = EndpointCache::new();
        cache.set("/api/a", Some(endpoint("/api/a", "read:a"))).await;

        assert_eq!(cache.get("/api/a").await.unwrap().scope, "read:a");
        cache.invalidate("/api/a").await;
        assert!(cache.get("/api/a").await.is_none());
    }

    #[tokio::test]
    async fn test_set_none_is_noop() {
        let cache = EndpointCache::new();
        cache.set("/api/a", None).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_populate() {
        let storage = MockEndpointStorage {
            endpoints: vec![endpoint("/api/a", "read:a"), endpoint("/api/b", "read:b")],
        };
        let cache = EndpointCache::new();

        let loaded = cache
            .populate(&storage, Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(cache.get("/api/b").await.unwrap().scope, "read:b");
    }
}
