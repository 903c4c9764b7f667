//! TTL cache of token revocation/kind state.
//!
//! This cache is the fast path for token validation. Entries carry an
//! absolute freshness expiry, independent of the token's own validity
//! window: the TTL bounds how long a cached answer is trusted, not how
//! long the credential lives.
//!
//! Expiration is two independent mechanisms: a cheap check at lookup time
//! that evicts the stale entry as a side effect, and a low-frequency
//! background sweep that reclaims entries nobody reads anymore.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::types::Token;

/// A cached token with its freshness expiry.
struct CacheEntry {
    token: Token,
    /// When this cache entry stops being trusted. Not the credential's
    /// own `expires_at`.
    fresh_until: OffsetDateTime,
}

impl CacheEntry {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        now < self.fresh_until
    }
}

/// TTL cache, token id to revocation/kind state.
///
/// A revoke operation must invalidate this cache before returning, so no
/// validator can observe a revoked token as valid once revoke has
/// completed.
pub struct TokenStateCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl TokenStateCache {
    /// Creates a new cache with the given entry freshness TTL.
    ///
    /// Sub-second TTLs are honored; an out-of-range TTL saturates to the
    /// maximum representable duration.
    #[must_use]
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::try_from(ttl).unwrap_or(Duration::MAX),
        }
    }

    /// Looks up a token's cached state.
    ///
    /// Returns `None` if the id is absent or the entry's TTL has elapsed;
    /// a stale entry is evicted on the failed read as a side effect.
    pub async fn get(&self, token_id: &str) -> Option<Token> {
        let now = OffsetDateTime::now_utc();

        {
            let entries = self.entries.read().await;
            match entries.get(token_id) {
                None => return None,
                Some(entry) if entry.is_fresh(now) => return Some(entry.token.clone()),
                Some(_) => {} // stale, fall through to evict
            }
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(token_id) {
            // Re-check under the write lock: a concurrent set may have
            // refreshed the entry between the two lock acquisitions.
            if entry.is_fresh(now) {
                return Some(entry.token.clone());
            }
            entries.remove(token_id);
            tracing::debug!(token_id, "Evicted stale token state entry on read");
        }
        None
    }

    /// Stores token state with expiry = now + TTL, overwriting any
    /// existing entry.
    pub async fn set(&self, token: Token) {
        let entry = CacheEntry {
            fresh_until: OffsetDateTime::now_utc() + self.ttl,
            token,
        };
        self.entries
            .write()
            .await
            .insert(entry.token.token_id.clone(), entry);
    }

    /// Removes an entry unconditionally.
    pub async fn invalidate(&self, token_id: &str) {
        self.entries.write().await.remove(token_id);
    }

    /// Removes all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Returns the number of cached entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes all TTL-expired entries.
    ///
    /// Bounds memory growth for keys nobody reads; runs under the same
    /// exclusion as writers.
    ///
    /// # Returns
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            tracing::debug!(removed, "Swept expired token state entries");
        }
        removed
    }

    /// Starts the periodic background sweep.
    ///
    /// The returned handle must be stopped at shutdown.
    #[must_use]
    pub fn start_sweeper(self: &Arc<Self>, interval: StdDuration) -> SweeperHandle {
        let cache = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would sweep an empty cache.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep_expired().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
            tracing::debug!("Token state sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle controlling the background sweep task.
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper and waits for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}
