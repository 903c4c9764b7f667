//! Token lifecycle engine.
//!
//! Orchestrates the four token operations (issue, validate, authorize,
//! revoke) over the caches, the credential store, and the batch writer.
//!
//! State placement rules:
//! - Issuance writes the state cache synchronously and queues the durable
//!   insert through the batch writer. A freshly issued token validates
//!   through the cache before its batch ever flushes.
//! - Validation reads the state cache first and falls back to the store,
//!   repopulating the cache on a hit. A token absent from both is
//!   unknown, whether it never existed or its batch was lost.
//! - Revocation writes the store synchronously and only then invalidates
//!   the cache entry, so a failed store write leaves the cached state
//!   untouched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::batch::TokenBatchWriter;
use crate::cache::{ClientCache, EndpointCache, TokenStateCache};
use crate::config::StoreTimeoutConfig;
use crate::error::AuthError;
use crate::storage::{ClientStorage, EndpointStorage, TokenStorage};
use crate::token::jwt::{AccessTokenClaims, JwtError, JwtService};
use crate::types::{Token, TokenKind};

// ============================================================================
// Responses
// ============================================================================

/// The result of a successful token issuance.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// The signed credential string to hand to the client.
    pub access_token: String,

    /// The token identifier (`jti` claim), usable for revocation bookkeeping.
    pub token_id: String,

    /// Kind of the issued token.
    pub kind: TokenKind,

    /// When the credential expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

// ============================================================================
// Token Service
// ============================================================================

/// The token lifecycle engine.
///
/// Cheap to share behind an `Arc`; all state lives in the caches, the
/// store, and the batch writer it was built with.
pub struct TokenService {
    jwt: Arc<JwtService>,
    clients: Arc<ClientCache>,
    endpoints: Arc<EndpointCache>,
    token_states: Arc<TokenStateCache>,
    client_storage: Arc<dyn ClientStorage>,
    endpoint_storage: Arc<dyn EndpointStorage>,
    token_storage: Arc<dyn TokenStorage>,
    batch_writer: Arc<TokenBatchWriter>,
    timeouts: StoreTimeoutConfig,
}

impl TokenService {
    /// Creates a new token service over the given components.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        jwt: Arc<JwtService>,
        clients: Arc<ClientCache>,
        endpoints: Arc<EndpointCache>,
        token_states: Arc<TokenStateCache>,
        client_storage: Arc<dyn ClientStorage>,
        endpoint_storage: Arc<dyn EndpointStorage>,
        token_storage: Arc<dyn TokenStorage>,
        batch_writer: Arc<TokenBatchWriter>,
        timeouts: StoreTimeoutConfig,
    ) -> Self {
        Self {
            jwt,
            clients,
            endpoints,
            token_states,
            client_storage,
            endpoint_storage,
            token_storage,
            batch_writer,
            timeouts,
        }
    }

    // ========================================================================
    // Issue
    // ========================================================================

    /// Issues a new signed credential to an authenticated client.
    ///
    /// The credential is signed before any state is recorded; a signing
    /// failure leaves no trace in the cache or the write queue.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if an input is empty, `InvalidClient` if
    /// the client is unknown or the secret does not match, or a storage
    /// error if the client lookup fails.
    pub async fn issue(
        &self,
        client_id: &str,
        client_secret: &str,
        kind: TokenKind,
    ) -> AuthResult<IssuedToken> {
        // 1. Validate inputs
        if client_id.is_empty() {
            return Err(AuthError::invalid_request("client_id is required"));
        }
        if client_secret.is_empty() {
            return Err(AuthError::invalid_request("client_secret is required"));
        }

        // 2. Authenticate the client (cache first, store fallback)
        let client = self.lookup_client(client_id).await?;
        let Some(client) = client else {
            return Err(AuthError::invalid_client("Unknown client"));
        };
        if !client.verify_secret(client_secret) {
            return Err(AuthError::invalid_client("Invalid client secret"));
        }

        // 3. Mint the record and sign the credential
        let token = Token::issue(Token::generate_id(), kind, client_id);
        let claims = AccessTokenClaims::new(
            self.jwt.issuer(),
            client_id,
            token.token_id.clone(),
            kind,
            &client.scopes,
        );
        let access_token = self
            .jwt
            .encode(&claims)
            .map_err(|e| AuthError::internal(format!("Failed to sign credential: {e}")))?;

        // 4. Record state: cache synchronously, store via the batch queue
        let issued = IssuedToken {
            access_token,
            token_id: token.token_id.clone(),
            kind,
            expires_at: token.expires_at,
        };
        self.token_states.set(token.clone()).await;
        self.batch_writer.add(token).await;

        tracing::info!(
            client_id,
            token_id = %issued.token_id,
            kind = %kind,
            "Token issued"
        );
        Ok(issued)
    }

    // ========================================================================
    // Validate
    // ========================================================================

    /// Validates a credential and returns its claims.
    ///
    /// A one-time token that validates successfully is revoked in the
    /// background; the revocation is not awaited, so a second validation
    /// racing the revoke write may still succeed. Single-use is enforced
    /// on a best-effort basis, not as a hard guarantee.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the signature fails or the token is
    /// unknown, `TokenExpired` if its validity window has passed, or
    /// `TokenRevoked` if it was revoked.
    pub async fn validate(&self, credential: &str) -> AuthResult<AccessTokenClaims> {
        // 1. Verify the signature and time window
        let claims = self.jwt.decode(credential).map_err(map_jwt_error)?;

        // 2. Resolve the token's tracked state (cache first, store fallback)
        let token = match self.token_states.get(&claims.jti).await {
            Some(token) => token,
            None => {
                let found = self
                    .with_timeout(
                        self.timeouts.lookup,
                        self.token_storage.find_by_id(&claims.jti),
                        "Token lookup",
                    )
                    .await?;
                let Some(token) = found else {
                    return Err(AuthError::invalid_token("Unknown token"));
                };
                self.token_states.set(token.clone()).await;
                token
            }
        };

        // 3. Check tracked state
        if token.revoked {
            return Err(AuthError::TokenRevoked);
        }
        if token.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        // 4. One-time tokens burn on first use, in the background
        if token.kind == TokenKind::OneTime {
            let storage = Arc::clone(&self.token_storage);
            let token_states = Arc::clone(&self.token_states);
            let token_id = token.token_id.clone();
            let write_timeout = self.timeouts.write;
            tokio::spawn(async move {
                revoke_by_id(storage, token_states, &token_id, write_timeout).await;
            });
        }

        Ok(claims)
    }

    // ========================================================================
    // Authorize
    // ========================================================================

    /// Checks whether validated claims may call the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the endpoint is unregistered or inactive,
    /// `Forbidden` if the claims lack the endpoint's required scope, or a
    /// storage error if the endpoint lookup fails.
    pub async fn authorize(&self, claims: &AccessTokenClaims, url: &str) -> AuthResult<()> {
        if url.is_empty() {
            return Err(AuthError::invalid_request("url is required"));
        }

        let endpoint = match self.endpoints.get(url).await {
            Some(endpoint) => Some(endpoint),
            None => {
                let found = self
                    .with_timeout(
                        self.timeouts.lookup,
                        self.endpoint_storage.find_by_url(url),
                        "Endpoint lookup",
                    )
                    .await?;
                self.endpoints.set(url, found.clone()).await;
                found
            }
        };

        // Inactive endpoints are indistinguishable from unregistered ones
        let Some(endpoint) = endpoint.filter(|e| e.active) else {
            return Err(AuthError::not_found(format!("Unknown endpoint: {url}")));
        };

        if !claims.has_scope(&endpoint.scope) {
            tracing::debug!(
                client_id = %claims.sub,
                url,
                required_scope = %endpoint.scope,
                "Scope check failed"
            );
            return Err(AuthError::forbidden(format!(
                "Missing required scope: {}",
                endpoint.scope
            )));
        }

        Ok(())
    }

    // ========================================================================
    // Revoke
    // ========================================================================

    /// Revokes a credential.
    ///
    /// The signature is verified but expiry is not; an expired credential
    /// can still be revoked. The durable write happens first, and the
    /// cache entry is invalidated only after it commits, so callers can
    /// rely on the revocation being persistent when this returns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the signature fails, `NotFound` if the
    /// store has no row for the token (e.g. its insert batch has not
    /// flushed or was lost), or a storage error if the write fails.
    pub async fn revoke(&self, credential: &str) -> AuthResult<()> {
        let claims = self
            .jwt
            .decode_allow_expired(credential)
            .map_err(map_jwt_error)?;
        self.revoke_token_id(&claims.jti).await
    }

    /// Revokes a token by its identifier.
    ///
    /// Same durability contract as [`Self::revoke`]: store write first,
    /// cache invalidation only after the commit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the store has no row for the id, or a
    /// storage error if the write fails.
    pub async fn revoke_token_id(&self, token_id: &str) -> AuthResult<()> {
        if token_id.is_empty() {
            return Err(AuthError::invalid_request("token_id is required"));
        }

        self.with_timeout(
            self.timeouts.write,
            self.token_storage.revoke(token_id, OffsetDateTime::now_utc()),
            "Token revocation",
        )
        .await?;

        self.token_states.invalidate(token_id).await;
        tracing::info!(token_id, "Token revoked");
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    async fn lookup_client(&self, client_id: &str) -> AuthResult<Option<crate::types::Client>> {
        if let Some(client) = self.clients.get(client_id).await {
            return Ok(Some(client));
        }
        let found = self
            .with_timeout(
                self.timeouts.lookup,
                self.client_storage.find_by_client_id(client_id),
                "Client lookup",
            )
            .await?;
        self.clients.set(client_id, found.clone()).await;
        Ok(found)
    }

    async fn with_timeout<T>(
        &self,
        timeout: Duration,
        fut: impl Future<Output = AuthResult<T>>,
        what: &str,
    ) -> AuthResult<T> {
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| AuthError::storage(format!("{what} timed out")))?
    }
}

/// Revokes a token by id, best effort.
///
/// Used for burning one-time tokens after their first validation. A
/// failure is logged and swallowed; the token row keeps its unrevoked
/// state and remains usable until its own expiry.
pub async fn revoke_by_id(
    storage: Arc<dyn TokenStorage>,
    token_states: Arc<TokenStateCache>,
    token_id: &str,
    timeout: Duration,
) {
    let write = storage.revoke(token_id, OffsetDateTime::now_utc());
    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => {
            token_states.invalidate(token_id).await;
            tracing::debug!(token_id, "One-time token burned");
        }
        Ok(Err(e)) => {
            tracing::error!(token_id, error = %e, "Failed to burn one-time token");
        }
        Err(_) => {
            tracing::error!(token_id, "One-time token burn timed out");
        }
    }
}

fn map_jwt_error(err: JwtError) -> AuthError {
    match err {
        JwtError::Expired | JwtError::NotYetValid => AuthError::TokenExpired,
        other => AuthError::invalid_token(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::token::jwt::SigningAlgorithm;
    use crate::types::{Client, Endpoint};

    const ISSUER: &str = "https://auth.example.com";
    const SECRET: &[u8] = b"test-secret";

    struct MockClientStorage {
        clients: Vec<Client>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ClientStorage for MockClientStorage {
        async fn load_all(&self) -> AuthResult<Vec<Client>> {
            Ok(self.clients.clone())
        }

        async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .clients
                .iter()
                .find(|c| c.client_id == client_id)
                .cloned())
        }
    }

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

    #[derive(Default)]
    struct MockTokenStorage {
        rows: Mutex<HashMap<String, Token>>,
    }

    #[async_trait]
    impl TokenStorage for MockTokenStorage {
        async fn find_by_id(&self, token_id: &str) -> AuthResult<Option<Token>> {
            Ok(self.rows.lock().unwrap().get(token_id).cloned())
        }

        async fn insert_batch(&self, tokens: &[Token]) -> AuthResult<()> {
            let mut rows = self.rows.lock().unwrap();
            for token in tokens {
                rows.insert(token.token_id.clone(), token.clone());
            }
            Ok(())
        }

        async fn revoke(&self, token_id: &str, revoked_at: OffsetDateTime) -> AuthResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let Some(token) = rows.get_mut(token_id) else {
                return Err(AuthError::not_found(format!("Unknown token: {token_id}")));
            };
            if !token.revoked {
                token.revoked = true;
                token.revoked_at = Some(revoked_at);
            }
            Ok(())
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, t| !t.is_expired());
            Ok((before - rows.len()) as u64)
        }
    }

    struct Fixture {
        service: TokenService,
        batch_writer: Arc<TokenBatchWriter>,
        token_states: Arc<TokenStateCache>,
        token_storage: Arc<MockTokenStorage>,
        client_storage: Arc<MockClientStorage>,
    }

    fn fixture() -> Fixture {
        let client_storage = Arc::new(MockClientStorage {
            clients: vec![Client {
                client_id: "c1".to_string(),
                secret_hash: Client::hash_secret("s3cret"),
                access_token_lifetime: None,
                scopes: vec!["read:orders".to_string(), "write:orders".to_string()],
            }],
            lookups: AtomicUsize::new(0),
        });
        let endpoint_storage = Arc::new(MockEndpointStorage {
            endpoints: vec![
                Endpoint {
                    url: "/orders".to_string(),
                    scope: "read:orders".to_string(),
                    method: "GET".to_string(),
                    active: true,
                },
                Endpoint {
                    url: "/admin".to_string(),
                    scope: "admin".to_string(),
                    method: "POST".to_string(),
                    active: true,
                },
                Endpoint {
                    url: "/legacy".to_string(),
                    scope: "read:orders".to_string(),
                    method: "GET".to_string(),
                    active: false,
                },
            ],
        });
        let token_storage = Arc::new(MockTokenStorage::default());
        let token_states = Arc::new(TokenStateCache::new(Duration::from_secs(3600)));
        let batch_writer = Arc::new(TokenBatchWriter::new(
            token_storage.clone() as Arc<dyn TokenStorage>,
            1000,
            Duration::from_secs(10),
        ));

        let service = TokenService::new(
            Arc::new(JwtService::new(SECRET, SigningAlgorithm::HS256, ISSUER)),
            Arc::new(ClientCache::new()),
            Arc::new(EndpointCache::new()),
            token_states.clone(),
            client_storage.clone() as Arc<dyn ClientStorage>,
            endpoint_storage,
            token_storage.clone() as Arc<dyn TokenStorage>,
            batch_writer.clone(),
            StoreTimeoutConfig::default(),
        );

        Fixture {
            service,
            batch_writer,
            token_states,
            token_storage,
            client_storage,
        }
    }

    async fn wait_for<F>(mut condition: F)
    where
        F: FnMut() -> bool,
    {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 1s");
    }

    #[tokio::test]
    async fn test_issue_then_validate_before_flush() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        assert_eq!(issued.token_id.len(), crate::types::TOKEN_ID_LEN);

        // Nothing durable yet, validation goes through the state cache.
        assert!(f.token_storage.rows.lock().unwrap().is_empty());
        let claims = f.service.validate(&issued.access_token).await.unwrap();
        assert_eq!(claims.sub, "c1");
        assert_eq!(claims.jti, issued.token_id);
        assert!(claims.has_scope("read:orders"));
    }

    #[tokio::test]
    async fn test_issue_reads_client_through_cache() {
        let f = fixture();

        f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();

        // The first issuance cached the client; the second never hit the store.
        assert_eq!(f.client_storage.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_credentials() {
        let f = fixture();

        let err = f.service.issue("", "s3cret", TokenKind::Normal).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let err = f.service.issue("c1", "", TokenKind::Normal).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let err = f.service.issue("c1", "wrong", TokenKind::Normal).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));

        let err = f.service.issue("ghost", "s3cret", TokenKind::Normal).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_validate_rejects_forged_and_unknown() {
        let f = fixture();

        assert!(matches!(
            f.service.validate("garbage").await.unwrap_err(),
            AuthError::InvalidToken { .. }
        ));

        // Valid signature, but a token the engine never issued.
        let forged_jwt = JwtService::new(SECRET, SigningAlgorithm::HS256, ISSUER);
        let claims =
            AccessTokenClaims::new(ISSUER, "c1", "made-up-id", TokenKind::Normal, &[]);
        let forged = forged_jwt.encode(&claims).unwrap();
        assert!(matches!(
            f.service.validate(&forged).await.unwrap_err(),
            AuthError::InvalidToken { .. }
        ));
    }

    #[tokio::test]
    async fn test_validate_falls_back_to_store() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        f.batch_writer.flush().await;
        f.token_states.clear().await;

        let claims = f.service.validate(&issued.access_token).await.unwrap();
        assert_eq!(claims.jti, issued.token_id);

        // The store hit repopulated the cache.
        assert!(f.token_states.get(&issued.token_id).await.is_some());
    }

    #[tokio::test]
    async fn test_one_time_token_burns_after_first_use() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::OneTime).await.unwrap();
        f.batch_writer.flush().await;

        f.service.validate(&issued.access_token).await.unwrap();

        // The burn is fire-and-forget; wait for the background write.
        let storage = f.token_storage.clone();
        let id = issued.token_id.clone();
        wait_for(move || {
            storage
                .rows
                .lock()
                .unwrap()
                .get(&id)
                .is_some_and(|t| t.revoked)
        })
        .await;

        let err = f.service.validate(&issued.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_authorize_scope_and_endpoint_checks() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        let claims = f.service.validate(&issued.access_token).await.unwrap();

        f.service.authorize(&claims, "/orders").await.unwrap();

        let err = f.service.authorize(&claims, "/admin").await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));

        let err = f.service.authorize(&claims, "/nowhere").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));

        // Inactive endpoints behave exactly like unregistered ones.
        let err = f.service.authorize(&claims, "/legacy").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_revoke_is_durable_and_idempotent() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        f.batch_writer.flush().await;

        f.service.revoke(&issued.access_token).await.unwrap();
        let row = f
            .token_storage
            .rows
            .lock()
            .unwrap()
            .get(&issued.token_id)
            .cloned()
            .unwrap();
        assert!(row.revoked);
        assert!(row.revoked_at.is_some());

        // Second revoke succeeds without resetting anything.
        f.service.revoke(&issued.access_token).await.unwrap();

        let err = f.service.validate(&issued.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_revoke_by_token_id() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        f.batch_writer.flush().await;

        f.service.revoke_token_id(&issued.token_id).await.unwrap();
        let err = f.service.validate(&issued.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));

        let err = f.service.revoke_token_id("").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_revoke_before_flush_is_not_found() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();

        // No durable row yet, so the revoke write has nothing to update.
        let err = f.service.revoke(&issued.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));

        // The failed revoke left the cached state untouched.
        f.service.validate(&issued.access_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoked_state_found_via_store_path() {
        let f = fixture();

        let issued = f.service.issue("c1", "s3cret", TokenKind::Normal).await.unwrap();
        f.batch_writer.flush().await;
        f.service.revoke(&issued.access_token).await.unwrap();
        f.token_states.clear().await;

        let err = f.service.validate(&issued.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }
}
