//! Runtime assembly of the token engine.
//!
//! Wires configuration and storage backends into the caches, the JWT
//! service, the batch writer, and the token service, and owns the
//! background tasks (cache sweeper, batch flush timer) for the life of
//! the process.

use std::sync::Arc;

use crate::AuthResult;
use crate::batch::{BatchWriterHandle, TokenBatchWriter};
use crate::cache::{ClientCache, EndpointCache, SweeperHandle, TokenStateCache};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::storage::{ClientStorage, EndpointStorage, TokenStorage};
use crate::token::{JwtService, TokenService};

/// A fully wired token engine with its background tasks running.
pub struct AuthRuntime {
    service: Arc<TokenService>,
    clients: Arc<ClientCache>,
    endpoints: Arc<EndpointCache>,
    sweeper: SweeperHandle,
    flush_timer: BatchWriterHandle,
}

impl AuthRuntime {
    /// Builds the engine from configuration and storage backends.
    ///
    /// Client and endpoint caches are populated eagerly from the store;
    /// both background tasks (state cache sweeper, batch flush timer)
    /// are started before this returns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config fails validation, or
    /// a storage error if either bulk cache load fails.
    pub async fn start(
        config: AuthConfig,
        client_storage: Arc<dyn ClientStorage>,
        endpoint_storage: Arc<dyn EndpointStorage>,
        token_storage: Arc<dyn TokenStorage>,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let clients = Arc::new(ClientCache::new());
        let endpoints = Arc::new(EndpointCache::new());
        clients
            .populate(client_storage.as_ref(), config.store.bulk_load)
            .await?;
        endpoints
            .populate(endpoint_storage.as_ref(), config.store.bulk_load)
            .await?;

        let token_states = Arc::new(TokenStateCache::new(config.tokens.state_cache_ttl));
        let sweeper = token_states.start_sweeper(config.tokens.sweep_interval);

        let batch_writer = Arc::new(TokenBatchWriter::new(
            Arc::clone(&token_storage),
            config.batch.max_batch_size,
            config.store.write,
        ));
        let flush_timer = batch_writer.start(config.batch.flush_interval);

        let jwt = Arc::new(JwtService::new(
            config.signing.secret.as_bytes(),
            config.signing.algorithm,
            config.issuer.clone(),
        ));

        let service = Arc::new(TokenService::new(
            jwt,
            Arc::clone(&clients),
            Arc::clone(&endpoints),
            token_states,
            client_storage,
            endpoint_storage,
            token_storage,
            batch_writer,
            config.store.clone(),
        ));

        tracing::info!(
            issuer = %config.issuer,
            algorithm = %config.signing.algorithm,
            "Token engine started"
        );

        Ok(Self {
            service,
            clients,
            endpoints,
            sweeper,
            flush_timer,
        })
    }

    /// Returns the token service.
    #[must_use]
    pub fn service(&self) -> Arc<TokenService> {
        Arc::clone(&self.service)
    }

    /// Returns the client cache, for administrative invalidation.
    #[must_use]
    pub fn clients(&self) -> Arc<ClientCache> {
        Arc::clone(&self.clients)
    }

    /// Returns the endpoint cache, for administrative invalidation.
    #[must_use]
    pub fn endpoints(&self) -> Arc<EndpointCache> {
        Arc::clone(&self.endpoints)
    }

    /// Stops the background tasks and flushes buffered token writes.
    pub async fn shutdown(self) {
        self.sweeper.stop().await;
        self.flush_timer.stop().await;
        tracing::info!("Token engine stopped");
    }
}
