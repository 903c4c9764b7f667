//! Endpoint storage for PostgreSQL.
//!
//! Protected endpoints live in the `endpoints` table, keyed by URL.
//! Inactive endpoints stay in the table; the engine treats them as
//! unregistered.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use keygate_auth::AuthResult;
use keygate_auth::storage::EndpointStorage;
use keygate_auth::types::Endpoint;

use crate::{PgPool, StorageResult, ensure_id};

type EndpointTuple = (String, String, String, bool);

fn endpoint_from_tuple(row: EndpointTuple) -> Endpoint {
    Endpoint {
        url: row.0,
        scope: row.1,
        method: row.2,
        active: row.3,
    }
}

fn endpoint_from_row(row: &PgRow) -> Result<Endpoint, sqlx_core::Error> {
    Ok(Endpoint {
        url: row.try_get("url")?,
        scope: row.try_get("scope")?,
        method: row.try_get("method")?,
        active: row.try_get("active")?,
    })
}

/// Arc-owning PostgreSQL endpoint storage.
#[derive(Clone)]
pub struct PostgresEndpointStore {
    pool: Arc<PgPool>,
}

impl PostgresEndpointStore {
    /// Create a new endpoint store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self) -> StorageResult<Vec<Endpoint>> {
        let rows = query(
            r#"
            SELECT url, scope, method, active
            FROM endpoints
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        // One malformed row must not block cache population.
        let mut endpoints = Vec::with_capacity(rows.len());
        for row in &rows {
            match endpoint_from_row(row) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(error) => {
                    tracing::warn!(%error, "Skipping malformed endpoint row");
                }
            }
        }
        Ok(endpoints)
    }

    async fn fetch_by_url(&self, url: &str) -> StorageResult<Option<Endpoint>> {
        ensure_id(url, "url")?;
        let row: Option<EndpointTuple> = query_as(
            r#"
            SELECT url, scope, method, active
            FROM endpoints
            WHERE url = $1
            "#,
        )
        .bind(url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(endpoint_from_tuple))
    }
}

#[async_trait]
impl EndpointStorage for PostgresEndpointStore {
    async fn load_all(&self) -> AuthResult<Vec<Endpoint>> {
        Ok(self.fetch_all().await?)
    }

    async fn find_by_url(&self, url: &str) -> AuthResult<Option<Endpoint>> {
        Ok(self.fetch_by_url(url).await?)
    }
}
