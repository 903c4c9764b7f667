//! Client storage for PostgreSQL.
//!
//! Registered machine clients live in the `clients` table with plain
//! typed columns. Rows that fail to decode during a bulk load are
//! logged and skipped so one bad row cannot block cache population.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use keygate_auth::AuthResult;
use keygate_auth::storage::ClientStorage;
use keygate_auth::types::Client;

use crate::{PgPool, StorageResult, ensure_id};

type ClientTuple = (String, String, Option<i64>, Vec<String>);

fn client_from_tuple(row: ClientTuple) -> Client {
    Client {
        client_id: row.0,
        secret_hash: row.1,
        access_token_lifetime: row.2,
        scopes: row.3,
    }
}

fn client_from_row(row: &PgRow) -> Result<Client, sqlx_core::Error> {
    Ok(Client {
        client_id: row.try_get("client_id")?,
        secret_hash: row.try_get("secret_hash")?,
        access_token_lifetime: row.try_get("access_token_lifetime")?,
        scopes: row.try_get("scopes")?,
    })
}

/// Arc-owning PostgreSQL client storage.
#[derive(Clone)]
pub struct PostgresClientStore {
    pool: Arc<PgPool>,
}

impl PostgresClientStore {
    /// Create a new client store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self) -> StorageResult<Vec<Client>> {
        let rows = query(
            r#"
            SELECT client_id, secret_hash, access_token_lifetime, scopes
            FROM clients
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        // One malformed row must not block cache population.
        let mut clients = Vec::with_capacity(rows.len());
        for row in &rows {
            match client_from_row(row) {
                Ok(client) => clients.push(client),
                Err(error) => {
                    tracing::warn!(%error, "Skipping malformed client row");
                }
            }
        }
        Ok(clients)
    }

    async fn fetch_by_client_id(&self, client_id: &str) -> StorageResult<Option<Client>> {
        ensure_id(client_id, "client_id")?;
        let row: Option<ClientTuple> = query_as(
            r#"
            SELECT client_id, secret_hash, access_token_lifetime, scopes
            FROM clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(client_from_tuple))
    }
}

#[async_trait]
impl ClientStorage for PostgresClientStore {
    async fn load_all(&self) -> AuthResult<Vec<Client>> {
        Ok(self.fetch_all().await?)
    }

    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.fetch_by_client_id(client_id).await?)
    }
}
