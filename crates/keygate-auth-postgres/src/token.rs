//! Issued token storage for PostgreSQL.
//!
//! Token state lives in the `tokens` table, keyed by the token id (`jti`
//! claim). Inserts arrive in batches inside one transaction; revocations
//! are single committed updates.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use keygate_auth::AuthResult;
use keygate_auth::storage::TokenStorage;
use keygate_auth::types::{Token, TokenKind};

use crate::{PgPool, StorageError, StorageResult, ensure_id};

type TokenTuple = (
    String,
    String,
    String,
    OffsetDateTime,
    OffsetDateTime,
    bool,
    Option<OffsetDateTime>,
);

fn token_from_tuple(row: TokenTuple) -> StorageResult<Token> {
    let kind = TokenKind::parse(&row.1)
        .ok_or_else(|| StorageError::invalid_row(format!("Unknown token kind: {}", row.1)))?;
    Ok(Token {
        token_id: row.0,
        kind,
        client_id: row.2,
        issued_at: row.3,
        expires_at: row.4,
        revoked: row.5,
        revoked_at: row.6,
    })
}

/// Arc-owning PostgreSQL token storage.
#[derive(Clone)]
pub struct PostgresTokenStore {
    pool: Arc<PgPool>,
}

impl PostgresTokenStore {
    /// Create a new token store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, token_id: &str) -> StorageResult<Option<Token>> {
        ensure_id(token_id, "token_id")?;
        let row: Option<TokenTuple> = query_as(
            r#"
            SELECT token_id, kind, client_id, issued_at, expires_at, revoked, revoked_at
            FROM tokens
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(token_from_tuple).transpose()
    }

    async fn write_batch(&self, tokens: &[Token]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for token in tokens {
            query(
                r#"
                INSERT INTO tokens
                    (token_id, kind, client_id, issued_at, expires_at, revoked, revoked_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&token.token_id)
            .bind(token.kind.as_str())
            .bind(&token.client_id)
            .bind(token.issued_at)
            .bind(token.expires_at)
            .bind(token.revoked)
            .bind(token.revoked_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn mark_revoked(
        &self,
        token_id: &str,
        revoked_at: OffsetDateTime,
    ) -> StorageResult<()> {
        ensure_id(token_id, "token_id")?;
        // Idempotent: re-revoking keeps the original timestamp.
        let result = query(
            r#"
            UPDATE tokens
            SET revoked = TRUE,
                revoked_at = COALESCE(revoked_at, $2)
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .bind(revoked_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("Token {token_id}")));
        }
        Ok(())
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        let result = query("DELETE FROM tokens WHERE expires_at < NOW()")
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStorage for PostgresTokenStore {
    async fn find_by_id(&self, token_id: &str) -> AuthResult<Option<Token>> {
        Ok(self.fetch_by_id(token_id).await?)
    }

    async fn insert_batch(&self, tokens: &[Token]) -> AuthResult<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        self.write_batch(tokens).await?;
        tracing::debug!(batch_size = tokens.len(), "Token batch persisted");
        Ok(())
    }

    async fn revoke(&self, token_id: &str, revoked_at: OffsetDateTime) -> AuthResult<()> {
        Ok(self.mark_revoked(token_id, revoked_at).await?)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let deleted = self.delete_expired().await?;
        if deleted > 0 {
            tracing::info!(deleted, "Expired token rows removed");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_tuple() {
        let now = OffsetDateTime::now_utc();
        let token = token_from_tuple((
            "t1".to_string(),
            "one_time".to_string(),
            "c1".to_string(),
            now,
            now + time::Duration::minutes(30),
            false,
            None,
        ))
        .unwrap();
        assert_eq!(token.kind, TokenKind::OneTime);
        assert!(!token.revoked);
    }

    #[test]
    fn test_token_from_tuple_rejects_unknown_kind() {
        let now = OffsetDateTime::now_utc();
        let err = token_from_tuple((
            "t1".to_string(),
            "refresh".to_string(),
            "c1".to_string(),
            now,
            now,
            false,
            None,
        ))
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRow(_)));
    }
}
