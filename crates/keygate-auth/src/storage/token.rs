//! Token storage trait.
//!
//! Defines the durable side of the token state split: inserts arrive in
//! batches from the batch writer, revocations are written synchronously
//! by the engine.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::Token;

/// Storage operations for issued tokens.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Finds a token's durable state by its identifier.
    ///
    /// Returns `None` if no row exists for the id. A row may legitimately
    /// be missing for a freshly issued token whose batch has not flushed
    /// yet; callers treat that as "unknown token".
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or the storage operation fails.
    async fn find_by_id(&self, token_id: &str) -> AuthResult<Option<Token>>;

    /// Inserts a batch of freshly issued tokens.
    ///
    /// The whole batch is written inside one transaction; if any row
    /// fails, the transaction rolls back and no row from the batch is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails. The error carries
    /// enough context for the caller to log the loss.
    async fn insert_batch(&self, tokens: &[Token]) -> AuthResult<()>;

    /// Marks a token as revoked.
    ///
    /// The update is transactional: the revoked flag and revocation
    /// timestamp are committed before this method returns. Revoking an
    /// already-revoked token succeeds and leaves the original revocation
    /// timestamp in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::NotFound`] if no row exists for the
    /// id, or a storage error if the transaction fails.
    async fn revoke(&self, token_id: &str, revoked_at: OffsetDateTime) -> AuthResult<()>;

    /// Deletes token rows whose own expiry has passed.
    ///
    /// Expired tokens can no longer validate regardless of their revoked
    /// state, so their rows are only occupying space.
    ///
    /// # Returns
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
