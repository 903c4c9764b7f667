//! Client domain type.
//!
//! A client is a registered machine caller identified by a unique client
//! id and a shared secret. The secret is stored as a SHA-256 hash, never
//! plaintext.

use serde::{Deserialize, Serialize};

/// A registered machine client.
///
/// Immutable after load except through explicit administrative update;
/// cached indefinitely until explicitly invalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub client_id: String,

    /// SHA-256 hash of the shared secret (hex-encoded).
    pub secret_hash: String,

    /// Per-client access token lifetime in seconds, as recorded in the
    /// store. Issuance currently uses the fixed per-kind lifetimes; this
    /// field is carried for administrative tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<i64>,

    /// Scopes this client is allowed to request, in registration order.
    pub scopes: Vec<String>,
}

impl Client {
    /// Hash a secret value using SHA-256.
    ///
    /// Used both when registering clients and when verifying presented
    /// secrets.
    #[must_use]
    pub fn hash_secret(secret: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verifies a presented plaintext secret against the stored hash.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        Self::hash_secret(secret) == self.secret_hash
    }

    /// Returns `true` if the client is allowed the given scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id or secret hash is empty.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::MissingClientId);
        }
        if self.secret_hash.is_empty() {
            return Err(ClientValidationError::MissingSecret);
        }
        Ok(())
    }
}

/// Errors that can occur while validating a client record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientValidationError {
    /// The client id is empty.
    #[error("Client id must not be empty")]
    MissingClientId,

    /// The secret hash is empty.
    #[error("Client secret must not be empty")]
    MissingSecret,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            client_id: "c1".to_string(),
            secret_hash: Client::hash_secret("s3cret"),
            access_token_lifetime: None,
            scopes: vec!["read:x".to_string(), "write:x".to_string()],
        }
    }

    #[test]
    fn test_verify_secret() {
        let client = client();
        assert!(client.verify_secret("s3cret"));
        assert!(!client.verify_secret("wrong"));
        assert!(!client.verify_secret(""));
    }

    #[test]
    fn test_hash_secret_is_stable_hex() {
        let hash = Client::hash_secret("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, Client::hash_secret("abc"));
        assert_ne!(hash, Client::hash_secret("abd"));
    }

    #[test]
    fn test_has_scope() {
        let client = client();
        assert!(client.has_scope("read:x"));
        assert!(!client.has_scope("admin"));
    }

    #[test]
    fn test_validate() {
        assert!(client().validate().is_ok());

        let mut bad = client();
        bad.client_id.clear();
        assert_eq!(
            bad.validate().unwrap_err(),
            ClientValidationError::MissingClientId
        );

        let mut bad = client();
        bad.secret_hash.clear();
        assert_eq!(
            bad.validate().unwrap_err(),
            ClientValidationError::MissingSecret
        );
    }
}
