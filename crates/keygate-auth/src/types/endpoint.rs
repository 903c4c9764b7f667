//! Endpoint domain type.

use serde::{Deserialize, Serialize};

/// A protected endpoint and the scope it requires.
///
/// Read-only from the engine's perspective; endpoints are loaded in bulk
/// at startup and refreshed only by explicit cache population calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint URL (unique key).
    pub url: String,

    /// Scope a token must carry to access this endpoint.
    pub scope: String,

    /// HTTP method the endpoint serves.
    pub method: String,

    /// Whether the endpoint is active. Inactive endpoints are treated as
    /// unknown by authorization.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_roundtrip() {
        let endpoint = Endpoint {
            url: "/api/v1/reports".to_string(),
            scope: "read:reports".to_string(),
            method: "GET".to_string(),
            active: true,
        };
        let json = serde_json::to_string(&endpoint).unwrap();
        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, endpoint);
    }
}
