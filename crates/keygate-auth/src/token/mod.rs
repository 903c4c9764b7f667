//! Token signing, verification, and lifecycle orchestration.

pub mod jwt;
pub mod service;

pub use jwt::{AccessTokenClaims, JwtError, JwtService, SigningAlgorithm};
pub use service::{IssuedToken, TokenService, revoke_by_id};
