//! In-memory caching layer.
//!
//! Three caches with independent exclusion primitives (no global lock):
//!
//! - [`ClientCache`] - client id to credential record, read-through
//! - [`EndpointCache`] - endpoint URL to required scope, read-through
//! - [`TokenStateCache`] - token id to revocation/kind state, TTL-bounded

pub mod client;
pub mod endpoint;
pub mod token_state;

pub use client::ClientCache;
pub use endpoint::EndpointCache;
pub use token_state::{SweeperHandle, TokenStateCache};
