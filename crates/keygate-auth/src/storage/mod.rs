//! Storage traits for the credential store.
//!
//! This module defines the abstract surface the engine consumes from the
//! durable store:
//!
//! - Client registrations
//! - Endpoint scope mappings
//! - Token state (inserts, revocations)
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `keygate-auth-postgres` - PostgreSQL storage backend

pub mod client;
pub mod endpoint;
pub mod token;

pub use client::ClientStorage;
pub use endpoint::EndpointStorage;
pub use token::TokenStorage;
