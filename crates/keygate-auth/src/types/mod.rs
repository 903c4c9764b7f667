//! Domain types for the token lifecycle engine.

pub mod client;
pub mod endpoint;
pub mod token;

pub use client::{Client, ClientValidationError};
pub use endpoint::Endpoint;
pub use token::{TOKEN_ID_LEN, Token, TokenKind};
