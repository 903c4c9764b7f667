//! Batch persistence pipeline for issued tokens.

pub mod writer;

pub use writer::{BatchWriterHandle, TokenBatchWriter};
