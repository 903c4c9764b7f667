//! Asynchronous batch persistence of issued tokens.
//!
//! Token issuance must not pay for a durable insert. The writer buffers
//! freshly issued tokens in memory and persists them in batches, either
//! when the buffer reaches its size threshold or on a timer tick.
//!
//! The buffer lock is held only for the buffer swap, never across the
//! store write, so issuance throughput is never serialized behind store
//! latency. A size-triggered flush runs on its own spawned task, which
//! means it can overlap an in-flight timer flush: batches are each
//! transactional but may commit out of issuance order. Token ids are
//! unique per issuance, so no two batches ever carry the same row; the
//! missing cross-batch ordering is an accepted trade-off.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::storage::TokenStorage;
use crate::types::Token;

/// Buffers newly issued tokens and flushes them to the credential store
/// asynchronously.
pub struct TokenBatchWriter {
    buffer: Mutex<Vec<Token>>,
    storage: Arc<dyn TokenStorage>,
    max_batch_size: usize,
    write_timeout: Duration,
}

impl TokenBatchWriter {
    /// Creates a new writer flushing through the given storage.
    ///
    /// Every durable write is bounded by `write_timeout`; a write that
    /// exceeds it counts as a failed batch.
    #[must_use]
    pub fn new(
        storage: Arc<dyn TokenStorage>,
        max_batch_size: usize,
        write_timeout: Duration,
    ) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            storage,
            max_batch_size,
            write_timeout,
        }
    }

    /// Appends a token to the buffer.
    ///
    /// Tokens with an empty token id or client id are logged and dropped.
    /// When the buffer reaches the configured maximum size, the full
    /// batch is handed to a spawned flush immediately; the caller never
    /// waits on store I/O.
    pub async fn add(self: &Arc<Self>, token: Token) {
        if token.token_id.is_empty() || token.client_id.is_empty() {
            tracing::warn!(
                token_id = %token.token_id,
                client_id = %token.client_id,
                "Dropping token with missing identifiers"
            );
            return;
        }

        let batch = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(token);
            if buffer.len() >= self.max_batch_size {
                std::mem::take(&mut *buffer)
            } else {
                return;
            }
        };

        tracing::debug!(batch_size = batch.len(), "Buffer full, flushing");
        let storage = Arc::clone(&self.storage);
        let write_timeout = self.write_timeout;
        tokio::spawn(async move {
            write_batch(&*storage, batch, write_timeout).await;
        });
    }

    /// Flushes the current buffer contents, if any.
    ///
    /// The buffer is swapped out under its lock; the durable write runs
    /// after the lock is released.
    pub async fn flush(&self) {
        let batch = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return;
            }
            std::mem::take(&mut *buffer)
        };
        write_batch(&*self.storage, batch, self.write_timeout).await;
    }

    /// Returns the instantaneous buffer depth.
    pub async fn pending_count(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Starts the periodic timer flush.
    ///
    /// The timer guarantees bounded staleness even under low issuance
    /// rates. The returned handle must be stopped before process
    /// shutdown; stopping performs one final synchronous flush so no
    /// buffered token is lost.
    #[must_use]
    pub fn start(self: &Arc<Self>, interval: Duration) -> BatchWriterHandle {
        let writer = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the immediate first tick; there is nothing buffered yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        writer.flush().await;
                    }
                    _ = &mut shutdown_rx => {
                        writer.flush().await;
                        break;
                    }
                }
            }
            tracing::debug!("Token batch writer stopped");
        });

        BatchWriterHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle controlling the background flush task.
pub struct BatchWriterHandle {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl BatchWriterHandle {
    /// Signals the flush loop to perform one final flush and terminate,
    /// and waits until it has.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// Persists one batch inside a single transaction.
///
/// Partial failure aborts and rolls back the whole batch. Per current
/// behavior the failed batch is logged and dropped, not re-queued: a
/// store outage while batches are in flight loses those tokens. The next
/// timer flush retries only whatever has been buffered since.
async fn write_batch(storage: &dyn TokenStorage, batch: Vec<Token>, timeout: Duration) {
    let batch_size = batch.len();
    let issued_between = (
        batch.first().map(|t| t.issued_at),
        batch.last().map(|t| t.issued_at),
    );

    let outcome = match tokio::time::timeout(timeout, storage.insert_batch(&batch)).await {
        Ok(result) => result,
        Err(_) => Err(crate::error::AuthError::storage("Batch write timed out")),
    };

    match outcome {
        Ok(()) => {
            tracing::debug!(batch_size, "Persisted token batch");
        }
        Err(error) => {
            tracing::error!(
                batch_size,
                oldest = ?issued_between.0.unwrap_or_else(OffsetDateTime::now_utc),
                newest = ?issued_between.1.unwrap_or_else(OffsetDateTime::now_utc),
                %error,
                "Failed to persist token batch; batch dropped"
            );
        }
    }
}
