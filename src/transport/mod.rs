//! Transport module
//!
//! The transport delivers raw shape messages to the sync engine, in order,
//! in batches that mirror the chunks it receives. How it talks to the server
//! (long-poll, SSE, retries, live-mode negotiation) is its own business.
//!
//! # Overview
//!
//! The transport module provides:
//! - `Transport` - Interface the sync engine consumes
//! - `MemoryTransport` - Scripted transport for tests and replays
//!
//! The HTTP long-poll implementation lives in [`crate::http`].

mod memory;

pub use memory::MemoryTransport;

use crate::error::Result;
use crate::offset::Offset;
use crate::types::JsonValue;
use async_trait::async_trait;

/// Source of raw shape messages
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next batch of raw messages
    ///
    /// Returns `Ok(None)` once the stream has ended. Transient failures are
    /// retried internally; an `Err` ends the session.
    async fn next_batch(&mut self) -> Result<Option<Vec<JsonValue>>>;

    /// Restart consumption, from `from` or from scratch when `None`
    async fn restart(&mut self, from: Option<Offset>) -> Result<()>;

    /// Server-side identity of the shape being consumed, once known
    ///
    /// Checkpoints store it next to the offset; an offset is only valid
    /// within the shape it was issued for.
    fn handle(&self) -> Option<&str> {
        None
    }

    /// Continue a previous session from a checkpoint
    ///
    /// Returns `false` when the position cannot be used and the transport
    /// restarted from scratch instead.
    async fn resume(&mut self, from: Offset, _handle: Option<String>) -> Result<bool> {
        self.restart(Some(from)).await?;
        Ok(true)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn next_batch(&mut self) -> Result<Option<Vec<JsonValue>>> {
        (**self).next_batch().await
    }

    async fn restart(&mut self, from: Option<Offset>) -> Result<()> {
        (**self).restart(from).await
    }

    fn handle(&self) -> Option<&str> {
        (**self).handle()
    }

    async fn resume(&mut self, from: Offset, handle: Option<String>) -> Result<bool> {
        (**self).resume(from, handle).await
    }
}
