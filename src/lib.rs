// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Shape Sync
//!
//! A client for change-data-capture shape streams. A shape is a filtered
//! view of one table; the server delivers its initial contents followed by
//! every row change, interleaved with control signals.
//!
//! ## Features
//!
//! - **Message Classification**: Change vs control messages, decoded at the boundary
//! - **Resumable Offsets**: Totally ordered, persistable stream positions
//! - **Cursor Tracking**: Monotonic progress with explicit resync handling
//! - **Async Event Stream**: Ordered events, safe to drop at any await point
//! - **HTTP Long-Poll**: Offset/handle tracking, live mode, retries with backoff
//! - **Checkpoints**: Resume a shape across process restarts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use shape_sync::{HttpClient, HttpClientConfig, HttpTransport, ShapeRequest, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> shape_sync::Result<()> {
//!     let client = HttpClient::with_config(
//!         HttpClientConfig::builder().base_url("http://localhost:3000").build(),
//!     )?;
//!     let transport = HttpTransport::new(client, "/v1/shape", ShapeRequest::new("users"));
//!     let mut engine = SyncEngine::new(transport);
//!
//!     let mut events = Box::pin(engine.events());
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  raw JSON   ┌──────────────────────────────────────┐
//! │  Transport   │ ──────────▶ │              SyncEngine              │
//! │ HTTP/Memory  │ ◀────────── │  Message ─▶ derive_offset ─▶ Cursor  │
//! └──────────────┘   restart   └──────────────────┬───────────────────┘
//!                                                 │ SyncEvent
//!                              ┌──────────────────┴───────────────────┐
//!                              │   caller / Shape / StateManager      │
//!                              └──────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Message data model and classification
pub mod message;

/// Stream offsets
pub mod offset;

/// Stream cursor
pub mod cursor;

/// Sync engine
pub mod engine;

/// Transport interface
pub mod transport;

/// HTTP long-poll transport
pub mod http;

/// Materialized shape rows
pub mod shape;

/// Checkpoint persistence
pub mod state;

/// Session configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::SessionConfig;
pub use cursor::{CursorPhase, StreamCursor};
pub use engine::{SyncConfig, SyncEngine, SyncEvent, SyncStats};
pub use http::{HttpClient, HttpClientConfig, HttpTransport, ShapeRequest};
pub use message::{ChangeMessage, ControlKind, ControlMessage, Message, Operation};
pub use offset::{derive_offset, Offset};
pub use shape::Shape;
pub use state::StateManager;
pub use transport::{MemoryTransport, Transport};
