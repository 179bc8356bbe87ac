//! Checkpoint module
//!
//! Persists the resume offset of each shape so that a later session can
//! pick up where the previous one stopped instead of resyncing.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Per-shape checkpoint records
//! - `StateManager` - File-based state persistence
//! - Atomic writes (temp file + rename)

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{ShapeState, State};
