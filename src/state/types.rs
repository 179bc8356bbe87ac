//! Checkpoint types
//!
//! These types are serialized to JSON and persisted between runs.

use crate::offset::Offset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete checkpoint state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Per-shape state
    #[serde(default)]
    pub shapes: HashMap<String, ShapeState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a shape
    pub fn get_shape(&self, shape: &str) -> Option<&ShapeState> {
        self.shapes.get(shape)
    }

    /// Get the stored offset for a shape
    pub fn get_offset(&self, shape: &str) -> Option<Offset> {
        self.get_shape(shape)?.offset
    }

    /// Record a resume position for a shape
    ///
    /// The handle names the server-side shape the offset belongs to; an
    /// offset is meaningless to the server without it.
    pub fn set_position(&mut self, shape: &str, offset: Offset, handle: Option<String>) {
        let entry = self.shapes.entry(shape.to_string()).or_default();
        entry.offset = Some(offset);
        entry.handle = handle;
        entry.updated_at = Some(Utc::now());
    }
}

/// Checkpoint of a single shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeState {
    /// Last adopted resume offset
    #[serde(default)]
    pub offset: Option<Offset>,

    /// Server shape handle the offset was issued under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// When the offset was last written
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
