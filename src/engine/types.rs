//! Engine types
//!
//! Output events and configuration for the sync engine.

use crate::message::{ChangeMessage, ControlKind};
use crate::offset::Offset;
use serde::Serialize;

/// An event emitted to the caller during sync
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A row-level change
    RowChange {
        /// The change itself
        change: ChangeMessage,
        /// Cursor offset at the time the change was received
        offset: Option<Offset>,
    },
    /// The client has caught up with the source
    UpToDate {
        /// Cursor offset after applying the signal
        offset: Option<Offset>,
    },
    /// Local state is invalid; consumption restarts from scratch
    MustResync,
    /// A control message of a kind this client does not interpret
    Control {
        /// The control discriminator
        control: ControlKind,
    },
}

impl SyncEvent {
    /// Create a row change event
    pub fn row_change(change: ChangeMessage, offset: Option<Offset>) -> Self {
        Self::RowChange { change, offset }
    }

    /// Create an up-to-date event
    pub fn up_to_date(offset: Option<Offset>) -> Self {
        Self::UpToDate { offset }
    }

    /// Check if this is a row change
    pub fn is_row_change(&self) -> bool {
        matches!(self, Self::RowChange { .. })
    }

    /// Check if this is an up-to-date event
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Self::UpToDate { .. })
    }

    /// Check if this is a must-resync event
    pub fn is_must_resync(&self) -> bool {
        matches!(self, Self::MustResync)
    }
}

/// Configuration for a sync session
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Emit `SyncEvent::Control` for unknown control kinds
    pub surface_unknown_controls: bool,
    /// Restart the transport from scratch after a must-refetch
    pub restart_on_resync: bool,
    /// Maximum events to emit (0 = unlimited)
    pub max_events: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            surface_unknown_controls: false,
            restart_on_resync: true,
            max_events: 0,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface unknown control kinds as events
    #[must_use]
    pub fn with_unknown_controls(mut self, surface: bool) -> Self {
        self.surface_unknown_controls = surface;
        self
    }

    /// Restart automatically after a must-refetch
    #[must_use]
    pub fn with_restart_on_resync(mut self, restart: bool) -> Self {
        self.restart_on_resync = restart;
        self
    }

    /// Set max events
    #[must_use]
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }
}

/// Statistics from a sync session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Change messages delivered
    pub changes: usize,
    /// Up-to-date signals applied
    pub up_to_date: usize,
    /// Must-refetch signals applied
    pub resyncs: usize,
    /// Malformed messages rejected
    pub rejected: usize,
    /// Buffered messages dropped by a resync
    pub discarded: usize,
    /// Unknown control messages seen
    pub unknown_controls: usize,
    /// Batches received from the transport
    pub batches: usize,
    /// Events emitted
    pub events: usize,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }
}
