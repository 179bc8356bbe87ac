//! Stream cursor
//!
//! Tracks how far a session has consumed a shape stream: the current resume
//! [`Offset`], whether the client has caught up with the source, and whether
//! the server has demanded a full resync.
//!
//! The cursor is owned and mutated by a single [`SyncEngine`]; every mutation
//! either completes fully or leaves the cursor untouched.
//!
//! [`SyncEngine`]: crate::engine::SyncEngine

use crate::error::{Error, Result};
use crate::offset::Offset;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Lifecycle phase of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPhase {
    /// Fresh session, nothing known yet
    Initializing,
    /// Catching up from a known offset
    Syncing,
    /// Caught up with the source
    Live,
}

/// Resume position and catch-up state of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCursor {
    offset: Option<Offset>,
    up_to_date: bool,
    must_resync: bool,
}

impl StreamCursor {
    /// Create a cursor for a fresh session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cursor for a session resumed from a persisted offset
    pub fn resume(offset: Offset) -> Self {
        Self {
            offset: Some(offset),
            ..Self::default()
        }
    }

    /// Current resume offset, if any
    pub fn offset(&self) -> Option<Offset> {
        self.offset
    }

    /// Whether the client has caught up with the source
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    /// Whether a must-refetch is pending acknowledgement
    pub fn must_resync(&self) -> bool {
        self.must_resync
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> CursorPhase {
        if self.up_to_date {
            CursorPhase::Live
        } else if self.offset.is_some() {
            CursorPhase::Syncing
        } else {
            CursorPhase::Initializing
        }
    }

    /// Apply an up-to-date signal
    ///
    /// Adopts `offset` when given. A derived offset lower than the current
    /// one is a protocol violation; the cursor is left unchanged.
    pub fn mark_up_to_date(&mut self, offset: Option<Offset>) -> Result<()> {
        if let Some(received) = offset {
            if let Some(current) = self.offset {
                if received < current {
                    return Err(Error::regression(current, received));
                }
            }
        }

        let was = self.phase();
        if offset.is_some() {
            self.offset = offset;
        }
        self.up_to_date = true;

        if was != CursorPhase::Live {
            info!(offset = ?self.offset, "Cursor is live");
        } else {
            debug!(offset = ?self.offset, "Cursor still live");
        }
        Ok(())
    }

    /// Apply a must-refetch signal, from any phase
    pub fn reset(&mut self) {
        info!(previous = ?self.offset, "Cursor reset, full resync required");
        self.offset = None;
        self.up_to_date = false;
        self.must_resync = true;
    }

    /// Clear the pending resync once the transport has restarted
    pub fn acknowledge_resync(&mut self) {
        self.must_resync = false;
    }
}
