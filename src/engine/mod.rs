//! Sync engine module
//!
//! Consumes a transport's ordered message sequence and turns it into an
//! ordered sequence of [`SyncEvent`]s, keeping the [`StreamCursor`] current.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Drives one session over a transport
//! - `SyncConfig` - Configuration for a session
//! - `SyncEvent` - Events handed to the caller (RowChange, UpToDate, MustResync)
//!
//! # Ordering
//!
//! Events are emitted in exactly the order their messages arrived. Each
//! message is processed synchronously by [`SyncEngine::process`]; the event
//! stream only suspends while waiting on the transport, between messages.
//! Dropping the stream therefore never leaves the cursor half-updated.

mod types;

pub use types::{SyncConfig, SyncEvent, SyncStats};

use crate::cursor::StreamCursor;
use crate::error::{Error, Result};
use crate::message::{ControlKind, Message};
use crate::offset::{derive_offset, Offset};
use crate::state::StateManager;
use crate::transport::Transport;
use crate::types::JsonValue;
use futures::Stream;
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

/// Checkpoint write owed to the state manager
#[derive(Debug, Clone, Copy)]
enum CheckpointOp {
    Save(Offset),
    Clear,
}

/// Sync engine for one shape stream
pub struct SyncEngine<T: Transport> {
    /// Message source
    transport: T,
    /// Resume position
    cursor: StreamCursor,
    /// Session configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
    /// Checkpoint store and shape name
    checkpoint: Option<(StateManager, String)>,
    /// Messages of the current batch not yet processed
    pending: VecDeque<JsonValue>,
    /// Checkpoint write deferred to the next suspension point
    owed: Option<CheckpointOp>,
    /// Set once the session has ended
    finished: bool,
}

impl<T: Transport> SyncEngine<T> {
    /// Create a new sync engine for a fresh session
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cursor: StreamCursor::new(),
            config: SyncConfig::default(),
            stats: SyncStats::default(),
            checkpoint: None,
            pending: VecDeque::new(),
            owed: None,
            finished: false,
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an existing cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: StreamCursor) -> Self {
        self.cursor = cursor;
        self
    }

    /// Persist adopted offsets under `shape`
    #[must_use]
    pub fn with_checkpoint(mut self, state: StateManager, shape: impl Into<String>) -> Self {
        self.checkpoint = Some((state, shape.into()));
        self
    }

    /// Get the cursor
    pub fn cursor(&self) -> &StreamCursor {
        &self.cursor
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether the session has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Resume from the stored checkpoint, if there is one
    ///
    /// Hands the stored offset and shape handle to the transport and returns
    /// the offset once the transport has accepted it. A checkpoint the
    /// transport cannot use leaves the session starting from scratch.
    pub async fn resume(&mut self) -> Result<Option<Offset>> {
        let Some((state, shape)) = &self.checkpoint else {
            return Ok(None);
        };
        let Some(saved) = state.checkpoint(shape).await else {
            debug!(shape = %shape, "No checkpoint, starting from scratch");
            return Ok(None);
        };
        let Some(offset) = saved.offset else {
            return Ok(None);
        };

        self.pending.clear();
        if !self.transport.resume(offset, saved.handle).await? {
            warn!(shape = %shape, %offset, "Checkpoint cannot be resumed, starting from scratch");
            self.cursor = StreamCursor::new();
            return Ok(None);
        }

        info!(shape = %shape, %offset, "Resuming from checkpoint");
        self.cursor = StreamCursor::resume(offset);
        Ok(Some(offset))
    }

    /// Process a single raw message
    ///
    /// Returns the event to emit, if any. Malformed messages are rejected
    /// with a recoverable error; an offset regression is session-fatal.
    pub fn process(&mut self, raw: &JsonValue) -> Result<Option<SyncEvent>> {
        let message = Message::from_value(raw).inspect_err(|e| {
            self.stats.rejected += 1;
            warn!("Rejected message: {e}");
        })?;

        match message {
            Message::Change(change) => {
                debug!(key = %change.key, operation = ?change.operation, "Change");
                self.stats.changes += 1;
                Ok(Some(SyncEvent::row_change(change, self.cursor.offset())))
            }
            Message::Control(control) => match &control.headers.control {
                ControlKind::UpToDate => {
                    let derived = derive_offset(&control).inspect_err(|e| {
                        self.stats.rejected += 1;
                        warn!("Rejected up-to-date message: {e}");
                    })?;
                    self.cursor.mark_up_to_date(derived)?;
                    self.stats.up_to_date += 1;
                    if let Some(offset) = derived {
                        self.owed = Some(CheckpointOp::Save(offset));
                    }
                    Ok(Some(SyncEvent::up_to_date(self.cursor.offset())))
                }
                ControlKind::MustRefetch => {
                    self.cursor.reset();
                    self.stats.resyncs += 1;
                    self.stats.discarded += self.pending.len();
                    if !self.pending.is_empty() {
                        debug!(count = self.pending.len(), "Discarding buffered messages");
                    }
                    self.pending.clear();
                    self.owed = Some(CheckpointOp::Clear);
                    Ok(Some(SyncEvent::MustResync))
                }
                ControlKind::Unknown(kind) => {
                    self.stats.unknown_controls += 1;
                    debug!(control = %kind, "Unknown control message");
                    if self.config.surface_unknown_controls {
                        Ok(Some(SyncEvent::Control {
                            control: control.headers.control.clone(),
                        }))
                    } else {
                        Ok(None)
                    }
                }
            },
        }
    }

    /// Wait for and return the next event
    ///
    /// Returns `None` once the session has ended. After a session-fatal
    /// error has been returned, every further call returns `None`.
    pub async fn next_event(&mut self) -> Option<Result<SyncEvent>> {
        loop {
            self.flush_checkpoint().await;

            if self.finished {
                return None;
            }

            if self.config.max_events > 0 && self.stats.events >= self.config.max_events {
                debug!(max = self.config.max_events, "Event limit reached");
                self.finished = true;
                return None;
            }

            if self.cursor.must_resync() {
                if !self.config.restart_on_resync {
                    self.finished = true;
                    return None;
                }
                if let Err(e) = self.transport.restart(None).await {
                    return Some(Err(self.fail(e)));
                }
                self.cursor.acknowledge_resync();
                info!("Transport restarted from scratch");
            }

            let Some(raw) = self.pending.pop_front() else {
                match self.transport.next_batch().await {
                    Ok(Some(batch)) => {
                        self.stats.batches += 1;
                        debug!(size = batch.len(), "Received batch");
                        self.pending.extend(batch);
                        continue;
                    }
                    Ok(None) => {
                        info!("Transport ended");
                        self.finished = true;
                        return None;
                    }
                    Err(e) => return Some(Err(self.fail(e))),
                }
            };

            match self.process(&raw) {
                Ok(Some(event)) => {
                    self.stats.events += 1;
                    return Some(Ok(event));
                }
                Ok(None) => {}
                Err(e) if e.is_session_fatal() => return Some(Err(self.fail(e))),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Lazy stream of events for this session
    ///
    /// The engine stays borrowed for as long as the stream lives; once the
    /// stream is dropped the cursor and stats can be inspected again.
    pub fn events(&mut self) -> impl Stream<Item = Result<SyncEvent>> + '_ {
        futures::stream::unfold(self, |engine| async move {
            let item = engine.next_event().await?;
            Some((item, engine))
        })
    }

    /// End the session with a fatal error
    fn fail(&mut self, e: Error) -> Error {
        error!("Session failed: {e}");
        self.finished = true;
        self.pending.clear();
        e
    }

    /// Apply any deferred checkpoint write
    ///
    /// Runs at the start of every `next_event` call; call it directly when
    /// stopping consumption early. The write stays owed until it succeeds,
    /// so a failed or interrupted write is retried on the next call. Failures
    /// are logged, never returned.
    pub async fn flush_checkpoint(&mut self) {
        let Some(op) = self.owed else {
            return;
        };
        let Some((state, shape)) = &self.checkpoint else {
            self.owed = None;
            return;
        };

        let result = match op {
            CheckpointOp::Save(offset) => {
                let handle = self.transport.handle().map(str::to_string);
                state.set_position(shape, offset, handle).await
            }
            CheckpointOp::Clear => state.clear_shape(shape).await,
        };
        match result {
            Ok(()) => self.owed = None,
            Err(e) => warn!(shape = %shape, "Checkpoint failed: {e}"),
        }
    }
}
