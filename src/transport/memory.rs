//! In-memory transport
//!
//! Replays scripted batches. Each call to `restart` switches to the next
//! queued session script, or to an empty stream when none is left.

use super::Transport;
use crate::error::{Error, Result};
use crate::offset::Offset;
use crate::types::JsonValue;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

/// Scripted transport
#[derive(Debug, Default)]
pub struct MemoryTransport {
    batches: VecDeque<Vec<JsonValue>>,
    sessions: VecDeque<Vec<Vec<JsonValue>>>,
    restarts: Vec<Option<Offset>>,
    failure: Option<String>,
    handle: Option<String>,
}

impl MemoryTransport {
    /// Create a transport that yields the given batches
    pub fn new(batches: Vec<Vec<JsonValue>>) -> Self {
        Self {
            batches: batches.into(),
            ..Self::default()
        }
    }

    /// Create a transport that yields every message in a single batch
    pub fn single_batch(messages: Vec<JsonValue>) -> Self {
        Self::new(vec![messages])
    }

    /// Read a JSON-lines file, one raw message per line
    ///
    /// Blank lines are skipped. Lines that are not valid JSON are passed
    /// through as strings so the engine reports them as malformed.
    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let mut messages = Vec::new();
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str(line)
                .unwrap_or_else(|_| JsonValue::String(line.to_string()));
            messages.push(value);
        }

        Ok(Self::single_batch(messages))
    }

    /// Queue the batches served after the next restart
    #[must_use]
    pub fn then_session(mut self, batches: Vec<Vec<JsonValue>>) -> Self {
        self.sessions.push_back(batches);
        self
    }

    /// Fail with a transport error once the scripted batches run out
    #[must_use]
    pub fn fail_at_end(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Report `handle` as the shape handle
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Offsets passed to `restart`, in call order
    pub fn restarts(&self) -> &[Option<Offset>] {
        &self.restarts
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<JsonValue>>> {
        match self.batches.pop_front() {
            Some(batch) => Ok(Some(batch)),
            None => match self.failure.take() {
                Some(message) => Err(Error::transport(message)),
                None => Ok(None),
            },
        }
    }

    async fn restart(&mut self, from: Option<Offset>) -> Result<()> {
        debug!(?from, "Memory transport restarted");
        self.restarts.push(from);
        self.batches = self.sessions.pop_front().unwrap_or_default().into();
        Ok(())
    }

    fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }
}
