//! State manager implementation
//!
//! Keeps the checkpoint state in memory and writes the whole file after
//! every change. Writes go to a temp file that is renamed over the old one,
//! so a crash mid-write never leaves a truncated checkpoint behind.

use super::types::{ShapeState, State};
use crate::error::{Error, Result};
use crate::offset::Offset;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared handle to a checkpoint store
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Checkpoint file, `None` when nothing is persisted
    path: Option<PathBuf>,
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Create a store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// Open a checkpoint file, starting empty when it does not exist yet
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
        } else {
            State::new()
        };

        Ok(Self {
            path: Some(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        Self::render(&*state)
    }

    /// Stored checkpoint of a shape
    pub async fn checkpoint(&self, shape: &str) -> Option<ShapeState> {
        self.state.read().await.get_shape(shape).cloned()
    }

    /// Stored offset of a shape
    pub async fn get_offset(&self, shape: &str) -> Option<Offset> {
        self.state.read().await.get_offset(shape)
    }

    /// Record the resume position of a shape
    pub async fn set_position(
        &self,
        shape: &str,
        offset: Offset,
        handle: Option<String>,
    ) -> Result<()> {
        self.update(|state| state.set_position(shape, offset, handle))
            .await
    }

    /// Forget the checkpoint of a single shape
    pub async fn clear_shape(&self, shape: &str) -> Result<()> {
        self.update(|state| {
            state.shapes.remove(shape);
        })
        .await
    }

    /// Forget every checkpoint
    pub async fn clear(&self) -> Result<()> {
        self.update(|state| *state = State::new()).await
    }

    /// Apply a change and persist the result
    ///
    /// The write lock is held across the file write so concurrent updates
    /// reach the disk in the order they were applied.
    async fn update(&self, change: impl FnOnce(&mut State)) -> Result<()> {
        let mut state = self.state.write().await;
        change(&mut *state);

        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = Self::render(&*state)?;

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!(path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    fn render(state: &State) -> Result<String> {
        serde_json::to_string_pretty(state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }
}
