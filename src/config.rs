//! Session configuration
//!
//! A sync session can be described in a YAML file:
//!
//! ```yaml
//! source:
//!   url: http://localhost:3000
//!   table: users
//!   where: "active = true"
//!   columns: [id, name]
//!   live: true
//! sync:
//!   surface_unknown_controls: false
//!   restart_on_resync: true
//! http:
//!   timeout_secs: 60
//!   max_retries: 5
//!   backoff: exponential
//! state:
//!   path: ./checkpoint.json
//!   shape: users
//! ```

use crate::engine::SyncConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, ShapeRequest};
use crate::types::{BackoffType, OptionStringExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the shape is served
    #[serde(default)]
    pub source: SourceConfig,

    /// Engine behaviour
    #[serde(default)]
    pub sync: SyncSection,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSection,

    /// Checkpoint settings
    #[serde(default)]
    pub state: StateSection,
}

impl SessionConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check that everything needed to open an HTTP session is present
    pub fn validate(&self) -> Result<()> {
        let url = self
            .source
            .url
            .as_deref()
            .ok_or_else(|| Error::missing_field("source.url"))?;
        url::Url::parse(url)?;

        if self.source.table.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::missing_field("source.table"));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::config("http.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Shape name used as the checkpoint key
    pub fn shape_name(&self) -> String {
        self.state
            .shape
            .clone()
            .none_if_empty()
            .or_else(|| self.source.table.clone())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Engine configuration
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_unknown_controls(self.sync.surface_unknown_controls)
            .with_restart_on_resync(self.sync.restart_on_resync)
            .with_max_events(self.sync.max_events)
    }

    /// HTTP client configuration
    pub fn http_config(&self) -> Result<HttpClientConfig> {
        let url = self
            .source
            .url
            .clone()
            .ok_or_else(|| Error::missing_field("source.url"))?;
        Ok(HttpClientConfig::builder()
            .base_url(url)
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .max_retries(self.http.max_retries)
            .backoff(
                self.http.backoff,
                Duration::from_millis(self.http.initial_backoff_ms),
                Duration::from_millis(self.http.max_backoff_ms),
            )
            .build())
    }

    /// Shape request
    pub fn shape_request(&self) -> Result<ShapeRequest> {
        let table = self
            .source
            .table
            .clone()
            .ok_or_else(|| Error::missing_field("source.table"))?;
        let mut request = ShapeRequest::new(table)
            .with_columns(self.source.columns.clone())
            .live(self.source.live);
        if let Some(clause) = self.source.where_clause.clone().none_if_empty() {
            request = request.with_where(clause);
        }
        Ok(request)
    }
}

/// Shape source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the sync service
    #[serde(default)]
    pub url: Option<String>,

    /// Path of the shape endpoint
    #[serde(default = "default_path")]
    pub path: String,

    /// Root table
    #[serde(default)]
    pub table: Option<String>,

    /// Row filter
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,

    /// Columns to include
    #[serde(default)]
    pub columns: Vec<String>,

    /// Follow the shape after catching up
    #[serde(default)]
    pub live: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: default_path(),
            table: None,
            where_clause: None,
            columns: Vec::new(),
            live: false,
        }
    }
}

fn default_path() -> String {
    "/v1/shape".to_string()
}

/// Engine section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default)]
    pub surface_unknown_controls: bool,

    #[serde(default = "default_true")]
    pub restart_on_resync: bool,

    #[serde(default)]
    pub max_events: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            surface_unknown_controls: false,
            restart_on_resync: true,
            max_events: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

/// HTTP section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffType,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    30_000
}

/// Checkpoint section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSection {
    /// Checkpoint file (no persistence when absent)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Checkpoint key (defaults to the table name)
    #[serde(default)]
    pub shape: Option<String>,
}
