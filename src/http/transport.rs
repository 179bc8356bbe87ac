//! HTTP long-poll transport
//!
//! Each request asks for the chunk after the transport's own request
//! position. The server returns the next position in the `electric-offset`
//! header and the shape identity in `electric-handle`. Once a chunk ends with
//! an up-to-date signal the transport either switches to live long-polling or,
//! for one-shot syncs, ends the stream.

use super::client::HttpClient;
use crate::error::{Error, Result};
use crate::message::ControlKind;
use crate::offset::Offset;
use crate::transport::Transport;
use crate::types::JsonValue;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

/// Response header carrying the next request offset
pub const OFFSET_HEADER: &str = "electric-offset";

/// Response header carrying the shape handle
pub const HANDLE_HEADER: &str = "electric-handle";

/// Offset requesting a shape from its beginning
const INITIAL_OFFSET: &str = "-1";

/// Which shape to request
#[derive(Debug, Clone, Default)]
pub struct ShapeRequest {
    /// Root table of the shape
    pub table: String,
    /// Optional row filter
    pub where_clause: Option<String>,
    /// Columns to include (empty = all)
    pub columns: Vec<String>,
    /// Keep long-polling after catching up
    pub live: bool,
}

impl ShapeRequest {
    /// Create a request for a whole table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Set the row filter
    #[must_use]
    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    /// Set the column list
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Keep following the shape after catching up
    #[must_use]
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }
}

/// Shape stream transport over HTTP long-poll
#[derive(Debug)]
pub struct HttpTransport {
    client: HttpClient,
    path: String,
    request: ShapeRequest,
    offset: String,
    handle: Option<String>,
    live_mode: bool,
    done: bool,
}

impl HttpTransport {
    /// Create a transport for `request`, served at `path`
    pub fn new(client: HttpClient, path: impl Into<String>, request: ShapeRequest) -> Self {
        Self {
            client,
            path: path.into(),
            request,
            offset: INITIAL_OFFSET.to_string(),
            handle: None,
            live_mode: false,
            done: false,
        }
    }

    /// Current request position as sent to the server
    pub fn request_offset(&self) -> &str {
        &self.offset
    }

    /// Shape handle assigned by the server, once known
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Whether the transport is long-polling in live mode
    pub fn is_live(&self) -> bool {
        self.live_mode
    }

    fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("table".to_string(), self.request.table.clone()),
            ("offset".to_string(), self.offset.clone()),
        ];
        if let Some(handle) = &self.handle {
            query.push(("handle".to_string(), handle.clone()));
        }
        if let Some(clause) = &self.request.where_clause {
            query.push(("where".to_string(), clause.clone()));
        }
        if !self.request.columns.is_empty() {
            query.push(("columns".to_string(), self.request.columns.join(",")));
        }
        if self.live_mode {
            query.push(("live".to_string(), "true".to_string()));
        }
        query
    }

    fn reset_position(&mut self) {
        self.offset = INITIAL_OFFSET.to_string();
        self.handle = None;
        self.live_mode = false;
        self.done = false;
    }

    /// Move the request position to `from` within the shape `handle`
    ///
    /// The server only accepts a non-initial offset together with the handle
    /// it was issued under, so without one the position falls back to the
    /// start of the shape. Returns whether `from` was adopted.
    fn resume_at(&mut self, from: Option<Offset>, handle: Option<String>) -> bool {
        match (from, handle) {
            (Some(offset), Some(handle)) => {
                self.offset = offset.to_string();
                self.handle = Some(handle);
                self.live_mode = false;
                self.done = false;
                true
            }
            (Some(offset), None) => {
                warn!(%offset, "No shape handle for offset, requesting the shape from the start");
                self.reset_position();
                false
            }
            (None, _) => {
                self.reset_position();
                false
            }
        }
    }

    fn track_position(&mut self, response: &Response) -> Result<()> {
        let headers = response.headers();
        if let Some(handle) = headers.get(HANDLE_HEADER).and_then(|v| v.to_str().ok()) {
            self.handle = Some(handle.to_string());
        }
        let offset = headers
            .get(OFFSET_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::transport(format!("response has no {OFFSET_HEADER} header")))?;
        self.offset = offset.to_string();
        Ok(())
    }
}

/// Check whether a raw batch contains an up-to-date signal
fn ends_catch_up(batch: &[JsonValue]) -> bool {
    batch.iter().any(|value| {
        value
            .get("headers")
            .and_then(|h| h.get("control"))
            .and_then(JsonValue::as_str)
            == Some(ControlKind::UpToDate.as_str())
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn next_batch(&mut self) -> Result<Option<Vec<JsonValue>>> {
        if self.done {
            return Ok(None);
        }

        let query = self.query();
        debug!(offset = %self.offset, live = self.live_mode, "Requesting shape chunk");

        let response = match self.client.get(&self.path, &query).await {
            Ok(response) => response,
            Err(Error::HttpStatus { status: 409, .. }) => {
                warn!(table = %self.request.table, "Shape handle is stale, resync required");
                self.reset_position();
                return Ok(Some(vec![
                    json!({"headers": {"control": ControlKind::MustRefetch.as_str()}}),
                ]));
            }
            Err(e) => return Err(e),
        };

        self.track_position(&response)?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Some(Vec::new()));
        }

        let body = response.text().await?;
        let batch: Vec<JsonValue> = if body.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&body)
                .map_err(|e| Error::transport(format!("response body is not a JSON array: {e}")))?
        };

        if ends_catch_up(&batch) {
            if self.request.live {
                if !self.live_mode {
                    info!(table = %self.request.table, "Caught up, switching to live mode");
                }
                self.live_mode = true;
            } else {
                self.done = true;
            }
        }

        Ok(Some(batch))
    }

    async fn restart(&mut self, from: Option<Offset>) -> Result<()> {
        let handle = self.handle.clone();
        self.resume_at(from, handle);
        debug!(offset = %self.offset, "HTTP transport restarted");
        Ok(())
    }

    fn handle(&self) -> Option<&str> {
        HttpTransport::handle(self)
    }

    async fn resume(&mut self, from: Offset, handle: Option<String>) -> Result<bool> {
        let handle = handle.or_else(|| self.handle.clone());
        let resumed = self.resume_at(Some(from), handle);
        debug!(offset = %self.offset, resumed, "HTTP transport resumed");
        Ok(resumed)
    }
}
