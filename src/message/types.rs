//! Message types
//!
//! Data model for the two kinds of message a shape stream carries.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Row};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Control discriminator signalling that the client has caught up
pub const UP_TO_DATE: &str = "up-to-date";

/// Control discriminator signalling that the client must start over
pub const MUST_REFETCH: &str = "must-refetch";

/// Row mutation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A row-level change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeMessage {
    /// Stable row identity
    pub key: String,
    /// Row values after the change (primary key columns only for deletes)
    pub value: Row,
    /// Prior values, when the source sends them for updates and deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Row>,
    /// Mutation kind
    pub operation: Operation,
}

/// Kind of a control message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// All currently available changes have been delivered
    UpToDate,
    /// The client state is invalid; a full resync is required
    MustRefetch,
    /// A kind this client does not know about
    Unknown(String),
}

impl ControlKind {
    /// Wire value of this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::UpToDate => UP_TO_DATE,
            Self::MustRefetch => MUST_REFETCH,
            Self::Unknown(kind) => kind,
        }
    }
}

impl From<&str> for ControlKind {
    fn from(value: &str) -> Self {
        match value {
            UP_TO_DATE => Self::UpToDate,
            MUST_REFETCH => Self::MustRefetch,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ControlKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Headers of a control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlHeaders {
    /// Discriminator
    pub control: ControlKind,
    /// Source sequence marker, only sent in live mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_last_seen_lsn: Option<String>,
}

/// A protocol signalling message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    pub headers: ControlHeaders,
}

impl ControlMessage {
    /// Build a control message of the given kind with no sequence marker
    pub fn new(control: ControlKind) -> Self {
        Self {
            headers: ControlHeaders {
                control,
                global_last_seen_lsn: None,
            },
        }
    }

    /// Attach a sequence marker
    #[must_use]
    pub fn with_lsn(mut self, lsn: impl Into<String>) -> Self {
        self.headers.global_last_seen_lsn = Some(lsn.into());
        self
    }
}

/// A message on a shape stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Change(ChangeMessage),
    Control(ControlMessage),
}

impl Message {
    /// Convert a raw JSON message into its tagged form
    ///
    /// The presence of a `key` field is the only discriminant: anything with
    /// a key must be a well-formed change, anything without one must be a
    /// well-formed control message.
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed(format!("expected a JSON object, got {value}")))?;

        if super::has_change_key(value) {
            decode_change(object).map(Self::Change)
        } else {
            decode_control(object).map(Self::Control)
        }
    }
}

fn decode_change(object: &Row) -> Result<ChangeMessage> {
    let key = object
        .get("key")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::malformed("change message key must be a string"))?
        .to_string();

    let operation = object
        .get("headers")
        .and_then(|h| h.get("operation"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::malformed(format!("change message '{key}' has no operation")))?;
    let operation = Operation::parse(operation).ok_or_else(|| {
        Error::malformed(format!(
            "change message '{key}' has unknown operation '{operation}'"
        ))
    })?;

    let value = match object.get("value") {
        None | Some(JsonValue::Null) => Row::new(),
        Some(JsonValue::Object(row)) => row.clone(),
        Some(other) => {
            return Err(Error::malformed(format!(
                "change message '{key}' value must be an object, got {other}"
            )))
        }
    };

    let old_value = match object.get("old_value") {
        Some(JsonValue::Object(row)) => Some(row.clone()),
        _ => None,
    };

    Ok(ChangeMessage {
        key,
        value,
        old_value,
        operation,
    })
}

fn decode_control(object: &Row) -> Result<ControlMessage> {
    let headers = object
        .get("headers")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| Error::malformed("message has neither a key nor a headers object"))?;

    let control = headers
        .get("control")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::malformed("control message has no control header"))?;

    let global_last_seen_lsn = match headers.get("global_last_seen_lsn") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(lsn)) => Some(lsn.clone()),
        Some(JsonValue::Number(n)) if n.is_u64() => Some(n.to_string()),
        Some(other) => {
            return Err(Error::malformed(format!(
                "global_last_seen_lsn must be a string or unsigned integer, got {other}"
            )))
        }
    };

    Ok(ControlMessage {
        headers: ControlHeaders {
            control: ControlKind::from(control),
            global_last_seen_lsn,
        },
    })
}
