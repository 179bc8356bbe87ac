//! Message classification
//!
//! Change and control messages partition the message space: every message is
//! exactly one of the two.

use super::types::{ControlKind, Message};
use crate::types::JsonValue;

/// Check whether a raw JSON message carries a `key` field
///
/// This is the wire-level discriminant used when decoding.
pub fn has_change_key(value: &JsonValue) -> bool {
    value.get("key").is_some()
}

/// Check if a message is a change message
pub fn is_change_message(message: &Message) -> bool {
    matches!(message, Message::Change(_))
}

/// Check if a message is a control message
pub fn is_control_message(message: &Message) -> bool {
    !is_change_message(message)
}

/// Check if a message is the up-to-date control signal
pub fn is_up_to_date_message(message: &Message) -> bool {
    matches!(message, Message::Control(c) if c.headers.control == ControlKind::UpToDate)
}

/// Check if a message is the must-refetch control signal
pub fn is_must_refetch_message(message: &Message) -> bool {
    matches!(message, Message::Control(c) if c.headers.control == ControlKind::MustRefetch)
}
