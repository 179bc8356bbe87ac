//! Shape stream messages
//!
//! Raw JSON messages from a transport are converted once, at the boundary,
//! into the tagged [`Message`] enum. Everything downstream matches on the
//! variant instead of re-inspecting the JSON.
//!
//! # Overview
//!
//! The message module provides:
//! - `Message` - Change or control message
//! - `ChangeMessage` / `ControlMessage` - The two variants
//! - Classification predicates used by the sync engine

mod classify;
mod types;

pub use classify::{
    has_change_key, is_change_message, is_control_message, is_must_refetch_message,
    is_up_to_date_message,
};
pub use types::{ChangeMessage, ControlHeaders, ControlKind, ControlMessage, Message, Operation};
