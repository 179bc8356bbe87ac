//! Stream offsets
//!
//! An [`Offset`] marks how far a client has consumed a shape stream. It is
//! made of a source sequence number (the LSN) and a sub-index that
//! disambiguates several logical messages sharing one sequence value.
//!
//! Outside this module an offset is an opaque token: it can be compared,
//! persisted and handed back to a transport, but callers never build one by
//! hand. The external form is `"<sequence>_<sub_index>"`.

use crate::error::{Error, Result};
use crate::message::ControlMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resumable position in a shape stream
///
/// Ordering is numeric on the sequence, then numeric on the sub-index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Offset {
    sequence: u64,
    sub_index: u64,
}

impl Offset {
    /// Create an offset from its parts
    pub(crate) fn new(sequence: u64, sub_index: u64) -> Self {
        Self {
            sequence,
            sub_index,
        }
    }

    /// Offset at the boundary of a source sequence value
    pub(crate) fn at_sequence(sequence: u64) -> Self {
        Self::new(sequence, 0)
    }

    /// Source sequence component
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Sub-index component
    pub fn sub_index(&self) -> u64 {
        self.sub_index
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.sequence, self.sub_index)
    }
}

impl FromStr for Offset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (sequence, sub_index) = s
            .split_once('_')
            .ok_or_else(|| Error::invalid_offset(s, "expected <sequence>_<sub_index>"))?;

        let sequence = parse_component(s, sequence)?;
        let sub_index = parse_component(s, sub_index)?;
        Ok(Self::new(sequence, sub_index))
    }
}

fn parse_component(value: &str, part: &str) -> Result<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_offset(value, format!("'{part}' is not a number")));
    }
    part.parse()
        .map_err(|e| Error::invalid_offset(value, format!("'{part}': {e}")))
}

impl TryFrom<String> for Offset {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Offset> for String {
    fn from(offset: Offset) -> Self {
        offset.to_string()
    }
}

/// Derive the resume offset carried by a control message
///
/// Only live (low-latency) responses carry `global_last_seen_lsn`; without it
/// there is nothing to derive and the cursor must not move. A present LSN of
/// `"0"` is a real position and yields `0_0`.
pub fn derive_offset(message: &ControlMessage) -> Result<Option<Offset>> {
    let Some(lsn) = message.headers.global_last_seen_lsn.as_deref() else {
        return Ok(None);
    };
    if lsn.is_empty() {
        return Ok(None);
    }

    let sequence = parse_component(lsn, lsn).map_err(|_| {
        Error::malformed(format!("global_last_seen_lsn '{lsn}' is not a sequence number"))
    })?;
    Ok(Some(Offset::at_sequence(sequence)))
}
