//! Materialized shape
//!
//! Folds [`SyncEvent`]s into the current set of rows, keyed by row identity.

use crate::engine::SyncEvent;
use crate::message::Operation;
use crate::offset::Offset;
use crate::types::Row;
use std::collections::HashMap;

/// Current rows of a shape
#[derive(Debug, Clone, Default)]
pub struct Shape {
    rows: HashMap<String, Row>,
    offset: Option<Offset>,
    up_to_date: bool,
}

impl Shape {
    /// Create an empty shape
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event
    pub fn apply(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::RowChange { change, .. } => match change.operation {
                Operation::Insert => {
                    self.rows.insert(change.key.clone(), change.value.clone());
                }
                Operation::Update => {
                    let row = self.rows.entry(change.key.clone()).or_default();
                    for (column, value) in &change.value {
                        row.insert(column.clone(), value.clone());
                    }
                }
                Operation::Delete => {
                    self.rows.remove(&change.key);
                }
            },
            SyncEvent::UpToDate { offset } => {
                self.up_to_date = true;
                if offset.is_some() {
                    self.offset = *offset;
                }
            }
            SyncEvent::MustResync => {
                self.rows.clear();
                self.offset = None;
                self.up_to_date = false;
            }
            SyncEvent::Control { .. } => {}
        }
    }

    /// Get a row by key
    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    /// All rows, unordered
    pub fn rows(&self) -> &HashMap<String, Row> {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the shape has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Offset of the last up-to-date signal that carried one
    pub fn offset(&self) -> Option<Offset> {
        self.offset
    }

    /// Whether the rows reflect everything the source had at last check
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChangeMessage, Message};
    use serde_json::json;

    fn change(value: serde_json::Value) -> SyncEvent {
        match Message::from_value(&value).unwrap() {
            Message::Change(change) => SyncEvent::row_change(change, None),
            Message::Control(_) => panic!("expected change"),
        }
    }

    #[test]
    fn test_insert_update_delete() {
        let mut shape = Shape::new();

        shape.apply(&change(json!({
            "key": "1",
            "value": {"id": 1, "name": "Alice", "email": "a@example.com"},
            "headers": {"operation": "insert"}
        })));
        shape.apply(&change(json!({
            "key": "2",
            "value": {"id": 2, "name": "Bob"},
            "headers": {"operation": "insert"}
        })));
        assert_eq!(shape.len(), 2);

        // Updates only carry changed columns
        shape.apply(&change(json!({
            "key": "1",
            "value": {"name": "Alicia"},
            "headers": {"operation": "update"}
        })));
        let row = shape.get("1").unwrap();
        assert_eq!(row["name"], "Alicia");
        assert_eq!(row["email"], "a@example.com");

        shape.apply(&change(json!({"key": "2", "headers": {"operation": "delete"}})));
        assert!(shape.get("2").is_none());
        assert_eq!(shape.len(), 1);
    }

    #[test]
    fn test_up_to_date_and_resync() {
        let mut shape = Shape::new();
        shape.apply(&SyncEvent::row_change(
            ChangeMessage {
                key: "k".to_string(),
                value: Row::new(),
                old_value: None,
                operation: Operation::Insert,
            },
            None,
        ));
        shape.apply(&SyncEvent::up_to_date(Some("9_0".parse().unwrap())));
        assert!(shape.is_up_to_date());
        assert_eq!(shape.offset().map(|o| o.to_string()), Some("9_0".to_string()));

        // An up-to-date without an offset keeps the last known one
        shape.apply(&SyncEvent::up_to_date(None));
        assert!(shape.offset().is_some());

        shape.apply(&SyncEvent::MustResync);
        assert!(shape.is_empty());
        assert!(shape.offset().is_none());
        assert!(!shape.is_up_to_date());
    }
}
