//! Typed notifications published by the store.

use crate::path::Path;
use crate::topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed notification carried on the bus.
///
/// Each variant knows the topic it is published on, so producers never
/// format topic strings by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Notification {
    /// The value at `path` changed. `value` is `None` when the path no
    /// longer resolves in the new tree.
    PathChanged { path: Path, value: Option<Value> },

    /// Catch-all published once after every write, whether or not any path
    /// actually changed. `changes` is the partial that was applied (the whole
    /// default tree for a reset).
    StateChanged { new_state: Value, changes: Value },

    /// Control message asking the store to reset itself to its defaults.
    Reset,
}

impl Notification {
    /// The bus topic this notification is published on.
    pub fn topic(&self) -> String {
        match self {
            Notification::PathChanged { path, .. } => path.topic(),
            Notification::StateChanged { .. } => topic::STATE_CHANGED.to_string(),
            Notification::Reset => topic::STATE_RESET.to_string(),
        }
    }

    /// The new value for a [`PathChanged`](Notification::PathChanged)
    /// notification, `None` for other variants or for removed paths.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Notification::PathChanged { value, .. } => value.as_ref(),
            _ => None,
        }
    }
}
