//! Topic names used on the bus.
//!
//! These strings are the wire-level names of notifications. Inside the crate
//! notifications are the typed [`Notification`](crate::Notification) enum;
//! topics only matter at the bus boundary.

/// Catch-all topic published once after every write.
pub const STATE_CHANGED: &str = "state:changed";

/// Control topic: publishing [`Notification::Reset`](crate::Notification::Reset)
/// here makes the store reset itself to its defaults.
pub const STATE_RESET: &str = "state:reset";

/// Topic for changes to a single dotted path: `state:<path>:changed`.
pub fn path_changed(path: &str) -> String {
    format!("state:{path}:changed")
}
