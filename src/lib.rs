//! A reactive JSON state tree.
//!
//! [`StateStore`] holds one serializable tree. Components write to it with
//! sparse partial updates that are deep-merged in, and react to
//! [`Notification`]s published on a [`Bus`] for exactly the paths whose
//! values changed. The tree is saved to a single [`Storage`] slot after a
//! debounce delay and reconciled with the defaults on the next start.

mod bus;
mod error;
mod merge;
mod notification;
mod path;
mod persist;
pub mod storage;
mod store;
pub mod topic;

pub use bus::{Bus, Subscription};
pub use error::StoreError;
pub use merge::{deep_equal, deep_equal_opt, deep_merge};
pub use notification::Notification;
pub use path::{get_nested_value, has_dotted_key, partial_for, touched_paths, Path};
pub use persist::DEFAULT_DEBOUNCE;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use store::{StateStore, StoreBuilder};
