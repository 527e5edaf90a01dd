use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by [`StateStore`](crate::StateStore).
///
/// Writes never return these; they are logged instead. Only explicit
/// operations such as [`StateStore::flush`](crate::StateStore::flush) report
/// them to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The storage backend failed to save.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The persistence worker is not running, so nothing can be saved.
    #[error("persistence worker is not running")]
    WorkerGone,
}
