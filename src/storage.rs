//! Durable single-slot storage for the serialized state tree.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Default file name used by [`FileStorage::in_dir`].
pub const DEFAULT_SLOT: &str = "state.json";

/// Errors raised by a [`Storage`] backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Reading or writing the slot failed at the I/O layer.
    #[error("storage i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another process holds the slot's write lock.
    #[error("storage slot {} is locked by another writer", path.display())]
    Locked { path: PathBuf },

    /// The backend refused the write (e.g. quota exceeded).
    #[error("storage rejected write: {0}")]
    Rejected(String),
}

/// A durable slot holding one serialized tree.
///
/// `load` returns `Ok(None)` when nothing has been stored yet. The store
/// treats every load error as "nothing stored", so backends may be strict.
pub trait Storage: Send + 'static {
    /// Read the stored blob, if any.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored blob.
    fn save(&self, blob: &str) -> Result<(), StorageError>;
}

/// A slot backed by a single JSON file.
///
/// Saves go to a `.tmp` sibling first, are synced, then renamed over the
/// slot, so a crash mid-save leaves the previous blob intact. Concurrent
/// savers in different processes are serialized by an exclusive lock on a
/// `.lock` sibling; the last one to finish wins.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    tmp_path: PathBuf,
    lock_path: PathBuf,
}

impl FileStorage {
    /// Use `path` as the slot file. The parent directory must exist.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let tmp_path = sibling(&path, "tmp");
        let lock_path = sibling(&path, "lock");
        FileStorage {
            path,
            tmp_path,
            lock_path,
        }
    }

    /// Use `dir/state.json` as the slot, creating `dir` if needed.
    pub fn in_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(FileStorage::new(dir.join(DEFAULT_SLOT)))
    }

    /// Path of the slot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, blob: &str) -> io::Result<()> {
        let mut file = File::create(&self.tmp_path)?;
        file.write_all(blob.as_bytes())?;
        file.sync_data()?;
        drop(file);
        fs::rename(&self.tmp_path, &self.path)
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }

    fn save(&self, blob: &str) -> Result<(), StorageError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| io_error(&self.lock_path, e))?;

        if let Err(e) = lock_file.try_lock_exclusive() {
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
            {
                return Err(StorageError::Locked {
                    path: self.path.clone(),
                });
            }
            return Err(io_error(&self.lock_path, e));
        }

        let result = self.write_atomic(blob).map_err(|e| io_error(&self.path, e));
        let _ = FileExt::unlock(&lock_file);
        result
    }
}

#[derive(Debug, Default)]
struct Slot {
    blob: Option<String>,
    saves: usize,
    fail_saves: bool,
}

/// An in-memory slot shared between clones.
///
/// Cloning yields a handle on the same slot, which makes it easy to keep a
/// handle in a test while the store owns another, or to "restart" a store
/// against the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryStorage {
    /// An empty slot.
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// A slot that already holds `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let storage = MemoryStorage::default();
        storage.lock().blob = Some(blob.into());
        storage
    }

    /// The currently stored blob.
    pub fn blob(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Make subsequent saves fail with [`StorageError::Rejected`].
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panic while holding the guard cannot leave `Slot` half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.lock().blob.clone())
    }

    fn save(&self, blob: &str) -> Result<(), StorageError> {
        let mut slot = self.lock();
        if slot.fail_saves {
            return Err(StorageError::Rejected("quota exceeded".to_string()));
        }
        slot.blob = Some(blob.to_string());
        slot.saves += 1;
        Ok(())
    }
}
