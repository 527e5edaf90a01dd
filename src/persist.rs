//! Debounced persistence on a background worker.
//!
//! The worker owns the [`Storage`] backend. Every `schedule` replaces the
//! pending blob and re-arms the delay; only the blob that survives a full
//! quiet period is written. `flush` writes the pending blob immediately and
//! waits for the result.

use crate::error::StoreError;
use crate::storage::{Storage, StorageError};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default debounce delay.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

enum Command {
    Schedule(String),
    Flush(Sender<Result<(), StorageError>>),
    Shutdown,
}

/// Hash of a serialized blob, used to skip saves that would not change the
/// slot.
pub(crate) fn blob_hash(blob: &str) -> u64 {
    xxhash_rust::xxh64::xxh64(blob.as_bytes(), 0)
}

pub(crate) struct Persister {
    tx: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl Persister {
    /// Start the worker. `stored_hash` is the hash of the blob currently in
    /// the slot, if known.
    ///
    /// If the worker thread cannot be spawned the persister is inert: the
    /// store keeps working in memory and every save is dropped.
    pub(crate) fn spawn(storage: Box<dyn Storage>, delay: Duration, stored_hash: Option<u64>) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("pathstore-persist".to_string())
            .spawn(move || {
                Worker {
                    storage,
                    delay,
                    last_hash: stored_hash,
                }
                .run(rx)
            });

        match spawned {
            Ok(worker) => Persister {
                tx: Some(tx),
                worker: Some(worker),
            },
            Err(e) => {
                log::error!("pathstore: could not start persistence worker: {e}");
                Persister {
                    tx: None,
                    worker: None,
                }
            }
        }
    }

    /// Replace the pending blob and restart the delay.
    pub(crate) fn schedule(&self, blob: String) {
        let sent = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send(Command::Schedule(blob)).is_ok());
        if !sent {
            log::warn!("pathstore: persistence worker is gone, dropping save");
        }
    }

    /// Write the pending blob now and wait for the outcome.
    pub(crate) fn flush(&self) -> Result<(), StoreError> {
        let tx = self.tx.as_ref().ok_or(StoreError::WorkerGone)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(Command::Flush(reply_tx))
            .map_err(|_| StoreError::WorkerGone)?;
        reply_rx.recv().map_err(|_| StoreError::WorkerGone)??;
        Ok(())
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Command::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("pathstore: persistence worker panicked");
            }
        }
    }
}

struct Worker {
    storage: Box<dyn Storage>,
    delay: Duration,
    last_hash: Option<u64>,
}

impl Worker {
    fn run(mut self, rx: Receiver<Command>) {
        let mut pending: Option<String> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let command = match deadline {
                Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        deadline = None;
                        if let Some(blob) = pending.take() {
                            // Errors are logged inside `write`; nobody is waiting on a timed save.
                            let _ = self.write(&blob);
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => Command::Shutdown,
                },
                None => match rx.recv() {
                    Ok(command) => command,
                    Err(_) => Command::Shutdown,
                },
            };

            match command {
                Command::Schedule(blob) => {
                    pending = Some(blob);
                    deadline = Some(Instant::now() + self.delay);
                }
                Command::Flush(reply) => {
                    deadline = None;
                    let result = match pending.take() {
                        Some(blob) => self.write(&blob),
                        None => Ok(()),
                    };
                    let _ = reply.send(result);
                }
                Command::Shutdown => {
                    if let Some(blob) = pending.take() {
                        let _ = self.write(&blob);
                    }
                    return;
                }
            }
        }
    }

    fn write(&mut self, blob: &str) -> Result<(), StorageError> {
        let hash = blob_hash(blob);
        if self.last_hash == Some(hash) {
            log::debug!("pathstore: state unchanged since last save, skipping write");
            return Ok(());
        }
        match self.storage.save(blob) {
            Ok(()) => {
                self.last_hash = Some(hash);
                log::debug!("pathstore: saved {} bytes", blob.len());
                Ok(())
            }
            Err(e) => {
                log::error!("pathstore: failed to save state: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn persister(storage: &MemoryStorage, delay: Duration) -> Persister {
        Persister::spawn(Box::new(storage.clone()), delay, None)
    }

    #[test]
    fn flush_writes_only_latest_blob() {
        let storage = MemoryStorage::new();
        let p = persister(&storage, Duration::from_secs(60));
        p.schedule("1".into());
        p.schedule("2".into());
        p.schedule("3".into());
        assert_eq!(storage.save_count(), 0);

        p.flush().unwrap();
        assert_eq!(storage.save_count(), 1);
        assert_eq!(storage.blob().as_deref(), Some("3"));
    }

    #[test]
    fn flush_without_pending_is_noop() {
        let storage = MemoryStorage::new();
        let p = persister(&storage, Duration::from_secs(60));
        p.flush().unwrap();
        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn identical_blob_is_skipped() {
        let storage = MemoryStorage::new();
        let p = Persister::spawn(Box::new(storage.clone()), Duration::from_secs(60), Some(blob_hash("{}")));
        p.schedule("{}".into());
        p.flush().unwrap();
        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn delay_elapses_without_flush() {
        let storage = MemoryStorage::new();
        let p = persister(&storage, Duration::from_millis(10));
        p.schedule("x".into());

        let start = Instant::now();
        while storage.save_count() == 0 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(storage.blob().as_deref(), Some("x"));
        drop(p);
    }

    #[test]
    fn drop_writes_pending_blob() {
        let storage = MemoryStorage::new();
        let p = persister(&storage, Duration::from_secs(60));
        p.schedule("last".into());
        drop(p);
        assert_eq!(storage.blob().as_deref(), Some("last"));
    }

    #[test]
    fn flush_reports_save_failure() {
        let storage = MemoryStorage::new();
        storage.set_fail_saves(true);
        let p = persister(&storage, Duration::from_secs(60));
        p.schedule("x".into());
        assert!(matches!(p.flush(), Err(StoreError::Storage(_))));
    }
}
