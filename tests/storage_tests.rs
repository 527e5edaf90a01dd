use fs2::FileExt;
use pathstore::{FileStorage, Storage, StorageError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_save_load_round_trip() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::in_dir(dir.path()).unwrap();

    storage.save(r#"{"a":1}"#).unwrap();
    assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"a":1}"#));
}

#[test]
fn test_load_nonexistent() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::in_dir(dir.path()).unwrap();
    assert!(storage.load().unwrap().is_none());
}

#[test]
fn test_in_dir_creates_directory() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("profile").join("widget");
    let storage = FileStorage::in_dir(&nested).unwrap();

    assert!(nested.is_dir());
    assert_eq!(storage.path(), nested.join("state.json"));
}

#[test]
fn test_no_tmp_file_after_save() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::in_dir(dir.path()).unwrap();
    storage.save("{}").unwrap();

    assert!(storage.path().exists());
    assert!(!dir.path().join("state.json.tmp").exists());
}

#[test]
fn test_save_overwrites_existing() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("custom.json"));
    storage.save(r#"{"v":1}"#).unwrap();
    storage.save(r#"{"v":2}"#).unwrap();

    let contents = fs::read_to_string(dir.path().join("custom.json")).unwrap();
    assert_eq!(contents, r#"{"v":2}"#);
}

/// A stale `.tmp` left by a crash mid-save is ignored on load and replaced
/// by the next save.
#[test]
fn test_stale_tmp_file_is_ignored() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::in_dir(dir.path()).unwrap();
    storage.save(r#"{"good":true}"#).unwrap();
    fs::write(dir.path().join("state.json.tmp"), "{partial").unwrap();

    assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"good":true}"#));

    storage.save(r#"{"good":"again"}"#).unwrap();
    assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"good":"again"}"#));
    assert!(!dir.path().join("state.json.tmp").exists());
}

#[test]
fn test_save_fails_while_locked() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::in_dir(dir.path()).unwrap();
    storage.save(r#"{"v":1}"#).unwrap();

    let holder = fs::OpenOptions::new()
        .write(true)
        .open(dir.path().join("state.json.lock"))
        .unwrap();
    holder.try_lock_exclusive().unwrap();

    let err = storage.save(r#"{"v":2}"#).unwrap_err();
    assert!(matches!(err, StorageError::Locked { .. }), "got {err}");
    assert!(err.to_string().contains("state.json"), "error should name the slot: {err}");
    assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"v":1}"#));

    FileExt::unlock(&holder).unwrap();
    storage.save(r#"{"v":2}"#).unwrap();
}

#[test]
fn test_load_error_names_path() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("state.json")).unwrap();
    let storage = FileStorage::in_dir(dir.path()).unwrap();

    let err = storage.load().unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert!(err.to_string().contains("state.json"));
}
