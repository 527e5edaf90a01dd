//! Schema evolution across restarts.
//!
//! The first run saves user choices under an old schema. The second run
//! starts with new default keys; saved values win, new keys are filled in.

use pathstore::{FileStorage, StateStore};
use serde_json::json;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    // --- Run 1: old schema ---
    {
        let store = StateStore::builder(json!({"background": {"color": "#ffffff"}}))
            .storage(FileStorage::in_dir(dir.path())?)
            .debounce(Duration::from_millis(200))
            .init();
        store.update(json!({"background": {"color": "#203040"}}));
        store.flush()?;
        println!("run 1: {}", store.state());
    }

    // --- Run 2: new schema adds blur and a favorites list ---
    let store = StateStore::builder(json!({
        "background": {"color": "#ffffff", "blur": 0},
        "favorites": []
    }))
    .storage(FileStorage::in_dir(dir.path())?)
    .init();
    println!("run 2: {}", store.state());

    store.reset();
    println!("reset: {}", store.state());
    store.flush()?;

    Ok(())
}
