//! A settings panel and a clock widget sharing one store.
//!
//! The panel writes through `update`; the clock only listens to the paths it
//! renders from. Writing a value that is already set does not re-render.

use pathstore::{topic, Notification, StateStore};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = StateStore::builder(json!({
        "clock": {"format24": true, "seconds": false},
        "background": {"color": "#ffffff"}
    }))
    .storage(pathstore::FileStorage::in_dir(dir.path())?)
    .init();

    // Clock widget: re-render from the `clock` subtree whenever it changes.
    // Listeners take what they need from the notification instead of holding
    // a store handle, so the store still drops (and saves) at the end.
    store.subscribe_path("clock", |clock| {
        let Some(clock) = clock else { return };
        let format = if clock["format24"] == json!(true) { "24h" } else { "12h" };
        let seconds = if clock["seconds"] == json!(true) { " with seconds" } else { "" };
        println!("clock: render {format}{seconds}");
    });

    store.subscribe_path("background.color", |color| {
        println!("background: color -> {}", color.map_or("(unset)".to_string(), |c| c.to_string()));
    });

    store.subscribe_changes(|_, changes| println!("  (write: {changes})"));

    println!("panel: toggle seconds");
    store.update(json!({"clock": {"seconds": true}}));

    println!("panel: pick the same color again");
    store.update_path("background.color", json!("#ffffff"));

    println!("panel: pick black");
    store.update_path("background.color", json!("#000000"));

    println!("panel: reset button");
    store
        .bus()
        .publish(topic::STATE_RESET, &Notification::Reset);

    store.flush()?;
    let saved = std::fs::read_to_string(dir.path().join("state.json"))?;
    println!("\nsaved: {saved}");

    Ok(())
}
