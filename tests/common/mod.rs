#![allow(dead_code)]

use pathstore::{MemoryStorage, Notification, StateStore, Storage};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Long enough that no save fires on its own during a test.
pub const NEVER: Duration = Duration::from_secs(3600);

pub fn settings_defaults() -> Value {
    json!({
        "settings": {
            "background": {"color": "#ffffff", "image": null, "blur": 0},
            "clock": {"format24": true, "seconds": false}
        },
        "favorites": []
    })
}

pub fn store_with(defaults: Value, storage: impl Storage) -> StateStore {
    StateStore::builder(defaults)
        .storage(storage)
        .debounce(NEVER)
        .init()
}

pub fn memory_store(defaults: Value) -> (StateStore, MemoryStorage) {
    let storage = MemoryStorage::new();
    (store_with(defaults, storage.clone()), storage)
}

/// Records every notification delivered on a set of topics, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Rc<RefCell<Vec<(String, Notification)>>>,
}

impl Recorder {
    pub fn watch(&self, store: &StateStore, topic: &str) {
        let seen = self.seen.clone();
        let name = topic.to_string();
        store.bus().subscribe(topic, move |n: &Notification| {
            seen.borrow_mut().push((name.clone(), n.clone()));
        });
    }

    pub fn topics(&self) -> Vec<String> {
        self.seen.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn values_for(&self, topic: &str) -> Vec<Option<Value>> {
        self.seen
            .borrow()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, n)| n.value().cloned())
            .collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.seen.borrow().iter().filter(|(t, _)| t == topic).count()
    }

    pub fn clear(&self) {
        self.seen.borrow_mut().clear();
    }
}
