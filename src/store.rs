use crate::bus::{Bus, Subscription};
use crate::error::StoreError;
use crate::merge::{deep_equal, deep_equal_opt, deep_merge};
use crate::notification::Notification;
use crate::path::{get_nested_value, has_dotted_key, partial_for, touched_paths, Path};
use crate::persist::{blob_hash, Persister, DEFAULT_DEBOUNCE};
use crate::storage::{MemoryStorage, Storage};
use crate::topic;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

struct Inner {
    tree: RefCell<Value>,
    defaults: Value,
    bus: Bus<Notification>,
    persister: Persister,
    reset_listener: RefCell<Option<Subscription>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(sub) = self.reset_listener.get_mut().take() {
            sub.unsubscribe();
        }
    }
}

/// The reactive state store.
///
/// Owns the live tree, the default tree captured at init, the notification
/// bus and the persistence worker. `StateStore` is a cheap handle: clone it
/// and hand it to every component that reads or writes state.
///
/// All reads and writes are synchronous. Notifications for a write are
/// delivered after the live tree has been replaced, and no internal borrow
/// is held while they run, so listeners may call back into the store.
///
/// # Examples
///
/// ```
/// use pathstore::{MemoryStorage, StateStore};
/// use serde_json::json;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let store = StateStore::builder(json!({"theme": {"color": "#fff", "blur": 0}}))
///     .storage(MemoryStorage::new())
///     .init();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// store.subscribe_path("theme.color", move |value| {
///     sink.borrow_mut().push(value.cloned());
/// });
///
/// store.update(json!({"theme": {"color": "#000"}}));
/// store.update(json!({"theme": {"color": "#000"}})); // no-op
///
/// assert_eq!(*seen.borrow(), [Some(json!("#000"))]);
/// assert_eq!(store.get("theme.blur"), Some(json!(0)));
/// ```
#[derive(Clone)]
pub struct StateStore {
    inner: Rc<Inner>,
}

impl StateStore {
    /// Start configuring a store whose schema and reset target is `defaults`.
    pub fn builder(defaults: Value) -> StoreBuilder {
        StoreBuilder {
            defaults,
            storage: Box::new(MemoryStorage::new()),
            debounce: DEFAULT_DEBOUNCE,
            bus: None,
        }
    }

    /// A deep copy of the live tree.
    pub fn state(&self) -> Value {
        self.inner.tree.borrow().clone()
    }

    /// A copy of the value at `path` in the live tree, `None` if it does not
    /// resolve.
    pub fn get(&self, path: &str) -> Option<Value> {
        get_nested_value(&self.inner.tree.borrow(), path).cloned()
    }

    /// A copy of the default tree captured at init.
    pub fn defaults(&self) -> Value {
        self.inner.defaults.clone()
    }

    /// The bus notifications are published on.
    pub fn bus(&self) -> &Bus<Notification> {
        &self.inner.bus
    }

    /// Deep-merge `partial` into the live tree.
    ///
    /// One `PathChanged` notification is published for every path touched by
    /// `partial` (or an ancestor of one) whose value actually changed,
    /// followed by a single `StateChanged`, and a save is scheduled.
    ///
    /// If the merge leaves the tree unchanged the live tree is not replaced,
    /// no path fires and nothing is saved; only the catch-all `StateChanged`
    /// is published.
    ///
    /// A `partial` that is not an object cannot mirror an object tree and is
    /// ignored with a warning.
    pub fn update(&self, partial: Value) {
        let changed = {
            let mut tree = self.inner.tree.borrow_mut();
            if tree.is_object() && !partial.is_object() {
                log::warn!("pathstore: ignoring non-object update {partial}");
                return;
            }
            let merged = deep_merge(tree.clone(), &partial);
            if deep_equal(&merged, &tree) {
                None
            } else {
                let old = std::mem::replace(&mut *tree, merged);
                Some((old, tree.clone()))
            }
        };

        let Some((old, new)) = changed else {
            self.publish_state_changed(self.state(), partial);
            return;
        };

        if has_dotted_key(&partial) {
            log::warn!("pathstore: keys containing '.' are stored but not reported by path");
        }
        let paths = touched_paths(&partial);
        self.notify(&old, &new, &paths, partial);
        self.schedule_save();
    }

    /// Set a single value by path. Shorthand for updating with the sparse
    /// partial that mentions only `path`.
    pub fn update_path(&self, path: impl Into<Path>, value: Value) {
        self.update(partial_for(&path.into(), value));
    }

    /// Replace the live tree with a fresh copy of the defaults.
    ///
    /// Every path of the old or the new tree is checked, so keys that only
    /// existed before the reset are reported with a `None` value.
    pub fn reset(&self) {
        let fresh = self.inner.defaults.clone();
        let old = std::mem::replace(&mut *self.inner.tree.borrow_mut(), fresh.clone());

        let mut paths = touched_paths(&fresh);
        let mut seen: HashSet<Path> = paths.iter().cloned().collect();
        paths.extend(
            touched_paths(&old)
                .into_iter()
                .filter(|path| seen.insert(path.clone())),
        );

        log::debug!("pathstore: reset to defaults");
        self.notify(&old, &fresh, &paths, fresh.clone());
        self.schedule_save();
    }

    /// Write any pending save now and wait for it to finish.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.inner.persister.flush()
    }

    /// Call `callback` with the new value whenever the value at `path`
    /// changes. The value is `None` when the path stopped resolving.
    pub fn subscribe_path<F>(&self, path: impl Into<Path>, callback: F) -> Subscription
    where
        F: Fn(Option<&Value>) + 'static,
    {
        let path = path.into();
        self.inner.bus.subscribe(path.topic(), move |n: &Notification| {
            if let Notification::PathChanged { value, .. } = n {
                callback(value.as_ref());
            }
        })
    }

    /// Call `callback` with `(new_state, changes)` after every write.
    pub fn subscribe_changes<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value, &Value) + 'static,
    {
        self.inner
            .bus
            .subscribe(topic::STATE_CHANGED, move |n: &Notification| {
                if let Notification::StateChanged { new_state, changes } = n {
                    callback(new_state, changes);
                }
            })
    }

    fn notify(&self, old: &Value, new: &Value, paths: &[Path], changes: Value) {
        for path in paths {
            let before = get_nested_value(old, path.as_str());
            let after = get_nested_value(new, path.as_str());
            if deep_equal_opt(before, after) {
                continue;
            }
            let notification = Notification::PathChanged {
                path: path.clone(),
                value: after.cloned(),
            };
            self.publish(&notification);
        }

        self.publish_state_changed(new.clone(), changes);
    }

    fn publish_state_changed(&self, new_state: Value, changes: Value) {
        self.publish(&Notification::StateChanged { new_state, changes });
    }

    fn publish(&self, notification: &Notification) {
        self.inner.bus.publish(&notification.topic(), notification);
    }

    /// Schedule a save of the live tree as it is now. Listeners may have
    /// written again during notification, so the caller's snapshot can be
    /// stale.
    fn schedule_save(&self) {
        let serialized = serde_json::to_string(&*self.inner.tree.borrow());
        match serialized {
            Ok(blob) => self.inner.persister.schedule(blob),
            Err(e) => log::error!("pathstore: failed to serialize state: {e}"),
        }
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.inner.tree.borrow())
            .field("bus", &self.inner.bus)
            .finish()
    }
}

/// Configures and initializes a [`StateStore`].
///
/// Defaults: an in-memory slot, a one second save debounce and a fresh bus.
pub struct StoreBuilder {
    defaults: Value,
    storage: Box<dyn Storage>,
    debounce: Duration,
    bus: Option<Bus<Notification>>,
}

impl StoreBuilder {
    /// Persist to `storage`.
    pub fn storage(mut self, storage: impl Storage) -> Self {
        self.storage = Box::new(storage);
        self
    }

    /// Wait this long after the last write before saving.
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Publish on an existing bus instead of a fresh one.
    pub fn bus(mut self, bus: Bus<Notification>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Load the stored tree, reconcile it with the defaults and return a
    /// ready store.
    ///
    /// Never fails: a missing, unreadable or corrupt slot just means the
    /// store starts from the defaults. A save of the reconciled tree is
    /// scheduled so the slot always ends up in the current schema.
    pub fn init(self) -> StateStore {
        let StoreBuilder {
            defaults,
            storage,
            debounce,
            bus,
        } = self;

        let stored = load_stored(&*storage, &defaults);
        let (tree, stored_hash) = match stored {
            Some((value, hash)) => (deep_merge(defaults.clone(), &value), Some(hash)),
            None => (defaults.clone(), None),
        };

        let store = StateStore {
            inner: Rc::new(Inner {
                tree: RefCell::new(tree),
                defaults,
                bus: bus.unwrap_or_default(),
                persister: Persister::spawn(storage, debounce, stored_hash),
                reset_listener: RefCell::new(None),
            }),
        };

        let weak = Rc::downgrade(&store.inner);
        let listener = store
            .inner
            .bus
            .subscribe(topic::STATE_RESET, move |n: &Notification| {
                if !matches!(n, Notification::Reset) {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    StateStore { inner }.reset();
                }
            });
        *store.inner.reset_listener.borrow_mut() = Some(listener);

        store.schedule_save();
        store
    }
}

/// Read and parse the stored tree, returning it with the hash of the raw
/// blob. Anything unusable is treated as absent.
fn load_stored(storage: &dyn Storage, defaults: &Value) -> Option<(Value, u64)> {
    let blob = match storage.load() {
        Ok(Some(blob)) => blob,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("pathstore: could not read stored state, using defaults: {e}");
            return None;
        }
    };

    let value: Value = match serde_json::from_str(&blob) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("pathstore: stored state is corrupt, using defaults: {e}");
            return None;
        }
    };

    if defaults.is_object() && !value.is_object() {
        log::warn!("pathstore: stored state is not an object, using defaults");
        return None;
    }

    Some((value, blob_hash(&blob)))
}
