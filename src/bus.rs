//! Topic-keyed publish/subscribe.
//!
//! The bus knows nothing about state shape. It maps topic strings to ordered
//! listener lists and delivers payloads synchronously on the caller's stack.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

type Callback<P> = Rc<dyn Fn(&P)>;

struct Listener<P> {
    id: u64,
    callback: Callback<P>,
}

struct Registry<P> {
    next_id: u64,
    topics: HashMap<String, Vec<Listener<P>>>,
}

/// A single-threaded publish/subscribe bus.
///
/// `Bus` is a cheap handle; clones share the same listener registry.
/// Delivery within a topic follows registration order. A listener that
/// panics is logged and skipped; the remaining listeners still run and the
/// panic never reaches the publisher.
///
/// # Examples
///
/// ```
/// use pathstore::Bus;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let bus: Bus<u32> = Bus::new();
/// let seen = Rc::new(Cell::new(0));
/// let sink = seen.clone();
/// let sub = bus.subscribe("tick", move |n| sink.set(sink.get() + n));
///
/// bus.publish("tick", &2);
/// bus.publish("tock", &100);
/// sub.unsubscribe();
/// bus.publish("tick", &5);
/// assert_eq!(seen.get(), 2);
/// ```
pub struct Bus<P> {
    registry: Rc<RefCell<Registry<P>>>,
}

impl<P: 'static> Bus<P> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Bus {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                topics: HashMap::new(),
            })),
        }
    }

    /// Register `callback` for `topic`.
    ///
    /// Never fails; the topic's listener list is created on first use. The
    /// returned [`Subscription`] removes exactly this registration, so a
    /// callback subscribed twice needs two unsubscribes.
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&P) + 'static,
    {
        let topic = topic.into();
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .topics
                .entry(topic.clone())
                .or_default()
                .push(Listener {
                    id,
                    callback: Rc::new(callback),
                });
            id
        };

        let registry: Weak<RefCell<Registry<P>>> = Rc::downgrade(&self.registry);
        Subscription {
            topic: topic.clone(),
            dispose: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    remove_listener(&mut registry.borrow_mut(), &topic, id);
                }
            })),
        }
    }

    /// Deliver `payload` to every listener of `topic`.
    ///
    /// Listeners are collected before delivery starts, so callbacks may
    /// subscribe, unsubscribe or publish without disturbing this round.
    /// Publishing to a topic with no listeners does nothing.
    pub fn publish(&self, topic: &str, payload: &P) {
        let callbacks: Vec<Callback<P>> = {
            let registry = self.registry.borrow();
            let Some(listeners) = registry.topics.get(topic) else {
                return;
            };
            listeners.iter().map(|l| Rc::clone(&l.callback)).collect()
        };

        for callback in callbacks {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                log::error!(
                    "pathstore: listener for '{topic}' panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Number of listeners currently registered for `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.registry
            .borrow()
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Drop every listener registered for `topic`.
    pub fn clear(&self, topic: &str) {
        self.registry.borrow_mut().topics.remove(topic);
    }
}

fn remove_listener<P>(registry: &mut Registry<P>, topic: &str, id: u64) {
    if let Some(listeners) = registry.topics.get_mut(topic) {
        listeners.retain(|l| l.id != id);
        if listeners.is_empty() {
            registry.topics.remove(topic);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

impl<P: 'static> Default for Bus<P> {
    fn default() -> Self {
        Bus::new()
    }
}

impl<P> Clone for Bus<P> {
    fn clone(&self) -> Self {
        Bus {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<P> fmt::Debug for Bus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut topics: Vec<_> = registry
            .topics
            .iter()
            .map(|(topic, listeners)| (topic.as_str(), listeners.len()))
            .collect();
        topics.sort_unstable();
        f.debug_struct("Bus").field("topics", &topics).finish()
    }
}

/// Handle returned by [`Bus::subscribe`].
///
/// Dropping the handle leaves the listener registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
pub struct Subscription {
    topic: String,
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Remove the registration this handle was created for.
    pub fn unsubscribe(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// The topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish()
    }
}
