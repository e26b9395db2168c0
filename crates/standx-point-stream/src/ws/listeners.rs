/*
[INPUT]:  Listener callbacks bound to topics by the caller
[OUTPUT]: Per-topic callback lists in registration order, removable by handle
[POS]:    WebSocket layer - listener registry consulted by the dispatcher
[UPDATE]: When changing listener identity or lookup rules
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Callback invoked synchronously with each decoded payload
pub type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Opaque handle returned by `add`, used to remove a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerBinding<P> {
    id: ListenerId,
    callback: Callback<P>,
}

/// Topic -> ordered callbacks
pub struct ListenerRegistry<P> {
    next_id: AtomicU64,
    bindings: RwLock<HashMap<String, Vec<ListenerBinding<P>>>>,
}

impl<P> ListenerRegistry<P> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn add<F>(&self, topic: &str, callback: F) -> ListenerId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.bindings
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(ListenerBinding {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Remove one binding. Returns false if `id` is not bound to `topic`.
    pub fn remove(&self, topic: &str, id: ListenerId) -> bool {
        let mut bindings = self.bindings.write();
        let Some(list) = bindings.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|binding| binding.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            bindings.remove(topic);
        }
        removed
    }

    /// Callbacks for `topic` in registration order, cloned out of the lock
    pub fn listeners_for(&self, topic: &str) -> Vec<Callback<P>> {
        self.bindings
            .read()
            .get(topic)
            .map(|list| list.iter().map(|binding| binding.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.bindings.read().get(topic).map_or(0, Vec::len)
    }
}

impl<P> Default for ListenerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for ListenerRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.bindings.read();
        let mut map = f.debug_map();
        for (topic, list) in bindings.iter() {
            map.entry(topic, &list.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_listeners_keep_registration_order() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            registry.add("price:BTC-USD", move |value: &u32| seen.lock().push((tag, *value)));
        }

        for callback in registry.listeners_for("price:BTC-USD") {
            callback(&7);
        }
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7), ("third", 7)]);
    }

    #[test]
    fn test_remove_by_handle() {
        let registry = ListenerRegistry::<u32>::new();
        let first = registry.add("order", |_| {});
        let second = registry.add("order", |_| {});

        assert!(registry.remove("order", first));
        assert!(!registry.remove("order", first));
        assert!(!registry.remove("price:BTC-USD", second));
        assert_eq!(registry.count("order"), 1);

        assert!(registry.remove("order", second));
        assert_eq!(registry.count("order"), 0);
        assert!(registry.listeners_for("order").is_empty());
    }

    #[test]
    fn test_topics_are_exact_match() {
        let registry = ListenerRegistry::<u32>::new();
        registry.add("price:BTC-USD", |_| {});
        assert_eq!(registry.count("price:BTC"), 0);
        assert_eq!(registry.count("price:BTC-USD"), 1);
    }
}
