/*
[INPUT]:  Subscribe/unsubscribe calls from the public API, acks from the read loop
[OUTPUT]: Authoritative ordered set of desired topics, replay snapshots
[POS]:    WebSocket layer - subscription registry surviving reconnects
[UPDATE]: When changing subscription bookkeeping or replay ordering
*/

use std::collections::HashSet;

use indexmap::IndexSet;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Topics {
    desired: IndexSet<String>,
    confirmed: HashSet<String>,
}

/// Desired topics, independent of connection state.
///
/// The `*_and` methods run a check under the registry lock so that a
/// concurrent replay snapshot and a subscribe call never both (or neither)
/// send the same topic.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: Mutex<Topics>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `topic`. Returns `None` if it was already present, otherwise
    /// `Some(check())` evaluated under the lock.
    pub fn insert_and<R>(&self, topic: &str, check: impl FnOnce() -> R) -> Option<R> {
        let mut topics = self.topics.lock();
        if !topics.desired.insert(topic.to_string()) {
            return None;
        }
        Some(check())
    }

    /// Remove `topic`. Returns `None` if it was absent, otherwise
    /// `Some(check())` evaluated under the lock.
    pub fn remove_and<R>(&self, topic: &str, check: impl FnOnce() -> R) -> Option<R> {
        let mut topics = self.topics.lock();
        if !topics.desired.shift_remove(topic) {
            return None;
        }
        topics.confirmed.remove(topic);
        Some(check())
    }

    /// Snapshot topics in insertion order, running `mark` under the same lock
    pub fn snapshot_and(&self, mark: impl FnOnce()) -> Vec<String> {
        let topics = self.topics.lock();
        mark();
        topics.desired.iter().cloned().collect()
    }

    pub fn insert(&self, topic: &str) -> bool {
        self.insert_and(topic, || ()).is_some()
    }

    pub fn remove(&self, topic: &str) -> bool {
        self.remove_and(topic, || ()).is_some()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.lock().desired.contains(topic)
    }

    pub fn topics(&self) -> Vec<String> {
        self.snapshot_and(|| ())
    }

    pub fn len(&self) -> usize {
        self.topics.lock().desired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.lock().desired.is_empty()
    }

    /// Record a server ack. Acks for topics no longer desired are ignored.
    pub fn mark_confirmed(&self, topic: &str) -> bool {
        let mut topics = self.topics.lock();
        if !topics.desired.contains(topic) {
            return false;
        }
        topics.confirmed.insert(topic.to_string())
    }

    pub fn is_confirmed(&self, topic: &str) -> bool {
        self.topics.lock().confirmed.contains(topic)
    }

    /// Forget acks; called whenever the connection is replaced
    pub fn clear_confirmed(&self) {
        self.topics.lock().confirmed.clear();
    }
}
