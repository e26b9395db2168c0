/*
[INPUT]:  Decoded (topic, payload) pairs from the read loop
[OUTPUT]: Synchronous listener invocations, isolated from listener panics
[POS]:    WebSocket layer - dispatcher between read loop and listener registry
[UPDATE]: When changing delivery gating or failure isolation
*/

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use super::listeners::ListenerRegistry;
use super::subscriptions::SubscriptionRegistry;

/// Delivers payloads to the listeners of subscribed topics
pub struct Dispatcher<P> {
    listeners: Arc<ListenerRegistry<P>>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl<P> Dispatcher<P> {
    pub fn new(listeners: Arc<ListenerRegistry<P>>, subscriptions: Arc<SubscriptionRegistry>) -> Self {
        Self {
            listeners,
            subscriptions,
        }
    }

    /// Invoke every listener bound to `topic`, in registration order.
    ///
    /// Frames for topics that are not currently subscribed are dropped.
    /// Returns the number of listeners that ran to completion.
    pub fn dispatch(&self, topic: &str, payload: &P) -> usize {
        if !self.subscriptions.contains(topic) {
            debug!(topic, "dropping frame for unsubscribed topic");
            return 0;
        }

        let callbacks = self.listeners.listeners_for(topic);
        if callbacks.is_empty() {
            debug!(topic, "no listeners bound");
            return 0;
        }

        let mut delivered = 0;
        for (index, callback) in callbacks.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(
                        topic,
                        listener_index = index,
                        panic = %panic_message(panic.as_ref()),
                        "listener panicked"
                    );
                }
            }
        }
        delivered
    }
}

impl<P> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
