/*
[INPUT]:  Failure reports from the read loop and heartbeat task
[OUTPUT]: At most one DisconnectReason per connection, delivered to the reconnect watcher
[POS]:    WebSocket layer - per-connection one-shot disconnect signal
[UPDATE]: When adding disconnect causes
*/

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    StreamClosed,
    ReadError,
    DecodeFailed,
    AuthRejected,
    HeartbeatFailed,
    IdleTimeout,
}

/// One-shot disconnect trigger shared by the tasks of a single connection.
///
/// A fresh signal is created for every connection attempt; firing an old one
/// after a reconnect does nothing.
#[derive(Debug, Clone)]
pub struct DisconnectSignal {
    tx: Arc<Mutex<Option<oneshot::Sender<DisconnectReason>>>>,
}

impl DisconnectSignal {
    pub fn new() -> (Self, oneshot::Receiver<DisconnectReason>) {
        let (tx, rx) = oneshot::channel();
        let signal = Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (signal, rx)
    }

    /// Fire the signal. Only the first call per connection has any effect.
    pub fn fire(&self, reason: DisconnectReason) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(reason);
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx.lock().is_none()
    }
}
