/*
[INPUT]:  Transition requests from the supervisor and public API
[OUTPUT]: Current ConnectionState, change notifications via `watch`
[POS]:    WebSocket layer - single source of truth for connection state
[UPDATE]: When adding states or changing transition rules
*/

use tokio::sync::watch;

use crate::error::{Result, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Closing only moves to Closed; Closed never moves.
    fn allows(self, next: ConnectionState) -> bool {
        match self {
            ConnectionState::Closed => false,
            ConnectionState::Closing => next == ConnectionState::Closed,
            _ => self != next,
        }
    }
}

/// Shared connection state cell
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is allowed. Returns whether it changed.
    pub fn set(&self, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if !current.allows(next) {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Disconnected -> Connecting, or a misuse error describing why not
    pub fn begin_connecting(&self) -> Result<()> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|current| match *current {
            ConnectionState::Disconnected => {
                *current = ConnectionState::Connecting;
                true
            }
            ConnectionState::Closing | ConnectionState::Closed => {
                outcome = Err(StreamError::Closed);
                false
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                outcome = Err(StreamError::AlreadyOpen);
                false
            }
        });
        outcome
    }

    /// Anything but Closing/Closed -> Closing. Returns false if already shutting down.
    pub fn begin_closing(&self) -> bool {
        self.tx.send_if_modified(|current| match *current {
            ConnectionState::Closing | ConnectionState::Closed => false,
            _ => {
                *current = ConnectionState::Closing;
                true
            }
        })
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
