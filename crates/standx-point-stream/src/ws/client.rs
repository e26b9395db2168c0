/*
[INPUT]:  StreamConfig, a StreamCodec, optional custom signer
[OUTPUT]: Long-lived streaming client: open/close, subscriptions, listeners, state
[POS]:    WebSocket layer - public entry point over the connection supervisor
[UPDATE]: When changing the public client API or open/close semantics
*/

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthHandshake, Signer};
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};

use super::codec::StreamCodec;
use super::listeners::ListenerId;
use super::state::ConnectionState;
use super::supervisor::Shared;

/// Resilient streaming client for one endpoint
///
/// Subscriptions survive reconnects: every (re)connect replays the
/// subscribed topics before any data frame is dispatched.
pub struct StreamClient<C: StreamCodec> {
    shared: Arc<Shared<C>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl<C: StreamCodec> StreamClient<C> {
    /// Create a client. Authenticates on every connect when credentials are set.
    pub fn new(config: StreamConfig, codec: C) -> Result<Self> {
        config.validate()?;
        let url = config.parsed_url()?;
        let auth = match &config.credentials {
            Some(credentials) => Some(AuthHandshake::new(credentials, &url, config.auth_version)?),
            None => None,
        };
        Ok(Self::from_shared(Shared::new(config, url, codec, auth)))
    }

    /// Create a client signing auth requests with a custom signer.
    ///
    /// The API key still comes from `config.credentials`.
    pub fn with_signer(config: StreamConfig, codec: C, signer: Arc<dyn Signer>) -> Result<Self> {
        config.validate()?;
        let url = config.parsed_url()?;
        let api_key = config
            .credentials
            .as_ref()
            .map(|credentials| credentials.api_key.clone())
            .ok_or_else(|| StreamError::Config("custom signer requires credentials".to_string()))?;
        let auth = AuthHandshake::with_signer(api_key, signer, &url, config.auth_version)?;
        Ok(Self::from_shared(Shared::new(config, url, codec, Some(auth))))
    }

    fn from_shared(shared: Shared<C>) -> Self {
        Self {
            shared: Arc::new(shared),
            watcher: Mutex::new(None),
        }
    }

    /// Connect with up to `max_try_times` attempts, then keep the stream alive.
    ///
    /// Fails with `AlreadyOpen` while open or connecting and with `Closed`
    /// once the client has been closed.
    pub async fn open(&self) -> Result<()> {
        if self.shared.lifetime.is_cancelled() {
            self.shared.state.set(ConnectionState::Closed);
        }
        self.shared.state.begin_connecting()?;
        info!(url = %self.shared.url, "opening stream");

        let connected = tokio::select! {
            biased;
            _ = self.shared.lifetime.cancelled() => Err(StreamError::Closed),
            connected = self.shared.dial_with_retry() => connected,
        };

        let disconnect_rx = match connected {
            Ok(disconnect_rx) => disconnect_rx,
            Err(StreamError::Closed) => {
                self.shared.teardown().await;
                self.shared.state.set(ConnectionState::Closed);
                return Err(StreamError::Closed);
            }
            Err(err) => {
                self.shared.state.set(ConnectionState::Disconnected);
                error!(url = %self.shared.url, error = %err, "failed to open stream");
                return Err(err);
            }
        };

        let handle = tokio::spawn(self.shared.clone().watch_disconnects(disconnect_rx));
        if let Some(previous) = self.watcher.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop reconnecting, close the socket and end the client lifetime.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        if !self.shared.state.begin_closing() {
            debug!("close ignored; stream already closing");
            return;
        }
        info!(url = %self.shared.url, "closing stream");
        self.shared.lifetime.cancel();

        let watcher = self.watcher.lock().await.take();
        if let Some(handle) = watcher
            && let Err(err) = handle.await
        {
            warn!(error = %err, "stream supervisor ended abnormally");
        }

        self.shared.teardown().await;
        self.shared.state.set(ConnectionState::Closed);
        info!("stream closed");
    }

    /// Add `topic` to the subscription set. No-op if already present.
    ///
    /// While disconnected the topic is only recorded; it is sent on the next
    /// connect. A failed send is returned but the topic stays registered.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Result<()> {
        let topic = topic.into();
        self.ensure_usable()?;
        let frame = self.shared.codec.encode_subscribe(&topic)?;

        let Some(connected) = self
            .shared
            .subscriptions
            .insert_and(&topic, || self.shared.state.is_connected())
        else {
            debug!(%topic, "already subscribed");
            return Ok(());
        };

        if !connected {
            debug!(%topic, "subscription queued until connected");
            return Ok(());
        }

        self.shared.writer.send_text(frame).await.inspect_err(|err| {
            warn!(%topic, error = %err, "subscribe send failed; will retry on reconnect");
        })
    }

    /// Remove `topic` from the subscription set. No-op if absent.
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.ensure_usable()?;
        let frame = self.shared.codec.encode_unsubscribe(topic)?;

        let Some(connected) = self
            .shared
            .subscriptions
            .remove_and(topic, || self.shared.state.is_connected())
        else {
            debug!(topic, "not subscribed");
            return Ok(());
        };

        if !connected {
            return Ok(());
        }

        self.shared.writer.send_text(frame).await.inspect_err(|err| {
            warn!(topic, error = %err, "unsubscribe send failed");
        })
    }

    /// Register a callback for data frames on `topic`
    pub fn add_listener<F>(&self, topic: &str, listener: F) -> ListenerId
    where
        F: Fn(&C::Payload) + Send + Sync + 'static,
    {
        self.shared.listeners.add(topic, listener)
    }

    pub fn remove_listener(&self, topic: &str, id: ListenerId) -> bool {
        self.shared.listeners.remove(topic, id)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current state. Reads `Closed` once the lifetime token is cancelled,
    /// except while `close()` is still tearing down.
    pub fn state(&self) -> ConnectionState {
        match self.shared.state.get() {
            ConnectionState::Closing => ConnectionState::Closing,
            _ if self.shared.lifetime.is_cancelled() => ConnectionState::Closed,
            state => state,
        }
    }

    /// Watch connection state transitions
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Topics in subscription order
    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.subscriptions.topics()
    }

    /// Topics acknowledged by the server on the current connection
    pub fn is_confirmed(&self, topic: &str) -> bool {
        self.shared.subscriptions.is_confirmed(topic)
    }

    /// Successful connects so far, reconnects included
    pub fn connection_count(&self) -> u64 {
        self.shared.connection_count()
    }

    /// Token ending the client lifetime. Cancelling it has the same effect as `close()`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.lifetime.clone()
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.shared.state.get() {
            ConnectionState::Closing | ConnectionState::Closed => Err(StreamError::Closed),
            _ if self.shared.lifetime.is_cancelled() => Err(StreamError::Closed),
            _ => Ok(()),
        }
    }
}

impl<C: StreamCodec> fmt::Debug for StreamClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.shared.url.as_str())
            .field("state", &self.state())
            .field("subscriptions", &self.shared.subscriptions.len())
            .field("connections", &self.shared.connection_count())
            .finish()
    }
}

impl<C: StreamCodec> Drop for StreamClient<C> {
    fn drop(&mut self) {
        self.shared.lifetime.cancel();
    }
}
