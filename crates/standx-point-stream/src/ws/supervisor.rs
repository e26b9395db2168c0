/*
[INPUT]:  StreamConfig, codec, optional auth handshake, registries, lifetime token
[OUTPUT]: Connected socket with replayed subscriptions, running read loop + heartbeat,
          reconnect watcher reacting to one disconnect signal per connection
[POS]:    WebSocket layer - connection supervisor state machine
[UPDATE]: When changing dial/retry policy, bring-up order, or teardown semantics
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{AuthHandshake, PendingAuth};
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};

use super::codec::{InboundFrame, StreamCodec};
use super::dispatch::Dispatcher;
use super::heartbeat::{Heartbeat, Liveness};
use super::listeners::ListenerRegistry;
use super::signal::{DisconnectReason, DisconnectSignal};
use super::state::{ConnectionState, StateCell};
use super::subscriptions::SubscriptionRegistry;
use super::transport::{self, FrameReader, RawFrame, truncate_for_log};
use super::writer::FrameWriter;

const RAW_LOG_MAX_BYTES: usize = 1024;
const TASK_STOP_GRACE: Duration = Duration::from_secs(1);

/// Delay before zero-based dial attempt `attempt`: `attempt * step`
pub(crate) fn backoff_duration(step: Duration, attempt: u32) -> Duration {
    step.saturating_mul(attempt)
}

/// Tasks belonging to the live connection
struct ActiveConnection {
    id: Uuid,
    token: CancellationToken,
    reader: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl ActiveConnection {
    async fn shutdown(self) {
        self.token.cancel();
        stop_task(self.reader).await;
        if let Some(heartbeat) = self.heartbeat {
            stop_task(heartbeat).await;
        }
        debug!(connection_id = %self.id, "connection torn down");
    }
}

async fn stop_task(mut handle: JoinHandle<()>) {
    if tokio::time::timeout(TASK_STOP_GRACE, &mut handle).await.is_err() {
        handle.abort();
    }
}

/// State shared between the public client and its background tasks
pub(crate) struct Shared<C: StreamCodec> {
    pub config: StreamConfig,
    pub url: Url,
    pub codec: Arc<C>,
    pub auth: Option<AuthHandshake>,
    pub state: StateCell,
    pub writer: Arc<FrameWriter>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub listeners: Arc<ListenerRegistry<C::Payload>>,
    pub lifetime: CancellationToken,
    dispatcher: Dispatcher<C::Payload>,
    active: Mutex<Option<ActiveConnection>>,
    connections: AtomicU64,
}

impl<C: StreamCodec> Shared<C> {
    pub fn new(config: StreamConfig, url: Url, codec: C, auth: Option<AuthHandshake>) -> Self {
        let writer = Arc::new(FrameWriter::new(
            config.write_interval(),
            config.write_timeout(),
            config.debug,
        ));
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let listeners = Arc::new(ListenerRegistry::new());
        let dispatcher = Dispatcher::new(listeners.clone(), subscriptions.clone());

        Self {
            config,
            url,
            codec: Arc::new(codec),
            auth,
            state: StateCell::new(),
            writer,
            subscriptions,
            listeners,
            lifetime: CancellationToken::new(),
            dispatcher,
            active: Mutex::new(None),
            connections: AtomicU64::new(0),
        }
    }

    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Up to `max_try_times` connection attempts with linear backoff.
    ///
    /// Returns `Closed` as soon as the lifetime token is cancelled.
    pub async fn dial_with_retry(self: &Arc<Self>) -> Result<oneshot::Receiver<DisconnectReason>> {
        let max_try_times = self.config.max_try_times;
        let mut last_error = None;

        for attempt in 0..max_try_times {
            if attempt > 0 {
                let delay = backoff_duration(self.config.backoff_step(), attempt);
                debug!(attempt = attempt + 1, ?delay, "waiting before next dial attempt");
                tokio::select! {
                    biased;
                    _ = self.lifetime.cancelled() => return Err(StreamError::Closed),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => return Err(StreamError::Closed),
                outcome = self.connect_once() => outcome,
            };

            match outcome {
                Ok(disconnect_rx) => return Ok(disconnect_rx),
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        max_try_times,
                        url = %self.url,
                        error = %err,
                        "stream connect attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(StreamError::Dial {
            attempts: max_try_times,
            message: last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    /// Dial, authenticate, mark connected, replay, then start the read loop and heartbeat
    async fn connect_once(self: &Arc<Self>) -> Result<oneshot::Receiver<DisconnectReason>> {
        let connection_id = Uuid::new_v4();
        debug!(%connection_id, url = %self.url, "dialing stream");

        let (sink, source) = transport::dial(
            self.url.as_str(),
            self.config.dial_timeout(),
            self.config.max_frame_size,
        )
        .await?;
        let mut reader = FrameReader::new(source, self.config.max_frame_size);
        self.writer.attach(sink).await;

        if let Some(auth) = &self.auth
            && let Err(err) = self.authenticate(auth, &mut reader).await
        {
            self.writer.detach().await;
            return Err(err);
        }

        self.subscriptions.clear_confirmed();
        let topics = self.subscriptions.snapshot_and(|| {
            self.state.set(ConnectionState::Connected);
        });
        let connections = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            %connection_id,
            url = %self.url,
            connections,
            topics = topics.len(),
            "stream connected"
        );

        if let Err(err) = self.replay(&topics).await {
            warn!(%connection_id, error = %err, "subscription replay incomplete");
        }

        let token = self.lifetime.child_token();
        let liveness = Arc::new(Liveness::new());
        let (disconnect, disconnect_rx) = DisconnectSignal::new();

        let heartbeat = Heartbeat {
            mode: self.config.heartbeat.mode(),
            idle_timeout: self.config.heartbeat.idle_timeout(),
            codec: self.codec.clone(),
            writer: self.writer.clone(),
            liveness: liveness.clone(),
            disconnect: disconnect.clone(),
            token: token.clone(),
        }
        .spawn();

        let read_loop = ReadLoop {
            shared: self.clone(),
            reader,
            liveness,
            disconnect,
            token: token.clone(),
            connection_id,
        };
        let reader = tokio::spawn(read_loop.run());

        let previous = self.active.lock().await.replace(ActiveConnection {
            id: connection_id,
            token,
            reader,
            heartbeat,
        });
        if let Some(previous) = previous {
            previous.shutdown().await;
        }

        Ok(disconnect_rx)
    }

    /// Send one signed auth frame and wait for its ack
    async fn authenticate(&self, auth: &AuthHandshake, reader: &mut FrameReader) -> Result<()> {
        let request = auth.prepare()?;
        let frame = self.codec.encode_auth(&request)?;
        self.writer.send_text(frame).await?;
        let pending = PendingAuth::new(&request);

        let timeout = self.config.auth_timeout();
        let (success, message) = tokio::time::timeout(timeout, self.await_auth_ack(reader))
            .await
            .map_err(|_| StreamError::auth(format!("no auth ack within {timeout:?}")))??;

        let elapsed = pending.resolve(success, message)?;
        info!(?elapsed, version = ?auth.version(), "stream authenticated");
        Ok(())
    }

    async fn await_auth_ack(&self, reader: &mut FrameReader) -> Result<(bool, Option<String>)> {
        loop {
            let frame = match reader.next_frame().await {
                Some(frame) => frame?,
                None => return Err(StreamError::auth("connection closed before auth ack")),
            };

            match frame {
                RawFrame::Ping(payload) => self.writer.send_pong(payload).await?,
                RawFrame::Pong => {}
                RawFrame::Close => {
                    return Err(StreamError::auth("server closed connection during auth"));
                }
                RawFrame::Data(bytes) => match self.codec.decode(&bytes)? {
                    InboundFrame::AuthAck { success, message } => return Ok((success, message)),
                    InboundFrame::Ping(token) => {
                        let pong = self.codec.encode_pong(token.as_deref())?;
                        self.writer.send_text(pong).await?;
                    }
                    other => debug!(kind = ?other.kind(), "frame ignored while awaiting auth ack"),
                },
            }
        }
    }

    /// One subscribe request per topic; every topic gets an attempt
    async fn replay(&self, topics: &[String]) -> Result<()> {
        let mut failed = Vec::new();
        for topic in topics {
            let sent = match self.codec.encode_subscribe(topic) {
                Ok(frame) => self.writer.send_text(frame).await,
                Err(err) => Err(err),
            };
            match sent {
                Ok(()) => debug!(topic = %topic, "subscription replayed"),
                Err(err) => failed.push((topic.clone(), err.to_string())),
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(StreamError::Resubscribe { failed })
        }
    }

    /// Stop the live connection's tasks and close its socket
    pub async fn teardown(&self) {
        let active = self.active.lock().await.take();
        if let Some(active) = &active {
            active.token.cancel();
        }
        // frees the write lock held by any stalled send before joining tasks
        self.writer.detach().await;
        if let Some(active) = active {
            active.shutdown().await;
        }
        self.subscriptions.clear_confirmed();
    }

    /// Reconnect watcher: waits for the disconnect signal of the current
    /// connection, tears it down and dials again until the lifetime ends.
    pub async fn watch_disconnects(
        self: Arc<Self>,
        mut disconnect_rx: oneshot::Receiver<DisconnectReason>,
    ) {
        loop {
            let reason = tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => break,
                reason = &mut disconnect_rx => reason.ok(),
            };

            match reason {
                Some(reason) => warn!(?reason, url = %self.url, "stream disconnected"),
                None => debug!("disconnect signal dropped"),
            }

            self.teardown().await;
            if self.lifetime.is_cancelled() {
                break;
            }

            if !self.config.auto_reconnect {
                self.state.set(ConnectionState::Disconnected);
                info!("auto reconnect disabled; stream stays disconnected");
                return;
            }

            self.state.set(ConnectionState::Connecting);
            match self.reconnect().await {
                Some(next) => disconnect_rx = next,
                None => break,
            }
        }

        self.teardown().await;
        self.state.set(ConnectionState::Closed);
        info!("stream supervisor stopped");
    }

    /// Repeat bounded dial rounds, pausing between them, until one succeeds
    async fn reconnect(self: &Arc<Self>) -> Option<oneshot::Receiver<DisconnectReason>> {
        let mut round: u32 = 0;
        loop {
            round = round.saturating_add(1);
            match self.dial_with_retry().await {
                Ok(disconnect_rx) => {
                    info!(round, "stream reconnected");
                    return Some(disconnect_rx);
                }
                Err(StreamError::Closed) => return None,
                Err(err) => {
                    let pause = self.config.reconnect_pause();
                    warn!(round, ?pause, error = %err, "reconnect round exhausted; pausing");
                    tokio::select! {
                        biased;
                        _ = self.lifetime.cancelled() => return None,
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }
    }
}

/// Single consumer of one connection's inbound frames
struct ReadLoop<C: StreamCodec> {
    shared: Arc<Shared<C>>,
    reader: FrameReader,
    liveness: Arc<Liveness>,
    disconnect: DisconnectSignal,
    token: CancellationToken,
    connection_id: Uuid,
}

impl<C: StreamCodec> ReadLoop<C> {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(connection_id = %self.connection_id, "read loop stopped");
                    return;
                }
                next = self.reader.next_frame() => next,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    warn!(connection_id = %self.connection_id, error = %err, "stream read failed");
                    let reason = match err {
                        StreamError::FrameTooLarge { .. } => DisconnectReason::DecodeFailed,
                        _ => DisconnectReason::ReadError,
                    };
                    self.disconnect.fire(reason);
                    return;
                }
                None => {
                    warn!(connection_id = %self.connection_id, "stream ended");
                    self.disconnect.fire(DisconnectReason::StreamClosed);
                    return;
                }
            };

            self.liveness.touch();
            if let Err(reason) = self.handle(frame).await {
                self.disconnect.fire(reason);
                return;
            }
        }
    }

    async fn handle(&self, frame: RawFrame) -> std::result::Result<(), DisconnectReason> {
        match frame {
            RawFrame::Ping(payload) => {
                if let Err(err) = self.shared.writer.send_pong(payload).await {
                    debug!(error = %err, "transport pong failed");
                }
                Ok(())
            }
            RawFrame::Pong => Ok(()),
            RawFrame::Close => {
                info!(connection_id = %self.connection_id, "server closed stream");
                Err(DisconnectReason::StreamClosed)
            }
            RawFrame::Data(bytes) => self.handle_data(&bytes).await,
        }
    }

    async fn handle_data(&self, bytes: &[u8]) -> std::result::Result<(), DisconnectReason> {
        if self.shared.config.debug {
            debug!(
                bytes = bytes.len(),
                frame = %truncate_for_log(&String::from_utf8_lossy(bytes), RAW_LOG_MAX_BYTES),
                "ws frame received"
            );
        }

        let frame = match self.shared.codec.decode(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(
                    connection_id = %self.connection_id,
                    error = %err,
                    "undecodable frame; tearing down connection"
                );
                return Err(DisconnectReason::DecodeFailed);
            }
        };

        match frame {
            InboundFrame::Ping(token) => {
                let sent = match self.shared.codec.encode_pong(token.as_deref()) {
                    Ok(pong) => self.shared.writer.send_text(pong).await,
                    Err(err) => Err(err),
                };
                if let Err(err) = sent {
                    warn!(error = %err, "pong reply failed");
                }
            }
            InboundFrame::Pong => {}
            InboundFrame::AuthAck { success: true, .. } => debug!("auth ack received"),
            InboundFrame::AuthAck {
                success: false,
                message,
            } => {
                error!(
                    connection_id = %self.connection_id,
                    reason = message.as_deref().unwrap_or(""),
                    "auth rejected; tearing down connection"
                );
                return Err(DisconnectReason::AuthRejected);
            }
            InboundFrame::SubAck {
                topic,
                success: true,
            } => {
                self.shared.subscriptions.mark_confirmed(&topic);
            }
            InboundFrame::SubAck {
                topic,
                success: false,
            } => warn!(%topic, "server rejected subscription"),
            InboundFrame::Data { topic, payload } => {
                self.shared.dispatcher.dispatch(&topic, &payload);
            }
            InboundFrame::Unknown => debug!("unclassified frame ignored"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly() {
        let step = Duration::from_secs(5);
        assert_eq!(backoff_duration(step, 0), Duration::ZERO);
        assert_eq!(backoff_duration(step, 1), Duration::from_secs(5));
        assert_eq!(backoff_duration(step, 2), Duration::from_secs(10));
        assert_eq!(backoff_duration(step, 7), Duration::from_secs(35));
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(backoff_duration(Duration::MAX, 2), Duration::MAX);
    }
}
