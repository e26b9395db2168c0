/*
[INPUT]:  Outbound frames from subscribe/unsubscribe, auth, heartbeat, pong replies
[OUTPUT]: Frames written to the attached socket, one at a time, with a fixed pause after each
[POS]:    WebSocket layer - single outbound write serialization point
[UPDATE]: When changing rate-limit pacing or close behavior
*/

use std::fmt;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use crate::error::{Result, StreamError};

use super::transport::{WsSink, truncate_for_log};

const RAW_LOG_MAX_BYTES: usize = 1024;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Serializes all writes to the current socket
pub struct FrameWriter {
    sink: Mutex<Option<WsSink>>,
    /// Cancelled when the attached sink is detached; replaced on attach
    attachment: parking_lot::Mutex<CancellationToken>,
    interval: Duration,
    timeout: Duration,
    debug: bool,
}

impl FrameWriter {
    pub fn new(interval: Duration, timeout: Duration, debug: bool) -> Self {
        Self {
            sink: Mutex::new(None),
            attachment: parking_lot::Mutex::new(CancellationToken::new()),
            interval,
            timeout,
            debug,
        }
    }

    /// Install the outbound half of a fresh connection
    pub async fn attach(&self, sink: WsSink) {
        let mut guard = self.sink.lock().await;
        *self.attachment.lock() = CancellationToken::new();
        let previous = guard.replace(sink);
        drop(guard);
        if let Some(previous) = previous {
            close_sink(previous).await;
        }
    }

    /// Remove and close the current outbound half, if any.
    ///
    /// A write in flight on that sink is abandoned with `Write`.
    pub async fn detach(&self) {
        self.attachment.lock().cancel();
        let sink = self.sink.lock().await.take();
        if let Some(sink) = sink {
            close_sink(sink).await;
        }
    }

    pub async fn is_attached(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    pub async fn send_text(&self, text: String) -> Result<()> {
        if self.debug {
            debug!(
                bytes = text.len(),
                frame = %truncate_for_log(&text, RAW_LOG_MAX_BYTES),
                "ws frame sent"
            );
        }
        self.send(WsMessage::Text(text.into())).await
    }

    pub async fn send_ping(&self, payload: Vec<u8>) -> Result<()> {
        self.send(WsMessage::Ping(payload.into())).await
    }

    pub async fn send_pong(&self, payload: Vec<u8>) -> Result<()> {
        self.send(WsMessage::Pong(payload.into())).await
    }

    async fn send(&self, message: WsMessage) -> Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(StreamError::NotConnected)?;
        let detached = self.attachment.lock().clone();

        tokio::select! {
            biased;
            _ = detached.cancelled() => {
                return Err(StreamError::Write("socket detached during write".to_string()));
            }
            sent = tokio::time::timeout(self.timeout, sink.send(message)) => match sent {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(StreamError::Write(err.to_string())),
                Err(_) => {
                    return Err(StreamError::Write(format!(
                        "write not completed within {:?}",
                        self.timeout
                    )));
                }
            },
        }

        // pause while still holding the lock so the next writer waits too
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        Ok(())
    }
}

impl fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWriter")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

async fn close_sink(mut sink: WsSink) {
    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        debug!("ws close handshake timed out");
    }
}
