/*
[INPUT]:  Stream URL, dial timeout, maximum frame size
[OUTPUT]: Split socket halves; whole inbound frames as RawFrame
[POS]:    WebSocket layer - raw duplex transport (dial + frame reads)
[UPDATE]: When changing TLS/connect options or frame limits
*/

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};

use crate::error::{Result, StreamError};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, WsMessage>;
pub type WsSource = SplitStream<WsStream>;

/// One whole inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// Text or binary application frame
    Data(Vec<u8>),
    /// Transport-level ping with its payload
    Ping(Vec<u8>),
    Pong,
    Close,
}

/// Open a socket, bounded by `timeout`.
///
/// The protocol layer rejects inbound frames and messages over
/// `max_frame_size` before buffering them.
pub async fn dial(
    url: &str,
    timeout: Duration,
    max_frame_size: usize,
) -> Result<(WsSink, WsSource)> {
    let config = WebSocketConfig::default()
        .max_message_size(Some(max_frame_size))
        .max_frame_size(Some(max_frame_size));
    let connect = connect_async_with_config(url, Some(config), false);
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok((ws_stream, _response))) => Ok(ws_stream.split()),
        Ok(Err(err)) => Err(map_ws_error(err)),
        Err(_) => Err(StreamError::Timeout {
            duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Inbound half of a socket, enforcing the frame size limit
pub struct FrameReader {
    source: WsSource,
    max_frame_size: usize,
}

impl FrameReader {
    pub fn new(source: WsSource, max_frame_size: usize) -> Self {
        Self {
            source,
            max_frame_size,
        }
    }

    /// Next whole frame; `None` once the peer is gone
    pub async fn next_frame(&mut self) -> Option<Result<RawFrame>> {
        loop {
            let message = match self.source.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(map_ws_error(err))),
            };

            let frame = match message {
                WsMessage::Text(text) => RawFrame::Data(text.as_bytes().to_vec()),
                WsMessage::Binary(bytes) => RawFrame::Data(bytes.to_vec()),
                WsMessage::Ping(payload) => RawFrame::Ping(payload.to_vec()),
                WsMessage::Pong(_) => RawFrame::Pong,
                WsMessage::Close(_) => RawFrame::Close,
                WsMessage::Frame(_) => continue,
            };

            if let RawFrame::Data(bytes) = &frame
                && bytes.len() > self.max_frame_size
            {
                return Some(Err(StreamError::FrameTooLarge {
                    size: bytes.len(),
                    limit: self.max_frame_size,
                }));
            }

            return Some(Ok(frame));
        }
    }
}

fn map_ws_error(err: WsError) -> StreamError {
    match err {
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            StreamError::FrameTooLarge {
                size,
                limit: max_size,
            }
        }
        other => StreamError::WebSocket(other.to_string()),
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut cut = max_len;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + 3);
    out.push_str(&value[..cut]);
    out.push_str("...");
    out
}
