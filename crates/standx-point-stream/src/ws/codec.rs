/*
[INPUT]:  Topic strings, auth requests, raw inbound frame bytes
[OUTPUT]: Encoded outbound text frames, classified InboundFrame values
[POS]:    WebSocket layer - pluggable exchange envelope (encoder + decoder)
[UPDATE]: When adding frame classes or changing the codec contract
*/

use crate::auth::AuthRequest;
use crate::error::Result;

/// Classification tag of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Ping,
    Pong,
    AuthAck,
    SubAck,
    Data,
    Unknown,
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame<P> {
    /// Server liveness ping; the token is echoed back in the pong
    Ping(Option<String>),
    Pong,
    AuthAck {
        success: bool,
        message: Option<String>,
    },
    SubAck {
        topic: String,
        success: bool,
    },
    Data {
        topic: String,
        payload: P,
    },
    Unknown,
}

impl<P> InboundFrame<P> {
    pub fn kind(&self) -> FrameKind {
        match self {
            InboundFrame::Ping(_) => FrameKind::Ping,
            InboundFrame::Pong => FrameKind::Pong,
            InboundFrame::AuthAck { .. } => FrameKind::AuthAck,
            InboundFrame::SubAck { .. } => FrameKind::SubAck,
            InboundFrame::Data { .. } => FrameKind::Data,
            InboundFrame::Unknown => FrameKind::Unknown,
        }
    }
}

/// Exchange-specific wire envelope.
///
/// The client never inspects frame contents itself; everything it sends is
/// produced here and everything it receives is classified here.
pub trait StreamCodec: Send + Sync + 'static {
    type Payload: Send + Sync + 'static;

    fn encode_subscribe(&self, topic: &str) -> Result<String>;

    fn encode_unsubscribe(&self, topic: &str) -> Result<String>;

    fn encode_auth(&self, request: &AuthRequest) -> Result<String>;

    fn encode_pong(&self, token: Option<&str>) -> Result<String>;

    /// Application-level ping. `None` falls back to a transport ping frame.
    fn encode_ping(&self) -> Option<String> {
        None
    }

    /// Classify and decode one frame. Errors are fatal for the connection.
    fn decode(&self, frame: &[u8]) -> Result<InboundFrame<Self::Payload>>;
}
