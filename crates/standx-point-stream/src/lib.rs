/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Resilient exchange streaming client surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod config;
pub mod error;
pub mod standx;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{AuthHandshake, AuthRequest, HmacSha256Signer, NonceGenerator, Signer};

pub use config::{AuthVersion, Credentials, HeartbeatConfig, StreamConfig};
pub use error::{Result, StreamError};

// Re-export the StandX adapter
pub use standx::{
    DepthBookData,
    OrderUpdateData,
    PriceData,
    StandxCodec,
    StandxPayload,
    StandxStreamClient,
    Topic,
};

// Re-export commonly used types from ws
pub use ws::{
    ConnectionState,
    DisconnectReason,
    FrameKind,
    HeartbeatMode,
    InboundFrame,
    ListenerId,
    StreamClient,
    StreamCodec,
};
