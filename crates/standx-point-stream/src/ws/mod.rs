/*
[INPUT]:  Stream configuration, codec, subscription topics, listener callbacks
[OUTPUT]: Self-healing WebSocket stream with replayed subscriptions
[POS]:    WebSocket layer - connection lifecycle, pacing, liveness, dispatch
[UPDATE]: When adding submodules or changing connection logic
*/

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod heartbeat;
pub mod listeners;
pub mod signal;
pub mod state;
pub mod subscriptions;
mod supervisor;
pub mod transport;
pub mod writer;

pub use client::StreamClient;
pub use codec::{FrameKind, InboundFrame, StreamCodec};
pub use heartbeat::HeartbeatMode;
pub use listeners::ListenerId;
pub use signal::DisconnectReason;
pub use state::ConnectionState;
pub use subscriptions::SubscriptionRegistry;
