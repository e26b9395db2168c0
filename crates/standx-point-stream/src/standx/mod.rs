/*
[INPUT]:  StandX stream endpoints and JSON envelope
[OUTPUT]: StandxCodec, typed payloads, topic helpers
[POS]:    StandX adapter - reference exchange codec for StreamClient
[UPDATE]: When adding channels or endpoints
*/

pub mod codec;
pub mod message;
pub mod topic;

pub use codec::StandxCodec;
pub use message::{DepthBookData, OrderUpdateData, PriceData, StandxPayload};
pub use topic::Topic;

use crate::ws::StreamClient;

/// Public market data stream
pub const MARKET_STREAM_URL: &str = "wss://perps.standx.com/ws-stream/v1";
/// Authenticated order response stream
pub const ORDER_STREAM_URL: &str = "wss://perps.standx.com/ws-api/v1";

pub const CHANNEL_PRICE: &str = "price";
pub const CHANNEL_DEPTH_BOOK: &str = "depth_book";
pub const CHANNEL_ORDER: &str = "order";
pub const CHANNEL_POSITION: &str = "position";
pub const CHANNEL_BALANCE: &str = "balance";

/// Streaming client speaking the StandX envelope
pub type StandxStreamClient = StreamClient<StandxCodec>;
