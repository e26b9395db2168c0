/*
[INPUT]:  Data objects of StandX stream frames
[OUTPUT]: Typed payloads (price, depth book, order) and the channel-tagged envelope
[POS]:    StandX adapter - message model
[UPDATE]: When StandX adds channels or changes payload fields
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Market price data
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceData {
    pub base: String,
    pub index_price: String,
    pub last_price: String,
    pub mark_price: String,
    pub mid_price: String,
    pub quote: String,
    #[serde(default)]
    pub spread: Vec<String>,
    pub symbol: String,
    pub time: String,
}

/// Depth book snapshot, levels as `[price, qty]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DepthBookData {
    pub asks: Vec<Vec<String>>,
    pub bids: Vec<Vec<String>>,
    pub symbol: String,
}

impl DepthBookData {
    pub fn best_bid(&self) -> Option<&str> {
        self.bids.first().and_then(|level| level.first()).map(String::as_str)
    }

    pub fn best_ask(&self) -> Option<&str> {
        self.asks.first().and_then(|level| level.first()).map(String::as_str)
    }
}

/// Order update data
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderUpdateData {
    pub id: i64,
    pub symbol: String,
    pub side: String,
    pub status: String,
    pub qty: String,
    pub fill_qty: String,
    pub price: String,
    pub order_type: String,
}

/// Payload handed to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum StandxPayload {
    Price(PriceData),
    DepthBook(DepthBookData),
    Order(OrderUpdateData),
    Position(Value),
    Balance(Value),
}

impl StandxPayload {
    pub fn channel(&self) -> &'static str {
        match self {
            StandxPayload::Price(_) => super::CHANNEL_PRICE,
            StandxPayload::DepthBook(_) => super::CHANNEL_DEPTH_BOOK,
            StandxPayload::Order(_) => super::CHANNEL_ORDER,
            StandxPayload::Position(_) => super::CHANNEL_POSITION,
            StandxPayload::Balance(_) => super::CHANNEL_BALANCE,
        }
    }
}

/// Data frame envelope keyed by `channel`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "channel")]
pub(crate) enum ChannelMessage {
    #[serde(rename = "price")]
    Price { symbol: String, data: PriceData },
    #[serde(rename = "depth_book")]
    DepthBook { symbol: String, data: DepthBookData },
    #[serde(rename = "order")]
    Order { data: OrderUpdateData },
    #[serde(rename = "position")]
    Position { data: Value },
    #[serde(rename = "balance")]
    Balance { data: Value },
    #[serde(other)]
    Other,
}

impl ChannelMessage {
    /// Topic and payload, `None` for unrecognized channels
    pub(crate) fn into_topic_payload(self) -> Option<(String, StandxPayload)> {
        let pair = match self {
            ChannelMessage::Price { symbol, data } => (
                format!("{}:{symbol}", super::CHANNEL_PRICE),
                StandxPayload::Price(data),
            ),
            ChannelMessage::DepthBook { symbol, data } => (
                format!("{}:{symbol}", super::CHANNEL_DEPTH_BOOK),
                StandxPayload::DepthBook(data),
            ),
            ChannelMessage::Order { data } => {
                (super::CHANNEL_ORDER.to_string(), StandxPayload::Order(data))
            }
            ChannelMessage::Position { data } => (
                super::CHANNEL_POSITION.to_string(),
                StandxPayload::Position(data),
            ),
            ChannelMessage::Balance { data } => (
                super::CHANNEL_BALANCE.to_string(),
                StandxPayload::Balance(data),
            ),
            ChannelMessage::Other => return None,
        };
        Some(pair)
    }
}
