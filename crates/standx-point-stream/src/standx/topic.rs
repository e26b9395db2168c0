/*
[INPUT]:  Topic strings of the form "channel" or "channel:symbol"
[OUTPUT]: Parsed Topic with channel and optional symbol
[POS]:    StandX adapter - topic naming
[UPDATE]: When the topic naming scheme changes
*/

use std::fmt;

use serde::Serialize;

use crate::error::{Result, StreamError};

use super::{CHANNEL_DEPTH_BOOK, CHANNEL_PRICE};

/// Channel plus optional symbol, serialized as the subscribe body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Topic {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl Topic {
    pub fn new(channel: impl Into<String>, symbol: Option<&str>) -> Self {
        Self {
            channel: channel.into(),
            symbol: symbol.map(str::to_string),
        }
    }

    pub fn price(symbol: &str) -> Self {
        Self::new(CHANNEL_PRICE, Some(symbol))
    }

    pub fn depth_book(symbol: &str) -> Self {
        Self::new(CHANNEL_DEPTH_BOOK, Some(symbol))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let (channel, symbol) = match raw.split_once(':') {
            Some((channel, symbol)) => (channel, Some(symbol)),
            None => (raw, None),
        };

        if channel.is_empty() {
            return Err(StreamError::Config(format!("topic '{raw}' has no channel")));
        }
        if symbol.is_some_and(str::is_empty) {
            return Err(StreamError::Config(format!("topic '{raw}' has an empty symbol")));
        }

        Ok(Self::new(channel, symbol))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{}:{symbol}", self.channel),
            None => f.write_str(&self.channel),
        }
    }
}
