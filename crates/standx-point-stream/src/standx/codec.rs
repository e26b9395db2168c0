/*
[INPUT]:  Topics, auth requests, raw StandX stream frames
[OUTPUT]: StandX JSON envelopes, classified InboundFrame<StandxPayload>
[POS]:    StandX adapter - StreamCodec implementation
[UPDATE]: When the StandX envelope or control frames change
*/

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::auth::AuthRequest;
use crate::error::{Result, StreamError};
use crate::ws::{InboundFrame, StreamCodec};

use super::message::{ChannelMessage, StandxPayload};
use super::topic::Topic;

const AUTH_CHANNEL: &str = "auth";
const EVENT_SUBSCRIBED: &str = "subscribed";
const EVENT_ERROR: &str = "error";

/// JSON envelope used by the StandX market and order streams
#[derive(Debug, Clone, Copy, Default)]
pub struct StandxCodec;

impl StandxCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode_object(&self, object: Map<String, Value>) -> Result<InboundFrame<StandxPayload>> {
        if let Some(token) = object.get("ping") {
            return Ok(InboundFrame::Ping(token_string(token)));
        }
        if object.contains_key("pong") {
            return Ok(InboundFrame::Pong);
        }
        if let Some(event) = object.get("event").and_then(Value::as_str) {
            return decode_event(event, &object);
        }

        match object.get("channel").and_then(Value::as_str) {
            Some(AUTH_CHANNEL) => decode_auth_ack(&object),
            Some(_) => {
                let message: ChannelMessage = serde_json::from_value(Value::Object(object))
                    .map_err(|err| StreamError::decode(format!("bad data frame: {err}")))?;
                Ok(match message.into_topic_payload() {
                    Some((topic, payload)) => InboundFrame::Data { topic, payload },
                    None => InboundFrame::Unknown,
                })
            }
            None => Ok(InboundFrame::Unknown),
        }
    }
}

impl StreamCodec for StandxCodec {
    type Payload = StandxPayload;

    fn encode_subscribe(&self, topic: &str) -> Result<String> {
        let topic = Topic::parse(topic)?;
        Ok(json!({ "subscribe": topic }).to_string())
    }

    fn encode_unsubscribe(&self, topic: &str) -> Result<String> {
        let topic = Topic::parse(topic)?;
        Ok(json!({ "unsubscribe": topic }).to_string())
    }

    fn encode_auth(&self, request: &AuthRequest) -> Result<String> {
        Ok(serde_json::to_string(&json!({ "auth": request }))?)
    }

    fn encode_pong(&self, token: Option<&str>) -> Result<String> {
        let value = match token {
            Some(token) => token
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(token)),
            None => Value::from(Utc::now().timestamp_millis()),
        };
        Ok(json!({ "pong": value }).to_string())
    }

    fn encode_ping(&self) -> Option<String> {
        Some(json!({ "ping": Utc::now().timestamp_millis() }).to_string())
    }

    fn decode(&self, frame: &[u8]) -> Result<InboundFrame<StandxPayload>> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|err| StreamError::decode(format!("invalid JSON: {err}")))?;
        match value {
            Value::Object(object) => self.decode_object(object),
            other => Err(StreamError::decode(format!(
                "expected JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn decode_event(event: &str, object: &Map<String, Value>) -> Result<InboundFrame<StandxPayload>> {
    let success = match event {
        EVENT_SUBSCRIBED => true,
        EVENT_ERROR => false,
        _ => return Ok(InboundFrame::Unknown),
    };

    let topic = match object.get("topic").and_then(Value::as_str) {
        Some(topic) => topic.to_string(),
        None => {
            let channel = object
                .get("channel")
                .and_then(Value::as_str)
                .ok_or_else(|| StreamError::decode(format!("'{event}' event without topic")))?;
            let symbol = object.get("symbol").and_then(Value::as_str);
            Topic::new(channel, symbol).to_string()
        }
    };

    Ok(InboundFrame::SubAck { topic, success })
}

fn decode_auth_ack(object: &Map<String, Value>) -> Result<InboundFrame<StandxPayload>> {
    let data = object
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| StreamError::decode("auth frame without data"))?;
    let code = data
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| StreamError::decode("auth frame without code"))?;
    let message = data.get("msg").and_then(Value::as_str).map(str::to_string);

    Ok(InboundFrame::AuthAck {
        success: code == 0,
        message,
    })
}

fn token_string(token: &Value) -> Option<String> {
    match token {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
