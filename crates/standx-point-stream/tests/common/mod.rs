/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: In-process mock stream servers, client fixtures, polling helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for standx-point-stream tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use standx_point_stream::auth::AuthRequest;
use standx_point_stream::{
    InboundFrame, Result, StandxCodec, StandxPayload, StreamCodec, StreamConfig,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(5);

/// Scripted behaviour of the mock server
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Reject this many auth requests before accepting
    pub fail_auth_first: usize,
    /// Answer every subscribe with a `subscribed` event
    pub ack_subscriptions: bool,
    /// Frames pushed right after accept, or after a successful auth ack
    /// when `expect_auth` is set
    pub push_on_connect: Vec<String>,
    pub expect_auth: bool,
    /// Read auth requests but never answer them
    pub ignore_auth: bool,
}

enum ServerCommand {
    Send(String),
    Close,
    Abort,
}

struct ConnectionRecord {
    frames: Vec<String>,
    commands: mpsc::UnboundedSender<ServerCommand>,
}

struct ServerState {
    options: MockOptions,
    auth_failures_left: AtomicUsize,
    connections: Mutex<Vec<ConnectionRecord>>,
}

/// WebSocket server recording every text frame per connection
pub struct MockStreamServer {
    pub url: String,
    state: Arc<ServerState>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server addr");
        let state = Arc::new(ServerState {
            auth_failures_left: AtomicUsize::new(options.fail_auth_first),
            options,
            connections: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_connection(stream, accept_state.clone()));
            }
        });

        Self {
            url: format!("ws://{addr}/ws-stream/v1"),
            state,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.lock().len()
    }

    /// Text frames received on connection `index`
    pub fn frames(&self, index: usize) -> Vec<String> {
        self.state
            .connections
            .lock()
            .get(index)
            .map(|record| record.frames.clone())
            .unwrap_or_default()
    }

    /// Frames on connection `index` carrying `key` at the top level
    pub fn frames_with(&self, index: usize, key: &str) -> Vec<Value> {
        self.frames(index)
            .iter()
            .filter_map(|frame| serde_json::from_str::<Value>(frame).ok())
            .filter(|value| value.get(key).is_some())
            .collect()
    }

    /// Topics of subscribe requests received on connection `index`
    pub fn subscribed_topics(&self, index: usize) -> Vec<String> {
        self.frames_with(index, "subscribe")
            .iter()
            .map(|value| topic_of(&value["subscribe"]))
            .collect()
    }

    pub fn send(&self, index: usize, frame: impl Into<String>) {
        self.command(index, ServerCommand::Send(frame.into()));
    }

    /// Close with a close frame
    pub fn close(&self, index: usize) {
        self.command(index, ServerCommand::Close);
    }

    /// Drop the TCP connection without a close frame
    pub fn abort(&self, index: usize) {
        self.command(index, ServerCommand::Abort);
    }

    fn command(&self, index: usize, command: ServerCommand) {
        if let Some(record) = self.state.connections.lock().get(index) {
            let _ = record.commands.send(command);
        }
    }
}

async fn serve_connection(stream: TcpStream, state: Arc<ServerState>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
    let index = {
        let mut connections = state.connections.lock();
        connections.push(ConnectionRecord {
            frames: Vec::new(),
            commands: commands_tx,
        });
        connections.len() - 1
    };

    let (mut sink, mut source) = ws.split();
    if !state.options.expect_auth {
        push_initial(&mut sink, &state.options).await;
    }

    loop {
        tokio::select! {
            command = commands_rx.recv() => match command {
                Some(ServerCommand::Send(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(ServerCommand::Close) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(ServerCommand::Abort) | None => break,
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_string();
                    if let Some(record) = state.connections.lock().get_mut(index) {
                        record.frames.push(text.clone());
                    }
                    let (replies, authenticated) = replies_for(&text, &state);
                    for reply in replies {
                        if sink.send(Message::Text(reply.into())).await.is_err() {
                            return;
                        }
                    }
                    if authenticated {
                        push_initial(&mut sink, &state.options).await;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn push_initial<S>(sink: &mut S, options: &MockOptions)
where
    S: futures_util::Sink<Message> + Unpin,
{
    for frame in &options.push_on_connect {
        if sink.send(Message::Text(frame.clone().into())).await.is_err() {
            return;
        }
    }
}

/// Replies to one inbound frame, plus whether it was an accepted auth request
fn replies_for(text: &str, state: &ServerState) -> (Vec<String>, bool) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return (Vec::new(), false);
    };

    if value.get("auth").is_some() {
        if state.options.ignore_auth {
            return (Vec::new(), false);
        }
        let rejected = state
            .auth_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return (vec![auth_ack_frame(401, "invalid signature")], false);
        }
        return (vec![auth_ack_frame(0, "success")], true);
    }

    if let Some(token) = value.get("ping") {
        return (vec![json!({ "pong": token }).to_string()], false);
    }

    if let Some(body) = value.get("subscribe")
        && state.options.ack_subscriptions
    {
        let ack = json!({"event": "subscribed", "topic": topic_of(body)}).to_string();
        return (vec![ack], false);
    }

    (Vec::new(), false)
}

fn topic_of(body: &Value) -> String {
    let channel = body["channel"].as_str().unwrap_or_default();
    match body["symbol"].as_str() {
        Some(symbol) => format!("{channel}:{symbol}"),
        None => channel.to_string(),
    }
}

/// TCP listener that accepts and immediately drops every connection
pub struct RefusingServer {
    pub url: String,
    accepted: Arc<AtomicUsize>,
}

impl RefusingServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind refusing server");
        let addr = listener.local_addr().expect("refusing server addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        Self {
            url: format!("ws://{addr}/ws-stream/v1"),
            accepted,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// WebSocket server that completes the upgrade and then never reads
pub struct SilentServer {
    pub url: String,
    upgraded: Arc<AtomicUsize>,
}

impl SilentServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent server");
        let addr = listener.local_addr().expect("silent server addr");
        let upgraded = Arc::new(AtomicUsize::new(0));
        let counter = upgraded.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    drop(ws);
                });
            }
        });

        Self {
            url: format!("ws://{addr}/ws-stream/v1"),
            upgraded,
        }
    }

    pub fn upgraded(&self) -> usize {
        self.upgraded.load(Ordering::SeqCst)
    }
}

/// Config with fast retries and no write pacing
pub fn fast_config(url: &str) -> StreamConfig {
    StreamConfig::new(url)
        .with_max_try_times(3)
        .with_backoff_step(Duration::from_millis(10))
        .with_reconnect_pause(Duration::from_millis(20))
        .with_dial_timeout(Duration::from_secs(2))
        .with_auth_timeout(Duration::from_secs(2))
        .with_write_interval(Duration::ZERO)
}

pub fn auth_ack_frame(code: i64, msg: &str) -> String {
    json!({"channel": "auth", "data": {"code": code, "msg": msg}}).to_string()
}

pub fn position_frame(qty: &str) -> String {
    json!({"channel": "position", "data": {"symbol": "BTC-USD", "qty": qty}}).to_string()
}

pub fn price_frame(symbol: &str, mark_price: &str) -> String {
    json!({
        "channel": "price",
        "symbol": symbol,
        "data": {
            "base": "BTC",
            "index_price": mark_price,
            "last_price": mark_price,
            "mark_price": mark_price,
            "mid_price": mark_price,
            "quote": "USD",
            "spread": [mark_price, mark_price],
            "symbol": symbol,
            "time": "2024-01-01T00:00:00Z"
        }
    })
    .to_string()
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Await `future` with the default test timeout
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future).await.expect("timed out")
}

/// StandX codec that records encode and decode calls in order
#[derive(Debug, Clone, Default)]
pub struct RecordingCodec {
    inner: StandxCodec,
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingCodec {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl StreamCodec for RecordingCodec {
    type Payload = StandxPayload;

    fn encode_subscribe(&self, topic: &str) -> Result<String> {
        self.events.lock().push(format!("subscribe:{topic}"));
        self.inner.encode_subscribe(topic)
    }

    fn encode_unsubscribe(&self, topic: &str) -> Result<String> {
        self.events.lock().push(format!("unsubscribe:{topic}"));
        self.inner.encode_unsubscribe(topic)
    }

    fn encode_auth(&self, request: &AuthRequest) -> Result<String> {
        self.events.lock().push("auth".to_string());
        self.inner.encode_auth(request)
    }

    fn encode_pong(&self, token: Option<&str>) -> Result<String> {
        self.inner.encode_pong(token)
    }

    fn encode_ping(&self) -> Option<String> {
        self.inner.encode_ping()
    }

    fn decode(&self, frame: &[u8]) -> Result<InboundFrame<StandxPayload>> {
        let decoded = self.inner.decode(frame)?;
        if let InboundFrame::Data { topic, .. } = &decoded {
            self.events.lock().push(format!("data:{topic}"));
        }
        Ok(decoded)
    }
}

/// Install a test subscriber honouring RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
