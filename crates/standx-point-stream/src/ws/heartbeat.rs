/*
[INPUT]:  Heartbeat mode, idle timeout, liveness timestamps from the read loop
[OUTPUT]: Client pings on a fixed interval; disconnect signal on ping failure or silence
[POS]:    WebSocket layer - liveness detection for one connection
[UPDATE]: When changing ping cadence or staleness rules
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::StreamCodec;
use super::signal::{DisconnectReason, DisconnectSignal};
use super::writer::FrameWriter;

const MIN_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatMode {
    /// Server sends pings, the read loop answers them
    ServerDriven,
    /// Client sends a ping every `interval`
    ClientDriven { interval: Duration },
}

/// Last time anything arrived on the current connection
#[derive(Debug)]
pub struct Liveness {
    last_seen: Mutex<Instant>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the heartbeat task of one connection needs
pub(crate) struct Heartbeat<C> {
    pub mode: HeartbeatMode,
    pub idle_timeout: Option<Duration>,
    pub codec: Arc<C>,
    pub writer: Arc<FrameWriter>,
    pub liveness: Arc<Liveness>,
    pub disconnect: DisconnectSignal,
    pub token: CancellationToken,
}

impl<C: StreamCodec> Heartbeat<C> {
    /// Spawn the ticking task, or `None` when the server drives liveness
    /// and no idle timeout is configured.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        let tick = tick_period(self.mode, self.idle_timeout)?;
        Some(tokio::spawn(self.run(tick)))
    }

    async fn run(self, tick: Duration) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let mut last_ping = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!("heartbeat stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Some(idle_timeout) = self.idle_timeout {
                let idle = self.liveness.idle_for();
                if idle >= idle_timeout {
                    warn!(?idle, ?idle_timeout, "no inbound frames within idle timeout");
                    self.disconnect.fire(DisconnectReason::IdleTimeout);
                    return;
                }
            }

            if let HeartbeatMode::ClientDriven { interval } = self.mode
                && last_ping.elapsed() >= interval
            {
                last_ping = Instant::now();
                let sent = match self.codec.encode_ping() {
                    Some(frame) => self.writer.send_text(frame).await,
                    None => self.writer.send_ping(Vec::new()).await,
                };
                if let Err(err) = sent {
                    warn!(error = %err, "heartbeat ping failed");
                    self.disconnect.fire(DisconnectReason::HeartbeatFailed);
                    return;
                }
            }
        }
    }
}

fn tick_period(mode: HeartbeatMode, idle_timeout: Option<Duration>) -> Option<Duration> {
    let ping = match mode {
        HeartbeatMode::ClientDriven { interval } => Some(interval.max(MIN_TICK)),
        HeartbeatMode::ServerDriven => None,
    };
    let idle = idle_timeout.map(|timeout| (timeout / 2).max(MIN_TICK));
    match (ping, idle) {
        (Some(ping), Some(idle)) => Some(ping.min(idle)),
        (ping, idle) => ping.or(idle),
    }
}
