/*
[INPUT]:  Wall clock (milliseconds)
[OUTPUT]: Strictly increasing nonces
[POS]:    Auth layer - client-owned nonce source for signed handshakes
[UPDATE]: When changing nonce format or seeding
*/

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Monotonic nonce generator owned by a single client.
///
/// Values track wall-clock milliseconds but never repeat or go backwards,
/// even when called faster than the clock advances.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }
}
