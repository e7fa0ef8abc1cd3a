//! Token bucket for outbound rate limiting
//!
//! `delay` is the time it takes to earn one token back and `burst` the size
//! of the bucket. Each sent line spends one token; once fewer than one
//! token is left the send loop has to wait `delay` before the next line.

use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Throttle {
    /// Tokens left, never above the burst size
    tokens: f64,
    /// When the previous line was accounted for
    last_send: Option<Instant>,
}

impl Throttle {
    /// Start with a full bucket
    pub fn new(burst: u32) -> Self {
        Self {
            tokens: f64::from(burst),
            last_send: None,
        }
    }

    /// Account for a line sent at `now`
    ///
    /// Returns how long the sender must pause before the next line, if at
    /// all. A `delay` of zero disables throttling.
    pub fn record_send(&mut self, now: Instant, delay: Duration, burst: u32) -> Option<Duration> {
        if delay.is_zero() {
            return None;
        }

        let burst = f64::from(burst);
        if let Some(last_send) = self.last_send {
            let owed = now.saturating_duration_since(last_send).as_secs_f64() / delay.as_secs_f64();
            self.tokens += owed;
        }
        self.tokens = self.tokens.min(burst);

        self.last_send = Some(now);
        self.tokens -= 1.0;

        if self.tokens < 1.0 {
            debug!("Send throttle exhausted ({:.2} tokens left), pausing {:?}", self.tokens, delay);
            Some(delay)
        } else {
            None
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
