//! Per-kind polling cadence.
//!
//! A cadence is a fixed tick interval plus an optional modulo gate. A gated
//! kind is polled on a tick only when `unix_millis(now) mod period < window`.
//! There is no second timer: the gate is evaluated against the wall clock on
//! every tick, so a tick that lands just before the window opens skips a whole
//! period, and jitter around the window edges can let two ticks through in
//! one period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wall-clock window inside which a gated kind may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceGate {
    pub period_seconds: u64,
    pub window_seconds: u64,
}

impl CadenceGate {
    pub fn new(period_seconds: u64, window_seconds: u64) -> Self {
        Self {
            period_seconds,
            window_seconds,
        }
    }

    /// Whether `now` falls inside the open part of the period.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let period_ms = (self.period_seconds as i64).saturating_mul(1000);
        if period_ms <= 0 {
            return true;
        }
        let window_ms = (self.window_seconds as i64).saturating_mul(1000);
        now.timestamp_millis().rem_euclid(period_ms) < window_ms
    }
}

/// How often a kind is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    pub gate: Option<CadenceGate>,
}

impl Cadence {
    /// Fire on every tick.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            gate: None,
        }
    }

    /// Tick every `interval`, fire only while `gate` is open.
    pub fn gated(interval: Duration, gate: CadenceGate) -> Self {
        Self {
            interval,
            gate: Some(gate),
        }
    }

    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        self.gate.map_or(true, |gate| gate.is_open(now))
    }
}
