//! Millisecond clock and the one-shot timers built on it
//!
//! Frame delta is measured across the present call so it includes the vsync
//! wait; converting the result to 16.16 seconds keeps animation tuning tied
//! to wall time.

use std::time::Instant;

use crate::fixed::{FRAC_BITS, Fx, mul};

// 1/1000 in 16.16; multiplying by it converts milliseconds to seconds
// without a division.
const ONE_MSEC_INV: Fx = 65;

/// Monotonic millisecond source.
pub trait Clock {
    fn now_ms(&mut self) -> u32;
}

/// Wall clock backed by `Instant`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&mut self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

/// Deterministic clock for tests and headless runs: advances a fixed step
/// per query.
pub struct SteppedClock {
    now: u32,
    pub step_ms: u32,
}

impl SteppedClock {
    pub fn new(step_ms: u32) -> Self {
        Self { now: 0, step_ms }
    }
}

impl Clock for SteppedClock {
    fn now_ms(&mut self) -> u32 {
        self.now += self.step_ms;
        self.now
    }
}

/// Convert a millisecond delta to 16.16 seconds.
#[inline]
pub fn msec_to_fx_seconds(ms: u32) -> Fx {
    mul((ms as i32) << FRAC_BITS, ONE_MSEC_INV)
}

/// One-shot millisecond timer; disarmed after it fires until reset.
#[derive(Debug, Clone, Copy)]
pub struct SimpleTimer {
    active: bool,
    delay_ms: u32,
    last_ms: u32,
}

impl SimpleTimer {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            active: false,
            delay_ms,
            last_ms: 0,
        }
    }

    pub fn reset(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
        self.active = true;
    }

    pub fn is_ready(&mut self, now_ms: u32) -> bool {
        if !self.active {
            return false;
        }
        if now_ms.wrapping_sub(self.last_ms) >= self.delay_ms {
            self.active = false;
            return true;
        }
        false
    }
}

/// Rearmable delay window for cadence checks (spawn pacing, level switch).
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayWindow {
    pub previous_ms: u32,
    pub delay_ms: u32,
}

impl DelayWindow {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            previous_ms: 0,
            delay_ms,
        }
    }

    pub fn elapsed(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.previous_ms)
    }

    pub fn ready(&self, now_ms: u32) -> bool {
        self.elapsed(now_ms) >= self.delay_ms
    }

    pub fn rearm(&mut self, now_ms: u32) {
        self.previous_ms = now_ms;
    }
}
