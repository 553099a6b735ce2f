// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source abstraction, so the scheduler and session store can be driven
//! by a fake clock in tests instead of the wall clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A source of the current time, injected everywhere the gateway needs
/// timestamps so tests can control it deterministically.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Current time formatted as ISO-8601 UTC with millisecond precision,
    /// matching the Gateway Record's `startedAt` format.
    fn now_iso8601(&self) -> String {
        let ms = self.now_ms();
        let secs = ms.div_euclid(1000);
        let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
        DateTime::<Utc>::from_timestamp(secs, nanos)
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is valid"))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only advances when told to, for deterministic tests of the
/// activation FSM and resize coalescer.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now_ms: Arc<AtomicI64>,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_ms(&self, value: i64) {
        self.now_ms.store(value, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(1_700_000_000_000)
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_on_demand() {
        let clock = FakeClock::new(0);
        assert_eq!(clock.now_ms(), 0);
        clock.advance_ms(1_500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn iso8601_round_trips_through_chrono() {
        let clock = FakeClock::new(1_700_000_000_000);
        let s = clock.now_iso8601();
        assert!(DateTime::parse_from_rfc3339(&s).is_ok());
        assert!(s.ends_with('Z'));
    }
}
