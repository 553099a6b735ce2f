// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic poll loop used by commands that wait on daemon state (e.g.
//! `gateway start` waiting for the record to appear, `reaper` waiting for a
//! terminated process to exit).

use std::time::{Duration, Instant};

/// Outcome of a single [`Poller::tick`].
pub enum Tick {
    Ready,
    Timeout,
    Interrupted,
}

/// A fixed-interval poll loop with an overall deadline and ctrl-c awareness.
pub struct Poller {
    interval: Duration,
    deadline: Instant,
    ctrl_c: bool,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, deadline: Instant::now() + timeout, ctrl_c: false }
    }

    /// Sleep one interval, then report whether the deadline has passed or a
    /// ctrl-c was observed (callers poll `ctrlc`-style flags between ticks).
    pub fn tick(&mut self) -> Tick {
        if self.ctrl_c {
            return Tick::Interrupted;
        }
        if Instant::now() >= self.deadline {
            return Tick::Timeout;
        }
        std::thread::sleep(self.interval.min(self.deadline.saturating_duration_since(Instant::now())));
        if Instant::now() >= self.deadline {
            Tick::Timeout
        } else {
            Tick::Ready
        }
    }

    pub fn interrupt(&mut self) {
        self.ctrl_c = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_out_after_deadline() {
        let mut p = Poller::new(Duration::from_millis(5), Duration::from_millis(20));
        let mut ticks = 0;
        loop {
            match p.tick() {
                Tick::Ready => ticks += 1,
                Tick::Timeout => break,
                Tick::Interrupted => panic!("unexpected interrupt"),
            }
            if ticks > 100 {
                panic!("never timed out");
            }
        }
    }

    #[test]
    fn interrupt_short_circuits() {
        let mut p = Poller::new(Duration::from_millis(5), Duration::from_secs(10));
        p.interrupt();
        assert!(matches!(p.tick(), Tick::Interrupted));
    }
}
