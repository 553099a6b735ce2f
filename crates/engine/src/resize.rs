// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layout/resize service (4.10): a single-threaded cooperative coalescer.
//! Accepts "desired (cols, rows)" events at arbitrary rate and decides, for
//! each live session, when the one PTY resize that matters should actually
//! fire. Modeled as a pure state machine over an injected `Instant` so it
//! can be driven deterministically in tests, the same way the flat
//! timer-map scheduler this supersedes was.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use harness_core::SessionId;

/// Default `resizeMinIntervalMs` (4.10).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(33);
/// Default `ptyResizeSettleMs` (4.10).
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(75);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAction {
    /// Commit this size to the PTY now.
    CommitNow(u16, u16),
    /// A timer has been (re)armed; nothing to do yet.
    Scheduled,
}

#[derive(Debug, Clone)]
struct Entry {
    desired: (u16, u16),
    last_committed_at: Option<Instant>,
    next_fire: Option<Instant>,
    settle_until: Option<Instant>,
}

/// Coalesces resize requests per session so at most one PTY resize fires
/// per `min_interval`, with a settle window after each commit that absorbs
/// a burst of immediately-following requests (e.g. a drag-resize).
#[derive(Debug)]
pub struct ResizeCoalescer {
    min_interval: Duration,
    settle: Duration,
    entries: HashMap<SessionId, Entry>,
}

impl Default for ResizeCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL, DEFAULT_SETTLE)
    }
}

impl ResizeCoalescer {
    pub fn new(min_interval: Duration, settle: Duration) -> Self {
        Self {
            min_interval,
            settle,
            entries: HashMap::new(),
        }
    }

    /// Records a desired size for `session_id` and decides whether to
    /// commit immediately or defer to a coalesced fire. `immediate` only
    /// bypasses throttling when `is_active_live` is true (4.10).
    pub fn request(
        &mut self,
        session_id: SessionId,
        cols: u16,
        rows: u16,
        now: Instant,
        immediate: bool,
        is_active_live: bool,
    ) -> ResizeAction {
        let entry = self.entries.entry(session_id).or_insert(Entry {
            desired: (cols, rows),
            last_committed_at: None,
            next_fire: None,
            settle_until: None,
        });
        entry.desired = (cols, rows);

        if immediate && is_active_live {
            entry.next_fire = None;
            entry.last_committed_at = Some(now);
            entry.settle_until = Some(now + self.settle);
            return ResizeAction::CommitNow(cols, rows);
        }

        let fire_at = if let Some(settle_until) = entry.settle_until {
            if now < settle_until {
                let remaining = settle_until - now;
                let min_interval_gap = entry
                    .last_committed_at
                    .map(|t| (t + self.min_interval).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO);
                now + remaining.max(min_interval_gap)
            } else {
                self.earliest_allowed(entry, now)
            }
        } else {
            self.earliest_allowed(entry, now)
        };

        if fire_at <= now && entry.next_fire.is_none() {
            entry.last_committed_at = Some(now);
            entry.settle_until = Some(now + self.settle);
            return ResizeAction::CommitNow(cols, rows);
        }

        entry.next_fire = Some(fire_at.max(now));
        ResizeAction::Scheduled
    }

    fn earliest_allowed(&self, entry: &Entry, now: Instant) -> Instant {
        entry
            .last_committed_at
            .map(|t| t + self.min_interval)
            .unwrap_or(now)
    }

    /// Returns every session whose coalesced timer has elapsed by `now`,
    /// each with the most recently desired size, and clears their timers.
    pub fn due(&mut self, now: Instant) -> Vec<(SessionId, (u16, u16))> {
        let mut fired = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if let Some(fire_at) = entry.next_fire {
                if fire_at <= now {
                    fired.push((id.clone(), entry.desired));
                    entry.next_fire = None;
                    entry.last_committed_at = Some(now);
                    entry.settle_until = Some(now + self.settle);
                }
            }
        }
        fired
    }

    /// Clamps a divider move to `[1, cols-1]` (4.10).
    pub fn clamp_divider(position: u16, cols: u16) -> u16 {
        if cols <= 1 {
            return 0;
        }
        position.clamp(1, cols - 1)
    }

    pub fn clear_resize_timer(&mut self, session_id: &SessionId) {
        if let Some(entry) = self.entries.get_mut(session_id) {
            entry.next_fire = None;
        }
    }

    pub fn clear_pty_resize_timer(&mut self, session_id: &SessionId) {
        if let Some(entry) = self.entries.get_mut(session_id) {
            entry.settle_until = None;
        }
    }

    pub fn forget(&mut self, session_id: &SessionId) {
        self.entries.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    #[test]
    fn first_request_commits_immediately_when_idle() {
        let mut c = ResizeCoalescer::new(Duration::from_millis(33), Duration::from_millis(75));
        let now = Instant::now();
        let action = c.request(sid("s1"), 80, 24, now, false, false);
        assert_eq!(action, ResizeAction::CommitNow(80, 24));
    }

    #[test]
    fn rapid_followups_within_min_interval_coalesce() {
        let mut c = ResizeCoalescer::new(Duration::from_millis(33), Duration::from_millis(75));
        let t0 = Instant::now();
        assert_eq!(c.request(sid("s1"), 80, 24, t0, false, false), ResizeAction::CommitNow(80, 24));

        let t1 = t0 + Duration::from_millis(5);
        assert_eq!(c.request(sid("s1"), 100, 30, t1, false, false), ResizeAction::Scheduled);

        // not due yet
        assert!(c.due(t1 + Duration::from_millis(10)).is_empty());

        let fired = c.due(t0 + Duration::from_millis(80));
        assert_eq!(fired, vec![(sid("s1"), (100, 30))]);
    }

    #[test]
    fn immediate_bypasses_throttle_only_when_active_live() {
        let mut c = ResizeCoalescer::default();
        let t0 = Instant::now();
        c.request(sid("s1"), 80, 24, t0, false, false);
        let t1 = t0 + Duration::from_millis(1);
        assert_eq!(
            c.request(sid("s1"), 90, 25, t1, true, false),
            ResizeAction::Scheduled
        );
        assert_eq!(
            c.request(sid("s1"), 91, 26, t1, true, true),
            ResizeAction::CommitNow(91, 26)
        );
    }

    #[test]
    fn clamp_divider_respects_bounds() {
        assert_eq!(ResizeCoalescer::clamp_divider(0, 100), 1);
        assert_eq!(ResizeCoalescer::clamp_divider(200, 100), 99);
        assert_eq!(ResizeCoalescer::clamp_divider(50, 100), 50);
    }

    #[test]
    fn clearing_timers_drops_pending_fire() {
        let mut c = ResizeCoalescer::default();
        let t0 = Instant::now();
        c.request(sid("s1"), 80, 24, t0, false, false);
        c.request(sid("s1"), 81, 25, t0 + Duration::from_millis(1), false, false);
        c.clear_resize_timer(&sid("s1"));
        assert!(c.due(t0 + Duration::from_secs(1)).is_empty());
    }
}
