//! Interval clock.
//!
//! A virtual-time timer wheel. It owns no threads: whoever owns the wheel
//! advances it and receives the lines that became due, one at a time, in
//! deadline order. Because lines are handed out one by one, a line canceled
//! while an earlier one is being dispatched never fires, even if it was
//! already due.
//!
//! ## Usage
//!
//! ```ignore
//! let mut clock = Clock::new();
//! let handle = clock.schedule(Duration::from_secs(1), true, TimerLine::BreakCountdown);
//! while let Some((handle, line)) = clock.pop_due(target) {
//!     // dispatch `line`
//! }
//! clock.settle(target);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reminders::ReminderKind;

/// Shortest period the wheel accepts. Zero periods would spin forever.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Opaque id of one scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockHandle(u64);

#[derive(Debug, Clone)]
struct Entry<T> {
    line: T,
    period: Duration,
    repeating: bool,
    deadline: Duration,
}

/// Timer wheel keyed by `(deadline, handle)`.
///
/// Handles are allocated in increasing order and a repeating entry keeps its
/// handle when re-armed, so entries due at the same instant fire in the order
/// they were first scheduled.
#[derive(Debug, Clone)]
pub struct ClockWheel<T> {
    now: Duration,
    next_id: u64,
    entries: HashMap<ClockHandle, Entry<T>>,
    queue: BTreeMap<(Duration, ClockHandle), ()>,
}

impl<T: Clone> Default for ClockWheel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ClockWheel<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: HashMap::new(),
            queue: BTreeMap::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Virtual time elapsed since the wheel was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_active(&self, handle: ClockHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Lines of every live entry, in no particular order.
    pub fn active_lines(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|entry| &entry.line)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Schedule `line` to fire after `period`, and every `period` after that
    /// if `repeating`. Never fails.
    pub fn schedule(&mut self, period: Duration, repeating: bool, line: T) -> ClockHandle {
        let period = period.max(MIN_PERIOD);
        let handle = ClockHandle(self.next_id);
        self.next_id += 1;
        let deadline = self.now + period;
        self.entries.insert(
            handle,
            Entry {
                line,
                period,
                repeating,
                deadline,
            },
        );
        self.queue.insert((deadline, handle), ());
        handle
    }

    /// Cancel an entry. Unknown or already-finished handles are a no-op.
    /// Returns whether something was actually canceled.
    pub fn cancel(&mut self, handle: ClockHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(entry) => {
                self.queue.remove(&(entry.deadline, handle));
                true
            }
            None => false,
        }
    }

    /// Cancel whatever `slot` holds, then schedule a fresh entry into it.
    /// This is the only way a logical line should be (re)started, so a line
    /// never has two live entries.
    pub fn restart(
        &mut self,
        slot: &mut Option<ClockHandle>,
        period: Duration,
        repeating: bool,
        line: T,
    ) -> ClockHandle {
        self.stop(slot);
        let handle = self.schedule(period, repeating, line);
        *slot = Some(handle);
        handle
    }

    /// Cancel whatever `slot` holds and clear it.
    pub fn stop(&mut self, slot: &mut Option<ClockHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    /// Pop the earliest entry due at or before `until`, moving `now` to its
    /// deadline. Repeating entries are re-armed before being returned so the
    /// receiver may cancel them.
    pub fn pop_due(&mut self, until: Duration) -> Option<(ClockHandle, T)> {
        let (deadline, handle) = *self.queue.keys().next()?;
        if deadline > until {
            return None;
        }
        self.queue.remove(&(deadline, handle));
        self.now = self.now.max(deadline);

        let entry = self.entries.get_mut(&handle)?;
        let line = entry.line.clone();
        if entry.repeating {
            entry.deadline = deadline + entry.period;
            self.queue.insert((entry.deadline, handle), ());
        } else {
            self.entries.remove(&handle);
        }
        Some((handle, line))
    }

    /// Move `now` forward to `until` once everything due has been popped.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

/// Every logical timer line in the scheduler. Entries reference their owner
/// only through this token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerLine {
    /// One-second countdown to the next break.
    BreakCountdown,
    /// One-second elapsed-time line of the pre-break badge.
    PreBreakBadge,
    /// One-second countdown of the running break.
    BreakDuration,
    /// Short delay between the break reaching zero and it ending.
    BreakGrace,
    /// Repeating reminder line.
    Reminder(ReminderKind),
    /// One-shot that dismisses the reminder badge.
    ReminderAutoDismiss,
    /// Self-re-arming pointer tracking of the countdown badge.
    CountdownTracking,
}

pub type Clock = ClockWheel<TimerLine>;

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn drain(clock: &mut ClockWheel<&'static str>, until: Duration) -> Vec<(Duration, &'static str)> {
        let mut fired = Vec::new();
        while let Some((_, line)) = clock.pop_due(until) {
            fired.push((clock.now(), line));
        }
        clock.settle(until);
        fired
    }

    #[test]
    fn repeating_entry_fires_every_period() {
        let mut clock = ClockWheel::new();
        clock.schedule(secs(2), true, "tick");
        let fired = drain(&mut clock, secs(7));
        assert_eq!(fired, vec![(secs(2), "tick"), (secs(4), "tick"), (secs(6), "tick")]);
        assert_eq!(clock.now(), secs(7));
        assert_eq!(clock.next_deadline(), Some(secs(8)));
    }

    #[test]
    fn one_shot_fires_once_and_cancel_afterwards_is_noop() {
        let mut clock = ClockWheel::new();
        let handle = clock.schedule(secs(1), false, "once");
        assert_eq!(drain(&mut clock, secs(5)).len(), 1);
        assert!(!clock.is_active(handle));
        assert!(!clock.cancel(handle));
        assert_eq!(clock.active_count(), 0);
    }

    #[test]
    fn cancel_prevents_an_already_due_entry() {
        let mut clock = ClockWheel::new();
        let first = clock.schedule(secs(1), false, "first");
        let second = clock.schedule(secs(1), false, "second");
        let (handle, line) = clock.pop_due(secs(3)).unwrap();
        assert_eq!((handle, line), (first, "first"));
        // The receiver of "first" cancels "second" while it is queued.
        assert!(clock.cancel(second));
        assert!(clock.pop_due(secs(3)).is_none());
    }

    #[test]
    fn ties_fire_in_scheduling_order_even_after_rearm() {
        let mut clock = ClockWheel::new();
        clock.schedule(secs(1), true, "main");
        drain(&mut clock, secs(1));
        clock.schedule(secs(1), true, "badge");
        let fired = drain(&mut clock, secs(2));
        assert_eq!(fired, vec![(secs(2), "main"), (secs(2), "badge")]);
    }

    #[test]
    fn restart_replaces_previous_entry_of_the_slot() {
        let mut clock = ClockWheel::new();
        let mut slot = None;
        let first = clock.restart(&mut slot, secs(5), true, "line");
        let second = clock.restart(&mut slot, secs(5), true, "line");
        assert_ne!(first, second);
        assert!(!clock.is_active(first));
        assert_eq!(clock.active_count(), 1);
        clock.stop(&mut slot);
        assert!(slot.is_none());
        assert_eq!(clock.active_count(), 0);
    }

    #[test]
    fn zero_period_is_clamped() {
        let mut clock = ClockWheel::new();
        clock.schedule(Duration::ZERO, true, "spin");
        assert_eq!(clock.next_deadline(), Some(MIN_PERIOD));
    }

    #[test]
    fn canceling_own_repeating_line_during_dispatch_stops_it() {
        let mut clock = ClockWheel::new();
        let handle = clock.schedule(secs(1), true, "self");
        let (popped, _) = clock.pop_due(secs(10)).unwrap();
        assert_eq!(popped, handle);
        clock.cancel(handle);
        assert!(clock.pop_due(secs(10)).is_none());
    }
}
