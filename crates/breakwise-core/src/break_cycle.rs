//! Break cycle state machine.
//!
//! Owns the three break timer lines and decides when a break starts and ends.
//! Like the rest of the core it has no threads of its own: the engine hands
//! it fired clock lines and user commands on the single designated context.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> CountingDown -> PreBreakCountdownVisible -> BreakActive -> CountingDown
//!              ^  \______ postpone _____/                  |
//!              \____________ end / skip ___________________/
//! any -> Idle (disable)
//! ```

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, ClockHandle, TimerLine};
use crate::config::check_interval;
use crate::error::ConfigError;
use crate::events::{BreakEndReason, Event, EventBus};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakCycleState {
    Idle,
    CountingDown,
    PreBreakCountdownVisible,
    BreakActive,
}

/// Fixed timing knobs that are not part of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakTiming {
    /// The pre-break badge appears once this much time is left.
    pub pre_break_window: Duration,
    /// Delay between the break reaching zero and it ending. Zero ends the
    /// break on the same tick.
    pub end_grace: Duration,
}

impl Default for BreakTiming {
    fn default() -> Self {
        Self {
            pre_break_window: Duration::from_secs(10),
            end_grace: Duration::from_millis(500),
        }
    }
}

/// Interval/duration changes requested while a break runs.
#[derive(Debug, Clone, Copy, Default)]
struct Deferred {
    interval: Option<Duration>,
    duration: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BreakCycle {
    state: BreakCycleState,
    enabled: bool,
    break_interval: Duration,
    break_duration: Duration,
    time_until_next_break: Duration,
    current_break_time_remaining: Duration,
    badge_elapsed: Duration,
    break_seq: u64,
    timing: BreakTiming,
    deferred: Deferred,
    countdown: Option<ClockHandle>,
    badge: Option<ClockHandle>,
    break_clock: Option<ClockHandle>,
    grace: Option<ClockHandle>,
}

impl BreakCycle {
    /// Create an idle machine. Call [`BreakCycle::enable`] to start counting.
    pub fn new(
        break_interval: Duration,
        break_duration: Duration,
        timing: BreakTiming,
    ) -> Result<Self, ConfigError> {
        validate_interval(break_interval)?;
        validate_duration(break_duration)?;
        Ok(Self {
            state: BreakCycleState::Idle,
            enabled: false,
            break_interval,
            break_duration,
            time_until_next_break: break_interval,
            current_break_time_remaining: break_duration,
            badge_elapsed: Duration::ZERO,
            break_seq: 0,
            timing,
            deferred: Deferred::default(),
            countdown: None,
            badge: None,
            break_clock: None,
            grace: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> BreakCycleState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_break_active(&self) -> bool {
        self.state == BreakCycleState::BreakActive
    }

    pub fn break_interval(&self) -> Duration {
        self.break_interval
    }

    pub fn break_duration(&self) -> Duration {
        self.break_duration
    }

    pub fn time_until_next_break(&self) -> Duration {
        self.time_until_next_break
    }

    pub fn current_break_time_remaining(&self) -> Duration {
        self.current_break_time_remaining
    }

    pub fn break_seq(&self) -> u64 {
        self.break_seq
    }

    pub fn timing(&self) -> BreakTiming {
        self.timing
    }

    /// Interval and duration that take effect when the next countdown starts.
    pub fn pending_config(&self) -> (Option<Duration>, Option<Duration>) {
        (self.deferred.interval, self.deferred.duration)
    }

    /// Handles of the live clock lines owned by the machine.
    pub fn active_handles(&self) -> impl Iterator<Item = ClockHandle> + '_ {
        [self.countdown, self.badge, self.break_clock, self.grace]
            .into_iter()
            .flatten()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// `Idle -> CountingDown`. No-op when already running.
    pub fn enable(&mut self, clock: &mut Clock, bus: &mut EventBus) {
        if self.enabled && self.state != BreakCycleState::Idle {
            return;
        }
        self.enabled = true;
        self.start_countdown(clock, bus);
    }

    /// `any -> Idle`. Cancels every line unconditionally.
    pub fn disable(&mut self, clock: &mut Clock, bus: &mut EventBus) {
        let was = self.state;
        self.enabled = false;
        self.cancel_all(clock);
        self.state = BreakCycleState::Idle;
        self.badge_elapsed = Duration::ZERO;
        self.apply_deferred();
        self.current_break_time_remaining = self.break_duration;
        self.time_until_next_break = self.break_interval;

        match was {
            BreakCycleState::BreakActive => bus.publish(Event::BreakEnded {
                break_seq: self.break_seq,
                reason: BreakEndReason::Disabled,
                at: Utc::now(),
            }),
            BreakCycleState::PreBreakCountdownVisible => {
                bus.publish(Event::PreBreakCountdownHidden { at: Utc::now() })
            }
            _ => {}
        }
        if was != BreakCycleState::Idle {
            info!("break timer disabled");
            bus.publish(Event::TimerDisabled { at: Utc::now() });
        }
    }

    /// Flip between enabled and idle. Returns the new enabled flag.
    pub fn toggle(&mut self, clock: &mut Clock, bus: &mut EventBus) -> bool {
        if self.enabled {
            self.disable(clock, bus);
        } else {
            self.enable(clock, bus);
        }
        self.enabled
    }

    /// User-requested early exit. Cancels the break clock synchronously, so no
    /// decrement can be observed afterwards.
    pub fn skip_break(&mut self, clock: &mut Clock, bus: &mut EventBus) -> bool {
        self.finish_break(BreakEndReason::Skipped, clock, bus)
    }

    /// User-requested end of the break, same cleanup as a skip.
    pub fn end_break(&mut self, clock: &mut Clock, bus: &mut EventBus) -> bool {
        self.finish_break(BreakEndReason::Ended, clock, bus)
    }

    /// Start the break right away from a counting state.
    pub fn start_break_now(&mut self, clock: &mut Clock, bus: &mut EventBus) -> bool {
        if !self.is_counting() {
            return false;
        }
        self.time_until_next_break = Duration::ZERO;
        self.enter_break(clock, bus);
        true
    }

    /// Push the next break back by `by`. Hides the pre-break badge.
    pub fn postpone(&mut self, by: Duration, clock: &mut Clock, bus: &mut EventBus) -> bool {
        if !self.is_counting() {
            return false;
        }
        self.time_until_next_break = self.time_until_next_break.saturating_add(by);
        self.hide_badge(clock, bus);
        info!(
            by_secs = by.as_secs(),
            next_break_in_secs = self.time_until_next_break.as_secs(),
            "break postponed"
        );
        bus.publish(Event::BreakPostponed {
            by_secs: by.as_secs(),
            next_break_in_secs: self.time_until_next_break.as_secs(),
            at: Utc::now(),
        });
        true
    }

    /// Change the break interval. Restarts a running countdown; deferred to the
    /// next cycle while a break is active.
    pub fn set_interval(
        &mut self,
        interval: Duration,
        clock: &mut Clock,
        bus: &mut EventBus,
    ) -> Result<(), ConfigError> {
        validate_interval(interval)?;
        self.reconfigure(Some(interval), None, clock, bus);
        Ok(())
    }

    /// Change the break length. A running break keeps its remaining time.
    pub fn set_duration(
        &mut self,
        duration: Duration,
        clock: &mut Clock,
        bus: &mut EventBus,
    ) -> Result<(), ConfigError> {
        validate_duration(duration)?;
        self.reconfigure(None, Some(duration), clock, bus);
        Ok(())
    }

    /// Change interval and duration atomically. Both are validated before
    /// either is applied.
    pub fn set_preset(
        &mut self,
        interval: Duration,
        duration: Duration,
        clock: &mut Clock,
        bus: &mut EventBus,
    ) -> Result<(), ConfigError> {
        validate_interval(interval)?;
        validate_duration(duration)?;
        self.reconfigure(Some(interval), Some(duration), clock, bus);
        Ok(())
    }

    pub fn set_timing(&mut self, timing: BreakTiming) {
        self.timing = timing;
    }

    // ── Clock callbacks ──────────────────────────────────────────────

    /// Main one-second countdown.
    pub fn on_countdown_tick(&mut self, handle: ClockHandle, clock: &mut Clock, bus: &mut EventBus) {
        if self.countdown != Some(handle) || !self.is_counting() {
            return;
        }
        self.time_until_next_break = self.time_until_next_break.saturating_sub(TICK);

        if self.time_until_next_break.is_zero() {
            self.enter_break(clock, bus);
            return;
        }

        if self.state == BreakCycleState::CountingDown
            && self.time_until_next_break <= self.timing.pre_break_window
        {
            self.show_badge(clock, bus);
        } else if self.state == BreakCycleState::PreBreakCountdownVisible {
            bus.publish(Event::PreBreakCountdownTick {
                next_break_in_secs: self.time_until_next_break.as_secs(),
                at: Utc::now(),
            });
        }
    }

    /// Badge elapsed-time line. The badge retires itself once its window has
    /// passed.
    pub fn on_badge_tick(&mut self, handle: ClockHandle, clock: &mut Clock, bus: &mut EventBus) {
        if self.badge != Some(handle) || self.state != BreakCycleState::PreBreakCountdownVisible {
            return;
        }
        self.badge_elapsed += TICK;
        if self.badge_elapsed >= self.timing.pre_break_window {
            debug!("pre-break badge window elapsed");
            self.hide_badge(clock, bus);
        }
    }

    /// Break-duration line.
    pub fn on_break_tick(&mut self, handle: ClockHandle, clock: &mut Clock, bus: &mut EventBus) {
        if self.break_clock != Some(handle) || !self.is_break_active() {
            return;
        }
        self.current_break_time_remaining = self.current_break_time_remaining.saturating_sub(TICK);
        bus.publish(Event::BreakTick {
            remaining_secs: self.current_break_time_remaining.as_secs(),
            at: Utc::now(),
        });

        if !self.current_break_time_remaining.is_zero() {
            return;
        }
        clock.stop(&mut self.break_clock);
        if self.timing.end_grace.is_zero() {
            self.finish_break(BreakEndReason::Completed, clock, bus);
        } else {
            debug!(grace_ms = self.timing.end_grace.as_millis() as u64, "break finished, grace delay");
            clock.restart(&mut self.grace, self.timing.end_grace, false, TimerLine::BreakGrace);
        }
    }

    pub fn on_grace_elapsed(&mut self, handle: ClockHandle, clock: &mut Clock, bus: &mut EventBus) {
        if self.grace != Some(handle) {
            return;
        }
        self.grace = None;
        self.finish_break(BreakEndReason::Completed, clock, bus);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn is_counting(&self) -> bool {
        matches!(
            self.state,
            BreakCycleState::CountingDown | BreakCycleState::PreBreakCountdownVisible
        )
    }

    fn start_countdown(&mut self, clock: &mut Clock, bus: &mut EventBus) {
        self.apply_deferred();
        self.time_until_next_break = self.break_interval;
        self.badge_elapsed = Duration::ZERO;
        clock.restart(&mut self.countdown, TICK, true, TimerLine::BreakCountdown);
        self.state = BreakCycleState::CountingDown;
        info!(
            next_break_in_secs = self.break_interval.as_secs(),
            "break countdown started"
        );
        bus.publish(Event::CountdownStarted {
            next_break_in_secs: self.break_interval.as_secs(),
            at: Utc::now(),
        });
    }

    fn show_badge(&mut self, clock: &mut Clock, bus: &mut EventBus) {
        self.badge_elapsed = Duration::ZERO;
        clock.restart(&mut self.badge, TICK, true, TimerLine::PreBreakBadge);
        self.state = BreakCycleState::PreBreakCountdownVisible;
        debug!(
            next_break_in_secs = self.time_until_next_break.as_secs(),
            "pre-break countdown visible"
        );
        bus.publish(Event::PreBreakCountdownShown {
            next_break_in_secs: self.time_until_next_break.as_secs(),
            at: Utc::now(),
        });
    }

    fn hide_badge(&mut self, clock: &mut Clock, bus: &mut EventBus) {
        clock.stop(&mut self.badge);
        self.badge_elapsed = Duration::ZERO;
        if self.state == BreakCycleState::PreBreakCountdownVisible {
            self.state = BreakCycleState::CountingDown;
            bus.publish(Event::PreBreakCountdownHidden { at: Utc::now() });
        }
    }

    fn enter_break(&mut self, clock: &mut Clock, bus: &mut EventBus) {
        clock.stop(&mut self.countdown);
        self.hide_badge(clock, bus);
        self.break_seq += 1;
        self.current_break_time_remaining = self.break_duration;
        clock.restart(&mut self.break_clock, TICK, true, TimerLine::BreakDuration);
        self.state = BreakCycleState::BreakActive;
        info!(
            break_seq = self.break_seq,
            duration_secs = self.break_duration.as_secs(),
            "break started"
        );
        bus.publish(Event::BreakStarted {
            break_seq: self.break_seq,
            duration_secs: self.break_duration.as_secs(),
            at: Utc::now(),
        });
    }

    /// The single exit from `BreakActive`. Whoever gets here first wins; the
    /// loser finds the state already changed and does nothing.
    fn finish_break(&mut self, reason: BreakEndReason, clock: &mut Clock, bus: &mut EventBus) -> bool {
        if !self.is_break_active() {
            return false;
        }
        clock.stop(&mut self.break_clock);
        clock.stop(&mut self.grace);
        info!(break_seq = self.break_seq, ?reason, "break ended");
        bus.publish(Event::BreakEnded {
            break_seq: self.break_seq,
            reason,
            at: Utc::now(),
        });
        self.start_countdown(clock, bus);
        self.current_break_time_remaining = self.break_duration;
        true
    }

    fn reconfigure(
        &mut self,
        interval: Option<Duration>,
        duration: Option<Duration>,
        clock: &mut Clock,
        bus: &mut EventBus,
    ) {
        if self.is_break_active() {
            debug!("break active, deferring reconfiguration");
            if interval.is_some() {
                self.deferred.interval = interval;
            }
            if duration.is_some() {
                self.deferred.duration = duration;
            }
            return;
        }

        if let Some(duration) = duration {
            self.break_duration = duration;
            self.current_break_time_remaining = duration;
        }
        if let Some(interval) = interval {
            self.break_interval = interval;
            match self.state {
                BreakCycleState::Idle => self.time_until_next_break = interval,
                _ => {
                    self.hide_badge(clock, bus);
                    self.start_countdown(clock, bus);
                }
            }
        }
    }

    fn apply_deferred(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        if let Some(interval) = deferred.interval {
            self.break_interval = interval;
        }
        if let Some(duration) = deferred.duration {
            self.break_duration = duration;
        }
    }

    fn cancel_all(&mut self, clock: &mut Clock) {
        clock.stop(&mut self.countdown);
        clock.stop(&mut self.badge);
        clock.stop(&mut self.break_clock);
        clock.stop(&mut self.grace);
    }
}

fn validate_interval(interval: Duration) -> Result<(), ConfigError> {
    check_interval("timer.break_interval_secs", interval)
}

fn validate_duration(duration: Duration) -> Result<(), ConfigError> {
    check_interval("timer.break_duration_secs", duration)
}
