//! Blink and posture reminders.
//!
//! Two independent repeating lines. Each fire picks a message at random and
//! marks the line's overlay visible until it is dismissed.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, ClockHandle, TimerLine};
use crate::config::check_interval;
use crate::error::ConfigError;
use crate::events::{Event, EventBus};

const BLINK_MESSAGES: &[&str] = &[
    "Blink slowly a few times.",
    "Close your eyes for a moment.",
    "Look at something far away and blink.",
    "Your eyes need moisture. Blink!",
    "Relax your eyes and blink gently.",
];

const POSTURE_MESSAGES: &[&str] = &[
    "Sit up straight.",
    "Roll your shoulders back.",
    "Check your posture.",
    "Feet flat on the floor, back against the chair.",
    "Lift your chin and relax your neck.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Blink,
    Posture,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::Blink, ReminderKind::Posture];

    pub fn title(self) -> &'static str {
        match self {
            ReminderKind::Blink => "Blink reminder",
            ReminderKind::Posture => "Posture reminder",
        }
    }

    pub fn messages(self) -> &'static [&'static str] {
        match self {
            ReminderKind::Blink => BLINK_MESSAGES,
            ReminderKind::Posture => POSTURE_MESSAGES,
        }
    }

    fn config_key(self) -> &'static str {
        match self {
            ReminderKind::Blink => "reminders.blink_interval_secs",
            ReminderKind::Posture => "reminders.posture_interval_secs",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderKind::Blink => write!(f, "blink"),
            ReminderKind::Posture => write!(f, "posture"),
        }
    }
}

/// One reminder line.
#[derive(Debug, Clone)]
pub struct ReminderLine {
    kind: ReminderKind,
    interval: Duration,
    enabled: bool,
    current_message: Option<String>,
    overlay_visible: bool,
    handle: Option<ClockHandle>,
}

impl ReminderLine {
    fn new(kind: ReminderKind, interval: Duration, enabled: bool) -> Self {
        Self {
            kind,
            interval,
            enabled,
            current_message: None,
            overlay_visible: false,
            handle: None,
        }
    }

    pub fn kind(&self) -> ReminderKind {
        self.kind
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_message(&self) -> Option<&str> {
        self.current_message.as_deref()
    }

    pub fn is_overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    fn start(&mut self, clock: &mut Clock) {
        clock.restart(&mut self.handle, self.interval, true, TimerLine::Reminder(self.kind));
    }
}

/// Owns both reminder lines and the message randomness.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    blink: ReminderLine,
    posture: ReminderLine,
    rng: StdRng,
    skip_during_breaks: bool,
}

impl ReminderScheduler {
    pub fn new(
        blink_interval: Duration,
        posture_interval: Duration,
        blink_enabled: bool,
        posture_enabled: bool,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        validate(ReminderKind::Blink, blink_interval)?;
        validate(ReminderKind::Posture, posture_interval)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            blink: ReminderLine::new(ReminderKind::Blink, blink_interval, blink_enabled),
            posture: ReminderLine::new(ReminderKind::Posture, posture_interval, posture_enabled),
            rng,
            skip_during_breaks: true,
        })
    }

    pub fn line(&self, kind: ReminderKind) -> &ReminderLine {
        match kind {
            ReminderKind::Blink => &self.blink,
            ReminderKind::Posture => &self.posture,
        }
    }

    fn line_mut(&mut self, kind: ReminderKind) -> &mut ReminderLine {
        match kind {
            ReminderKind::Blink => &mut self.blink,
            ReminderKind::Posture => &mut self.posture,
        }
    }

    pub fn skip_during_breaks(&self) -> bool {
        self.skip_during_breaks
    }

    pub fn set_skip_during_breaks(&mut self, skip: bool) {
        self.skip_during_breaks = skip;
    }

    /// Start the clock of every enabled line.
    pub fn start_all(&mut self, clock: &mut Clock) {
        for kind in ReminderKind::ALL {
            let line = self.line_mut(kind);
            if line.enabled {
                line.start(clock);
            }
        }
    }

    /// Cancel every reminder clock. Visible overlays are left alone.
    pub fn stop_all(&mut self, clock: &mut Clock) {
        clock.stop(&mut self.blink.handle);
        clock.stop(&mut self.posture.handle);
    }

    /// Handle a fired reminder line. Returns the shown message, or `None` when
    /// the fire was stale or swallowed during a break.
    pub fn fire(
        &mut self,
        kind: ReminderKind,
        handle: ClockHandle,
        break_active: bool,
        bus: &mut EventBus,
    ) -> Option<String> {
        let skip = self.skip_during_breaks;
        let line = match kind {
            ReminderKind::Blink => &mut self.blink,
            ReminderKind::Posture => &mut self.posture,
        };
        if line.handle != Some(handle) || !line.enabled {
            return None;
        }
        if break_active && skip {
            debug!(%kind, "reminder swallowed during break");
            return None;
        }

        let message = kind
            .messages()
            .choose(&mut self.rng)
            .map(|m| m.to_string())
            .unwrap_or_default();
        line.current_message = Some(message.clone());
        line.overlay_visible = true;
        info!(%kind, %message, "reminder shown");
        bus.publish(Event::ReminderShown {
            kind,
            message: message.clone(),
            at: Utc::now(),
        });
        Some(message)
    }

    /// Clear the visible flag. Returns whether anything changed.
    pub fn dismiss(&mut self, kind: ReminderKind, bus: &mut EventBus) -> bool {
        let line = self.line_mut(kind);
        if !line.overlay_visible {
            return false;
        }
        line.overlay_visible = false;
        debug!(%kind, "reminder dismissed");
        bus.publish(Event::ReminderDismissed {
            kind,
            at: Utc::now(),
        });
        true
    }

    /// Dismiss whichever line is visible.
    pub fn dismiss_visible(&mut self, bus: &mut EventBus) -> bool {
        let mut any = false;
        for kind in ReminderKind::ALL {
            any |= self.dismiss(kind, bus);
        }
        any
    }

    /// Enabling starts the line from zero; disabling only cancels its clock.
    pub fn set_enabled(&mut self, kind: ReminderKind, enabled: bool, clock: &mut Clock) {
        let line = self.line_mut(kind);
        if line.enabled == enabled {
            return;
        }
        line.enabled = enabled;
        if enabled {
            line.start(clock);
        } else {
            clock.stop(&mut line.handle);
        }
    }

    pub fn set_interval(
        &mut self,
        kind: ReminderKind,
        interval: Duration,
        clock: &mut Clock,
    ) -> Result<(), ConfigError> {
        validate(kind, interval)?;
        let line = self.line_mut(kind);
        line.interval = interval;
        if line.enabled && line.handle.is_some() {
            line.start(clock);
        }
        Ok(())
    }

    /// Set both intervals at once, restarting enabled lines.
    pub fn apply_preset_intervals(
        &mut self,
        blink: Duration,
        posture: Duration,
        clock: &mut Clock,
    ) -> Result<(), ConfigError> {
        validate(ReminderKind::Blink, blink)?;
        validate(ReminderKind::Posture, posture)?;
        self.set_interval(ReminderKind::Blink, blink, clock)?;
        self.set_interval(ReminderKind::Posture, posture, clock)
    }
}

fn validate(kind: ReminderKind, interval: Duration) -> Result<(), ConfigError> {
    check_interval(kind.config_key(), interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn scheduler() -> ReminderScheduler {
        ReminderScheduler::new(secs(5), secs(7), true, true, Some(7)).unwrap()
    }

    fn fire_until(
        reminders: &mut ReminderScheduler,
        clock: &mut Clock,
        bus: &mut EventBus,
        until: Duration,
    ) -> Vec<(Duration, ReminderKind)> {
        let mut shown = Vec::new();
        while let Some((handle, line)) = clock.pop_due(until) {
            if let TimerLine::Reminder(kind) = line {
                if reminders.fire(kind, handle, false, bus).is_some() {
                    shown.push((clock.now(), kind));
                }
            }
        }
        clock.settle(until);
        shown
    }

    #[test]
    fn lines_fire_independently() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let mut bus = EventBus::new();
        reminders.start_all(&mut clock);
        let shown = fire_until(&mut reminders, &mut clock, &mut bus, secs(10));
        assert_eq!(
            shown,
            vec![
                (secs(5), ReminderKind::Blink),
                (secs(7), ReminderKind::Posture),
                (secs(10), ReminderKind::Blink),
            ]
        );
    }

    #[test]
    fn message_comes_from_the_template_set() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let mut bus = EventBus::new();
        reminders.start_all(&mut clock);
        fire_until(&mut reminders, &mut clock, &mut bus, secs(5));
        let line = reminders.line(ReminderKind::Blink);
        assert!(line.is_overlay_visible());
        let message = line.current_message().unwrap();
        assert!(BLINK_MESSAGES.contains(&message));
    }

    #[test]
    fn dismiss_is_idempotent() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let mut bus = EventBus::new();
        reminders.start_all(&mut clock);
        fire_until(&mut reminders, &mut clock, &mut bus, secs(5));
        while bus.pop().is_some() {}
        assert!(reminders.dismiss(ReminderKind::Blink, &mut bus));
        assert!(!reminders.dismiss(ReminderKind::Blink, &mut bus));
        assert!(matches!(bus.pop(), Some(Event::ReminderDismissed { .. })));
        assert!(bus.pop().is_none());
    }

    #[test]
    fn disabling_keeps_visible_overlay() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let mut bus = EventBus::new();
        reminders.start_all(&mut clock);
        fire_until(&mut reminders, &mut clock, &mut bus, secs(5));
        reminders.set_enabled(ReminderKind::Blink, false, &mut clock);
        let line = reminders.line(ReminderKind::Blink);
        assert!(line.is_overlay_visible());
        assert!(!line.is_running());
        let shown = fire_until(&mut reminders, &mut clock, &mut bus, secs(20));
        assert!(shown.iter().all(|(_, kind)| *kind == ReminderKind::Posture));
    }

    #[test]
    fn interval_change_restarts_from_zero() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let mut bus = EventBus::new();
        reminders.start_all(&mut clock);
        fire_until(&mut reminders, &mut clock, &mut bus, secs(3));
        reminders
            .set_interval(ReminderKind::Blink, secs(4), &mut clock)
            .unwrap();
        reminders.set_enabled(ReminderKind::Posture, false, &mut clock);
        let shown = fire_until(&mut reminders, &mut clock, &mut bus, secs(8));
        assert_eq!(shown, vec![(secs(7), ReminderKind::Blink)]);
    }

    #[test]
    fn fires_are_swallowed_during_breaks() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let mut bus = EventBus::new();
        reminders.start_all(&mut clock);
        let (handle, _) = clock.pop_due(secs(5)).unwrap();
        assert!(reminders.fire(ReminderKind::Blink, handle, true, &mut bus).is_none());
        assert!(!reminders.line(ReminderKind::Blink).is_overlay_visible());
        // The clock keeps running.
        assert!(reminders.line(ReminderKind::Blink).is_running());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut reminders = scheduler();
        let mut clock = Clock::new();
        let err = reminders
            .set_interval(ReminderKind::Posture, Duration::ZERO, &mut clock)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::invalid("reminders.posture_interval_secs", "must be at least 1 second")
        );
        assert_eq!(reminders.line(ReminderKind::Posture).interval(), secs(7));
    }
}
