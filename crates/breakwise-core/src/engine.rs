//! Scheduling engine.
//!
//! The engine is the one place where scheduler state changes. It owns the
//! clock, the break cycle, the reminder lines and the overlay orchestrator,
//! and serializes fired clock lines and user commands against them. It has
//! no threads: drive it with [`Engine::advance_to`] (tests, the runtime) and
//! call the command methods in between.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::break_cycle::{BreakCycle, BreakCycleState};
use crate::clock::{Clock, ClockHandle, TimerLine};
use crate::config::{Settings, SettingsStore};
use crate::error::{ConfigError, Result};
use crate::events::{Event, EventBus, ListenerId};
use crate::media::{execute_blocking, MediaCommand, MediaController, MediaCoordinator, ProbeReport};
use crate::overlay::{DisplayProvider, OverlayHost, OverlayOrchestrator, PointerProvider};
use crate::reminders::{ReminderKind, ReminderScheduler};

/// Desktop notification sink. Best effort.
pub trait Notifier: Send {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

/// External collaborators injected at construction.
pub struct Collaborators {
    pub store: Box<dyn SettingsStore>,
    pub host: Box<dyn OverlayHost>,
    pub displays: Box<dyn DisplayProvider>,
    pub pointer: Box<dyn PointerProvider>,
    pub notifier: Box<dyn Notifier>,
}

/// State of one reminder line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSnapshot {
    pub enabled: bool,
    pub interval_secs: u64,
    pub overlay_visible: bool,
    pub current_message: Option<String>,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub state: BreakCycleState,
    pub enabled: bool,
    pub time_until_next_break_secs: u64,
    pub current_break_time_remaining_secs: u64,
    pub break_interval_secs: u64,
    pub break_duration_secs: u64,
    pub break_seq: u64,
    pub blink: ReminderSnapshot,
    pub posture: ReminderSnapshot,
    pub break_overlays: usize,
    pub countdown_badge: bool,
    pub reminder_badge: Option<ReminderKind>,
    pub active_clocks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_preset: Option<Uuid>,
}

pub struct Engine {
    clock: Clock,
    cycle: BreakCycle,
    reminders: ReminderScheduler,
    overlays: OverlayOrchestrator,
    bus: EventBus,
    store: Box<dyn SettingsStore>,
    notifier: Box<dyn Notifier>,
    settings: Settings,
}

impl Engine {
    /// Build an engine from the stored settings and start whatever the
    /// settings say should run.
    pub fn new(collaborators: Collaborators) -> Result<Self> {
        Self::build(collaborators, None)
    }

    /// Like [`Engine::new`] with deterministic reminder messages.
    pub fn with_seed(collaborators: Collaborators, seed: u64) -> Result<Self> {
        Self::build(collaborators, Some(seed))
    }

    fn build(collaborators: Collaborators, seed: Option<u64>) -> Result<Self> {
        let Collaborators {
            store,
            host,
            displays,
            pointer,
            notifier,
        } = collaborators;

        let settings = store.load()?;
        settings.validate()?;

        let cycle = BreakCycle::new(
            settings.break_interval(),
            settings.break_duration(),
            settings.break_timing(),
        )?;
        let mut reminders = ReminderScheduler::new(
            settings.blink_interval(),
            settings.posture_interval(),
            settings.reminders.blink_enabled,
            settings.reminders.posture_enabled,
            seed,
        )?;
        reminders.set_skip_during_breaks(settings.reminders.skip_during_breaks);
        let media = MediaCoordinator::new(
            settings.media.smart_media_control,
            settings.media.producers.clone(),
        );
        let overlays =
            OverlayOrchestrator::new(host, displays, pointer, settings.overlay_settings(), media);

        let mut engine = Self {
            clock: Clock::new(),
            cycle,
            reminders,
            overlays,
            bus: EventBus::new(),
            store,
            notifier,
            settings,
        };

        if engine.settings.timer.enabled && engine.settings.timer.auto_start {
            engine.cycle.enable(&mut engine.clock, &mut engine.bus);
        }
        engine.reminders.start_all(&mut engine.clock);
        engine.pump();
        info!(
            state = ?engine.cycle.state(),
            break_interval_secs = engine.settings.timer.break_interval_secs,
            "engine started"
        );
        Ok(engine)
    }

    // ── Time ─────────────────────────────────────────────────────────

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.clock.next_deadline()
    }

    pub fn advance(&mut self, by: Duration) {
        self.advance_to(self.clock.now() + by);
    }

    /// Fire every line due up to `target`, one at a time, in deadline order.
    pub fn advance_to(&mut self, target: Duration) {
        while let Some((handle, line)) = self.clock.pop_due(target) {
            self.dispatch(handle, line);
        }
        self.clock.settle(target);
    }

    fn dispatch(&mut self, handle: ClockHandle, line: TimerLine) {
        let (clock, bus) = (&mut self.clock, &mut self.bus);
        match line {
            TimerLine::BreakCountdown => self.cycle.on_countdown_tick(handle, clock, bus),
            TimerLine::PreBreakBadge => self.cycle.on_badge_tick(handle, clock, bus),
            TimerLine::BreakDuration => self.cycle.on_break_tick(handle, clock, bus),
            TimerLine::BreakGrace => self.cycle.on_grace_elapsed(handle, clock, bus),
            TimerLine::Reminder(kind) => {
                let break_active = self.cycle.is_break_active();
                if let Some(message) = self.reminders.fire(kind, handle, break_active, bus) {
                    if let Err(e) = self.notifier.notify(kind.title(), &message) {
                        warn!(%kind, error = %e, "notification failed");
                    }
                }
            }
            TimerLine::ReminderAutoDismiss => {
                if let Some(kind) = self.overlays.on_auto_dismiss(handle) {
                    self.reminders.dismiss(kind, bus);
                }
            }
            TimerLine::CountdownTracking => self.overlays.on_tracking_tick(handle, clock),
        }
        self.pump();
    }

    /// Deliver queued events to the orchestrator, then to listeners.
    fn pump(&mut self) {
        while let Some(event) = self.bus.pop() {
            debug!(?event, "event");
            self.overlays.handle_event(&event, &mut self.clock);
            for kind in self.overlays.take_orphaned_reminders() {
                self.reminders.dismiss(kind, &mut self.bus);
            }
            self.bus.notify_listeners(&event);
        }
    }

    // ── Break commands ───────────────────────────────────────────────

    pub fn enable(&mut self) {
        self.cycle.enable(&mut self.clock, &mut self.bus);
        self.pump();
        self.persist_enabled();
    }

    pub fn disable(&mut self) {
        self.cycle.disable(&mut self.clock, &mut self.bus);
        self.pump();
        self.persist_enabled();
    }

    /// Returns the new enabled flag.
    pub fn toggle(&mut self) -> bool {
        let enabled = self.cycle.toggle(&mut self.clock, &mut self.bus);
        self.pump();
        self.persist_enabled();
        enabled
    }

    pub fn skip_break(&mut self) -> bool {
        let skipped = self.cycle.skip_break(&mut self.clock, &mut self.bus);
        self.pump();
        skipped
    }

    pub fn end_break(&mut self) -> bool {
        let ended = self.cycle.end_break(&mut self.clock, &mut self.bus);
        self.pump();
        ended
    }

    pub fn postpone(&mut self, by: Duration) -> bool {
        let postponed = self.cycle.postpone(by, &mut self.clock, &mut self.bus);
        self.pump();
        postponed
    }

    pub fn start_break_now(&mut self) -> bool {
        let started = self.cycle.start_break_now(&mut self.clock, &mut self.bus);
        self.pump();
        started
    }

    pub fn set_break_interval(&mut self, interval: Duration) -> Result<(), ConfigError> {
        self.cycle
            .set_interval(interval, &mut self.clock, &mut self.bus)?;
        self.pump();
        self.settings.timer.break_interval_secs = interval.as_secs();
        self.persist();
        Ok(())
    }

    pub fn set_break_duration(&mut self, duration: Duration) -> Result<(), ConfigError> {
        self.cycle
            .set_duration(duration, &mut self.clock, &mut self.bus)?;
        self.pump();
        self.settings.timer.break_duration_secs = duration.as_secs();
        self.persist();
        Ok(())
    }

    // ── Reminder commands ────────────────────────────────────────────

    pub fn dismiss_reminder(&mut self, kind: ReminderKind) -> bool {
        let dismissed = self.reminders.dismiss(kind, &mut self.bus);
        self.pump();
        dismissed
    }

    /// Dismiss every visible reminder. False when none was showing.
    pub fn dismiss_reminders(&mut self) -> bool {
        let dismissed = self.reminders.dismiss_visible(&mut self.bus);
        self.pump();
        dismissed
    }

    pub fn set_reminder_enabled(&mut self, kind: ReminderKind, enabled: bool) {
        self.reminders.set_enabled(kind, enabled, &mut self.clock);
        match kind {
            ReminderKind::Blink => self.settings.reminders.blink_enabled = enabled,
            ReminderKind::Posture => self.settings.reminders.posture_enabled = enabled,
        }
        self.persist();
    }

    pub fn set_reminder_interval(
        &mut self,
        kind: ReminderKind,
        interval: Duration,
    ) -> Result<(), ConfigError> {
        self.reminders.set_interval(kind, interval, &mut self.clock)?;
        match kind {
            ReminderKind::Blink => self.settings.reminders.blink_interval_secs = interval.as_secs(),
            ReminderKind::Posture => {
                self.settings.reminders.posture_interval_secs = interval.as_secs()
            }
        }
        self.persist();
        Ok(())
    }

    // ── Presets & settings ───────────────────────────────────────────

    /// Reconfigure break cycle and reminders from one preset. Either every
    /// value is applied or, on error, none is.
    pub fn apply_preset(&mut self, id: Uuid) -> Result<(), ConfigError> {
        let preset = self
            .settings
            .find_preset(id)
            .cloned()
            .ok_or(ConfigError::UnknownPreset(id))?;
        preset.validate()?;

        self.cycle.set_preset(
            preset.break_interval(),
            preset.break_duration(),
            &mut self.clock,
            &mut self.bus,
        )?;
        self.reminders.apply_preset_intervals(
            preset.blink_interval(),
            preset.posture_interval(),
            &mut self.clock,
        )?;
        self.settings.apply_preset_values(&preset)?;
        info!(preset = %preset.name, "preset applied");
        self.bus.publish(Event::PresetApplied {
            preset_id: preset.id,
            name: preset.name.clone(),
            at: chrono::Utc::now(),
        });
        self.pump();
        self.persist();
        Ok(())
    }

    /// Re-read the settings store and apply what changed.
    pub fn reload_settings(&mut self) -> Result<()> {
        let settings = self.store.load()?;
        settings.validate()?;

        self.cycle.set_timing(settings.break_timing());
        if settings.break_interval() != self.settings.break_interval() {
            self.cycle
                .set_interval(settings.break_interval(), &mut self.clock, &mut self.bus)?;
        }
        if settings.break_duration() != self.settings.break_duration() {
            self.cycle
                .set_duration(settings.break_duration(), &mut self.clock, &mut self.bus)?;
        }

        let lines = [
            (
                ReminderKind::Blink,
                settings.blink_interval(),
                self.settings.blink_interval(),
                settings.reminders.blink_enabled,
            ),
            (
                ReminderKind::Posture,
                settings.posture_interval(),
                self.settings.posture_interval(),
                settings.reminders.posture_enabled,
            ),
        ];
        for (kind, interval, previous, enabled) in lines {
            if interval != previous {
                self.reminders.set_interval(kind, interval, &mut self.clock)?;
            }
            self.reminders.set_enabled(kind, enabled, &mut self.clock);
        }
        self.reminders
            .set_skip_during_breaks(settings.reminders.skip_during_breaks);

        self.overlays.set_settings(settings.overlay_settings());
        self.overlays.configure_media(
            settings.media.smart_media_control,
            settings.media.producers.clone(),
        );

        if settings.timer.enabled != self.cycle.is_enabled() {
            if settings.timer.enabled {
                self.cycle.enable(&mut self.clock, &mut self.bus);
            } else {
                self.cycle.disable(&mut self.clock, &mut self.bus);
            }
        }
        self.pump();
        self.settings = settings;
        info!("settings reloaded");
        Ok(())
    }

    fn persist_enabled(&mut self) {
        self.settings.timer.enabled = self.cycle.is_enabled();
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.settings) {
            warn!(error = %e, "failed to save settings");
        }
    }

    // ── Overlays & media ─────────────────────────────────────────────

    /// Destroy the break overlays. Idempotent.
    pub fn hide_break_overlays(&mut self) {
        self.overlays.hide_break_overlays();
    }

    pub fn take_media_commands(&mut self) -> Vec<MediaCommand> {
        self.overlays.take_media_commands()
    }

    pub fn media_probed(&mut self, report: ProbeReport) {
        self.overlays.media_probed(report);
    }

    /// Run pending media work inline until none is left.
    pub fn run_media_blocking(&mut self, controller: &dyn MediaController) {
        loop {
            let commands = self.take_media_commands();
            if commands.is_empty() {
                return;
            }
            for command in &commands {
                if let Some(report) = execute_blocking(controller, command) {
                    self.media_probed(report);
                }
            }
        }
    }

    /// Tear down every overlay and stop all lines. Resumes paused media.
    pub fn shutdown(&mut self) {
        self.cycle.disable(&mut self.clock, &mut self.bus);
        self.reminders.stop_all(&mut self.clock);
        self.pump();
        self.overlays.teardown(&mut self.clock);
        info!("engine stopped");
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + Send + 'static) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn cycle(&self) -> &BreakCycle {
        &self.cycle
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn overlays(&self) -> &OverlayOrchestrator {
        &self.overlays
    }

    pub fn media(&self) -> &MediaCoordinator {
        self.overlays.media()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn snapshot(&self) -> Snapshot {
        let reminder = |kind| {
            let line = self.reminders.line(kind);
            ReminderSnapshot {
                enabled: line.is_enabled(),
                interval_secs: line.interval().as_secs(),
                overlay_visible: line.is_overlay_visible(),
                current_message: line.current_message().map(str::to_string),
            }
        };
        Snapshot {
            state: self.cycle.state(),
            enabled: self.cycle.is_enabled(),
            time_until_next_break_secs: self.cycle.time_until_next_break().as_secs(),
            current_break_time_remaining_secs: self.cycle.current_break_time_remaining().as_secs(),
            break_interval_secs: self.cycle.break_interval().as_secs(),
            break_duration_secs: self.cycle.break_duration().as_secs(),
            break_seq: self.cycle.break_seq(),
            blink: reminder(ReminderKind::Blink),
            posture: reminder(ReminderKind::Posture),
            break_overlays: self.overlays.break_overlay_count(),
            countdown_badge: self.overlays.has_countdown_badge(),
            reminder_badge: self.overlays.reminder_badge(),
            active_clocks: self.clock.active_count(),
            current_preset: self.settings.current_preset,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("now", &self.clock.now())
            .field("cycle", &self.cycle)
            .field("overlays", &self.overlays)
            .finish()
    }
}
