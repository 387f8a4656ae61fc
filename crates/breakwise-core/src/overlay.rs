//! Overlay orchestration.
//!
//! The orchestrator is the single in-core consumer of scheduler events. It
//! owns every overlay surface outright and keeps the overlay set in line
//! with the scheduler state:
//!
//! - one full-screen break overlay per display while a break is active,
//! - at most one pointer-following countdown badge while the pre-break
//!   countdown is visible,
//! - at most one reminder badge, superseded by newer reminders.
//!
//! Drawing is delegated to an [`OverlayHost`]. Displays and pointer come from
//! [`DisplayProvider`] and [`PointerProvider`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, ClockHandle, TimerLine};
use crate::error::OverlayError;
use crate::events::Event;
use crate::media::{MediaCommand, MediaCoordinator, ProbeReport};
use crate::reminders::ReminderKind;

pub const COUNTDOWN_BADGE_SIZE: (u32, u32) = (200, 80);
pub const REMINDER_BADGE_SIZE: (u32, u32) = (80, 80);
/// Gap between the reminder badge and the bottom of the primary display.
pub const REMINDER_BADGE_MARGIN: u32 = 100;

// ── Geometry ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// A `width`×`height` rect centered on `center`, pushed inside `self`.
    pub fn place_centered(&self, center: Point, width: u32, height: u32) -> Rect {
        let x = clamp_axis(center.x - width as i32 / 2, self.x, self.right() - width as i32);
        let y = clamp_axis(center.y - height as i32 / 2, self.y, self.bottom() - height as i32);
        Rect::new(x, y, width, height)
    }
}

fn clamp_axis(value: i32, min: i32, max: i32) -> i32 {
    // A badge larger than the display sticks to the top-left edge.
    value.min(max).max(min)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: u32,
    pub bounds: Rect,
    pub primary: bool,
}

// ── Collaborators ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceKind {
    BreakOverlay { display: u32 },
    CountdownBadge,
    ReminderBadge { kind: ReminderKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayContent {
    BreakRemaining { remaining_secs: u64 },
    Countdown { next_break_in_secs: u64 },
    Reminder { kind: ReminderKind, message: String },
}

/// Connected displays, queried fresh each time.
pub trait DisplayProvider: Send {
    fn displays(&self) -> Vec<DisplayInfo>;
}

pub trait PointerProvider: Send {
    fn location(&self) -> Point;
}

/// Window-system side of the overlays.
///
/// Teardown is split in three steps so hosts can stop input before the
/// content goes away. Every method except `create` must tolerate unknown ids.
pub trait OverlayHost: Send {
    fn create(
        &mut self,
        id: SurfaceId,
        kind: SurfaceKind,
        bounds: Rect,
        content: &OverlayContent,
    ) -> Result<(), OverlayError>;
    fn render(&mut self, id: SurfaceId, content: &OverlayContent);
    fn move_to(&mut self, id: SurfaceId, bounds: Rect);
    fn disable_input(&mut self, id: SurfaceId);
    fn detach_content(&mut self, id: SurfaceId);
    fn release(&mut self, id: SurfaceId);
}

/// Fixed desktop layout, mostly for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDisplays(pub Vec<DisplayInfo>);

impl StaticDisplays {
    /// `count` 1920×1080 displays side by side, the first one primary.
    pub fn side_by_side(count: u32) -> Self {
        Self(
            (0..count)
                .map(|i| DisplayInfo {
                    id: i + 1,
                    bounds: Rect::new(i as i32 * 1920, 0, 1920, 1080),
                    primary: i == 0,
                })
                .collect(),
        )
    }
}

impl DisplayProvider for StaticDisplays {
    fn displays(&self) -> Vec<DisplayInfo> {
        self.0.clone()
    }
}

/// Pointer that never moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPointer(pub Point);

impl PointerProvider for FixedPointer {
    fn location(&self) -> Point {
        self.0
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySettings {
    pub show_floating_countdown: bool,
    pub multi_screen: bool,
    pub reminder_auto_dismiss: Duration,
    pub tracking_interval: Duration,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            show_floating_countdown: true,
            multi_screen: true,
            reminder_auto_dismiss: Duration::from_secs(4),
            tracking_interval: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Badge {
    id: SurfaceId,
    display: Rect,
    bounds: Rect,
}

pub struct OverlayOrchestrator {
    host: Box<dyn OverlayHost>,
    displays: Box<dyn DisplayProvider>,
    pointer: Box<dyn PointerProvider>,
    settings: OverlaySettings,
    next_surface: u64,
    break_overlays: Vec<(u32, SurfaceId)>,
    countdown_badge: Option<Badge>,
    badge_visible: bool,
    reminder_badge: Option<(ReminderKind, SurfaceId)>,
    tracking: Option<ClockHandle>,
    auto_dismiss: Option<ClockHandle>,
    orphaned: Vec<ReminderKind>,
    media: MediaCoordinator,
    media_outbox: Vec<MediaCommand>,
}

impl OverlayOrchestrator {
    pub fn new(
        host: Box<dyn OverlayHost>,
        displays: Box<dyn DisplayProvider>,
        pointer: Box<dyn PointerProvider>,
        settings: OverlaySettings,
        media: MediaCoordinator,
    ) -> Self {
        Self {
            host,
            displays,
            pointer,
            settings,
            next_surface: 0,
            break_overlays: Vec::new(),
            countdown_badge: None,
            badge_visible: false,
            reminder_badge: None,
            tracking: None,
            auto_dismiss: None,
            orphaned: Vec::new(),
            media,
            media_outbox: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn break_overlay_count(&self) -> usize {
        self.break_overlays.len()
    }

    /// Displays currently covered by a break overlay.
    pub fn break_overlay_displays(&self) -> Vec<u32> {
        self.break_overlays.iter().map(|(display, _)| *display).collect()
    }

    pub fn has_countdown_badge(&self) -> bool {
        self.countdown_badge.is_some()
    }

    pub fn countdown_badge_bounds(&self) -> Option<Rect> {
        self.countdown_badge.map(|badge| badge.bounds)
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    pub fn reminder_badge(&self) -> Option<ReminderKind> {
        self.reminder_badge.map(|(kind, _)| kind)
    }

    pub fn settings(&self) -> OverlaySettings {
        self.settings
    }

    pub fn media(&self) -> &MediaCoordinator {
        &self.media
    }

    // ── Configuration ────────────────────────────────────────────────

    pub fn set_settings(&mut self, settings: OverlaySettings) {
        self.settings = settings;
    }

    pub fn configure_media(&mut self, enabled: bool, producers: Vec<String>) {
        self.media.configure(enabled, producers);
    }

    // ── Event consumption ────────────────────────────────────────────

    /// Apply one scheduler event.
    pub fn handle_event(&mut self, event: &Event, clock: &mut Clock) {
        match event {
            Event::BreakStarted {
                break_seq,
                duration_secs,
                ..
            } => {
                self.hide_countdown_badge(clock);
                self.show_break_overlays(*duration_secs);
                if let Some(command) = self.media.begin_break(*break_seq) {
                    self.media_outbox.push(command);
                }
            }
            Event::BreakTick { remaining_secs, .. } => {
                let content = OverlayContent::BreakRemaining {
                    remaining_secs: *remaining_secs,
                };
                for (_, id) in &self.break_overlays {
                    self.host.render(*id, &content);
                }
            }
            Event::BreakEnded { .. } => {
                self.hide_break_overlays();
                if let Some(command) = self.media.end_break() {
                    self.media_outbox.push(command);
                }
            }
            Event::PreBreakCountdownShown {
                next_break_in_secs, ..
            } => self.show_countdown_badge(*next_break_in_secs, clock),
            Event::PreBreakCountdownTick {
                next_break_in_secs, ..
            } => {
                if let Some(badge) = self.countdown_badge {
                    self.host.render(
                        badge.id,
                        &OverlayContent::Countdown {
                            next_break_in_secs: *next_break_in_secs,
                        },
                    );
                }
            }
            Event::PreBreakCountdownHidden { .. } => self.hide_countdown_badge(clock),
            Event::ReminderShown { kind, message, .. } => {
                self.show_reminder_badge(*kind, message, clock)
            }
            Event::ReminderDismissed { kind, .. } => {
                if self.reminder_badge() == Some(*kind) {
                    self.hide_reminder_badge(clock);
                }
            }
            Event::CountdownStarted { .. }
            | Event::BreakPostponed { .. }
            | Event::TimerDisabled { .. }
            | Event::PresetApplied { .. } => {}
        }
    }

    /// Reminder lines left visible without a badge: superseded by the other
    /// line, or their badge could not be created. The owner dismisses them.
    pub fn take_orphaned_reminders(&mut self) -> Vec<ReminderKind> {
        std::mem::take(&mut self.orphaned)
    }

    /// Media work produced since the last call.
    pub fn take_media_commands(&mut self) -> Vec<MediaCommand> {
        std::mem::take(&mut self.media_outbox)
    }

    pub fn media_probed(&mut self, report: ProbeReport) {
        if let Some(command) = self.media.probes_completed(report) {
            self.media_outbox.push(command);
        }
    }

    // ── Clock callbacks ──────────────────────────────────────────────

    /// Tracking one-shot fired: re-center the badge and re-arm, unless the
    /// badge has gone.
    pub fn on_tracking_tick(&mut self, handle: ClockHandle, clock: &mut Clock) {
        if self.tracking != Some(handle) {
            return;
        }
        self.tracking = None;
        if !self.badge_visible {
            return;
        }
        if let Some(badge) = self.countdown_badge.as_mut() {
            let (width, height) = COUNTDOWN_BADGE_SIZE;
            let bounds = badge
                .display
                .place_centered(self.pointer.location(), width, height);
            if bounds != badge.bounds {
                badge.bounds = bounds;
                self.host.move_to(badge.id, bounds);
            }
            clock.restart(
                &mut self.tracking,
                self.settings.tracking_interval,
                false,
                TimerLine::CountdownTracking,
            );
        }
    }

    /// Auto-dismiss fired. Returns the line to dismiss; the resulting
    /// `ReminderDismissed` event removes the badge.
    pub fn on_auto_dismiss(&mut self, handle: ClockHandle) -> Option<ReminderKind> {
        if self.auto_dismiss != Some(handle) {
            return None;
        }
        self.auto_dismiss = None;
        self.reminder_badge()
    }

    // ── Break overlays ───────────────────────────────────────────────

    fn show_break_overlays(&mut self, remaining_secs: u64) {
        self.hide_break_overlays();

        let mut displays = self.displays.displays();
        if !self.settings.multi_screen {
            let primary = displays
                .iter()
                .position(|d| d.primary)
                .unwrap_or(0);
            displays = displays.into_iter().skip(primary).take(1).collect();
        }

        let content = OverlayContent::BreakRemaining { remaining_secs };
        for info in displays {
            let id = self.allocate();
            let kind = SurfaceKind::BreakOverlay { display: info.id };
            match self.host.create(id, kind, info.bounds, &content) {
                Ok(()) => self.break_overlays.push((info.id, id)),
                Err(e) => warn!(display_id = info.id, error = %e, "skipping break overlay"),
            }
        }
        debug!(count = self.break_overlays.len(), "break overlays shown");
    }

    /// Destroy every break overlay. Safe to call any number of times.
    pub fn hide_break_overlays(&mut self) {
        if self.break_overlays.is_empty() {
            return;
        }
        let overlays = std::mem::take(&mut self.break_overlays);
        for (_, id) in &overlays {
            self.host.disable_input(*id);
        }
        for (_, id) in &overlays {
            self.host.detach_content(*id);
        }
        for (_, id) in &overlays {
            self.host.release(*id);
        }
        debug!(count = overlays.len(), "break overlays hidden");
    }

    // ── Countdown badge ──────────────────────────────────────────────

    fn show_countdown_badge(&mut self, next_break_in_secs: u64, clock: &mut Clock) {
        self.hide_countdown_badge(clock);
        if !self.settings.show_floating_countdown {
            return;
        }

        let pointer = self.pointer.location();
        let displays = self.displays.displays();
        let Some(display) = displays
            .iter()
            .find(|d| d.bounds.contains(pointer))
            .or_else(|| displays.iter().find(|d| d.primary))
            .or_else(|| displays.first())
        else {
            warn!("no display for countdown badge");
            return;
        };

        let (width, height) = COUNTDOWN_BADGE_SIZE;
        let bounds = display.bounds.place_centered(pointer, width, height);
        let id = self.allocate();
        let content = OverlayContent::Countdown { next_break_in_secs };
        if let Err(e) = self
            .host
            .create(id, SurfaceKind::CountdownBadge, bounds, &content)
        {
            warn!(error = %e, "failed to create countdown badge");
            return;
        }
        self.countdown_badge = Some(Badge {
            id,
            display: display.bounds,
            bounds,
        });
        self.badge_visible = true;
        clock.restart(
            &mut self.tracking,
            self.settings.tracking_interval,
            false,
            TimerLine::CountdownTracking,
        );
    }

    fn hide_countdown_badge(&mut self, clock: &mut Clock) {
        self.badge_visible = false;
        clock.stop(&mut self.tracking);
        if let Some(badge) = self.countdown_badge.take() {
            self.destroy(badge.id);
        }
    }

    // ── Reminder badge ───────────────────────────────────────────────

    fn show_reminder_badge(&mut self, kind: ReminderKind, message: &str, clock: &mut Clock) {
        if let Some(replaced) = self.reminder_badge().filter(|shown| *shown != kind) {
            self.orphaned.push(replaced);
        }
        self.hide_reminder_badge(clock);

        let displays = self.displays.displays();
        let Some(primary) = displays
            .iter()
            .find(|d| d.primary)
            .or_else(|| displays.first())
        else {
            warn!(%kind, "no display for reminder badge");
            self.orphaned.push(kind);
            return;
        };

        let (width, height) = REMINDER_BADGE_SIZE;
        let area = primary.bounds;
        let bounds = Rect::new(
            area.x + (area.width as i32 - width as i32) / 2,
            area.bottom() - REMINDER_BADGE_MARGIN as i32 - height as i32,
            width,
            height,
        );
        let id = self.allocate();
        let content = OverlayContent::Reminder {
            kind,
            message: message.to_string(),
        };
        if let Err(e) = self
            .host
            .create(id, SurfaceKind::ReminderBadge { kind }, bounds, &content)
        {
            warn!(%kind, error = %e, "failed to create reminder badge");
            self.orphaned.push(kind);
            return;
        }
        self.reminder_badge = Some((kind, id));
        clock.restart(
            &mut self.auto_dismiss,
            self.settings.reminder_auto_dismiss,
            false,
            TimerLine::ReminderAutoDismiss,
        );
    }

    fn hide_reminder_badge(&mut self, clock: &mut Clock) {
        clock.stop(&mut self.auto_dismiss);
        if let Some((_, id)) = self.reminder_badge.take() {
            self.destroy(id);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn allocate(&mut self) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        id
    }

    fn destroy(&mut self, id: SurfaceId) {
        self.host.disable_input(id);
        self.host.detach_content(id);
        self.host.release(id);
    }

    /// Tear everything down, e.g. on shutdown.
    pub fn teardown(&mut self, clock: &mut Clock) {
        self.hide_break_overlays();
        self.hide_countdown_badge(clock);
        self.hide_reminder_badge(clock);
    }
}

impl std::fmt::Debug for OverlayOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayOrchestrator")
            .field("break_overlays", &self.break_overlays)
            .field("countdown_badge", &self.countdown_badge)
            .field("reminder_badge", &self.reminder_badge)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct HostState {
        live: Vec<(SurfaceId, SurfaceKind, Rect)>,
        ops: Vec<String>,
        fail_display: Option<u32>,
    }

    #[derive(Clone, Default)]
    struct TestHost(Arc<Mutex<HostState>>);

    impl OverlayHost for TestHost {
        fn create(
            &mut self,
            id: SurfaceId,
            kind: SurfaceKind,
            bounds: Rect,
            _content: &OverlayContent,
        ) -> Result<(), OverlayError> {
            let mut state = self.0.lock().unwrap();
            if let SurfaceKind::BreakOverlay { display } = kind {
                if state.fail_display == Some(display) {
                    return Err(OverlayError::CreationFailed {
                        display,
                        message: "gone".into(),
                    });
                }
            }
            state.live.push((id, kind, bounds));
            Ok(())
        }

        fn render(&mut self, id: SurfaceId, _content: &OverlayContent) {
            self.0.lock().unwrap().ops.push(format!("render {}", id.0));
        }

        fn move_to(&mut self, id: SurfaceId, bounds: Rect) {
            let mut state = self.0.lock().unwrap();
            if let Some(entry) = state.live.iter_mut().find(|(live, _, _)| *live == id) {
                entry.2 = bounds;
            }
        }

        fn disable_input(&mut self, id: SurfaceId) {
            self.0.lock().unwrap().ops.push(format!("disable {}", id.0));
        }

        fn detach_content(&mut self, id: SurfaceId) {
            self.0.lock().unwrap().ops.push(format!("detach {}", id.0));
        }

        fn release(&mut self, id: SurfaceId) {
            let mut state = self.0.lock().unwrap();
            state.ops.push(format!("release {}", id.0));
            state.live.retain(|(live, _, _)| *live != id);
        }
    }

    fn orchestrator(host: &TestHost, displays: u32, pointer: Point) -> OverlayOrchestrator {
        OverlayOrchestrator::new(
            Box::new(host.clone()),
            Box::new(StaticDisplays::side_by_side(displays)),
            Box::new(FixedPointer(pointer)),
            OverlaySettings::default(),
            MediaCoordinator::new(false, Vec::new()),
        )
    }

    fn break_started() -> Event {
        Event::BreakStarted {
            break_seq: 1,
            duration_secs: 20,
            at: Utc::now(),
        }
    }

    #[test]
    fn place_centered_clamps_to_display() {
        let display = Rect::new(0, 0, 1920, 1080);
        let rect = display.place_centered(Point { x: 5, y: 1075 }, 200, 80);
        assert_eq!(rect, Rect::new(0, 1000, 200, 80));
        let rect = display.place_centered(Point { x: 960, y: 540 }, 200, 80);
        assert_eq!(rect, Rect::new(860, 500, 200, 80));
    }

    #[test]
    fn teardown_runs_in_three_steps() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 2, Point::default());
        let mut clock = Clock::new();
        overlays.handle_event(&break_started(), &mut clock);
        overlays.hide_break_overlays();
        let ops = host.0.lock().unwrap().ops.clone();
        assert_eq!(
            ops,
            vec!["disable 0", "disable 1", "detach 0", "detach 1", "release 0", "release 1"]
        );
    }

    #[test]
    fn failing_display_is_skipped() {
        let host = TestHost::default();
        host.0.lock().unwrap().fail_display = Some(1);
        let mut overlays = orchestrator(&host, 3, Point::default());
        let mut clock = Clock::new();
        overlays.handle_event(&break_started(), &mut clock);
        assert_eq!(overlays.break_overlay_displays(), vec![2, 3]);
    }

    #[test]
    fn single_screen_mode_covers_primary_only() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 3, Point::default());
        overlays.set_settings(OverlaySettings {
            multi_screen: false,
            ..OverlaySettings::default()
        });
        let mut clock = Clock::new();
        overlays.handle_event(&break_started(), &mut clock);
        assert_eq!(overlays.break_overlay_displays(), vec![1]);
    }

    #[test]
    fn badge_follows_pointer_display_and_stops_tracking_when_hidden() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 2, Point { x: 2000, y: 10 });
        let mut clock = Clock::new();
        overlays.handle_event(
            &Event::PreBreakCountdownShown {
                next_break_in_secs: 10,
                at: Utc::now(),
            },
            &mut clock,
        );
        assert_eq!(overlays.countdown_badge_bounds(), Some(Rect::new(1920, 0, 200, 80)));
        assert!(overlays.is_tracking());

        let (handle, line) = clock.pop_due(Duration::from_millis(16)).unwrap();
        assert_eq!(line, TimerLine::CountdownTracking);
        overlays.on_tracking_tick(handle, &mut clock);
        assert!(overlays.is_tracking());

        overlays.handle_event(&Event::PreBreakCountdownHidden { at: Utc::now() }, &mut clock);
        assert!(!overlays.has_countdown_badge());
        assert!(!overlays.is_tracking());
        assert_eq!(clock.active_count(), 0);
    }

    #[test]
    fn hidden_floating_countdown_creates_no_badge() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 1, Point::default());
        overlays.set_settings(OverlaySettings {
            show_floating_countdown: false,
            ..OverlaySettings::default()
        });
        let mut clock = Clock::new();
        overlays.handle_event(
            &Event::PreBreakCountdownShown {
                next_break_in_secs: 10,
                at: Utc::now(),
            },
            &mut clock,
        );
        assert!(!overlays.has_countdown_badge());
        assert_eq!(clock.active_count(), 0);
    }

    #[test]
    fn newer_reminder_supersedes_badge_and_auto_dismiss() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 1, Point::default());
        let mut clock = Clock::new();
        let shown = |kind| Event::ReminderShown {
            kind,
            message: "hi".into(),
            at: Utc::now(),
        };
        overlays.handle_event(&shown(ReminderKind::Blink), &mut clock);
        overlays.handle_event(&shown(ReminderKind::Posture), &mut clock);

        let state = host.0.lock().unwrap();
        assert_eq!(state.live.len(), 1);
        assert_eq!(
            state.live[0].1,
            SurfaceKind::ReminderBadge {
                kind: ReminderKind::Posture
            }
        );
        assert_eq!(state.live[0].2, Rect::new(920, 900, 80, 80));
        drop(state);
        assert_eq!(clock.active_count(), 1);
        assert_eq!(overlays.reminder_badge(), Some(ReminderKind::Posture));
        assert_eq!(overlays.take_orphaned_reminders(), vec![ReminderKind::Blink]);
        assert!(overlays.take_orphaned_reminders().is_empty());
    }

    #[test]
    fn same_line_refire_orphans_nothing() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 1, Point::default());
        let mut clock = Clock::new();
        let shown = Event::ReminderShown {
            kind: ReminderKind::Blink,
            message: "hi".into(),
            at: Utc::now(),
        };
        overlays.handle_event(&shown, &mut clock);
        overlays.handle_event(&shown, &mut clock);
        assert_eq!(overlays.reminder_badge(), Some(ReminderKind::Blink));
        assert!(overlays.take_orphaned_reminders().is_empty());
    }

    #[test]
    fn no_displays_creates_nothing_and_orphans_the_reminder() {
        let host = TestHost::default();
        let mut overlays = orchestrator(&host, 0, Point::default());
        let mut clock = Clock::new();

        overlays.handle_event(&break_started(), &mut clock);
        assert_eq!(overlays.break_overlay_count(), 0);
        overlays.handle_event(
            &Event::PreBreakCountdownShown {
                next_break_in_secs: 10,
                at: Utc::now(),
            },
            &mut clock,
        );
        assert!(!overlays.has_countdown_badge());
        overlays.handle_event(
            &Event::ReminderShown {
                kind: ReminderKind::Posture,
                message: "sit up".into(),
                at: Utc::now(),
            },
            &mut clock,
        );
        assert_eq!(overlays.reminder_badge(), None);
        assert_eq!(overlays.take_orphaned_reminders(), vec![ReminderKind::Posture]);
        assert_eq!(clock.active_count(), 0);
        assert!(host.0.lock().unwrap().live.is_empty());

        overlays.hide_break_overlays();
        overlays.teardown(&mut clock);
    }
}
