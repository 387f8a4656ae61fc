#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use breakwise_core::overlay::{DisplayInfo, OverlayContent, Point, Rect, SurfaceId, SurfaceKind};
use breakwise_core::{
    Collaborators, DisplayProvider, Engine, Event, MemorySettingsStore, NoopNotifier, OverlayError,
    OverlayHost, PointerProvider, Settings,
};

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Live surfaces as seen by the window system.
#[derive(Debug, Default)]
pub struct HostState {
    pub live: Vec<(SurfaceId, SurfaceKind, Rect)>,
    pub released: Vec<SurfaceId>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingHost(pub Arc<Mutex<HostState>>);

impl RecordingHost {
    pub fn count(&self, pred: impl Fn(&SurfaceKind) -> bool) -> usize {
        self.0
            .lock()
            .unwrap()
            .live
            .iter()
            .filter(|(_, kind, _)| pred(kind))
            .count()
    }

    pub fn break_overlays(&self) -> usize {
        self.count(|kind| matches!(kind, SurfaceKind::BreakOverlay { .. }))
    }

    pub fn countdown_badges(&self) -> usize {
        self.count(|kind| matches!(kind, SurfaceKind::CountdownBadge))
    }

    pub fn reminder_badges(&self) -> usize {
        self.count(|kind| matches!(kind, SurfaceKind::ReminderBadge { .. }))
    }
}

impl OverlayHost for RecordingHost {
    fn create(
        &mut self,
        id: SurfaceId,
        kind: SurfaceKind,
        bounds: Rect,
        _content: &OverlayContent,
    ) -> Result<(), OverlayError> {
        self.0.lock().unwrap().live.push((id, kind, bounds));
        Ok(())
    }

    fn render(&mut self, _id: SurfaceId, _content: &OverlayContent) {}

    fn move_to(&mut self, _id: SurfaceId, _bounds: Rect) {}

    fn disable_input(&mut self, _id: SurfaceId) {}

    fn detach_content(&mut self, _id: SurfaceId) {}

    fn release(&mut self, id: SurfaceId) {
        let mut state = self.0.lock().unwrap();
        state.live.retain(|(live, _, _)| *live != id);
        state.released.push(id);
    }
}

/// Display list that tests can change mid-run.
#[derive(Debug, Clone)]
pub struct SharedDisplays(pub Arc<Mutex<Vec<DisplayInfo>>>);

impl SharedDisplays {
    pub fn new(count: u32) -> Self {
        let displays = (0..count)
            .map(|i| DisplayInfo {
                id: i + 1,
                bounds: Rect::new(i as i32 * 1920, 0, 1920, 1080),
                primary: i == 0,
            })
            .collect();
        Self(Arc::new(Mutex::new(displays)))
    }

    pub fn remove(&self, id: u32) {
        self.0.lock().unwrap().retain(|d| d.id != id);
    }
}

impl DisplayProvider for SharedDisplays {
    fn displays(&self) -> Vec<DisplayInfo> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedPointer(pub Arc<Mutex<Point>>);

impl PointerProvider for SharedPointer {
    fn location(&self) -> Point {
        *self.0.lock().unwrap()
    }
}

pub struct Fixture {
    pub engine: Engine,
    pub host: RecordingHost,
    pub displays: SharedDisplays,
    pub pointer: SharedPointer,
    pub store: MemorySettingsStore,
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl Fixture {
    pub fn new(settings: Settings, displays: u32) -> Self {
        let host = RecordingHost::default();
        let displays = SharedDisplays::new(displays);
        let pointer = SharedPointer::default();
        let store = MemorySettingsStore::new(settings);
        let mut engine = Engine::with_seed(
            Collaborators {
                store: Box::new(store.clone()),
                host: Box::new(host.clone()),
                displays: Box::new(displays.clone()),
                pointer: Box::new(pointer.clone()),
                notifier: Box::new(NoopNotifier),
            },
            42,
        )
        .expect("engine");
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        Self {
            engine,
            host,
            displays,
            pointer,
            store,
            events,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

/// Settings for the short-cycle scenarios: reminders off, no grace delay.
pub fn break_settings(interval: u64, duration: u64) -> Settings {
    let mut settings = Settings::default();
    settings.timer.break_interval_secs = interval;
    settings.timer.break_duration_secs = duration;
    settings.overlay.break_end_grace_ms = 0;
    settings.reminders.blink_enabled = false;
    settings.reminders.posture_enabled = false;
    settings.media.smart_media_control = false;
    settings
}
