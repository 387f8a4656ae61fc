//! # Breakwise Core Library
//!
//! Core logic of the Breakwise break reminder: when a break starts and ends,
//! when blink and posture reminders fire, and which overlays must exist on
//! which display at any moment. The CLI binary and any desktop shell are thin
//! layers over this crate.
//!
//! ## Architecture
//!
//! - **Clock**: a virtual-time timer wheel. Nothing in the core owns a thread;
//!   the caller advances time and receives due timer lines one by one
//! - **Break cycle**: the `Idle -> CountingDown -> PreBreakCountdownVisible ->
//!   BreakActive` state machine
//! - **Reminders**: two independent repeating lines (blink, posture)
//! - **Overlay orchestrator**: consumes events in order and owns every overlay
//!   surface, plus the pause/resume media policy
//! - **Engine**: the single context that serializes all of the above
//! - **Runtime**: a tokio task that drives an engine in real time
//!
//! ## Key Components
//!
//! - [`Engine`]: scheduler state, commands and snapshots
//! - [`Settings`]: TOML configuration and presets
//! - [`Event`]: typed state-change notifications

pub mod break_cycle;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod media;
pub mod overlay;
pub mod presets;
pub mod reminders;
pub mod runtime;

pub use break_cycle::{BreakCycle, BreakCycleState, BreakTiming};
pub use clock::{Clock, ClockHandle, TimerLine};
pub use config::{data_dir, MemorySettingsStore, Settings, SettingsStore, TomlSettingsStore};
pub use engine::{Collaborators, Engine, NoopNotifier, Notifier, Snapshot};
pub use error::{ConfigError, CoreError, MediaError, OverlayError};
pub use events::{BreakEndReason, Event, EventBus, ListenerId};
pub use media::{MediaCommand, MediaController, NoopMediaController, PlaybackStatus, ProbeReport};
pub use overlay::{
    DisplayInfo, DisplayProvider, OverlayContent, OverlayHost, Point, PointerProvider, Rect,
    SurfaceId, SurfaceKind,
};
pub use presets::{builtin_presets, CustomPreset};
pub use reminders::{ReminderKind, ReminderScheduler};
pub use runtime::{RuntimeConfig, RuntimeHandle};
