//! TOML-based settings.
//!
//! Stores:
//! - Break timing and the enabled/auto-start flags
//! - Blink and posture reminder lines
//! - Overlay behavior (pre-break window, grace delay, badge timing)
//! - Media co-operation
//! - Break presets
//!
//! Settings are stored at `~/.config/breakwise/config.toml`. The scheduler
//! reaches them only through a [`SettingsStore`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::break_cycle::BreakTiming;
use crate::error::{ConfigError, CoreError, Result};
use crate::overlay::OverlaySettings;
use crate::presets::{builtin_presets, CustomPreset};

/// Upper bound for every interval and duration setting: one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Check that an interval lies between one second and [`MAX_INTERVAL_SECS`].
pub(crate) fn check_interval(key: &str, interval: Duration) -> Result<(), ConfigError> {
    if interval < Duration::from_secs(1) {
        return Err(ConfigError::invalid(key, "must be at least 1 second"));
    }
    if interval > Duration::from_secs(MAX_INTERVAL_SECS) {
        return Err(ConfigError::invalid(
            key,
            format!("must be at most {MAX_INTERVAL_SECS} seconds"),
        ));
    }
    Ok(())
}

/// Break cycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_break_interval")]
    pub break_interval_secs: u64,
    #[serde(default = "default_break_duration")]
    pub break_duration_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

/// Reminder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_blink_interval")]
    pub blink_interval_secs: u64,
    #[serde(default = "default_posture_interval")]
    pub posture_interval_secs: u64,
    /// Kept for the preferences UI; the badge lifetime is `overlay.reminder_auto_dismiss_secs`.
    #[serde(default = "default_reminder_duration")]
    pub blink_duration_secs: u64,
    #[serde(default = "default_reminder_duration")]
    pub posture_duration_secs: u64,
    #[serde(default = "default_true")]
    pub blink_enabled: bool,
    #[serde(default = "default_true")]
    pub posture_enabled: bool,
    #[serde(default = "default_true")]
    pub skip_during_breaks: bool,
}

/// Overlay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_pre_break_window")]
    pub pre_break_window_secs: u64,
    #[serde(default = "default_break_end_grace")]
    pub break_end_grace_ms: u64,
    #[serde(default = "default_auto_dismiss")]
    pub reminder_auto_dismiss_secs: u64,
    #[serde(default = "default_tracking_interval")]
    pub tracking_interval_ms: u64,
    #[serde(default = "default_true")]
    pub show_floating_countdown: bool,
    #[serde(default = "default_true")]
    pub multi_screen: bool,
}

/// Media co-operation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_true")]
    pub smart_media_control: bool,
    #[serde(default = "default_producers")]
    pub producers: Vec<String>,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

/// Application settings.
///
/// Serialized to/from TOML at `~/.config/breakwise/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Last applied preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_preset: Option<Uuid>,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default = "builtin_presets")]
    pub presets: Vec<CustomPreset>,
}

// Default functions
fn default_break_interval() -> u64 {
    1200
}
fn default_break_duration() -> u64 {
    20
}
fn default_blink_interval() -> u64 {
    1200
}
fn default_posture_interval() -> u64 {
    1800
}
fn default_reminder_duration() -> u64 {
    5
}
fn default_pre_break_window() -> u64 {
    10
}
fn default_break_end_grace() -> u64 {
    500
}
fn default_auto_dismiss() -> u64 {
    4
}
fn default_tracking_interval() -> u64 {
    16
}
fn default_probe_timeout() -> u64 {
    2000
}
fn default_producers() -> Vec<String> {
    vec!["Spotify".into(), "Music".into()]
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            break_interval_secs: default_break_interval(),
            break_duration_secs: default_break_duration(),
            enabled: true,
            auto_start: true,
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            blink_interval_secs: default_blink_interval(),
            posture_interval_secs: default_posture_interval(),
            blink_duration_secs: default_reminder_duration(),
            posture_duration_secs: default_reminder_duration(),
            blink_enabled: true,
            posture_enabled: true,
            skip_during_breaks: true,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            pre_break_window_secs: default_pre_break_window(),
            break_end_grace_ms: default_break_end_grace(),
            reminder_auto_dismiss_secs: default_auto_dismiss(),
            tracking_interval_ms: default_tracking_interval(),
            show_floating_countdown: true,
            multi_screen: true,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            smart_media_control: true,
            producers: default_producers(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_preset: None,
            timer: TimerConfig::default(),
            reminders: RemindersConfig::default(),
            overlay: OverlayConfig::default(),
            media: MediaConfig::default(),
            presets: builtin_presets(),
        }
    }
}

impl Settings {
    pub fn break_interval(&self) -> Duration {
        Duration::from_secs(self.timer.break_interval_secs)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.timer.break_duration_secs)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_secs(self.reminders.blink_interval_secs)
    }

    pub fn posture_interval(&self) -> Duration {
        Duration::from_secs(self.reminders.posture_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.media.probe_timeout_ms)
    }

    pub fn break_timing(&self) -> BreakTiming {
        BreakTiming {
            pre_break_window: Duration::from_secs(self.overlay.pre_break_window_secs),
            end_grace: Duration::from_millis(self.overlay.break_end_grace_ms),
        }
    }

    pub fn overlay_settings(&self) -> OverlaySettings {
        OverlaySettings {
            show_floating_countdown: self.overlay.show_floating_countdown,
            multi_screen: self.overlay.multi_screen,
            reminder_auto_dismiss: Duration::from_secs(self.overlay.reminder_auto_dismiss_secs),
            tracking_interval: Duration::from_millis(self.overlay.tracking_interval_ms),
        }
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_MS: u64 = MAX_INTERVAL_SECS * 1000;
        // (key, value, may be zero, upper bound)
        let bounded = [
            ("timer.break_interval_secs", self.timer.break_interval_secs, false, MAX_INTERVAL_SECS),
            ("timer.break_duration_secs", self.timer.break_duration_secs, false, MAX_INTERVAL_SECS),
            ("reminders.blink_interval_secs", self.reminders.blink_interval_secs, false, MAX_INTERVAL_SECS),
            ("reminders.posture_interval_secs", self.reminders.posture_interval_secs, false, MAX_INTERVAL_SECS),
            ("overlay.pre_break_window_secs", self.overlay.pre_break_window_secs, true, MAX_INTERVAL_SECS),
            ("overlay.break_end_grace_ms", self.overlay.break_end_grace_ms, true, MAX_MS),
            ("overlay.reminder_auto_dismiss_secs", self.overlay.reminder_auto_dismiss_secs, false, MAX_INTERVAL_SECS),
            ("overlay.tracking_interval_ms", self.overlay.tracking_interval_ms, false, MAX_MS),
            ("media.probe_timeout_ms", self.media.probe_timeout_ms, false, MAX_MS),
        ];
        for (key, value, zero_ok, max) in bounded {
            if value == 0 && !zero_ok {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
            if value > max {
                return Err(ConfigError::invalid(key, format!("must be at most {max}")));
            }
        }
        for preset in &self.presets {
            preset.validate()?;
        }
        Ok(())
    }

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let invalid = |what: &str| ConfigError::invalid(key, format!("cannot parse '{value}' as {what}"));

            let new_value = match existing {
                serde_json::Value::Bool(_) => {
                    serde_json::Value::Bool(value.parse::<bool>().map_err(|_| invalid("bool"))?)
                }
                serde_json::Value::Number(_) => {
                    let n = value.parse::<u64>().map_err(|_| invalid("unsigned integer"))?;
                    serde_json::Value::Number(n.into())
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| ConfigError::ParseFailed(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Get a value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The new settings are validated as a
    /// whole; on error nothing changes.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Settings =
            serde_json::from_value(json).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            collect_leaves(&json, String::new(), &mut out);
        }
        out
    }
}

fn collect_leaves(value: &serde_json::Value, prefix: String, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_leaves(child, path, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix, s.clone())),
        other => out.push((prefix, other.to_string())),
    }
}

/// Returns `~/.config/breakwise[-dev]/` based on BREAKWISE_ENV.
///
/// Set BREAKWISE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("BREAKWISE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("breakwise-dev")
    } else {
        base_dir.join("breakwise")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

// ── Settings port ────────────────────────────────────────────────────

/// Where the scheduler reads and writes its settings.
pub trait SettingsStore: Send {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings file on disk.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `config.toml` inside [`data_dir`].
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(data_dir()?.join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    /// Load from disk, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the defaults cannot be written.
    fn load(&self) -> Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let settings: Settings = toml::from_str(&content)?;
                settings.validate()?;
                debug!(path = %self.path.display(), "settings loaded");
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Settings::default();
                self.save(&settings)?;
                info!(path = %self.path.display(), "created default settings");
                Ok(settings)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: self.path.clone(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let content = toml::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content).map_err(|e| ConfigError::SaveFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

/// In-process store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<Settings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    /// Current stored value.
    pub fn snapshot(&self) -> Settings {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the stored value, as an external editor would.
    pub fn replace(&self, settings: Settings) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.snapshot())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| CoreError::Custom("settings store lock poisoned".into()))?;
        *guard = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_roundtrip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Settings = toml::from_str("[timer]\nbreak_interval_secs = 600\n").unwrap();
        assert_eq!(parsed.timer.break_interval_secs, 600);
        assert_eq!(parsed.timer.break_duration_secs, 20);
        assert_eq!(parsed.reminders.posture_interval_secs, 1800);
        assert_eq!(parsed.presets.len(), 4);
        assert_eq!(parsed.media.producers, vec!["Spotify", "Music"]);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let settings = Settings::default();
        assert_eq!(settings.get("timer.break_interval_secs").as_deref(), Some("1200"));
        assert_eq!(settings.get("overlay.multi_screen").as_deref(), Some("true"));
        assert!(settings.get("timer.missing").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut settings = Settings::default();
        settings.set("reminders.blink_enabled", "false").unwrap();
        settings.set("timer.break_duration_secs", "45").unwrap();
        settings.set("media.producers", r#"["VLC"]"#).unwrap();
        assert!(!settings.reminders.blink_enabled);
        assert_eq!(settings.timer.break_duration_secs, 45);
        assert_eq!(settings.media.producers, vec!["VLC"]);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.set("timer.nope", "1"),
            Err(ConfigError::UnknownKey("timer.nope".into()))
        );
    }

    #[test]
    fn set_rejects_bad_type_and_zero() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("overlay.multi_screen", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("timer.break_interval_secs", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn set_rejects_values_past_one_week() {
        let mut settings = Settings::default();
        let week = MAX_INTERVAL_SECS.to_string();
        settings.set("timer.break_interval_secs", &week).unwrap();
        assert_eq!(settings.timer.break_interval_secs, MAX_INTERVAL_SECS);

        for (key, value) in [
            ("timer.break_interval_secs", (MAX_INTERVAL_SECS + 1).to_string()),
            ("reminders.posture_interval_secs", u64::MAX.to_string()),
            ("overlay.break_end_grace_ms", u64::MAX.to_string()),
            ("media.probe_timeout_ms", (MAX_INTERVAL_SECS * 1000 + 1).to_string()),
        ] {
            let err = settings.set(key, &value).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { key: ref k, .. } if k == key), "{err:?}");
        }
        assert_eq!(settings.timer.break_interval_secs, MAX_INTERVAL_SECS);
    }

    #[test]
    fn entries_list_leaf_keys() {
        let entries = Settings::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "timer.break_interval_secs" && v == "1200"));
        assert!(entries.iter().any(|(k, _)| k == "overlay.break_end_grace_ms"));
    }

    #[test]
    fn memory_store_shares_state_between_clones() {
        let store = MemorySettingsStore::default();
        let other = store.clone();
        let mut settings = Settings::default();
        settings.timer.enabled = false;
        store.save(&settings).unwrap();
        assert!(!other.load().unwrap().timer.enabled);
    }
}
