//! Break presets.
//!
//! A preset bundles break length, break interval and both reminder intervals.
//! Presets are stored in the units the preferences UI edits them in; the
//! `Duration` accessors do the conversion.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Settings, MAX_INTERVAL_SECS};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPreset {
    pub id: Uuid,
    pub name: String,
    /// Break length in seconds.
    pub break_duration_secs: u64,
    /// Time between breaks in minutes.
    pub break_interval_min: u64,
    /// Blink reminder interval in seconds.
    pub blink_interval_secs: u64,
    /// Posture reminder interval in minutes.
    pub posture_interval_min: u64,
}

impl CustomPreset {
    pub fn new(
        name: impl Into<String>,
        break_duration_secs: u64,
        break_interval_min: u64,
        blink_interval_secs: u64,
        posture_interval_min: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            break_duration_secs,
            break_interval_min,
            blink_interval_secs,
            posture_interval_min,
        }
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.break_duration_secs)
    }

    pub fn break_interval(&self) -> Duration {
        Duration::from_secs(self.break_interval_min.saturating_mul(60))
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_secs(self.blink_interval_secs)
    }

    pub fn posture_interval(&self) -> Duration {
        Duration::from_secs(self.posture_interval_min.saturating_mul(60))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("preset.name", "must not be empty"));
        }
        let fields = [
            ("preset.break_duration_secs", Some(self.break_duration_secs)),
            ("preset.break_interval_min", self.break_interval_min.checked_mul(60)),
            ("preset.blink_interval_secs", Some(self.blink_interval_secs)),
            ("preset.posture_interval_min", self.posture_interval_min.checked_mul(60)),
        ];
        for (key, secs) in fields {
            match secs {
                Some(0) => return Err(ConfigError::invalid(key, "must be greater than zero")),
                Some(secs) if secs <= MAX_INTERVAL_SECS => {}
                _ => return Err(ConfigError::invalid(key, "exceeds one week")),
            }
        }
        Ok(())
    }
}

/// Presets shipped with a fresh configuration. Their ids are fixed so they
/// can be referenced before the settings file exists.
pub fn builtin_presets() -> Vec<CustomPreset> {
    let preset = |id: u128, name: &str, duration, interval, blink, posture| CustomPreset {
        id: Uuid::from_u128(id),
        name: name.to_string(),
        break_duration_secs: duration,
        break_interval_min: interval,
        blink_interval_secs: blink,
        posture_interval_min: posture,
    };
    vec![
        preset(0x2020_2000_0000_4000_8000_0000_0000_0001, "20-20-20 Rule", 20, 20, 20, 30),
        preset(0x2020_2000_0000_4000_8000_0000_0000_0002, "Pomodoro", 300, 25, 20, 30),
        preset(0x2020_2000_0000_4000_8000_0000_0000_0003, "Short Breaks", 15, 15, 15, 25),
        preset(0x2020_2000_0000_4000_8000_0000_0000_0004, "Deep Focus", 30, 45, 25, 45),
    ]
}

impl Settings {
    pub fn find_preset(&self, id: Uuid) -> Option<&CustomPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Look a preset up by id or, failing that, by case-insensitive name.
    pub fn resolve_preset(&self, id_or_name: &str) -> Option<&CustomPreset> {
        if let Ok(id) = id_or_name.parse::<Uuid>() {
            return self.find_preset(id);
        }
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(id_or_name))
    }

    pub fn add_preset(&mut self, preset: CustomPreset) -> Result<Uuid, ConfigError> {
        preset.validate()?;
        if self.find_preset(preset.id).is_some() {
            return Err(ConfigError::invalid("preset.id", "already exists"));
        }
        let id = preset.id;
        self.presets.push(preset);
        Ok(id)
    }

    /// Replace the preset with the same id.
    pub fn update_preset(&mut self, preset: CustomPreset) -> Result<(), ConfigError> {
        preset.validate()?;
        let slot = self
            .presets
            .iter_mut()
            .find(|p| p.id == preset.id)
            .ok_or(ConfigError::UnknownPreset(preset.id))?;
        *slot = preset;
        Ok(())
    }

    /// Remove a preset. Clears `current_preset` if it pointed there.
    pub fn remove_preset(&mut self, id: Uuid) -> Result<CustomPreset, ConfigError> {
        let index = self
            .presets
            .iter()
            .position(|p| p.id == id)
            .ok_or(ConfigError::UnknownPreset(id))?;
        if self.current_preset == Some(id) {
            self.current_preset = None;
        }
        Ok(self.presets.remove(index))
    }

    /// Copy a preset's values into the timer and reminder sections.
    pub fn apply_preset_values(&mut self, preset: &CustomPreset) -> Result<(), ConfigError> {
        preset.validate()?;
        self.timer.break_duration_secs = preset.break_duration_secs;
        self.timer.break_interval_secs = preset.break_interval().as_secs();
        self.reminders.blink_interval_secs = preset.blink_interval_secs;
        self.reminders.posture_interval_secs = preset.posture_interval().as_secs();
        self.current_preset = Some(preset.id);
        Ok(())
    }
}
