//! Settings file behavior against a real filesystem.

mod common;

use breakwise_core::overlay::{FixedPointer, StaticDisplays};
use breakwise_core::{
    builtin_presets, Collaborators, CoreError, Engine, NoopNotifier, SettingsStore,
    TomlSettingsStore,
};
use common::RecordingHost;
use tempfile::TempDir;

#[test]
fn first_load_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let store = TomlSettingsStore::new(&path);

    let settings = store.load().unwrap();
    assert!(path.exists());
    assert_eq!(settings.timer.break_interval_secs, 1200);
    assert_eq!(settings.presets, builtin_presets());

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[timer]"));
    assert!(content.contains("[[presets]]"));
    assert!(content.contains("20-20-20 Rule"));
}

#[test]
fn edits_survive_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = TomlSettingsStore::new(dir.path().join("config.toml"));

    let mut settings = store.load().unwrap();
    settings.set("timer.break_interval_secs", "900").unwrap();
    settings.set("media.smart_media_control", "false").unwrap();
    settings.current_preset = Some(settings.presets[2].id);
    store.save(&settings).unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded, settings);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[timer\nbreak_interval_secs = ").unwrap();

    let err = TomlSettingsStore::new(&path).load().unwrap_err();
    assert!(matches!(err, CoreError::TomlDe(_)));
}

#[test]
fn zero_interval_in_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[timer]\nbreak_interval_secs = 0\n").unwrap();

    let err = TomlSettingsStore::new(&path).load().unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
}

#[test]
fn engine_persists_toggle_and_preset_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut engine = Engine::new(Collaborators {
        store: Box::new(TomlSettingsStore::new(&path)),
        host: Box::new(RecordingHost::default()),
        displays: Box::new(StaticDisplays::side_by_side(1)),
        pointer: Box::new(FixedPointer::default()),
        notifier: Box::new(NoopNotifier),
    })
    .unwrap();

    let pomodoro = builtin_presets()[1].id;
    engine.apply_preset(pomodoro).unwrap();
    assert!(!engine.toggle());

    let on_disk = TomlSettingsStore::new(&path).load().unwrap();
    assert!(!on_disk.timer.enabled);
    assert_eq!(on_disk.current_preset, Some(pomodoro));
    assert_eq!(on_disk.timer.break_interval_secs, 25 * 60);
    assert_eq!(on_disk.timer.break_duration_secs, 300);
}
