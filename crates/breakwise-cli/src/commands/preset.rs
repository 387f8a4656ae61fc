use breakwise_core::{CustomPreset, Settings, SettingsStore, TomlSettingsStore};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum PresetAction {
    /// List presets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a preset
    Add {
        /// Preset name
        name: String,
        /// Break length in seconds
        #[arg(long, default_value_t = 20)]
        break_duration: u64,
        /// Minutes between breaks
        #[arg(long, default_value_t = 20)]
        break_interval: u64,
        /// Seconds between blink reminders
        #[arg(long, default_value_t = 1200)]
        blink_interval: u64,
        /// Minutes between posture reminders
        #[arg(long, default_value_t = 30)]
        posture_interval: u64,
    },
    /// Change fields of a preset found by id or name
    Edit {
        preset: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// Break length in seconds
        #[arg(long)]
        break_duration: Option<u64>,
        /// Minutes between breaks
        #[arg(long)]
        break_interval: Option<u64>,
        /// Seconds between blink reminders
        #[arg(long)]
        blink_interval: Option<u64>,
        /// Minutes between posture reminders
        #[arg(long)]
        posture_interval: Option<u64>,
    },
    /// Delete a preset by id or name
    Delete { preset: String },
    /// Apply a preset by id or name
    Apply { preset: String },
}

fn resolve(settings: &Settings, preset: &str) -> Result<CustomPreset, Box<dyn std::error::Error>> {
    settings
        .resolve_preset(preset)
        .cloned()
        .ok_or_else(|| format!("preset not found: {preset}").into())
}

pub fn run(action: PresetAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = TomlSettingsStore::open_default()?;
    let mut settings = store.load()?;

    match action {
        PresetAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&settings.presets)?);
                return Ok(());
            }
            for preset in &settings.presets {
                let marker = if settings.current_preset == Some(preset.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}  {:<16} break {}s every {}m, blink {}s, posture {}m",
                    preset.id,
                    preset.name,
                    preset.break_duration_secs,
                    preset.break_interval_min,
                    preset.blink_interval_secs,
                    preset.posture_interval_min,
                );
            }
        }
        PresetAction::Add {
            name,
            break_duration,
            break_interval,
            blink_interval,
            posture_interval,
        } => {
            let preset = CustomPreset::new(
                name,
                break_duration,
                break_interval,
                blink_interval,
                posture_interval,
            );
            let id = settings.add_preset(preset)?;
            store.save(&settings)?;
            println!("{id}");
        }
        PresetAction::Edit {
            preset,
            name,
            break_duration,
            break_interval,
            blink_interval,
            posture_interval,
        } => {
            let mut preset = resolve(&settings, &preset)?;
            if let Some(name) = name {
                preset.name = name;
            }
            preset.break_duration_secs = break_duration.unwrap_or(preset.break_duration_secs);
            preset.break_interval_min = break_interval.unwrap_or(preset.break_interval_min);
            preset.blink_interval_secs = blink_interval.unwrap_or(preset.blink_interval_secs);
            preset.posture_interval_min = posture_interval.unwrap_or(preset.posture_interval_min);
            settings.update_preset(preset.clone())?;
            // The active preset's values live in the timer and reminder sections too.
            if settings.current_preset == Some(preset.id) {
                settings.apply_preset_values(&preset)?;
            }
            store.save(&settings)?;
            println!("updated {}", preset.name);
        }
        PresetAction::Delete { preset } => {
            let preset = resolve(&settings, &preset)?;
            settings.remove_preset(preset.id)?;
            store.save(&settings)?;
            println!("deleted {}", preset.name);
        }
        PresetAction::Apply { preset } => {
            let preset = resolve(&settings, &preset)?;
            settings.apply_preset_values(&preset)?;
            store.save(&settings)?;
            println!("applied {}", preset.name);
        }
    }
    Ok(())
}
