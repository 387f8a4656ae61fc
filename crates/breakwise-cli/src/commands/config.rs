use breakwise_core::{Settings, SettingsStore, TomlSettingsStore};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "timer.break_interval_secs", "overlay.multi_screen")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List {
        /// Print the whole file as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = TomlSettingsStore::open_default()?;
    match action {
        ConfigAction::Get { key } => {
            let settings = store.load()?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = store.load()?;
            settings.set(&key, &value)?;
            store.save(&settings)?;
            println!("ok");
        }
        ConfigAction::List { json } => {
            let settings = store.load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                for (key, value) in settings.entries() {
                    if key != "presets" {
                        println!("{key} = {value}");
                    }
                }
            }
        }
        ConfigAction::Reset => {
            store.save(&Settings::default())?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
