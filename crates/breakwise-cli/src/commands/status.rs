use std::time::Duration;

use breakwise_core::overlay::{FixedPointer, StaticDisplays};
use breakwise_core::{
    Collaborators, Engine, MemorySettingsStore, NoopMediaController, NoopNotifier, SettingsStore,
    TomlSettingsStore,
};
use clap::Args;

use crate::console::ConsoleOverlayHost;

#[derive(Args)]
pub struct StatusArgs {
    /// Simulate this many seconds before printing
    #[arg(long, default_value_t = 0)]
    after: u64,
    /// Number of simulated displays
    #[arg(long, default_value_t = 1)]
    displays: u32,
}

/// Build an engine from the settings file without writing back to it and
/// print its snapshot.
pub fn run(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = TomlSettingsStore::open_default()?.load()?;
    let mut engine = Engine::new(Collaborators {
        store: Box::new(MemorySettingsStore::new(settings)),
        host: Box::new(ConsoleOverlayHost::quiet()),
        displays: Box::new(StaticDisplays::side_by_side(args.displays.max(1))),
        pointer: Box::new(FixedPointer::default()),
        notifier: Box::new(NoopNotifier),
    })?;

    engine.advance(Duration::from_secs(args.after));
    engine.run_media_blocking(&NoopMediaController);

    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    Ok(())
}
