use std::sync::Arc;
use std::time::Duration;

use breakwise_core::overlay::{FixedPointer, Point, StaticDisplays};
use breakwise_core::runtime::{self, RuntimeConfig};
use breakwise_core::{
    Collaborators, Engine, Event, NoopMediaController, ReminderKind, RuntimeHandle, SettingsStore,
    TomlSettingsStore,
};
use clap::Args;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::console::{format_secs, BellNotifier, ConsoleOverlayHost};

const DEFAULT_POSTPONE_SECS: u64 = 300;

#[derive(Args)]
pub struct RunArgs {
    /// Number of simulated displays to cover during breaks
    #[arg(long, default_value_t = 1)]
    displays: u32,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = TomlSettingsStore::open_default()?;
    let settings = store.load()?;
    let config = RuntimeConfig {
        probe_timeout: settings.probe_timeout(),
    };

    let displays = StaticDisplays::side_by_side(args.displays.max(1));
    let center = displays
        .0
        .first()
        .map(|d| Point {
            x: d.bounds.x + d.bounds.width as i32 / 2,
            y: d.bounds.y + d.bounds.height as i32 / 2,
        })
        .unwrap_or_default();

    let engine = Engine::new(Collaborators {
        store: Box::new(store),
        host: Box::new(ConsoleOverlayHost::new()),
        displays: Box::new(displays),
        pointer: Box::new(FixedPointer(center)),
        notifier: Box::new(BellNotifier),
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(drive(engine, config))
}

async fn drive(engine: Engine, config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (handle, task) = runtime::spawn(engine, Arc::new(NoopMediaController), config);
    let mut events = handle.subscribe();

    // Plain thread: a blocking-pool task would hold up runtime shutdown.
    let (line_tx, mut lines) = mpsc::channel::<String>(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!(
        "breakwise running. Commands: skip, end, break, postpone [secs], toggle, dismiss [blink|posture], status, quit"
    );
    let snapshot = handle.snapshot().await?;
    println!(
        "next break in {}",
        format_secs(snapshot.time_until_next_break_secs)
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(line) = lines.recv() => {
                if !handle_line(&handle, line.trim()).await? {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "event log lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_line(handle: &RuntimeHandle, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some("skip") => handle.skip_break().await?,
        Some("end") => handle.end_break().await?,
        Some("break") => handle.start_break_now().await?,
        Some("postpone") => {
            let secs = match words.next() {
                Some(word) => word.parse::<u64>()?,
                None => DEFAULT_POSTPONE_SECS,
            };
            handle.postpone(Duration::from_secs(secs)).await?;
        }
        Some("toggle") => {
            let enabled = handle.toggle().await?;
            println!("breaks {}", if enabled { "enabled" } else { "disabled" });
        }
        Some("dismiss") => match words.next() {
            Some("blink") => handle.dismiss_reminder(ReminderKind::Blink).await?,
            Some("posture") => handle.dismiss_reminder(ReminderKind::Posture).await?,
            _ => handle.dismiss_reminders().await?,
        },
        Some("status") => {
            let snapshot = handle.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Some("quit" | "exit") => return Ok(false),
        Some(other) => println!("unknown command: {other}"),
    }
    Ok(true)
}

fn log_event(event: &Event) {
    match event {
        Event::CountdownStarted {
            next_break_in_secs, ..
        } => info!("next break in {}", format_secs(*next_break_in_secs)),
        Event::BreakPostponed {
            next_break_in_secs, ..
        } => info!("break postponed, next in {}", format_secs(*next_break_in_secs)),
        Event::BreakEnded { reason, .. } => info!(?reason, "break over"),
        Event::TimerDisabled { .. } => info!("breaks disabled"),
        Event::PresetApplied { name, .. } => info!(preset = %name, "preset applied"),
        _ => {}
    }
}
