//! Tokio driver for an [`Engine`].
//!
//! The engine lives on a single task. The task sleeps until the next clock
//! deadline or the next command, whichever comes first, then advances the
//! engine to the current instant. Media work runs on the blocking pool and
//! its probe reports are fed back through the same loop, so the engine is
//! never touched from another thread. Pause and resume calls go through one
//! worker and keep the order the engine issued them in.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{Engine, Snapshot};
use crate::error::{ConfigError, CoreError, MediaError, Result};
use crate::events::Event;
use crate::media::{execute_blocking, MediaCommand, MediaController, PlaybackStatus, ProbeReport};
use crate::reminders::ReminderKind;

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Requests accepted by the runtime task.
#[derive(Debug)]
pub enum Command {
    Enable,
    Disable,
    Toggle(oneshot::Sender<bool>),
    SkipBreak,
    EndBreak,
    Postpone(Duration),
    StartBreakNow,
    DismissReminder(ReminderKind),
    DismissReminders,
    SetBreakInterval(Duration, oneshot::Sender<Result<(), ConfigError>>),
    SetBreakDuration(Duration, oneshot::Sender<Result<(), ConfigError>>),
    ApplyPreset(Uuid, oneshot::Sender<Result<(), ConfigError>>),
    ReloadSettings(oneshot::Sender<Result<()>>),
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Budget for one round of media probes. Replaced by
    /// `media.probe_timeout_ms` whenever settings are reloaded.
    pub probe_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(2000),
        }
    }
}

/// Cloneable handle to a running scheduler.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
}

impl RuntimeHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::RuntimeStopped)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| CoreError::RuntimeStopped)
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn enable(&self) -> Result<()> {
        self.send(Command::Enable).await
    }

    pub async fn disable(&self) -> Result<()> {
        self.send(Command::Disable).await
    }

    pub async fn toggle(&self) -> Result<bool> {
        self.request(Command::Toggle).await
    }

    pub async fn skip_break(&self) -> Result<()> {
        self.send(Command::SkipBreak).await
    }

    pub async fn end_break(&self) -> Result<()> {
        self.send(Command::EndBreak).await
    }

    pub async fn postpone(&self, by: Duration) -> Result<()> {
        self.send(Command::Postpone(by)).await
    }

    pub async fn start_break_now(&self) -> Result<()> {
        self.send(Command::StartBreakNow).await
    }

    pub async fn dismiss_reminder(&self, kind: ReminderKind) -> Result<()> {
        self.send(Command::DismissReminder(kind)).await
    }

    pub async fn dismiss_reminders(&self) -> Result<()> {
        self.send(Command::DismissReminders).await
    }

    pub async fn set_break_interval(&self, interval: Duration) -> Result<()> {
        Ok(self
            .request(|tx| Command::SetBreakInterval(interval, tx))
            .await??)
    }

    pub async fn set_break_duration(&self, duration: Duration) -> Result<()> {
        Ok(self
            .request(|tx| Command::SetBreakDuration(duration, tx))
            .await??)
    }

    pub async fn apply_preset(&self, id: Uuid) -> Result<()> {
        Ok(self.request(|tx| Command::ApplyPreset(id, tx)).await??)
    }

    pub async fn reload_settings(&self) -> Result<()> {
        self.request(Command::ReloadSettings).await?
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(Command::Snapshot).await
    }

    /// Ask the task to stop. It tears overlays down and resumes media first.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

/// Start driving `engine` on the current tokio runtime. The join handle
/// yields the engine back once the task stops.
pub fn spawn(
    mut engine: Engine,
    media: Arc<dyn MediaController>,
    config: RuntimeConfig,
) -> (RuntimeHandle, JoinHandle<Engine>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

    let forward = event_tx.clone();
    engine.subscribe(move |event| {
        // No receivers is fine.
        let _ = forward.send(event.clone());
    });

    let task = tokio::spawn(run(engine, command_rx, media, config));
    (
        RuntimeHandle {
            commands: command_tx,
            events: event_tx,
        },
        task,
    )
}

async fn run(
    mut engine: Engine,
    mut commands: mpsc::Receiver<Command>,
    media: Arc<dyn MediaController>,
    mut config: RuntimeConfig,
) -> Engine {
    let origin = Instant::now()
        .checked_sub(engine.now())
        .unwrap_or_else(Instant::now);
    let (report_tx, mut reports) = mpsc::unbounded_channel::<ProbeReport>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<MediaCommand>();
    let control = tokio::spawn(media_control(Arc::clone(&media), control_rx));
    info!("scheduler runtime started");

    loop {
        dispatch_media(&mut engine, &media, &report_tx, &control_tx, config.probe_timeout);

        let deadline = engine.next_deadline().map(|d| origin + d);
        let sleep = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            command = commands.recv() => {
                engine.advance_to(origin.elapsed());
                match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => {
                        let reload = matches!(command, Command::ReloadSettings(_));
                        apply(&mut engine, command);
                        if reload {
                            config.probe_timeout = engine.settings().probe_timeout();
                        }
                    }
                }
            }
            Some(report) = reports.recv() => {
                engine.advance_to(origin.elapsed());
                engine.media_probed(report);
            }
            _ = sleep => {
                engine.advance_to(origin.elapsed());
            }
        }
    }

    engine.shutdown();
    // Resume whatever the last break paused, after any pause still in flight.
    for command in engine.take_media_commands() {
        let _ = control_tx.send(command);
    }
    drop(control_tx);
    if let Err(e) = control.await {
        warn!(error = %e, "media worker failed during shutdown");
    }
    info!("scheduler runtime stopped");
    engine
}

fn apply(engine: &mut Engine, command: Command) {
    debug!(?command, "command");
    match command {
        Command::Enable => engine.enable(),
        Command::Disable => engine.disable(),
        Command::Toggle(reply) => {
            let _ = reply.send(engine.toggle());
        }
        Command::SkipBreak => {
            engine.skip_break();
        }
        Command::EndBreak => {
            engine.end_break();
        }
        Command::Postpone(by) => {
            engine.postpone(by);
        }
        Command::StartBreakNow => {
            engine.start_break_now();
        }
        Command::DismissReminder(kind) => {
            engine.dismiss_reminder(kind);
        }
        Command::DismissReminders => {
            engine.dismiss_reminders();
        }
        Command::SetBreakInterval(interval, reply) => {
            let _ = reply.send(engine.set_break_interval(interval));
        }
        Command::SetBreakDuration(duration, reply) => {
            let _ = reply.send(engine.set_break_duration(duration));
        }
        Command::ApplyPreset(id, reply) => {
            let _ = reply.send(engine.apply_preset(id));
        }
        Command::ReloadSettings(reply) => {
            let _ = reply.send(engine.reload_settings());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(engine.snapshot());
        }
        Command::Shutdown => {}
    }
}

fn dispatch_media(
    engine: &mut Engine,
    media: &Arc<dyn MediaController>,
    reports: &mpsc::UnboundedSender<ProbeReport>,
    control: &mpsc::UnboundedSender<MediaCommand>,
    budget: Duration,
) {
    for command in engine.take_media_commands() {
        match command {
            MediaCommand::Probe {
                break_seq,
                producers,
            } => {
                let controller = Arc::clone(media);
                let reports = reports.clone();
                tokio::spawn(async move {
                    let report = probe_all(controller, break_seq, producers, budget).await;
                    let _ = reports.send(report);
                });
            }
            command => {
                if control.send(command).is_err() {
                    warn!("media worker gone, dropping command");
                }
            }
        }
    }
}

/// Runs pause and resume commands one at a time, in the order the engine
/// issued them, so a resume never overtakes the pause it undoes.
async fn media_control(
    controller: Arc<dyn MediaController>,
    mut commands: mpsc::UnboundedReceiver<MediaCommand>,
) {
    while let Some(command) = commands.recv().await {
        let controller = Arc::clone(&controller);
        let outcome =
            tokio::task::spawn_blocking(move || execute_blocking(controller.as_ref(), &command))
                .await;
        if let Err(e) = outcome {
            warn!(error = %e, "media worker failed");
        }
    }
}

/// Probe every producer on the blocking pool, all sharing one deadline.
/// Producers that miss it are reported `Unknown` and are not paused.
pub async fn probe_all(
    controller: Arc<dyn MediaController>,
    break_seq: u64,
    producers: Vec<String>,
    budget: Duration,
) -> ProbeReport {
    let deadline = Instant::now() + budget;
    let pending: Vec<_> = producers
        .into_iter()
        .map(|producer| {
            let controller = Arc::clone(&controller);
            let name = producer.clone();
            let task = tokio::task::spawn_blocking(move || controller.probe(&name));
            (producer, task)
        })
        .collect();

    let mut statuses = Vec::with_capacity(pending.len());
    for (producer, task) in pending {
        let result = match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(MediaError::Unavailable {
                producer: producer.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(MediaError::Timeout {
                producer: producer.clone(),
                budget_ms: budget.as_millis() as u64,
            }),
        };
        if let Err(e) = &result {
            warn!(%producer, error = %e, "media probe failed");
        }
        statuses.push((producer, PlaybackStatus::from_probe(result)));
    }
    ProbeReport {
        break_seq,
        statuses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct SlowController {
        delay: std::time::Duration,
        calls: Mutex<Vec<String>>,
    }

    impl MediaController for SlowController {
        fn probe(&self, producer: &str) -> Result<PlaybackStatus, MediaError> {
            std::thread::sleep(self.delay);
            if producer == "Spotify" {
                Ok(PlaybackStatus::Playing)
            } else {
                Err(MediaError::Unavailable {
                    producer: producer.into(),
                    message: "not running".into(),
                })
            }
        }

        fn pause(&self, producer: &str) -> Result<(), MediaError> {
            self.calls.lock().unwrap().push(format!("pause {producer}"));
            Ok(())
        }

        fn resume(&self, producer: &str) -> Result<(), MediaError> {
            self.calls.lock().unwrap().push(format!("resume {producer}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn probe_all_classifies_each_producer() {
        let controller = Arc::new(SlowController {
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        });
        let report = probe_all(
            controller,
            4,
            vec!["Spotify".into(), "Music".into()],
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(report.break_seq, 4);
        assert_eq!(
            report.statuses,
            vec![
                ("Spotify".to_string(), PlaybackStatus::Playing),
                ("Music".to_string(), PlaybackStatus::NotPlaying),
            ]
        );
    }

    #[tokio::test]
    async fn probe_past_budget_is_unknown() {
        let controller = Arc::new(SlowController {
            delay: Duration::from_millis(500),
            calls: Mutex::new(Vec::new()),
        });
        let report = probe_all(
            controller,
            1,
            vec!["Spotify".into()],
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(report.statuses[0].1, PlaybackStatus::Unknown);
    }
}
