//! Media co-operation during breaks.
//!
//! On break start every known producer is probed; only the ones found
//! `Playing` are paused, and only those are resumed when the break ends.
//! Probing may block, so the coordinator never calls a controller itself. It
//! emits [`MediaCommand`]s that the runtime executes off the scheduling
//! context, and the probe report comes back through
//! [`MediaCoordinator::probes_completed`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Playing,
    NotPlaying,
    Unknown,
}

impl PlaybackStatus {
    /// Map a probe outcome onto the tri-state.
    pub fn from_probe(result: Result<PlaybackStatus, MediaError>) -> Self {
        match result {
            Ok(status) => status,
            Err(MediaError::Unavailable { .. }) => PlaybackStatus::NotPlaying,
            Err(MediaError::Timeout { .. }) => PlaybackStatus::Unknown,
        }
    }
}

/// Scripting bridge to external media producers. Calls may block.
pub trait MediaController: Send + Sync {
    fn probe(&self, producer: &str) -> Result<PlaybackStatus, MediaError>;
    fn pause(&self, producer: &str) -> Result<(), MediaError>;
    fn resume(&self, producer: &str) -> Result<(), MediaError>;
}

/// Controller that reports nothing playing. Used when no bridge is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMediaController;

impl MediaController for NoopMediaController {
    fn probe(&self, _producer: &str) -> Result<PlaybackStatus, MediaError> {
        Ok(PlaybackStatus::NotPlaying)
    }

    fn pause(&self, _producer: &str) -> Result<(), MediaError> {
        Ok(())
    }

    fn resume(&self, _producer: &str) -> Result<(), MediaError> {
        Ok(())
    }
}

/// Work the coordinator asks its host to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaCommand {
    Probe {
        break_seq: u64,
        producers: Vec<String>,
    },
    Pause {
        producers: Vec<String>,
    },
    Resume {
        producers: Vec<String>,
    },
}

/// Probe outcome for one break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub break_seq: u64,
    pub statuses: Vec<(String, PlaybackStatus)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Probing { break_seq: u64 },
    Paused,
}

#[derive(Debug, Clone)]
pub struct MediaCoordinator {
    enabled: bool,
    producers: Vec<String>,
    phase: Phase,
    paused: BTreeSet<String>,
}

impl MediaCoordinator {
    pub fn new(enabled: bool, producers: Vec<String>) -> Self {
        Self {
            enabled,
            producers,
            phase: Phase::Idle,
            paused: BTreeSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn producers(&self) -> &[String] {
        &self.producers
    }

    /// Producers paused by the current break.
    pub fn paused(&self) -> impl Iterator<Item = &str> {
        self.paused.iter().map(String::as_str)
    }

    /// Takes effect at the next break.
    pub fn configure(&mut self, enabled: bool, producers: Vec<String>) {
        self.enabled = enabled;
        self.producers = producers;
    }

    /// Break `break_seq` started. Returns the probe request, if any.
    pub fn begin_break(&mut self, break_seq: u64) -> Option<MediaCommand> {
        if !self.enabled || self.producers.is_empty() {
            return None;
        }
        debug!(break_seq, "probing media producers");
        self.phase = Phase::Probing { break_seq };
        self.paused.clear();
        Some(MediaCommand::Probe {
            break_seq,
            producers: self.producers.clone(),
        })
    }

    /// Probe results arrived. Reports for a break that is no longer being
    /// probed are dropped.
    pub fn probes_completed(&mut self, report: ProbeReport) -> Option<MediaCommand> {
        if self.phase != (Phase::Probing { break_seq: report.break_seq }) {
            debug!(break_seq = report.break_seq, "discarding stale media probe report");
            return None;
        }
        self.phase = Phase::Paused;
        self.paused = report
            .statuses
            .into_iter()
            .filter(|(_, status)| *status == PlaybackStatus::Playing)
            .map(|(producer, _)| producer)
            .collect();
        if self.paused.is_empty() {
            return None;
        }
        info!(producers = ?self.paused, "pausing media for break");
        Some(MediaCommand::Pause {
            producers: self.paused.iter().cloned().collect(),
        })
    }

    /// The break ended. Resumes exactly what was paused, then forgets it.
    pub fn end_break(&mut self) -> Option<MediaCommand> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let paused = std::mem::take(&mut self.paused);
        match phase {
            Phase::Paused if !paused.is_empty() => {
                info!(producers = ?paused, "resuming media after break");
                Some(MediaCommand::Resume {
                    producers: paused.into_iter().collect(),
                })
            }
            _ => None,
        }
    }
}

/// Execute a command against a controller on the current thread. Probe
/// commands return their report. Failures are logged and absorbed.
pub fn execute_blocking(
    controller: &dyn MediaController,
    command: &MediaCommand,
) -> Option<ProbeReport> {
    match command {
        MediaCommand::Probe {
            break_seq,
            producers,
        } => {
            let statuses = producers
                .iter()
                .map(|producer| (producer.clone(), probe_one(controller, producer)))
                .collect();
            Some(ProbeReport {
                break_seq: *break_seq,
                statuses,
            })
        }
        MediaCommand::Pause { producers } => {
            for producer in producers {
                if let Err(e) = controller.pause(producer) {
                    warn!(%producer, error = %e, "failed to pause media");
                }
            }
            None
        }
        MediaCommand::Resume { producers } => {
            for producer in producers {
                if let Err(e) = controller.resume(producer) {
                    warn!(%producer, error = %e, "failed to resume media");
                }
            }
            None
        }
    }
}

pub(crate) fn probe_one(controller: &dyn MediaController, producer: &str) -> PlaybackStatus {
    let result = controller.probe(producer);
    if let Err(e) = &result {
        warn!(%producer, error = %e, "media probe failed");
    }
    PlaybackStatus::from_probe(result)
}
