//! Graceful-then-forced termination of matching processes.
//!
//! Each matched process runs through its own small state machine:
//!
//! ```text
//! Alive -> WaitingForExit -> Exited
//!                         -> StillAlive -> Exited
//!                                       -> KillFailed
//! ```
//!
//! Processes are handled one after another, so the worst case is one grace
//! period per match. A failure on one process never stops the others.

use super::locator::ImageName;
use super::probe::ProcessProber;
use super::table::{ProcessEntry, ProcessTable};
use crate::config::ProcessConfig;
use crate::error::{ErrorKind, LaunchError, Result};
use crate::platform::Delivery;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Termination progress of a single process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationState {
    Alive,
    WaitingForExit,
    StillAlive,
    Exited,
    KillFailed,
}

impl TerminationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TerminationState::Exited | TerminationState::KillFailed)
    }
}

/// Final outcome for one matched process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminationOutcome {
    pub pid: u32,
    pub name: String,
    pub state: TerminationState,
    /// True when the graceful request was not enough.
    pub forced: bool,
    pub error: Option<String>,
}

impl TerminationOutcome {
    pub fn killed(&self) -> bool {
        self.state == TerminationState::Exited
    }
}

/// Result of terminating every process matching one name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillReport {
    pub name: String,
    pub killed: usize,
    pub failed: usize,
    pub outcomes: Vec<TerminationOutcome>,
    pub summary: String,
}

impl KillReport {
    fn from_outcomes(name: &str, outcomes: Vec<TerminationOutcome>) -> Self {
        let killed = outcomes.iter().filter(|o| o.killed()).count();
        let failed = outcomes.len() - killed;
        let mut summary = format!("Terminated {} process(es)", killed);
        if failed > 0 {
            summary.push_str(&format!(", {} could not be terminated", failed));
        }
        Self {
            name: name.to_string(),
            killed,
            failed,
            outcomes,
            summary,
        }
    }

    /// `Some(PartialKillFailure)` when some matches survived.
    pub fn status(&self) -> Option<ErrorKind> {
        (self.killed > 0 && self.failed > 0).then_some(ErrorKind::PartialKillFailure)
    }
}

impl std::fmt::Display for KillReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary)
    }
}

/// Terminates processes by name.
#[derive(Clone)]
pub struct ProcessReaper {
    prober: ProcessProber,
    table: Arc<dyn ProcessTable>,
    grace_period: Duration,
    kill_settle: Duration,
}

impl ProcessReaper {
    pub fn new(table: Arc<dyn ProcessTable>) -> Self {
        Self {
            prober: ProcessProber::new(table.clone()),
            table,
            grace_period: ProcessConfig::TERMINATE_GRACE,
            kill_settle: ProcessConfig::KILL_SETTLE,
        }
    }

    /// Set how long each process gets to exit after the graceful request.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Terminate every process matching `name_or_path`.
    ///
    /// Fails with `ProcessNotFound` when nothing matches and with
    /// `TerminationFailed` when every match survived. A mixed result is a
    /// success whose [`KillReport::status`] flags the partial failure.
    pub fn kill(&self, name_or_path: &str) -> Result<KillReport> {
        let image = ImageName::derive(name_or_path);
        let not_found = || LaunchError::ProcessNotFound {
            name: image.file_name().to_string(),
        };

        let matches = match self.prober.find_matches(&image) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Cannot enumerate processes to kill {}: {}", image, e);
                return Err(not_found());
            }
        };
        if matches.is_empty() {
            return Err(not_found());
        }

        info!("Terminating {} process(es) matching {}", matches.len(), image);
        let outcomes: Vec<TerminationOutcome> =
            matches.into_iter().map(|entry| self.terminate(entry)).collect();
        let report = KillReport::from_outcomes(image.file_name(), outcomes);

        if report.killed == 0 {
            return Err(LaunchError::TerminationFailed {
                name: image.file_name().to_string(),
                failed: report.failed,
            });
        }
        if report.failed > 0 {
            warn!("{}: {}", image, report.summary);
        } else {
            info!("{}: {}", image, report.summary);
        }
        Ok(report)
    }

    fn terminate(&self, entry: ProcessEntry) -> TerminationOutcome {
        let pid = entry.pid;
        let mut state = TerminationState::Alive;
        let mut forced = false;
        let mut error = None;

        while !state.is_terminal() {
            state = match state {
                TerminationState::Alive => match self.table.request_terminate(pid) {
                    Ok(Delivery::AlreadyExited) => TerminationState::Exited,
                    Ok(Delivery::Sent) => TerminationState::WaitingForExit,
                    Err(e) => {
                        debug!("Graceful termination of {} failed: {}", pid, e);
                        TerminationState::StillAlive
                    }
                },
                TerminationState::WaitingForExit => {
                    if self.table.wait_for_exit(pid, self.grace_period) {
                        TerminationState::Exited
                    } else {
                        TerminationState::StillAlive
                    }
                }
                TerminationState::StillAlive => {
                    forced = true;
                    match self.table.force_kill(pid) {
                        Ok(Delivery::AlreadyExited) => TerminationState::Exited,
                        Ok(Delivery::Sent) if self.table.wait_for_exit(pid, self.kill_settle) => {
                            TerminationState::Exited
                        }
                        Ok(Delivery::Sent) => {
                            error = Some("still running after forced kill".to_string());
                            TerminationState::KillFailed
                        }
                        Err(e) => {
                            error = Some(e.to_string());
                            TerminationState::KillFailed
                        }
                    }
                }
                terminal => terminal,
            };
        }

        match state {
            TerminationState::Exited => info!(
                "Process {} ({}) {}",
                pid,
                entry.name,
                if forced { "force-killed" } else { "exited" }
            ),
            _ => warn!("Failed to terminate process {} ({})", pid, entry.name),
        }

        TerminationOutcome {
            pid,
            name: entry.name,
            state,
            forced,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::table::fake::{FakeProcess, FakeProcessTable};

    fn reaper(table: &Arc<FakeProcessTable>) -> ProcessReaper {
        let table: Arc<dyn ProcessTable> = table.clone();
        ProcessReaper::new(table).with_grace_period(Duration::from_millis(10))
    }

    #[test]
    fn test_kill_two_workers() {
        let table = Arc::new(FakeProcessTable::new(vec![
            FakeProcess::new(1, "worker.exe", 100, 0.0),
            FakeProcess::new(2, "worker.exe", 100, 0.0),
            FakeProcess::new(3, "shell", 100, 0.0),
        ]));
        let report = reaper(&table).kill("worker.exe").unwrap();

        assert_eq!(report.killed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.status(), None);
        assert!(report.outcomes.iter().all(|o| !o.forced));
        assert_eq!(table.alive_count(), 1);
    }

    #[test]
    fn test_stubborn_process_is_forced() {
        let table = Arc::new(FakeProcessTable::new(vec![
            FakeProcess::new(5, "worker.exe", 100, 0.0).ignoring_terminate(),
        ]));
        let report = reaper(&table).kill("worker.exe").unwrap();

        assert_eq!(report.killed, 1);
        assert!(report.outcomes[0].forced);
        assert_eq!(report.outcomes[0].state, TerminationState::Exited);
    }

    #[test]
    fn test_partial_failure_is_success() {
        let table = Arc::new(FakeProcessTable::new(vec![
            FakeProcess::new(1, "worker.exe", 100, 0.0),
            FakeProcess::new(2, "worker.exe", 100, 0.0).unkillable(),
        ]));
        let report = reaper(&table).kill("worker.exe").unwrap();

        assert_eq!(report.killed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.status(), Some(ErrorKind::PartialKillFailure));
        assert!(report.summary.contains("1 could not be terminated"));
        let failed = report.outcomes.iter().find(|o| o.pid == 2).unwrap();
        assert_eq!(failed.state, TerminationState::KillFailed);
        assert!(failed.error.is_some());
    }

    #[test]
    fn test_all_failed_is_error() {
        let table = Arc::new(FakeProcessTable::new(vec![
            FakeProcess::new(2, "worker.exe", 100, 0.0).unkillable(),
        ]));
        let err = reaper(&table).kill("worker.exe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TerminationFailed);
    }

    #[test]
    fn test_kill_is_idempotent() {
        let table = Arc::new(FakeProcessTable::new(vec![FakeProcess::new(
            9,
            "Demo.exe",
            100,
            0.0,
        )]));
        let reaper = reaper(&table);

        assert_eq!(reaper.kill("demo.exe").unwrap().killed, 1);
        let err = reaper.kill("demo.exe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_name_is_not_found() {
        let table = Arc::new(FakeProcessTable::new(vec![FakeProcess::new(1, "x", 1, 0.0)]));
        let err = reaper(&table).kill("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(table.alive_count(), 1);
    }

    #[test]
    fn test_enumeration_failure_is_not_found() {
        let table = Arc::new(FakeProcessTable::failing());
        let err = reaper(&table).kill("worker.exe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_kill_spares_own_process() {
        let own_pid = std::process::id();
        let table = Arc::new(FakeProcessTable::new(vec![
            FakeProcess::new(own_pid, "launchkit", 100, 0.0),
            FakeProcess::new(own_pid + 1, "toolkit", 100, 0.0),
        ]));

        let report = reaper(&table).kill("kit").unwrap();
        assert_eq!(report.killed, 1);
        assert!(table.is_alive(own_pid));
        assert!(!table.is_alive(own_pid + 1));

        let err = reaper(&table).kill("launch").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(table.alive_count(), 1);
    }
}
