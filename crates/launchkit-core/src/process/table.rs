//! Access to the OS process table.
//!
//! [`ProcessTable`] is the seam between the lifecycle logic (prober,
//! aggregator, reaper) and the operating system. [`SystemProcessTable`] is
//! backed by `sysinfo` plus the signalling helpers in [`crate::platform`];
//! tests substitute a scripted table.

use crate::config::ProcessConfig;
use crate::error::{LaunchError, Result};
use crate::platform::{self, Delivery};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

/// A live entry in the process table at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Name as reported by the OS. Linux truncates it to 15 characters.
    pub name: String,
    /// Untruncated file names the process is known by: its executable, the
    /// program it was started as, and a script handed to an interpreter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl ProcessEntry {
    /// Every name worth matching against, reported name first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Final path component of `path`, on either separator.
fn file_name_of(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())
}

fn aliases_of(process: &sysinfo::Process) -> Vec<String> {
    let mut aliases: Vec<String> = Vec::new();
    let mut push = |candidate: Option<&str>| {
        if let Some(name) = candidate {
            if !aliases.iter().any(|a| a == name) {
                aliases.push(name.to_string());
            }
        }
    };

    if let Some(exe) = process.exe() {
        push(exe.file_name().and_then(|n| n.to_str()));
    }
    let cmd: Vec<String> = process
        .cmd()
        .iter()
        .take(2)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    if let Some(program) = cmd.first() {
        push(file_name_of(program));
    }
    // `sh /path/to/tool.sh`: only path-like arguments, never flags or values
    if let Some(script) = cmd.get(1).filter(|arg| arg.contains(['/', '\\'])) {
        push(file_name_of(script));
    }
    aliases
}

/// Resource usage of a single process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceSample {
    /// Resident memory in bytes.
    pub memory_bytes: u64,
    /// CPU usage percentage (can exceed 100 on multi-core).
    pub cpu_percent: f32,
}

/// Trait for process table implementations.
pub trait ProcessTable: Send + Sync {
    /// Enumerate live processes. Zombies and non-leader threads are omitted.
    fn processes(&self) -> Result<Vec<ProcessEntry>>;

    /// Sample memory and CPU for each PID, one result per input PID.
    fn sample_usage(&self, pids: &[u32]) -> Vec<(u32, Result<ResourceSample>)>;

    /// Ask the process to exit.
    fn request_terminate(&self, pid: u32) -> Result<Delivery>;

    /// Kill the process outright.
    fn force_kill(&self, pid: u32) -> Result<Delivery>;

    /// Wait up to `timeout` for the process to exit. Returns true if it did.
    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool;

    /// Check whether the process is still alive.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Process table backed by `sysinfo`.
pub struct SystemProcessTable {
    system: Mutex<System>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> T {
        // A panic mid-refresh leaves stale data at worst; the next refresh
        // overwrites it.
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut system)
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Result<Vec<ProcessEntry>> {
        let refresh_kind = ProcessRefreshKind::new()
            .with_exe(UpdateKind::OnlyIfNotSet)
            .with_cmd(UpdateKind::OnlyIfNotSet);

        let entries: Vec<ProcessEntry> = self.with_system(|system| {
            system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind);
            system
                .processes()
                .iter()
                // Threads show up as their own entries on Linux
                .filter(|(_, process)| process.thread_kind().is_none())
                .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
                .map(|(pid, process)| ProcessEntry {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().into_owned(),
                    aliases: aliases_of(process),
                })
                .collect()
        });

        if entries.is_empty() {
            // A table with no processes at all (not even ourselves) means
            // enumeration is unavailable rather than that nothing runs.
            return Err(LaunchError::unsupported("process enumeration"));
        }

        debug!("Enumerated {} processes", entries.len());
        Ok(entries)
    }

    fn sample_usage(&self, pids: &[u32]) -> Vec<(u32, Result<ResourceSample>)> {
        if pids.is_empty() {
            return Vec::new();
        }

        let sys_pids: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();
        let refresh_kind = ProcessRefreshKind::new().with_cpu().with_memory();

        self.with_system(|system| {
            // CPU usage is a delta between two refreshes; the first one only
            // establishes the baseline.
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&sys_pids),
                true,
                refresh_kind,
            );
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&sys_pids),
                true,
                refresh_kind,
            );

            pids.iter()
                .zip(&sys_pids)
                .map(|(pid, sys_pid)| {
                    let sample = match system.process(*sys_pid) {
                        Some(process) if process.status() != ProcessStatus::Zombie => {
                            Ok(ResourceSample {
                                memory_bytes: process.memory(),
                                cpu_percent: process.cpu_usage(),
                            })
                        }
                        Some(_) => Err(LaunchError::ProcessUnavailable {
                            pid: *pid,
                            reason: "zombie".to_string(),
                        }),
                        None => Err(LaunchError::ProcessUnavailable {
                            pid: *pid,
                            reason: "exited before it could be sampled".to_string(),
                        }),
                    };
                    (*pid, sample)
                })
                .collect()
        })
    }

    fn request_terminate(&self, pid: u32) -> Result<Delivery> {
        platform::send_terminate(pid)
    }

    fn force_kill(&self, pid: u32) -> Result<Delivery> {
        platform::send_kill(pid)
    }

    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        platform::wait_for_exit(pid, timeout, ProcessConfig::EXIT_POLL_INTERVAL)
    }

    fn is_alive(&self, pid: u32) -> bool {
        platform::is_process_alive(pid)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_table_lists_self() {
        let table = SystemProcessTable::new();
        let own_pid = std::process::id();
        let processes = table.processes().unwrap();
        assert!(processes.iter().any(|p| p.pid == own_pid));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_threads_are_not_listed_as_processes() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _ = rx.recv();
        });

        let own_pid = std::process::id();
        let tids: Vec<u32> = std::fs::read_dir("/proc/self/task")
            .unwrap()
            .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
            .filter(|tid| *tid != own_pid)
            .collect();
        assert!(!tids.is_empty());

        let processes = SystemProcessTable::new().processes().unwrap();
        assert_eq!(processes.iter().filter(|p| p.pid == own_pid).count(), 1);
        assert!(processes.iter().all(|p| !tids.contains(&p.pid)));

        drop(tx);
        worker.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_long_script_name_is_listed_untruncated() {
        use std::process::{Command, Stdio};
        use std::time::Instant;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("launchkit-long-running-worker.sh");
        std::fs::write(&script, "#!/bin/sh\nwhile :; do sleep 1; done\n").unwrap();
        crate::platform::set_executable(&script).unwrap();

        let mut child = Command::new(&script)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();

        // The entry only carries the script once exec has happened
        let deadline = Instant::now() + Duration::from_secs(5);
        let entry = loop {
            let entry = SystemProcessTable::new()
                .processes()
                .unwrap()
                .into_iter()
                .find(|p| p.pid == pid);
            let listed = entry
                .as_ref()
                .is_some_and(|e| e.names().any(|n| n == "launchkit-long-running-worker.sh"));
            if listed || Instant::now() >= deadline {
                break entry;
            }
            std::thread::sleep(Duration::from_millis(50));
        };
        let _ = child.kill();
        let _ = child.wait();

        let entry = entry.unwrap();
        assert!(entry.names().any(|n| n == "launchkit-long-running-worker.sh"));
    }

    #[test]
    fn test_file_name_of_either_separator() {
        assert_eq!(file_name_of("/opt/game/run.sh"), Some("run.sh"));
        assert_eq!(file_name_of(r"C:\Games\EVZ.exe"), Some("EVZ.exe"));
        assert_eq!(file_name_of("sleep"), Some("sleep"));
        assert_eq!(file_name_of("/opt/game/"), None);
    }

    #[test]
    fn test_sample_self() {
        let table = SystemProcessTable::new();
        let own_pid = std::process::id();
        let samples = table.sample_usage(&[own_pid]);
        assert_eq!(samples.len(), 1);
        let (pid, sample) = &samples[0];
        assert_eq!(*pid, own_pid);
        let sample = sample.as_ref().unwrap();
        assert!(sample.memory_bytes > 0);
        assert!(sample.cpu_percent >= 0.0);
    }

    #[test]
    fn test_sample_missing_pid_is_unavailable() {
        let table = SystemProcessTable::new();
        let samples = table.sample_usage(&[4_000_000_000]);
        assert!(matches!(
            samples[0].1,
            Err(LaunchError::ProcessUnavailable { .. })
        ));
    }

    #[test]
    fn test_sample_nothing() {
        let table = SystemProcessTable::new();
        assert!(table.sample_usage(&[]).is_empty());
    }
}
