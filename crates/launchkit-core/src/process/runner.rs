//! Bounded blocking execution with captured output.

use crate::config::RunConfig;
use crate::error::{LaunchError, Result};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout, or stderr when stdout is blank. Many tools print their
    /// version to stderr.
    pub fn text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        }
    }
}

/// Run `program` with `args` in `working_dir`, waiting at most `timeout`.
///
/// The process is killed when the timeout expires. The deadline also bounds
/// reading its output: a background grandchild that inherited the pipes
/// cannot hold the call open, and whatever arrived in time is returned.
pub fn run_with_timeout(
    program: &Path,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<RunOutput> {
    let program_name = program.display().to_string();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    debug!("Running {} {:?} (timeout {:?})", program_name, args, timeout);
    let mut child = cmd.spawn().map_err(|e| LaunchError::LaunchFailed {
        program: program_name.clone(),
        message: e.to_string(),
    })?;

    // Drain both pipes concurrently so a chatty child cannot block on a full
    // pipe while we poll for its exit.
    let (done_tx, done_rx) = mpsc::channel();
    let stdout = child
        .stdout
        .take()
        .map(|pipe| spawn_reader(pipe, done_tx.clone()));
    let stderr = child
        .stderr
        .take()
        .map(|pipe| spawn_reader(pipe, done_tx.clone()));
    drop(done_tx);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                warn!("{} timed out after {:?}, killing it", program_name, timeout);
                if let Err(e) = child.kill() {
                    debug!("Failed to kill {}: {}", program_name, e);
                }
                let _ = child.wait();
                return Err(LaunchError::Timeout {
                    program: program_name,
                    after: timeout,
                });
            }
            None => std::thread::sleep(RunConfig::OUTPUT_POLL_INTERVAL),
        }
    };

    let readers = stdout.iter().chain(&stderr).count();
    if !wait_for_readers(&done_rx, readers, deadline) {
        warn!(
            "{} exited but its output is still held open, returning what was read",
            program_name
        );
    }

    let output = RunOutput {
        exit_code: status.code(),
        stdout: collected(stdout.as_ref()),
        stderr: collected(stderr.as_ref()),
    };
    debug!("{} exited with {:?}", program_name, output.exit_code);
    Ok(output)
}

type Captured = Arc<Mutex<Vec<u8>>>;

/// Copy `pipe` into a shared buffer until EOF, then signal `done`.
///
/// The buffer fills as data arrives, so a reader that never sees EOF still
/// leaves everything it read behind.
fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, done: Sender<()>) -> Captured {
    let captured = Captured::default();
    let sink = Arc::clone(&captured);
    std::thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
            }
        }
        let _ = done.send(());
    });
    captured
}

/// Wait until `readers` have hit EOF or `deadline` passes.
fn wait_for_readers(done: &Receiver<()>, readers: usize, deadline: Instant) -> bool {
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if done.recv_timeout(remaining).is_err() {
            return false;
        }
    }
    true
}

fn collected(captured: Option<&Captured>) -> String {
    captured
        .map(|buf| {
            let buf = buf.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&buf).into_owned()
        })
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_exit_code() {
        let output = run_with_timeout(
            Path::new("sh"),
            &["-c", "echo out; echo err >&2; exit 3"],
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_text_prefers_stdout() {
        let output = run_with_timeout(
            Path::new("sh"),
            &["-c", "echo 'tool 1.2' >&2"],
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(output.success());
        assert_eq!(output.text(), "tool 1.2");
    }

    #[test]
    fn test_working_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output = run_with_timeout(
            Path::new("sh"),
            &["-c", "ls"],
            Some(temp_dir.path()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(output.success());
        assert!(output.stdout.trim().is_empty());
    }

    #[test]
    fn test_timeout_kills_process() {
        let start = Instant::now();
        let err = run_with_timeout(
            Path::new("sleep"),
            &["10"],
            None,
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_background_grandchild_does_not_outlast_timeout() {
        let start = Instant::now();
        let output = run_with_timeout(
            Path::new("sh"),
            &["-c", "sleep 8 & echo hi"],
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hi");
    }

    #[test]
    fn test_missing_program_is_launch_failure() {
        let err = run_with_timeout(
            Path::new("/nonexistent/launchkit-tool"),
            &[],
            None,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed { .. }));
    }
}
