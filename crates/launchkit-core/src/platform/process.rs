//! Platform-specific process signalling.
//!
//! Liveness checks, graceful and forced termination, and zombie reaping.
//! None of these hold a handle across calls; every function addresses the
//! process by PID only.

use crate::error::{LaunchError, Result};
use std::time::{Duration, Instant};
use tracing::debug;

/// What happened when a signal was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The signal was delivered to a live process.
    Sent,
    /// The process was already gone.
    AlreadyExited,
}

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: `kill(pid, 0)`; `EPERM` still means the process exists.
///   Zombies count as dead.
/// - **Windows**: `OpenProcess` + `GetExitCodeProcess == STILL_ACTIVE`
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Some(raw) = unix_pid(pid) else {
            return false;
        };
        let exists = match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        };
        exists && !is_zombie(pid)
    }

    #[cfg(windows)]
    {
        windows_impl::is_alive(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        tracing::warn!("Process alive check not implemented for this platform");
        let _ = pid;
        false
    }
}

/// Ask a process to exit.
///
/// # Platform Behavior
/// - **Linux/macOS**: `SIGTERM`
/// - **Windows**: `taskkill /PID {pid}` (posts WM_CLOSE, no force)
pub fn send_terminate(pid: u32) -> Result<Delivery> {
    #[cfg(unix)]
    {
        signal_unix(pid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(windows)]
    {
        windows_impl::taskkill(pid, false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        Err(LaunchError::unsupported("process termination"))
    }
}

/// Kill a process outright.
///
/// # Platform Behavior
/// - **Linux/macOS**: `SIGKILL`
/// - **Windows**: `taskkill /PID {pid} /F /T` (process tree)
pub fn send_kill(pid: u32) -> Result<Delivery> {
    #[cfg(unix)]
    {
        signal_unix(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(windows)]
    {
        windows_impl::taskkill(pid, true)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        Err(LaunchError::unsupported("process termination"))
    }
}

/// Poll until the process is gone or `timeout` elapses.
///
/// Returns `true` if the process exited. Zombies left behind by our own
/// children are reaped on every poll.
pub fn wait_for_exit(pid: u32, timeout: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        reap(pid);
        if !is_process_alive(pid) {
            debug!("Process {} exited", pid);
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(poll);
    }
}

#[cfg(unix)]
fn signal_unix(pid: u32, signal: nix::sys::signal::Signal) -> Result<Delivery> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Some(raw) = unix_pid(pid) else {
        return Ok(Delivery::AlreadyExited);
    };
    debug!("Sending {} to process {}", signal, pid);
    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => Ok(Delivery::Sent),
        Err(Errno::ESRCH) => Ok(Delivery::AlreadyExited),
        Err(e) => Err(LaunchError::SignalFailed {
            pid,
            message: format!("{}: {}", signal, e),
        }),
    }
}

/// Convert to a signal-safe PID. Zero and negative values address process
/// groups, so they never name a single process.
#[cfg(unix)]
fn unix_pid(pid: u32) -> Option<i32> {
    i32::try_from(pid).ok().filter(|raw| *raw > 0)
}

/// Reap the process if it is our own zombie child.
fn reap(pid: u32) {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::wait::{waitpid, WaitPidFlag};
        use nix::unistd::Pid;

        let Some(raw) = unix_pid(pid) else {
            return;
        };
        match waitpid(Pid::from_raw(raw), Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => debug!("waitpid({}): {:?}", pid, status),
            // ECHILD means we're not the parent - whoever is will reap it.
            Err(Errno::ECHILD) => {}
            Err(e) => debug!("waitpid({}) failed: {} (this is usually OK)", pid, e),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Zombies still answer `kill(pid, 0)` but will never run again.
#[cfg(unix)]
fn is_zombie(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system
        .process(sys_pid)
        .map_or(false, |p| p.status() == ProcessStatus::Zombie)
}

#[cfg(windows)]
#[allow(unsafe_code)]
mod windows_impl {
    use super::Delivery;
    use crate::error::{LaunchError, Result};
    use std::os::windows::process::CommandExt;
    use std::process::Command;
    use tracing::{debug, warn};
    use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
    use windows_sys::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, CREATE_NO_WINDOW, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    pub(super) fn is_alive(pid: u32) -> bool {
        // SAFETY: OpenProcess has no preconditions; a null handle is checked
        // before use and every non-null handle is closed exactly once.
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }
            let mut code: u32 = 0;
            let ok = GetExitCodeProcess(handle, &mut code) != 0;
            CloseHandle(handle);
            ok && code == STILL_ACTIVE as u32
        }
    }

    pub(super) fn taskkill(pid: u32, force: bool) -> Result<Delivery> {
        let pid_arg = pid.to_string();
        let mut args = vec!["/PID", pid_arg.as_str()];
        if force {
            args.extend(["/F", "/T"]);
        }

        debug!("Running taskkill {:?}", args);
        let output = Command::new("taskkill")
            .args(&args)
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(|e| LaunchError::SignalFailed {
                pid,
                message: format!("Failed to run taskkill: {}", e),
            })?;

        if output.status.success() {
            return Ok(Delivery::Sent);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // "not found" errors are OK - process already dead
        if stderr.contains("not found") || stderr.contains("not running") {
            Ok(Delivery::AlreadyExited)
        } else {
            warn!("taskkill failed for {}: {}", pid, stderr.trim());
            Err(LaunchError::SignalFailed {
                pid,
                message: stderr.trim().to_string(),
            })
        }
    }
}
