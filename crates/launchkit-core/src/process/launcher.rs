//! Detached process launching.
//!
//! A launched process must outlive the launcher and must not be torn down
//! with it, so no handle to it is kept. On Windows the process gets its own
//! process group, no console and breaks away from any job object. Elsewhere
//! it is backgrounded by `nohup` inside a shell that starts a new session.
//!
//! On Unix the shell checks that the program can be run before backgrounding
//! it. Past that check the launch is fire-and-forget: a program that starts
//! and then fails is still a successful launch.

use super::script::LaunchScript;
use crate::config::ProcessConfig;
use crate::error::{ErrorKind, LaunchError, Result};
use crate::platform;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use self::imp::{spawn_direct, spawn_script};

/// How to start the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Start the executable itself.
    Direct,
    /// Run the given preamble first, from a generated script that then
    /// starts the executable.
    ViaScript(String),
}

/// Result of a launch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchResult {
    /// Whether the launch was successful.
    pub success: bool,
    /// Failure classification (if failed).
    pub error_kind: Option<ErrorKind>,
    /// Human-readable outcome.
    pub message: String,
    /// Generated script, for script launches. Deleted shortly after launch.
    pub script_path: Option<PathBuf>,
}

impl LaunchResult {
    fn launched(exe: &Path, script_path: Option<PathBuf>) -> Self {
        let name = exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| exe.display().to_string());
        Self {
            success: true,
            error_kind: None,
            message: format!("Launched {}", name),
            script_path,
        }
    }

    fn failed(err: &LaunchError) -> Self {
        Self {
            success: false,
            error_kind: Some(err.kind()),
            message: err.to_string(),
            script_path: None,
        }
    }
}

impl std::fmt::Display for LaunchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Process launcher for managed executables.
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Launch `path` detached, using `strategy`.
    ///
    /// Failures never leave a process behind; a generated script is removed
    /// immediately when its launch fails.
    pub fn launch(path: &str, strategy: &LaunchStrategy) -> LaunchResult {
        match Self::try_launch(path, strategy) {
            Ok((exe, script_path)) => {
                info!("Launched {}", exe.display());
                LaunchResult::launched(&exe, script_path)
            }
            Err(e) => {
                error!("Failed to launch '{}': {}", path, e);
                LaunchResult::failed(&e)
            }
        }
    }

    fn try_launch(path: &str, strategy: &LaunchStrategy) -> Result<(PathBuf, Option<PathBuf>)> {
        let exe = Path::new(path.trim());
        platform::check_launchable(exe)?;

        // The working directory changes before exec, so a relative program
        // path would resolve against the wrong directory.
        let exe = std::path::absolute(exe).map_err(|e| LaunchError::io_with_path(e, exe))?;
        let working_dir = exe
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        match strategy {
            LaunchStrategy::Direct => {
                info!("Starting program: {}", exe.display());
                spawn_direct(&exe, &working_dir)?;
                Ok((exe, None))
            }
            LaunchStrategy::ViaScript(preamble) => {
                if preamble.trim().is_empty() {
                    return Err(LaunchError::Config {
                        message: "launch script preamble is empty".to_string(),
                    });
                }
                info!("Starting program through a launch script: {}", exe.display());
                let script = LaunchScript::create(preamble, &exe)?;
                match spawn_script(script.path(), &working_dir) {
                    Ok(()) => {
                        let script_path = script.path().to_path_buf();
                        script.schedule_cleanup(ProcessConfig::SCRIPT_CLEANUP_DELAY);
                        Ok((exe, Some(script_path)))
                    }
                    Err(e) => {
                        script.remove_now();
                        Err(e)
                    }
                }
            }
        }
    }
}

#[cfg(windows)]
mod imp {
    use crate::error::{LaunchError, Result};
    use std::os::windows::process::CommandExt;
    use std::path::Path;
    use std::process::{Command, Stdio};
    use tracing::debug;

    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_BREAKAWAY_FROM_JOB: u32 = 0x0100_0000;
    const DETACHED_FLAGS: u32 =
        CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS | CREATE_BREAKAWAY_FROM_JOB;

    fn spawn(mut cmd: Command, program: &Path) -> Result<()> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(DETACHED_FLAGS);

        // Dropping the child closes the process and thread handles.
        let child = cmd.spawn().map_err(|e| LaunchError::LaunchFailed {
            program: program.display().to_string(),
            message: e.to_string(),
        })?;
        debug!("Spawned {} as PID {}", program.display(), child.id());
        Ok(())
    }

    pub(super) fn spawn_direct(exe: &Path, working_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(exe);
        cmd.current_dir(working_dir);
        spawn(cmd, exe)
    }

    pub(super) fn spawn_script(script: &Path, working_dir: &Path) -> Result<()> {
        let mut cmd = Command::new("cmd.exe");
        cmd.raw_arg(format!("/c \"{}\"", script.display()))
            .current_dir(working_dir);
        spawn(cmd, script)
    }
}

#[cfg(unix)]
mod imp {
    use crate::config::PathsConfig;
    use crate::error::{LaunchError, Result};
    use std::os::unix::process::CommandExt;
    use std::path::Path;
    use std::process::{Command, Stdio};
    use tracing::debug;

    /// `$0` is the program, `$1` the log file.
    const NOHUP_DIRECT: &str =
        r#"test -f "$0" && test -x "$0" || exit 126; nohup "$0" >/dev/null 2>&1 </dev/null &"#;
    const NOHUP_SCRIPT: &str =
        r#"test -f "$0" && test -r "$0" || exit 126; nohup sh "$0" >>"$1" 2>&1 </dev/null &"#;

    /// Shell exit status for a program that cannot be executed.
    const NOT_EXECUTABLE: i32 = 126;

    #[allow(unsafe_code)]
    fn run_detached(mut cmd: Command, program: &Path) -> Result<()> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // SAFETY: setsid() is async-signal-safe and creates a new session.
        // The shell and everything it backgrounds leave our session, so a
        // terminal hangup or process-group signal aimed at us misses them.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let launch_failed = |message: String| LaunchError::LaunchFailed {
            program: program.display().to_string(),
            message,
        };

        // The shell exits as soon as the program is backgrounded; waiting on
        // it hands the program to init and leaves no zombie behind.
        let status = cmd
            .spawn()
            .and_then(|mut shell| shell.wait())
            .map_err(|e| launch_failed(e.to_string()))?;
        match status.code() {
            Some(0) => {}
            Some(NOT_EXECUTABLE) => {
                return Err(launch_failed("cannot be executed".to_string()));
            }
            _ => return Err(launch_failed(format!("launch shell exited with {}", status))),
        }
        debug!("Backgrounded {}", program.display());
        Ok(())
    }

    pub(super) fn spawn_direct(exe: &Path, working_dir: &Path) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(NOHUP_DIRECT).arg(exe).current_dir(working_dir);
        run_detached(cmd, exe)
    }

    pub(super) fn spawn_script(script: &Path, working_dir: &Path) -> Result<()> {
        let log = working_dir.join(PathsConfig::NOHUP_LOG_NAME);
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(NOHUP_SCRIPT)
            .arg(script)
            .arg(&log)
            .current_dir(working_dir);
        run_detached(cmd, script)
    }
}

#[cfg(not(any(unix, windows)))]
mod imp {
    use crate::error::{LaunchError, Result};
    use std::path::Path;

    pub(super) fn spawn_direct(_exe: &Path, _working_dir: &Path) -> Result<()> {
        Err(LaunchError::unsupported("process creation"))
    }

    pub(super) fn spawn_script(_script: &Path, _working_dir: &Path) -> Result<()> {
        Err(LaunchError::unsupported("process creation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn wait_for(path: &Path, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if path.exists() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        path.exists()
    }

    #[test]
    fn test_empty_path_is_invalid_target() {
        let result = ProcessLauncher::launch("", &LaunchStrategy::Direct);
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidTarget));
        assert_eq!(result.message, "Path not set");
    }

    #[test]
    fn test_missing_file_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.exe");
        let result = ProcessLauncher::launch(
            &missing.to_string_lossy(),
            &LaunchStrategy::ViaScript("echo pre".into()),
        );
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidTarget));
        assert!(result.script_path.is_none());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_is_not_executable() {
        let temp_dir = TempDir::new().unwrap();
        let result =
            ProcessLauncher::launch(&temp_dir.path().to_string_lossy(), &LaunchStrategy::Direct);
        assert_eq!(result.error_kind, Some(ErrorKind::TargetNotExecutable));
    }

    #[cfg(unix)]
    fn write_program(dir: &Path, name: &str, body: &str) -> PathBuf {
        let program = dir.join(name);
        std::fs::write(&program, format!("#!/bin/sh\n{}\n", body)).unwrap();
        platform::set_executable(&program).unwrap();
        program
    }

    #[cfg(unix)]
    #[test]
    fn test_direct_launch_runs_in_program_directory() {
        let temp_dir = TempDir::new().unwrap();
        let program = write_program(temp_dir.path(), "marker.sh", "echo started > launched.txt");

        let result = ProcessLauncher::launch(&program.to_string_lossy(), &LaunchStrategy::Direct);
        assert!(result.success, "{}", result.message);
        assert!(result.error_kind.is_none());
        assert!(wait_for(&temp_dir.path().join("launched.txt"), Duration::from_secs(5)));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_launch_runs_preamble_first() {
        let temp_dir = TempDir::new().unwrap();
        let program = write_program(
            temp_dir.path(),
            "marker.sh",
            "test -f pre.txt && echo started > launched.txt",
        );
        let preamble = format!(
            "echo pre > {}",
            crate::process::script::sh_quote(&temp_dir.path().join("pre.txt").to_string_lossy())
        );

        let result = ProcessLauncher::launch(
            &program.to_string_lossy(),
            &LaunchStrategy::ViaScript(preamble),
        );
        assert!(result.success, "{}", result.message);
        assert!(result.script_path.is_some());
        assert!(wait_for(&temp_dir.path().join("launched.txt"), Duration::from_secs(5)));
        assert!(temp_dir.path().join(crate::config::PathsConfig::NOHUP_LOG_NAME).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unrunnable_program_fails_the_launch() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let program = temp_dir.path().join("plain.sh");
        std::fs::write(&program, "#!/bin/sh\necho started > launched.txt\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = spawn_direct(&program, temp_dir.path()).unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed { .. }));
        assert!(err.to_string().contains("cannot be executed"));

        let err = spawn_script(&temp_dir.path().join("gone.sh"), temp_dir.path()).unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed { .. }));
        assert!(!temp_dir.path().join("launched.txt").exists());
    }

    #[test]
    fn test_empty_preamble_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let program = temp_dir.path().join(if cfg!(windows) { "tool.exe" } else { "tool" });
        std::fs::write(&program, "#!/bin/sh\n").unwrap();
        platform::set_executable(&program).unwrap();

        let result = ProcessLauncher::launch(
            &program.to_string_lossy(),
            &LaunchStrategy::ViaScript("  ".into()),
        );
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Config));
    }
}
