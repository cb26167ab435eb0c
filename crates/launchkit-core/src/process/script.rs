//! Ephemeral launch scripts.
//!
//! A script is a caller-supplied preamble followed by a change into the
//! executable's directory and the executable itself. Scripts are written to
//! the system temp directory and deleted shortly after the launch.

use crate::config::PathsConfig;
use crate::error::{LaunchError, Result};
use crate::platform;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(windows)]
const SCRIPT_EXTENSION: &str = ".bat";
#[cfg(not(windows))]
const SCRIPT_EXTENSION: &str = ".sh";

/// A generated script on disk.
#[derive(Debug)]
pub struct LaunchScript {
    path: PathBuf,
}

impl LaunchScript {
    /// Render the script body for `exe`.
    pub fn render(preamble: &str, exe: &Path) -> String {
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));

        #[cfg(windows)]
        {
            let mut body = preamble.trim_end().replace("\r\n", "\n").replace('\n', "\r\n");
            body.push_str("\r\n");
            body.push_str(&format!("cd /d \"{}\"\r\n", dir.display()));
            body.push_str(&format!("\"{}\"\r\n", exe.display()));
            body
        }

        #[cfg(not(windows))]
        {
            let mut body = String::from("#!/bin/sh\n");
            body.push_str(preamble.trim_end());
            body.push('\n');
            body.push_str(&format!("cd {} || exit 1\n", sh_quote(&dir.to_string_lossy())));
            body.push_str(&format!("exec {}\n", sh_quote(&exe.to_string_lossy())));
            body
        }
    }

    /// Write a launch script for `exe` to the temp directory.
    pub fn create(preamble: &str, exe: &Path) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(PathsConfig::SCRIPT_PREFIX)
            .suffix(SCRIPT_EXTENSION)
            .tempfile()?;
        file.write_all(Self::render(preamble, exe).as_bytes())
            .map_err(|e| LaunchError::io_with_path(e, file.path()))?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| {
            let path = e.file.path().to_path_buf();
            LaunchError::io_with_path(e.error, path)
        })?;
        platform::set_executable(&path)?;

        info!("Temporary launch script created: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the script immediately.
    pub fn remove_now(self) {
        remove_script(&self.path);
    }

    /// Delete the script on a detached thread after `delay`.
    ///
    /// The handle may be dropped; nothing waits for or cancels the cleanup.
    pub fn schedule_cleanup(self, delay: Duration) -> JoinHandle<()> {
        debug!(
            "Scheduling removal of {} in {:?}",
            self.path.display(),
            delay
        );
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            remove_script(&self.path);
        })
    }
}

fn remove_script(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed launch script {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove launch script {}: {}", path.display(), e),
    }
}

/// Single-quote a string for POSIX sh.
#[cfg(not(windows))]
pub(crate) fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
