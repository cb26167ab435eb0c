//! Platform-specific file permission handling.
//!
//! Decides whether a path may be launched and makes generated scripts
//! executable.

use crate::error::{LaunchError, Result};
use std::path::Path;
use tracing::debug;

/// Extension the primary platform requires for a launchable image.
pub const WINDOWS_EXECUTABLE_EXTENSION: &str = "exe";

/// Make a file executable.
///
/// # Platform Behavior
/// - **Linux/macOS**: Sets the executable bit (mode 0o755)
/// - **Windows**: No-op (Windows determines executability by file extension)
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata =
            std::fs::metadata(path).map_err(|e| LaunchError::io_with_path(e, path))?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| LaunchError::io_with_path(e, path))?;
        debug!("Set executable permissions on: {}", path.display());
    }

    #[cfg(windows)]
    {
        debug!("Skipping executable bit on Windows for: {}", path.display());
    }

    Ok(())
}

/// Check if a file has executable permissions.
///
/// # Platform Behavior
/// - **Linux/macOS**: Checks if any execute bit is set
/// - **Windows**: Returns true for common executable extensions (.exe, .bat, .cmd, .com)
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map_or(false, |ext| matches!(ext.as_str(), "exe" | "bat" | "cmd" | "com"))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        false
    }
}

/// Validate that `path` can be handed to the launcher.
///
/// Checks, in order: non-empty, exists, is a regular file, follows the
/// platform's executable convention (`.exe` on Windows, an execute bit
/// elsewhere).
pub fn check_launchable(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(LaunchError::PathNotSet);
    }

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LaunchError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(LaunchError::io_with_path(e, path)),
    };

    if !metadata.is_file() {
        return Err(LaunchError::TargetNotExecutable {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    if cfg!(windows) {
        let has_exe_extension = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case(WINDOWS_EXECUTABLE_EXTENSION));
        if !has_exe_extension {
            return Err(LaunchError::WrongExtension {
                path: path.to_path_buf(),
                reason: format!("expected .{}", WINDOWS_EXECUTABLE_EXTENSION),
            });
        }
    } else if !is_executable(path) {
        return Err(LaunchError::TargetNotExecutable {
            path: path.to_path_buf(),
            reason: "missing execute permission".to_string(),
        });
    }

    Ok(())
}
