//! Platform abstraction layer for cross-platform compatibility.
//!
//! This module centralizes the platform-specific code that is not tied to a
//! single launch strategy: liveness checks, termination signals and file
//! permission handling. `#[cfg]` blocks for OS-specific behavior should live
//! here rather than being scattered through the process modules.
//!
//! # Architecture
//!
//! - `permissions` - Executable bits and the platform executable convention
//! - `process` - Liveness, signals, reaping
//!
//! # Supported Platforms
//!
//! - **Windows**: Primary platform (process-creation flags, version resources)
//! - **Linux / macOS**: Shell-backgrounded launches, POSIX signals

pub mod permissions;
pub mod process;

pub use permissions::{check_launchable, is_executable, set_executable};
pub use process::{is_process_alive, send_kill, send_terminate, wait_for_exit, Delivery};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
