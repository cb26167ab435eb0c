//! Centralized configuration for launchkit.
//!
//! This module provides configuration constants for process termination,
//! launch scripts, version probing and on-disk layout, plus the registry of
//! managed applications.

use crate::process::LaunchStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "launchkit";
    pub const SETTINGS_VERSION: u32 = 1;
}

/// Process lifecycle timing.
pub struct ProcessConfig;

impl ProcessConfig {
    /// How long a process gets to exit after the graceful signal.
    pub const TERMINATE_GRACE: Duration = Duration::from_secs(3);
    /// Poll interval while waiting for a process to exit.
    pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Pause after the forced kill before re-checking liveness.
    pub const KILL_SETTLE: Duration = Duration::from_millis(100);
    /// How long a generated launch script survives before deletion.
    pub const SCRIPT_CLEANUP_DELAY: Duration = Duration::from_secs(5);
    /// Delay callers should allow between launch and the first usage probe.
    pub const LAUNCH_SETTLE_DELAY: Duration = Duration::from_secs(3);
}

/// Timeouts for version probing.
pub struct VersionProbeConfig;

impl VersionProbeConfig {
    pub const VERSION_FLAG_TIMEOUT: Duration = Duration::from_secs(3);
    pub const SHORT_FLAG_TIMEOUT: Duration = Duration::from_secs(2);
    /// Output kept from a `-v` probe.
    pub const MAX_OUTPUT_CHARS: usize = 200;
}

/// Blocking execution limits.
pub struct RunConfig;

impl RunConfig {
    pub const BLOCKING_RUN_TIMEOUT: Duration = Duration::from_secs(300);
    pub const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);
}

/// Directory and file names.
pub struct PathsConfig;

impl PathsConfig {
    pub const DATA_DIR_NAME: &'static str = "data";
    pub const SETTINGS_FILE_NAME: &'static str = "config.json";
    /// Sibling log written by shell-backgrounded script launches.
    pub const NOHUP_LOG_NAME: &'static str = "nohup.out";
    pub const SCRIPT_PREFIX: &'static str = "launchkit-";
}

/// Front-end polling.
pub struct UiConfig;

impl UiConfig {
    pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(4000);
}

/// Compatibility-layer preamble applied before launching EVZ on Windows.
///
/// `app` is expanded by the batch interpreter; the launcher appends the
/// `cd` + invoke lines itself.
const EVZ_COMPAT_PREAMBLE: &str = r#"@echo off
set "app={path}"
reg add "HKCU\Software\Microsoft\Windows NT\CurrentVersion\AppCompatFlags\Layers" /v "%app%" /d "~ 16BITCOLOR" /f"#;

/// Managed applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AppId {
    #[serde(rename = "nsp")]
    NeuroSongSpider,
    #[serde(rename = "evz")]
    Evz,
    #[serde(rename = "neurolings")]
    Neurolings,
}

impl AppId {
    pub const ALL: [AppId; 3] = [AppId::NeuroSongSpider, AppId::Evz, AppId::Neurolings];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppId::NeuroSongSpider => "nsp",
            AppId::Evz => "evz",
            AppId::Neurolings => "neurolings",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AppId::NeuroSongSpider => "NeuroSongSpider",
            AppId::Evz => "EVZ",
            AppId::Neurolings => "Neurolings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nsp" | "neurosongspider" => Some(AppId::NeuroSongSpider),
            "evz" => Some(AppId::Evz),
            "neurolings" | "nl" => Some(AppId::Neurolings),
            _ => None,
        }
    }

    /// Launch strategy for the executable at `path`.
    ///
    /// EVZ needs a 16-bit colour compatibility flag set before it starts,
    /// which only exists on Windows.
    pub fn launch_strategy(&self, path: &str) -> LaunchStrategy {
        match self {
            AppId::Evz if cfg!(windows) => {
                LaunchStrategy::ViaScript(EVZ_COMPAT_PREAMBLE.replace("{path}", path))
            }
            _ => LaunchStrategy::Direct,
        }
    }

    /// Process name to look for when the executable hands off to another
    /// image and exits.
    pub fn usage_fallback_name(&self) -> Option<&'static str> {
        match self {
            AppId::Neurolings => Some("javaw"),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
