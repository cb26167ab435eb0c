//! Process lifecycle methods on LauncherApi.

use std::path::Path;

use crate::config::{AppId, RunConfig};
use crate::error::{LaunchError, Result};
use crate::platform;
use crate::process::{
    run_with_timeout, KillReport, LaunchResult, LaunchStrategy, ProcessLauncher, RunOutput,
    UsageReport,
};
use crate::LauncherApi;
use tracing::info;

impl LauncherApi {
    // ========================================
    // Path Configuration
    // ========================================

    /// Set the executable path for `app`. A blank path clears it.
    pub fn set_path(&self, app: AppId, path: &str) -> Result<()> {
        self.paths.set(app, path)
    }

    // ========================================
    // Process Management Methods
    // ========================================

    /// Launch `app` detached, using its registered launch strategy.
    pub fn launch(&self, app: AppId) -> LaunchResult {
        let path = self.path(app);
        let strategy = app.launch_strategy(&path);
        info!("Launching {} ({:?})", app.display_name(), strategy);
        ProcessLauncher::launch(&path, &strategy)
    }

    /// Launch an arbitrary executable.
    pub fn launch_path(&self, path: &str, strategy: &LaunchStrategy) -> LaunchResult {
        ProcessLauncher::launch(path, strategy)
    }

    /// Check if `app` is currently running.
    pub fn is_running(&self, app: AppId) -> bool {
        self.prober.is_running(&self.path(app))
    }

    /// Aggregate CPU and memory of every process belonging to `app`.
    ///
    /// Falls back to the app's hand-off process name when the executable
    /// itself is not found.
    pub fn usage(&self, app: AppId) -> Result<UsageReport> {
        let fallback = app.usage_fallback_name().unwrap_or_default();
        self.aggregator.usage(&self.path(app), fallback)
    }

    /// Terminate every process belonging to `app`.
    pub fn kill(&self, app: AppId) -> Result<KillReport> {
        self.reaper.kill(&self.path(app))
    }

    /// Run `app` in the foreground and wait for it to finish.
    ///
    /// Bounded by [`RunConfig::BLOCKING_RUN_TIMEOUT`]; a non-zero exit is
    /// reported through [`RunOutput::success`], not as an error.
    pub fn run_blocking(&self, app: AppId) -> Result<RunOutput> {
        self.run_path_blocking(&self.path(app))
    }

    /// Run an arbitrary executable in the foreground.
    pub fn run_path_blocking(&self, path: &str) -> Result<RunOutput> {
        let exe = Path::new(path.trim());
        platform::check_launchable(exe)?;
        let exe = std::path::absolute(exe).map_err(|e| LaunchError::io_with_path(e, exe))?;

        info!("Running {} to completion", exe.display());
        run_with_timeout(
            &exe,
            &[],
            exe.parent(),
            RunConfig::BLOCKING_RUN_TIMEOUT,
        )
    }
}
