//! Launchkit - lifecycle management for a small set of external executables.
//!
//! Launches executables fully detached from the caller, reports whether they
//! are running and how much CPU and memory they use, and terminates them
//! gracefully-then-forcefully. The front end (a GUI or the `launchkit` CLI)
//! only ever talks to [`LauncherApi`].
//!
//! # Example
//!
//! ```rust,no_run
//! use launchkit::{AppId, LauncherApi, MemoryPathStore};
//! use std::sync::Arc;
//!
//! let paths = MemoryPathStore::new().with_path(AppId::Evz, r"D:\EVZ\EVZ1.4T24.exe");
//! let api = LauncherApi::new(Arc::new(paths));
//!
//! let result = api.launch(AppId::Evz);
//! println!("{}", result.message);
//!
//! if api.is_running(AppId::Evz) {
//!     println!("{}", api.usage(AppId::Evz)?);
//! }
//! # Ok::<(), launchkit::LaunchError>(())
//! ```

pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod settings;
pub mod system;

mod api;

// Re-export commonly used types
pub use config::AppId;
pub use error::{ErrorKind, LaunchError, Result};
pub use process::{
    derive_image_name, ImageName, KillReport, LaunchResult, LaunchStrategy, ProcessTable,
    RunOutput, SystemProcessTable, UsageReport,
};
pub use settings::{JsonPathStore, MemoryPathStore, PathStore};
pub use system::{format_size, SizeReport, VersionInfo};

// Re-export builder from api module
pub use api::LauncherApiBuilder;

use process::{ProcessProber, ProcessReaper, UsageAggregator};
use std::sync::Arc;

/// Main API struct for launcher operations.
///
/// Holds no state of its own beyond the injected path store and process
/// table; every call re-reads the configured path and re-enumerates the
/// process table.
pub struct LauncherApi {
    paths: Arc<dyn PathStore>,
    prober: ProcessProber,
    aggregator: UsageAggregator,
    reaper: ProcessReaper,
}

impl LauncherApi {
    /// Create an API over the system process table.
    pub fn new(paths: Arc<dyn PathStore>) -> Self {
        Self::builder(paths).build()
    }

    /// Create a builder for more control over initialization.
    pub fn builder(paths: Arc<dyn PathStore>) -> LauncherApiBuilder {
        LauncherApiBuilder::new(paths)
    }

    /// Configured path for `app`, empty when unset.
    pub fn path(&self, app: AppId) -> String {
        self.paths.get(app).unwrap_or_default()
    }

    /// The injected path store.
    pub fn path_store(&self) -> &Arc<dyn PathStore> {
        &self.paths
    }
}
