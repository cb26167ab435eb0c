//! File information methods on LauncherApi.

use std::path::Path;

use crate::config::AppId;
use crate::error::Result;
use crate::system::{self, SizeReport, VersionInfo};
use crate::LauncherApi;

impl LauncherApi {
    /// Disk usage of the folder containing `app`'s executable.
    pub fn folder_size(&self, app: AppId) -> Result<SizeReport> {
        system::folder_size(Path::new(self.path(app).as_str()))
    }

    /// Best-effort version of `app`'s executable.
    pub fn version(&self, app: AppId) -> Result<VersionInfo> {
        system::detect_version(Path::new(self.path(app).as_str()))
    }
}
