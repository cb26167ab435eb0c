//! Disk usage of an executable's installation folder.

use crate::error::{LaunchError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Format bytes as human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Size of the folder containing an executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    pub folder_name: String,
    pub folder: PathBuf,
    pub total_bytes: u64,
    pub file_count: u64,
    /// Entries that could not be read and were left out of the total.
    pub skipped: u64,
}

impl SizeReport {
    pub fn total_size(&self) -> String {
        format_size(self.total_bytes)
    }
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Folder: {}", self.folder_name)?;
        writeln!(f, "Path: {}", self.folder.display())?;
        writeln!(f, "Total size: {}", self.total_size())?;
        write!(f, "Files: {}", self.file_count)
    }
}

/// Sum the sizes of every file below the directory containing `exe_path`.
///
/// Unreadable entries are skipped and counted in [`SizeReport::skipped`].
pub fn folder_size(exe_path: &Path) -> Result<SizeReport> {
    if exe_path.as_os_str().is_empty() {
        return Err(LaunchError::PathNotSet);
    }
    if !exe_path.exists() {
        return Err(LaunchError::FileNotFound(exe_path.to_path_buf()));
    }

    let folder = if exe_path.is_dir() {
        exe_path.to_path_buf()
    } else {
        match exe_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => std::env::current_dir()?,
        }
    };

    let mut total_bytes = 0u64;
    let mut file_count = 0u64;
    let mut skipped = 0u64;

    for entry in WalkDir::new(&folder) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(metadata) => {
                total_bytes += metadata.len();
                file_count += 1;
            }
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                skipped += 1;
            }
        }
    }

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string());

    let report = SizeReport {
        folder_name,
        folder,
        total_bytes,
        file_count,
        skipped,
    };
    info!(
        "Folder size: {}, {} file(s)",
        report.total_size(),
        report.file_count
    );
    Ok(report)
}
