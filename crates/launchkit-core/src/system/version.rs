//! Executable version detection.
//!
//! Tries, in order, and keeps the first that succeeds:
//! 1. The native version resource (Windows only)
//! 2. `<exe> --version`
//! 3. `<exe> -v`, accepted only when the output looks like a version
//! 4. File size and modification time

use crate::config::VersionProbeConfig;
use crate::error::{LaunchError, Result};
use crate::process::run_with_timeout;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static VERSION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("version regex must compile"));

/// Where version information came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Resource,
    VersionFlag,
    ShortFlag,
    FileMetadata,
}

/// Best-effort version information for an executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub file_name: String,
    /// Dotted version number, when one could be extracted.
    pub version: Option<String>,
    /// Text shown to the user.
    pub detail: String,
    pub source: VersionSource,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Extract the first dotted version number from `text`.
pub fn extract_version(text: &str) -> Option<String> {
    VERSION_NUMBER.find(text).map(|m| m.as_str().to_string())
}

/// Whether `-v` output plausibly describes a version.
fn looks_like_version(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("version") || lower.chars().take(10).any(|c| c == 'v')
}

/// Detect the version of the executable at `path`.
pub fn detect_version(path: &Path) -> Result<VersionInfo> {
    if path.as_os_str().is_empty() {
        return Err(LaunchError::PathNotSet);
    }
    if !path.exists() {
        return Err(LaunchError::FileNotFound(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let found = |detail: String, source: VersionSource| {
        let version = extract_version(&detail);
        info!("Version of {} ({:?}): {}", file_name, source, detail);
        VersionInfo {
            file_name: file_name.clone(),
            version,
            detail,
            source,
        }
    };

    match native_version(path) {
        Ok(version) => return Ok(found(version, VersionSource::Resource)),
        Err(e) => debug!("No version resource for {}: {}", path.display(), e),
    }

    let working_dir = path.parent().filter(|p| !p.as_os_str().is_empty());

    match run_with_timeout(
        path,
        &["--version"],
        working_dir,
        VersionProbeConfig::VERSION_FLAG_TIMEOUT,
    ) {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            return Ok(found(output.stdout.trim().to_string(), VersionSource::VersionFlag));
        }
        Ok(_) => debug!("--version gave nothing usable for {}", path.display()),
        Err(LaunchError::Timeout { .. }) => warn!("Version check timed out for {}", path.display()),
        Err(e) => debug!("--version failed for {}: {}", path.display(), e),
    }

    match run_with_timeout(
        path,
        &["-v"],
        working_dir,
        VersionProbeConfig::SHORT_FLAG_TIMEOUT,
    ) {
        Ok(output) if looks_like_version(&output.stdout) => {
            let detail: String = output
                .stdout
                .trim()
                .chars()
                .take(VersionProbeConfig::MAX_OUTPUT_CHARS)
                .collect();
            return Ok(found(detail, VersionSource::ShortFlag));
        }
        Ok(_) => debug!("-v gave nothing usable for {}", path.display()),
        Err(e) => warn!("-v version probe failed for {}: {}", path.display(), e),
    }

    let metadata = std::fs::metadata(path).map_err(|e| LaunchError::io_with_path(e, path))?;
    let size_mb = metadata.len() as f64 / 1024.0 / 1024.0;
    let mut detail = format!("{:.2} MB", size_mb);
    if let Ok(modified) = metadata.modified() {
        let modified: DateTime<Local> = modified.into();
        detail.push_str(&format!(", modified {}", modified.format("%Y-%m-%d %H:%M:%S")));
    }
    info!("No version information for {}, reporting file metadata", file_name);
    Ok(VersionInfo {
        file_name: file_name.clone(),
        version: None,
        detail,
        source: VersionSource::FileMetadata,
    })
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn native_version(path: &Path) -> Result<String> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, VS_FIXEDFILEINFO,
    };

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
    let root: Vec<u16> = "\\".encode_utf16().chain(Some(0)).collect();
    let unavailable = || LaunchError::Io {
        message: "no version resource".to_string(),
        path: Some(path.to_path_buf()),
        source: Some(std::io::Error::last_os_error()),
    };

    // SAFETY: `wide` and `root` are NUL-terminated UTF-16 buffers that
    // outlive the calls. `data` is sized from GetFileVersionInfoSizeW and
    // VerQueryValueW returns a pointer into `data`, which is only read
    // while `data` is alive and only when the reported length covers a
    // whole VS_FIXEDFILEINFO.
    unsafe {
        let mut handle = 0u32;
        let size = GetFileVersionInfoSizeW(wide.as_ptr(), &mut handle);
        if size == 0 {
            return Err(unavailable());
        }

        let mut data = vec![0u8; size as usize];
        if GetFileVersionInfoW(wide.as_ptr(), 0, size, data.as_mut_ptr().cast()) == 0 {
            return Err(unavailable());
        }

        let mut info_ptr: *mut std::ffi::c_void = std::ptr::null_mut();
        let mut info_len = 0u32;
        if VerQueryValueW(data.as_ptr().cast(), root.as_ptr(), &mut info_ptr, &mut info_len) == 0
            || info_ptr.is_null()
            || (info_len as usize) < std::mem::size_of::<VS_FIXEDFILEINFO>()
        {
            return Err(unavailable());
        }

        let info = &*(info_ptr as *const VS_FIXEDFILEINFO);
        let ms = info.dwFileVersionMS;
        let ls = info.dwFileVersionLS;
        Ok(format!(
            "{}.{}.{}.{}",
            (ms >> 16) & 0xFFFF,
            ms & 0xFFFF,
            (ls >> 16) & 0xFFFF,
            ls & 0xFFFF
        ))
    }
}

#[cfg(not(windows))]
fn native_version(_path: &Path) -> Result<String> {
    Err(LaunchError::unsupported("native version resource"))
}
