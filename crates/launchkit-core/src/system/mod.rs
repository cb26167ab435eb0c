//! File-level information about managed executables.
//!
//! Provides:
//! - Installation folder size
//! - Version detection with fallbacks
//!
//! # Example
//!
//! ```rust,no_run
//! use launchkit::system::{detect_version, folder_size};
//! use std::path::Path;
//!
//! let exe = Path::new(r"C:\apps\demo.exe");
//! println!("{}", folder_size(exe)?);
//! println!("{}", detect_version(exe)?);
//! # Ok::<(), launchkit::LaunchError>(())
//! ```

mod folder;
mod version;

pub use folder::{folder_size, format_size, SizeReport};
pub use version::{detect_version, extract_version, VersionInfo, VersionSource};
