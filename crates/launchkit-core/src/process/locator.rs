//! Process image name derivation.
//!
//! Every lookup against the process table goes through [`ImageName`]: the
//! bare file name of an executable plus a match key with the executable
//! suffix removed. Matching is case-insensitive containment, so a launcher
//! path of `.../fooapp.EXE` finds a running `FooApp.exe`, and `FooApp` on a
//! platform that drops the suffix from process names.

use serde::Serialize;
use std::fmt;

/// Suffixes stripped from the match key, compared case-insensitively.
pub const KNOWN_EXECUTABLE_SUFFIXES: [&str; 5] = [".exe", ".com", ".bat", ".cmd", ".sh"];

/// Canonical process image name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageName {
    /// Final path segment, extension kept.
    file_name: String,
    /// Lowercased file name without a known executable suffix.
    key: String,
}

impl ImageName {
    /// Derive the image name from a path or bare name.
    ///
    /// Both `/` and `\` are separators regardless of platform, since the
    /// managed executables are usually configured as Windows paths. A path
    /// without usable segments degrades to the whole trimmed string.
    pub fn derive(path: &str) -> Self {
        let trimmed = path.trim();
        let file_name = trimmed
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(trimmed)
            .to_string();

        let lower = file_name.to_lowercase();
        let key = KNOWN_EXECUTABLE_SUFFIXES
            .iter()
            .find_map(|suffix| lower.strip_suffix(suffix))
            .filter(|stem| !stem.is_empty())
            .unwrap_or(lower.as_str())
            .to_string();

        Self { file_name, key }
    }

    /// File name including extension, as shown to the user and as used by
    /// exact filters such as `tasklist /FI "IMAGENAME eq ..."`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Lowercased key used for containment matching.
    pub fn match_key(&self) -> &str {
        &self.key
    }

    /// True when nothing could be derived; an empty name matches nothing.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Case-insensitive containment of the match key in `process_name`.
    pub fn matches(&self, process_name: &str) -> bool {
        !self.is_empty() && process_name.to_lowercase().contains(&self.key)
    }

    /// Exact (case-insensitive) match on the full file name or the key.
    pub fn matches_exact(&self, process_name: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let lower = process_name.to_lowercase();
        lower == self.key || lower == self.file_name.to_lowercase()
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Derive the canonical image name for `path`.
pub fn derive_image_name(path: &str) -> ImageName {
    ImageName::derive(path)
}
