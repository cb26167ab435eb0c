//! Read-only queries against the process table.

use super::locator::ImageName;
use super::table::{ProcessEntry, ProcessTable};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers "is it running?" and "which processes match?".
#[derive(Clone)]
pub struct ProcessProber {
    table: Arc<dyn ProcessTable>,
    /// Never reported as a match, so a short key cannot select the launcher.
    own_pid: u32,
}

impl ProcessProber {
    pub fn new(table: Arc<dyn ProcessTable>) -> Self {
        Self {
            table,
            own_pid: std::process::id(),
        }
    }

    /// Live processes other than this one.
    fn candidates(&self) -> Result<Vec<ProcessEntry>> {
        let mut processes = self.table.processes()?;
        processes.retain(|entry| entry.pid != self.own_pid);
        Ok(processes)
    }

    /// Check whether any live process matches `name_or_path`.
    ///
    /// Enumeration failure is logged and reported as not running.
    pub fn is_running(&self, name_or_path: &str) -> bool {
        let image = ImageName::derive(name_or_path);
        if image.is_empty() {
            return false;
        }

        match self.find_matches(&image) {
            Ok(matches) => {
                debug!("{} matching process(es) for {}", matches.len(), image);
                !matches.is_empty()
            }
            Err(e) => {
                warn!("Failed to check whether {} is running: {}", image, e);
                false
            }
        }
    }

    /// All live processes, other than the caller, with a name or alias
    /// containing the image's match key.
    pub fn find_matches(&self, image: &ImageName) -> Result<Vec<ProcessEntry>> {
        if image.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .candidates()?
            .into_iter()
            .filter(|entry| entry.names().any(|name| image.matches(name)))
            .collect())
    }

    /// Match by `image`, and if that finds nothing, by `fallback`.
    ///
    /// The fallback pass accepts an exact name or containment.
    pub fn find_with_fallback(
        &self,
        image: &ImageName,
        fallback: Option<&ImageName>,
    ) -> Result<Vec<ProcessEntry>> {
        let processes = self.candidates()?;
        let primary: Vec<ProcessEntry> = processes
            .iter()
            .filter(|entry| entry.names().any(|name| image.matches(name)))
            .cloned()
            .collect();
        if !primary.is_empty() {
            return Ok(primary);
        }

        let Some(fallback) = fallback.filter(|f| !f.is_empty()) else {
            return Ok(primary);
        };
        debug!("No match for {}, trying fallback {}", image, fallback);
        Ok(processes
            .into_iter()
            .filter(|entry| {
                entry
                    .names()
                    .any(|name| fallback.matches_exact(name) || fallback.matches(name))
            })
            .collect())
    }
}
