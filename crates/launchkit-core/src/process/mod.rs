//! Process lifecycle and inspection.
//!
//! Launches managed executables detached from the launcher, answers whether
//! they are running, aggregates their resource usage and terminates them.
//!
//! # Matching
//!
//! Every query derives an [`ImageName`] from the configured path and matches
//! it against live process names by case-insensitive containment. Nothing is
//! cached between calls; each query re-enumerates the process table.
//!
//! # Example
//!
//! ```rust,no_run
//! use launchkit::process::{ProcessProber, ProcessReaper, SystemProcessTable};
//! use std::sync::Arc;
//!
//! let table = Arc::new(SystemProcessTable::new());
//! let prober = ProcessProber::new(table.clone());
//! if prober.is_running(r"C:\apps\demo.exe") {
//!     let report = ProcessReaper::new(table).kill(r"C:\apps\demo.exe")?;
//!     println!("{}", report.summary);
//! }
//! # Ok::<(), launchkit::LaunchError>(())
//! ```

mod launcher;
mod locator;
mod probe;
mod reaper;
mod runner;
pub(crate) mod script;
pub(crate) mod table;
mod usage;

pub use launcher::{LaunchResult, LaunchStrategy, ProcessLauncher};
pub use locator::{derive_image_name, ImageName, KNOWN_EXECUTABLE_SUFFIXES};
pub use probe::ProcessProber;
pub use reaper::{KillReport, ProcessReaper, TerminationOutcome, TerminationState};
pub use runner::{run_with_timeout, RunOutput};
pub use script::LaunchScript;
pub use table::{ProcessEntry, ProcessTable, ResourceSample, SystemProcessTable};
pub use usage::{ProcessUsage, UsageAggregator, UsageReport};
