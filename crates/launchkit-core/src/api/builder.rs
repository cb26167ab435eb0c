//! Builder for configuring LauncherApi initialization.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ProcessConfig;
use crate::process::{
    ProcessProber, ProcessReaper, ProcessTable, SystemProcessTable, UsageAggregator,
};
use crate::settings::PathStore;
use crate::LauncherApi;

/// Builder for configuring LauncherApi initialization.
///
/// # Example
///
/// ```rust,no_run
/// use launchkit::{LauncherApi, MemoryPathStore};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let api = LauncherApi::builder(Arc::new(MemoryPathStore::new()))
///     .grace_period(Duration::from_secs(5))
///     .build();
/// ```
pub struct LauncherApiBuilder {
    paths: Arc<dyn PathStore>,
    table: Option<Arc<dyn ProcessTable>>,
    grace_period: Duration,
}

impl LauncherApiBuilder {
    /// Create a new builder around the path store.
    pub fn new(paths: Arc<dyn PathStore>) -> Self {
        Self {
            paths,
            table: None,
            grace_period: ProcessConfig::TERMINATE_GRACE,
        }
    }

    /// Use a different process table.
    ///
    /// Default: the system process table.
    pub fn process_table(mut self, table: Arc<dyn ProcessTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// How long each process gets to exit before it is force-killed.
    ///
    /// Default: 3 seconds
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Build the LauncherApi instance.
    pub fn build(self) -> LauncherApi {
        let table: Arc<dyn ProcessTable> = self
            .table
            .unwrap_or_else(|| Arc::new(SystemProcessTable::new()));

        LauncherApi {
            paths: self.paths,
            prober: ProcessProber::new(table.clone()),
            aggregator: UsageAggregator::new(table.clone()),
            reaper: ProcessReaper::new(table).with_grace_period(self.grace_period),
        }
    }
}
