//! Aggregated resource usage across matching processes.

use super::locator::ImageName;
use super::probe::ProcessProber;
use super::table::ProcessTable;
use crate::error::{LaunchError, Result};
use crate::system::format_size;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Resource usage of one matched process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    pub memory_bytes: u64,
    pub cpu_percent: f32,
}

impl ProcessUsage {
    /// Text block shown per process.
    pub fn block(&self) -> String {
        format!(
            "{} (PID {})\nMemory: {}\nCPU: {:.1}%\n",
            self.name,
            self.pid,
            format_size(self.memory_bytes),
            self.cpu_percent
        )
    }
}

/// Summed usage of every process matching one image name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub count: usize,
    pub total_memory_bytes: u64,
    /// Sum of per-process CPU percentages, not normalized by core count.
    pub total_cpu_percent: f32,
    pub processes: Vec<ProcessUsage>,
}

impl UsageReport {
    fn from_processes(processes: Vec<ProcessUsage>) -> Self {
        Self {
            count: processes.len(),
            total_memory_bytes: processes.iter().map(|p| p.memory_bytes).sum(),
            total_cpu_percent: processes.iter().map(|p| p.cpu_percent).sum(),
            processes,
        }
    }

    /// Human-readable total memory.
    pub fn total_memory(&self) -> String {
        format_size(self.total_memory_bytes)
    }

    /// One text block per process.
    pub fn blocks(&self) -> Vec<String> {
        self.processes.iter().map(ProcessUsage::block).collect()
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} process(es)", self.count)?;
        writeln!(f, "Total memory: {}", self.total_memory())?;
        writeln!(f, "Total CPU: {:.1}%", self.total_cpu_percent)?;
        writeln!(f, "{}", "=".repeat(40))?;
        for block in self.blocks() {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

/// Sums CPU and memory across processes matching a name.
#[derive(Clone)]
pub struct UsageAggregator {
    prober: ProcessProber,
    table: Arc<dyn ProcessTable>,
}

impl UsageAggregator {
    pub fn new(table: Arc<dyn ProcessTable>) -> Self {
        Self {
            prober: ProcessProber::new(table.clone()),
            table,
        }
    }

    /// Aggregate usage for `name_or_path`, retrying with `fallback_name`
    /// when nothing matches. An empty fallback disables the second pass.
    ///
    /// Processes that vanish or refuse access during sampling are skipped.
    /// Returns `ProcessNotFound` when no process could be sampled.
    pub fn usage(&self, name_or_path: &str, fallback_name: &str) -> Result<UsageReport> {
        let image = ImageName::derive(name_or_path);
        let fallback = ImageName::derive(fallback_name);
        let not_found = || LaunchError::ProcessNotFound {
            name: image.file_name().to_string(),
        };

        let matches = match self.prober.find_with_fallback(&image, Some(&fallback)) {
            Ok(matches) => matches,
            Err(e) => {
                debug!("Enumeration failed for {}: {}", image, e);
                return Err(not_found());
            }
        };
        if matches.is_empty() {
            return Err(not_found());
        }

        let pids: Vec<u32> = matches.iter().map(|entry| entry.pid).collect();
        let processes: Vec<ProcessUsage> = self
            .table
            .sample_usage(&pids)
            .into_iter()
            .zip(matches)
            .filter_map(|((pid, sample), entry)| match sample {
                Ok(sample) => Some(ProcessUsage {
                    pid,
                    name: entry.name,
                    memory_bytes: sample.memory_bytes,
                    cpu_percent: sample.cpu_percent,
                }),
                Err(e) => {
                    debug!("Skipping process {}: {}", pid, e);
                    None
                }
            })
            .collect();

        if processes.is_empty() {
            return Err(not_found());
        }

        let report = UsageReport::from_processes(processes);
        info!(
            "{}: {} process(es), {}, CPU {:.1}%",
            image,
            report.count,
            report.total_memory(),
            report.total_cpu_percent
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::process::table::fake::{FakeProcess, FakeProcessTable};

    fn aggregator(processes: Vec<FakeProcess>) -> UsageAggregator {
        UsageAggregator::new(Arc::new(FakeProcessTable::new(processes)))
    }

    #[test]
    fn test_two_workers_are_summed() {
        let aggregator = aggregator(vec![
            FakeProcess::new(1, "worker.exe", 10 * 1024 * 1024, 1.5),
            FakeProcess::new(2, "shell", 1024, 0.0),
            FakeProcess::new(3, "worker.exe", 20 * 1024 * 1024, 2.5),
        ]);
        let report = aggregator.usage("C:/bin/worker.exe", "").unwrap();

        assert_eq!(report.count, 2);
        assert_eq!(report.total_memory_bytes, 30 * 1024 * 1024);
        assert_eq!(
            report.total_memory_bytes,
            report.processes.iter().map(|p| p.memory_bytes).sum::<u64>()
        );
        assert!((report.total_cpu_percent - 4.0).abs() < f32::EPSILON);
        assert_eq!(report.blocks().len(), 2);
    }

    #[test]
    fn test_no_match_is_not_found() {
        let aggregator = aggregator(vec![FakeProcess::new(1, "shell", 1024, 0.0)]);
        let err = aggregator.usage("worker.exe", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_path_is_not_found() {
        let aggregator = aggregator(vec![FakeProcess::new(1, "shell", 1024, 0.0)]);
        let err = aggregator.usage("", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_fallback_name() {
        let aggregator = aggregator(vec![FakeProcess::new(7, "javaw.exe", 4096, 3.0)]);
        let report = aggregator
            .usage(r"C:\Neurolings\Neurolings.exe", "javaw")
            .unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.processes[0].pid, 7);
    }

    #[test]
    fn test_vanished_process_is_skipped() {
        let aggregator = aggregator(vec![
            FakeProcess::new(1, "worker.exe", 1000, 1.0),
            FakeProcess::new(2, "worker.exe", 5000, 1.0).vanishing(),
        ]);
        let report = aggregator.usage("worker.exe", "").unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.total_memory_bytes, 1000);
    }

    #[test]
    fn test_all_vanished_is_not_found() {
        let aggregator = aggregator(vec![FakeProcess::new(1, "worker.exe", 1000, 1.0).vanishing()]);
        let err = aggregator.usage("worker.exe", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_report_rendering() {
        let aggregator = aggregator(vec![FakeProcess::new(42, "Demo.exe", 2048, 12.25)]);
        let text = aggregator.usage("demo.exe", "").unwrap().to_string();
        assert!(text.starts_with("Found 1 process(es)\n"));
        assert!(text.contains("Total memory: 2.00 KB"));
        assert!(text.contains(&"=".repeat(40)));
        assert!(text.contains("Demo.exe (PID 42)"));
    }
}
