//! Periodic status polling of every configured application.
//!
//! Mirrors what a front end does on its status timer: each tick re-probes
//! every app with a configured path and prints its running state and usage.

use anyhow::{Context, Result};
use launchkit::{AppId, LauncherApi, UsageReport};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Snapshot of one application at one tick.
#[derive(Debug)]
pub struct AppStatus {
    pub app: AppId,
    pub running: bool,
    pub usage: Option<UsageReport>,
}

impl AppStatus {
    fn line(&self) -> String {
        match (&self.usage, self.running) {
            (Some(usage), _) => format!(
                "{:<12} running  {} process(es)  {}  CPU {:.1}%",
                self.app.display_name(),
                usage.count,
                usage.total_memory(),
                usage.total_cpu_percent
            ),
            (None, true) => format!("{:<12} running", self.app.display_name()),
            (None, false) => format!("{:<12} stopped", self.app.display_name()),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "app": self.app,
            "running": self.running,
            "usage": self.usage,
        })
    }
}

/// Probe every app that has a path configured.
pub fn poll(api: &LauncherApi) -> Vec<AppStatus> {
    AppId::ALL
        .iter()
        .filter(|&&app| !api.path(app).is_empty())
        .map(|&app| {
            let running = api.is_running(app);
            let usage = if running {
                api.usage(app)
                    .map_err(|e| debug!("No usage for {}: {}", app, e))
                    .ok()
            } else {
                None
            };
            AppStatus {
                app,
                running,
                usage,
            }
        })
        .collect()
}

/// Poll until Ctrl-C.
pub async fn run(api: Arc<LauncherApi>, interval: Duration, json: bool) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let api = Arc::clone(&api);
                let statuses = tokio::task::spawn_blocking(move || poll(&api))
                    .await
                    .context("Status poll panicked")?;

                if statuses.is_empty() {
                    info!("No application paths configured");
                }
                for status in &statuses {
                    if json {
                        println!("{}", status.to_json());
                    } else {
                        println!("{}", status.line());
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Stopping watch");
                return Ok(());
            }
        }
    }
}
