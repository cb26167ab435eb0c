//! One-shot command handlers.
//!
//! Each handler renders its result either as human-readable text or as a
//! JSON envelope `{"success": .., "data": ..}` / `{"success": false, "error": ..}`.

use crate::Command;
use anyhow::Result;
use launchkit::config::ProcessConfig;
use launchkit::{AppId, LaunchError, LauncherApi};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

/// Run `command` and print its output.
pub fn handle(api: &LauncherApi, command: Command, json: bool) -> Result<()> {
    match render(api, command, json) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(Failure { output, error }) => {
            if let Some(output) = output {
                println!("{}", output);
            }
            Err(error)
        }
    }
}

/// A failed command, with the JSON envelope to print when requested.
#[derive(Debug)]
pub struct Failure {
    output: Option<String>,
    error: anyhow::Error,
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self {
            output: None,
            error,
        }
    }
}

fn fail(err: LaunchError, json: bool) -> Failure {
    let output = json.then(|| {
        json!({
            "success": false,
            "error": err.to_string(),
            "kind": err.kind().as_str(),
            "retryable": err.is_retryable(),
        })
        .to_string()
    });
    Failure {
        output,
        error: err.into(),
    }
}

fn success<T: Serialize>(data: &T) -> std::result::Result<String, Failure> {
    let data = serde_json::to_value(data).map_err(anyhow::Error::from)?;
    Ok(json!({ "success": true, "data": data }).to_string())
}

/// Render `command` to the text that would be printed.
pub fn render(
    api: &LauncherApi,
    command: Command,
    json: bool,
) -> std::result::Result<String, Failure> {
    match command {
        Command::SetPath { app, path } => {
            api.set_path(app, &path).map_err(|e| fail(e, json))?;
            if json {
                success(&json!({ "app": app, "path": api.path(app) }))
            } else if path.trim().is_empty() {
                Ok(format!("{} path cleared", app.display_name()))
            } else {
                Ok(format!("{} path set to {}", app.display_name(), api.path(app)))
            }
        }

        Command::Paths => {
            let paths: Vec<(AppId, String)> =
                AppId::ALL.iter().map(|&app| (app, api.path(app))).collect();
            if json {
                let map: serde_json::Map<String, Value> = paths
                    .into_iter()
                    .map(|(app, path)| (app.as_str().to_string(), Value::String(path)))
                    .collect();
                return success(&map);
            }
            Ok(paths
                .iter()
                .map(|(app, path)| {
                    let shown = if path.is_empty() { "(not set)" } else { path.as_str() };
                    format!("{:<12} {}", app.display_name(), shown)
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }

        Command::Launch { app, check } => {
            let result = api.launch(app);
            if result.success {
                let running = check.then(|| {
                    std::thread::sleep(ProcessConfig::LAUNCH_SETTLE_DELAY);
                    api.is_running(app)
                });
                if json {
                    success(&json!({ "launch": result, "running": running }))
                } else {
                    let name = app.display_name();
                    match running {
                        Some(true) => Ok(format!("{}\n{} is running", result.message, name)),
                        Some(false) => {
                            warn!("{} exited or has not appeared yet", name);
                            Ok(format!("{}\n{} is not running", result.message, name))
                        }
                        None => Ok(result.message),
                    }
                }
            } else {
                let output = json.then(|| {
                    json!({
                        "success": false,
                        "error": result.message,
                        "kind": result.error_kind.map(|k| k.as_str()),
                    })
                    .to_string()
                });
                Err(Failure {
                    output,
                    error: anyhow::anyhow!(
                        "Failed to launch {}: {}",
                        app.display_name(),
                        result.message
                    ),
                })
            }
        }

        Command::Status { app } => {
            let running = api.is_running(app);
            if json {
                success(&json!({ "app": app, "running": running }))
            } else if running {
                Ok(format!("{} is running", app.display_name()))
            } else {
                Ok(format!("{} is not running", app.display_name()))
            }
        }

        Command::Usage { app } => {
            let report = api.usage(app).map_err(|e| fail(e, json))?;
            if json {
                success(&report)
            } else {
                Ok(report.to_string())
            }
        }

        Command::Kill { app } => {
            let report = api.kill(app).map_err(|e| fail(e, json))?;
            if report.status().is_some() {
                warn!(
                    "{}: {} process(es) survived termination",
                    app.display_name(),
                    report.failed
                );
            }
            if json {
                success(&report)
            } else {
                Ok(report.to_string())
            }
        }

        Command::Size { app } => {
            let report = api.folder_size(app).map_err(|e| fail(e, json))?;
            if json {
                success(&report)
            } else {
                Ok(report.to_string())
            }
        }

        Command::Version { app } => {
            let info = api.version(app).map_err(|e| fail(e, json))?;
            if json {
                success(&info)
            } else {
                Ok(info.to_string())
            }
        }

        Command::Run { app } => {
            let output = api.run_blocking(app).map_err(|e| fail(e, json))?;
            if json {
                return success(&output);
            }
            if !output.success() {
                let code = output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                return Err(Failure {
                    output: Some(output.text().trim_end().to_string()),
                    error: anyhow::anyhow!("{} exited with {}", app.display_name(), code),
                });
            }
            Ok(output.text().trim_end().to_string())
        }

        Command::Watch { .. } => Err(anyhow::anyhow!("watch is not a one-shot command").into()),
    }
}
