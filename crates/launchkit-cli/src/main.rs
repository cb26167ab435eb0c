//! Launchkit CLI - command-line front end for the launcher.
//!
//! Each subcommand maps onto one `LauncherApi` operation. Output is plain
//! text, or JSON with `--json` for scripting.

mod handler;
mod watch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use launchkit::config::{PathsConfig, UiConfig};
use launchkit::{AppId, JsonPathStore, LaunchError, LauncherApi};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "launchkit")]
#[command(about = "Launch, monitor and stop managed executables")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Settings directory (defaults to ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Set the executable path of an application (empty to clear)
    SetPath {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
        path: String,
    },
    /// Show configured executable paths
    Paths,
    /// Launch an application detached
    Launch {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
        /// Wait for the process to settle, then report whether it is running
        #[arg(long)]
        check: bool,
    },
    /// Report whether an application is running
    Status {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
    },
    /// Show CPU and memory usage of an application
    Usage {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
    },
    /// Terminate an application
    Kill {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
    },
    /// Show the size of an application's folder
    Size {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
    },
    /// Show an application's version
    Version {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
    },
    /// Run an application in the foreground and wait for it to exit
    Run {
        #[arg(value_parser = parse_app_id)]
        app: AppId,
    },
    /// Poll status and usage of every configured application until Ctrl-C
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = UiConfig::STATUS_POLL_INTERVAL.as_millis() as u64)]
        interval_ms: u64,
    },
}

fn parse_app_id(value: &str) -> std::result::Result<AppId, LaunchError> {
    AppId::from_str(value).ok_or_else(|| LaunchError::InvalidAppId(value.to_string()))
}

/// Pick the settings directory: explicit, else `./data`, else the user
/// config directory when the working directory is not writable.
fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }

    let local = std::env::current_dir()
        .context("Failed to read the current directory")?
        .join(PathsConfig::DATA_DIR_NAME);
    if is_writable_dir(&local) {
        return Ok(local);
    }

    let fallback = dirs::config_dir()
        .map(|dir| dir.join(launchkit::config::AppConfig::APP_NAME))
        .context("No writable settings directory available")?;
    warn!(
        "{} is not writable, using {}",
        local.display(),
        fallback.display()
    );
    Ok(fallback)
}

/// Create `dir` if needed and check that this user can create files in it.
fn is_writable_dir(dir: &Path) -> bool {
    std::fs::create_dir_all(dir).is_ok() && tempfile::tempfile_in(dir).is_ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let data_dir = resolve_data_dir(args.data_dir)?;
    debug!("Settings directory: {}", data_dir.display());

    let store = JsonPathStore::open(&data_dir)
        .with_context(|| format!("Failed to open settings in {}", data_dir.display()))?;
    let api = Arc::new(LauncherApi::new(Arc::new(store)));

    match args.command {
        Command::Watch { interval_ms } => {
            info!("Watching configured applications every {} ms", interval_ms);
            watch::run(api, Duration::from_millis(interval_ms.max(1)), args.json).await
        }
        command => {
            let json = args.json;
            tokio::task::spawn_blocking(move || handler::handle(&api, command, json))
                .await
                .context("Command task panicked")?
        }
    }
}
