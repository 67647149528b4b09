//! Gesture-Control: local control server that drives a camera gesture
//! detector and turns recognised gestures into key presses.

mod app;
mod bind_executor;
mod config;
mod connection;
mod error;
mod key_hold_guard;
mod key_injector;
mod logging;
mod pattern_camera;
mod server;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    bind_executor::BindExecutor,
    connection::{Inbound, serve_connection},
    error::{AppError, Result as AppResult},
    key_hold_guard::KeyHoldGuard,
    key_injector::{EnigoInjector, KeyInjector, parse_key},
    pattern_camera::PatternCameraBackend,
    server::ServerState,
};

use crate::config::{Config, ConfigStore, project_dirs};

use std::{fs, path::Path, process::ExitCode, sync::Arc};

use tracing::{error, info};

/// Application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let data_dir = match project_dirs() {
        Ok(dirs) => dirs.data_dir().to_path_buf(),
        Err(e) => {
            eprintln!("Failed to resolve data directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Dropping the guard flushes the log file, so it lives until main returns.
    let _log_guard = match logging::init(&data_dir.join("logs")) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Gesture-Control failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(data_dir: &Path) -> AppResult<()> {
    info!(data_dir = ?data_dir, "Gesture-Control starting");

    fs::create_dir_all(data_dir)?;
    let config = ConfigStore::open(Config::default_path()?)?;

    let app = App::build(config, data_dir, Arc::new(PatternCameraBackend))?;
    app.run(Arc::new(EnigoInjector), shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = ?e, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
