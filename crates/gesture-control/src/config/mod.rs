mod camera_config;
#[allow(clippy::module_inception)]
mod config;
mod config_store;
mod detection_config;
mod server_config;

pub(crate) use {
    camera_config::CameraConfig, config::Config, config_store::ConfigStore,
    detection_config::DetectionConfig, server_config::ServerConfig,
};

use crate::{AppError, AppResult};

use std::panic::Location;

use directories::ProjectDirs;
use error_location::ErrorLocation;

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 8765;
pub(crate) const DEFAULT_STOP_TIMEOUT_MS: u64 = 2000;
pub(crate) const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;

pub(crate) fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_stop_timeout_ms() -> u64 {
    DEFAULT_STOP_TIMEOUT_MS
}

pub(crate) fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

/// Platform directories for config, data and logs.
#[track_caller]
pub(crate) fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from("com", "gesture-control", "Gesture-Control").ok_or_else(|| {
        AppError::ConfigError {
            reason: "Failed to get project directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    })
}
