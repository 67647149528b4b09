//! Key-value view of the persisted config for the command dispatcher.

use crate::{AppResult, config::Config};

use gesture_control_core::{AttributeStore, CoreError, CoreResult, SELECTED_CAMERA_KEY};

use std::{
    panic::Location,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use error_location::ErrorLocation;
use tracing::{error, info, instrument};

/// Owns the loaded [`Config`] and the file it came from.
///
/// Updates are written to disk before the in-memory copy changes, so a
/// successful `update_attribute` is always durable.
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<Config>,
}

impl ConfigStore {
    /// Load (or create) the config file at `path`.
    #[track_caller]
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let config = Config::load_from(&path)?;

        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(|e| {
            error!("Config lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}

impl AttributeStore for ConfigStore {
    #[track_caller]
    fn read_attribute(&self, key: &str) -> CoreResult<Option<String>> {
        match key {
            SELECTED_CAMERA_KEY => Ok(self.lock().camera.selected.clone()),
            _ => Err(CoreError::UnknownAttribute {
                key: key.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    #[track_caller]
    #[instrument(skip(self))]
    fn update_attribute(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut current = self.lock();
        let mut updated = current.clone();

        match key {
            SELECTED_CAMERA_KEY => updated.camera.selected = Some(value.to_string()),
            _ => {
                return Err(CoreError::UnknownAttribute {
                    key: key.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        updated
            .save_to(&self.path)
            .map_err(|e| CoreError::storage(format!("Failed to persist config: {}", e)))?;
        *current = updated;

        info!(key, "Config attribute updated");

        Ok(())
    }
}
