//! Persisted gesture binds.
//!
//! Binds live in memory behind a mutex and are mirrored to a TOML file. Every
//! save writes the whole file atomically before the in-memory map changes, so
//! a caller that sees success can rely on the bind surviving a restart.

use crate::{
    CoreError, CoreResult,
    binds::{Bind, BindMode},
};

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Default, Serialize, Deserialize)]
struct BindFile {
    #[serde(default)]
    binds: BTreeMap<String, Bind>,
}

/// Gesture-name to [`Bind`] mapping backed by a TOML file.
pub struct BindStore {
    path: PathBuf,
    binds: Mutex<BTreeMap<String, Bind>>,
}

impl BindStore {
    /// Load binds from `path`, starting empty if the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the file exists but cannot be read or parsed.
    #[track_caller]
    #[instrument(skip(path), fields(path = ?path.as_ref()))]
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let binds = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| CoreError::Storage {
                reason: format!("Failed to read binds file {}: {}", path.display(), e),
                location: ErrorLocation::from(Location::caller()),
            })?;

            let file: BindFile = toml::from_str(&contents).map_err(|e| CoreError::Storage {
                reason: format!("Failed to parse binds file {}: {}", path.display(), e),
                location: ErrorLocation::from(Location::caller()),
            })?;

            file.binds
        } else {
            debug!("No binds file yet, starting empty");
            BTreeMap::new()
        };

        info!(bind_count = binds.len(), "BindStore loaded");

        Ok(Self {
            path,
            binds: Mutex::new(binds),
        })
    }

    /// Every persisted bind, keyed by gesture name.
    pub fn all(&self) -> BTreeMap<String, Bind> {
        self.lock().clone()
    }

    /// The bind for `name`, if one was saved.
    pub fn get(&self, name: &str) -> Option<Bind> {
        self.lock().get(name).cloned()
    }

    /// Stored customizable flag for `name`; `false` when no bind exists.
    pub fn is_customizable(&self, name: &str) -> bool {
        self.lock().get(name).is_some_and(|bind| bind.customizable)
    }

    /// Insert or replace the bind for `name` and persist it.
    ///
    /// A replacement keeps the existing bind's customizable flag; new binds are
    /// customizable.
    ///
    /// # Errors
    ///
    /// - [`CoreError::BindExists`] if a bind exists and `overwrite` is false.
    /// - [`CoreError::BindNotCustomizable`] if the existing bind is locked.
    /// - [`CoreError::Storage`] if the file write fails; the in-memory map is
    ///   left unchanged in that case.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save(
        &self,
        name: &str,
        key: &str,
        hold_duration_ms: u64,
        mode: BindMode,
        overwrite: bool,
    ) -> CoreResult<Bind> {
        let mut binds = self.lock();

        let customizable = match binds.get(name) {
            Some(_) if !overwrite => {
                return Err(CoreError::BindExists {
                    name: name.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Some(existing) if !existing.customizable => {
                return Err(CoreError::BindNotCustomizable {
                    name: name.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Some(existing) => existing.customizable,
            None => true,
        };

        let bind = Bind {
            key: key.to_string(),
            mode,
            hold_duration_ms,
            customizable,
        };

        let mut updated = binds.clone();
        updated.insert(name.to_string(), bind.clone());
        self.write(&updated)?;
        *binds = updated;

        info!(gesture = %name, key = %key, ?mode, hold_duration_ms, "Bind saved");

        Ok(bind)
    }

    /// Atomic write: temp file, fsync, rename over the real file.
    #[track_caller]
    fn write(&self, binds: &BTreeMap<String, Bind>) -> CoreResult<()> {
        let file = BindFile {
            binds: binds.clone(),
        };

        let contents = toml::to_string_pretty(&file)
            .map_err(|e| CoreError::storage(format!("Failed to serialize binds: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::storage(format!("Failed to create binds directory: {}", e))
            })?;
        }

        let temp_path = self.path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path)
            .map_err(|e| CoreError::storage(format!("Failed to create temp binds file: {}", e)))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| CoreError::storage(format!("Failed to write temp binds file: {}", e)))?;

        temp_file
            .sync_all()
            .map_err(|e| CoreError::storage(format!("Failed to sync temp binds file: {}", e)))?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            CoreError::storage(format!("Failed to rename temp binds file to final: {}", e))
        })?;

        debug!(path = ?self.path, bind_count = binds.len(), "Binds written");

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Bind>> {
        self.binds.lock().unwrap_or_else(|e| {
            error!("Bind map lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}
