//! Shared, reloadable handle to the merged gesture catalog.

use crate::{
    CoreError, CoreResult,
    catalog::{Gesture, GestureCatalog, GestureMetadata, builtin_gestures},
};

use std::{
    collections::BTreeMap,
    fs,
    panic::Location,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use error_location::ErrorLocation;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Default, Deserialize)]
struct CustomGestureFile {
    #[serde(default)]
    gestures: BTreeMap<String, GestureMetadata>,
}

/// Owns the current [`GestureCatalog`] and swaps in rebuilt ones.
///
/// Readers get an `Arc` snapshot, so a reload never exposes a half-merged
/// catalog.
pub struct GestureRegistry {
    custom_path: PathBuf,
    current: RwLock<Arc<GestureCatalog>>,
}

impl GestureRegistry {
    /// Build the catalog from the built-in list and the custom file at `custom_path`.
    ///
    /// A missing custom file is treated as an empty custom source.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the custom file exists but is invalid.
    #[track_caller]
    #[instrument(skip(custom_path), fields(custom_path = ?custom_path.as_ref()))]
    pub fn load<P: AsRef<Path>>(custom_path: P) -> CoreResult<Self> {
        let custom_path = custom_path.as_ref().to_path_buf();
        let catalog = Self::build(&custom_path)?;

        info!(gesture_count = catalog.len(), "Gesture catalog loaded");

        Ok(Self {
            custom_path,
            current: RwLock::new(Arc::new(catalog)),
        })
    }

    /// The catalog as of now.
    pub fn snapshot(&self) -> Arc<GestureCatalog> {
        let guard = self.current.read().unwrap_or_else(|e| {
            error!("Gesture catalog lock poisoned, recovering: {}", e);
            e.into_inner()
        });
        Arc::clone(&guard)
    }

    /// Rebuild from both sources and replace the current catalog.
    ///
    /// On error the previous catalog stays in place.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn reload(&self) -> CoreResult<usize> {
        let catalog = Arc::new(Self::build(&self.custom_path)?);
        let count = catalog.len();

        let mut guard = self.current.write().unwrap_or_else(|e| {
            error!("Gesture catalog lock poisoned, recovering: {}", e);
            e.into_inner()
        });
        *guard = catalog;

        info!(gesture_count = count, "Gesture catalog reloaded");

        Ok(count)
    }

    #[track_caller]
    fn build(custom_path: &Path) -> CoreResult<GestureCatalog> {
        let custom = Self::load_custom(custom_path)?;
        Ok(GestureCatalog::from_sources(builtin_gestures(), custom))
    }

    #[track_caller]
    fn load_custom(path: &Path) -> CoreResult<Vec<Gesture>> {
        if !path.exists() {
            debug!(path = ?path, "No custom gesture file");
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| CoreError::Storage {
            reason: format!("Failed to read custom gestures {}: {}", path.display(), e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let file: CustomGestureFile =
            toml::from_str(&contents).map_err(|e| CoreError::Storage {
                reason: format!("Failed to parse custom gestures {}: {}", path.display(), e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!(custom_count = file.gestures.len(), "Custom gestures read");

        Ok(file
            .gestures
            .into_iter()
            .map(|(name, metadata)| Gesture { name, metadata })
            .collect())
    }
}
