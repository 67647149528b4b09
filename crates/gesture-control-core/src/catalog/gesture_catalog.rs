use crate::{CoreError, CoreResult, catalog::Gesture};

use std::{collections::BTreeMap, panic::Location};

use error_location::ErrorLocation;

/// Read-only union of the built-in and custom gesture sources.
///
/// Sources are merged in order; on a name collision the later source wins,
/// so custom gestures shadow built-in ones.
#[derive(Debug, Clone, Default)]
pub struct GestureCatalog {
    gestures: BTreeMap<String, Gesture>,
}

impl GestureCatalog {
    /// Merge `builtin` then `custom` into one name-keyed catalog.
    pub fn from_sources(builtin: Vec<Gesture>, custom: Vec<Gesture>) -> Self {
        let gestures = builtin
            .into_iter()
            .chain(custom)
            .map(|gesture| (gesture.name.clone(), gesture))
            .collect();

        Self { gestures }
    }

    /// Find a gesture by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::GestureNotFound`] if no source defines `name`.
    #[track_caller]
    pub fn lookup(&self, name: &str) -> CoreResult<&Gesture> {
        self.gestures
            .get(name)
            .ok_or_else(|| CoreError::GestureNotFound {
                name: name.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Every gesture, keyed by name.
    pub fn all(&self) -> &BTreeMap<String, Gesture> {
        &self.gestures
    }

    /// Number of distinct gesture names.
    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    /// Whether the catalog has no gestures at all.
    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }
}
