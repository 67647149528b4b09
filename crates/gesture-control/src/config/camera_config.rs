use serde::{Deserialize, Serialize};

/// Camera selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Selected camera name (None = backend default device).
    #[serde(default)]
    pub selected: Option<String>,
}
