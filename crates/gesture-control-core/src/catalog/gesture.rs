use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form gesture attributes, passed through to clients untouched.
pub type GestureMetadata = Map<String, Value>;

/// A recognisable gesture known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    /// Unique gesture name.
    pub name: String,
    /// Opaque attributes supplied by the gesture source.
    pub metadata: GestureMetadata,
}
