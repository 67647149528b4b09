use std::panic::Location;

use error_location::ErrorLocation;
use thiserror::Error;

/// Session, storage, and catalog errors with source location tracking.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A command needed an active detection session and none exists.
    #[error("No active detection session {location}")]
    NoActiveSession {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The camera backend could not provide a capture source.
    #[error("Camera unavailable: {reason} {location}")]
    CameraUnavailable {
        /// Description of the camera failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A bind already exists and overwriting was not requested.
    #[error("Bind for gesture '{name}' already exists {location}")]
    BindExists {
        /// Gesture name of the existing bind.
        name: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The existing bind is locked against replacement.
    #[error("Bind for gesture '{name}' is not customizable {location}")]
    BindNotCustomizable {
        /// Gesture name of the locked bind.
        name: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// No gesture or bind is known under this name.
    #[error("Gesture '{name}' not found {location}")]
    GestureNotFound {
        /// The name that was looked up.
        name: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Durable storage could not be read or written.
    #[error("Storage error: {reason} {location}")]
    Storage {
        /// Description of the storage failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The frame producer did not exit within the stop timeout.
    #[error("Frame producer did not stop within {timeout_ms}ms {location}")]
    ProducerStopTimeout {
        /// Configured stop timeout.
        timeout_ms: u64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A bounded session operation took too long or its worker died.
    #[error("Operation '{operation}' failed to complete: {reason} {location}")]
    OperationFailed {
        /// Name of the operation.
        operation: &'static str,
        /// Why it did not complete.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The config accessor does not know this attribute key.
    #[error("Unknown config attribute '{key}' {location}")]
    UnknownAttribute {
        /// The unrecognised key.
        key: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl CoreError {
    /// Shorthand for a storage failure tagged with the caller's location.
    #[track_caller]
    pub fn storage(reason: impl Into<String>) -> Self {
        CoreError::Storage {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Message suitable for a client response, without source locations.
    pub fn client_message(&self) -> String {
        match self {
            CoreError::NoActiveSession { .. } => "no active detection session".to_string(),
            CoreError::CameraUnavailable { reason, .. } => {
                format!("camera unavailable: {reason}")
            }
            CoreError::BindExists { name, .. } => {
                format!("bind for gesture '{name}' already exists")
            }
            CoreError::BindNotCustomizable { name, .. } => {
                format!("bind for gesture '{name}' is not customizable")
            }
            CoreError::GestureNotFound { name, .. } => format!("gesture '{name}' not found"),
            CoreError::Storage { reason, .. } => format!("storage error: {reason}"),
            CoreError::ProducerStopTimeout { timeout_ms, .. } => {
                format!("detection stopped but the camera did not shut down within {timeout_ms}ms")
            }
            CoreError::OperationFailed {
                operation, reason, ..
            } => format!("{operation} failed: {reason}"),
            CoreError::UnknownAttribute { key, .. } => format!("unknown config attribute '{key}'"),
        }
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
