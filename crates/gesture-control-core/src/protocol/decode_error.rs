use error_location::ErrorLocation;
use thiserror::Error;

/// Why an inbound message could not become a [`crate::protocol::Request`].
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not JSON, or JSON that is not an object.
    #[error("Invalid input: {reason} {location}")]
    InvalidInput {
        /// Parser detail, for logs only.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A JSON object without any known command key.
    #[error("Unknown command, keys: {keys:?} {location}")]
    UnknownCommand {
        /// Keys present in the object.
        keys: Vec<String>,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A known command whose payload has the wrong shape.
    #[error("Invalid payload for '{command}': {reason} {location}")]
    InvalidPayload {
        /// Wire name of the command.
        command: &'static str,
        /// What was wrong with the payload.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl DecodeError {
    /// Message suitable for a client response.
    pub fn client_message(&self) -> String {
        match self {
            DecodeError::InvalidInput { .. } => "invalid input".to_string(),
            DecodeError::UnknownCommand { .. } => "unknown command".to_string(),
            DecodeError::InvalidPayload {
                command, reason, ..
            } => format!("invalid payload for {command}: {reason}"),
        }
    }
}
