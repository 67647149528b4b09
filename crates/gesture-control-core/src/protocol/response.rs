use crate::{binds::Bind, catalog::GestureMetadata};

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::error;

/// `frame` value sent when a session is running but has no frame yet.
pub const FRAME_UNAVAILABLE_MARKER: &str = "ERRO";

/// A bind as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireBind {
    /// Bound key name.
    pub bind: String,
    /// Toggle mode when true, hold mode otherwise.
    pub toggle: bool,
    /// Hold duration in milliseconds.
    pub tempo_pressionado: u64,
    /// Whether clients may replace this bind.
    pub customizable: bool,
}

impl From<&Bind> for WireBind {
    fn from(bind: &Bind) -> Self {
        Self {
            bind: bind.key.clone(),
            toggle: bind.mode.is_toggle(),
            tempo_pressionado: bind.hold_duration_ms,
            customizable: bind.customizable,
        }
    }
}

/// One gesture with its catalog metadata and current bind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GestureView {
    /// Gesture name.
    pub nome: String,
    /// Catalog attributes; empty for binds that reference unknown gestures.
    #[serde(flatten)]
    pub metadata: GestureMetadata,
    /// The saved bind, if any.
    pub bind: Option<WireBind>,
}

/// Exactly one of these is sent for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// `{"pong": true}`
    Pong {
        /// Always true.
        pong: bool,
    },
    /// `{"status": "success", "message": ...}`
    Success {
        /// Always `"success"`.
        status: &'static str,
        /// What was done.
        message: String,
    },
    /// `{"allGestos": {...}}`
    AllBinds {
        /// Binds keyed by gesture name.
        #[serde(rename = "allGestos")]
        all_binds: BTreeMap<String, WireBind>,
    },
    /// `{"gesto": {...}}`
    Gesture {
        /// The gesture.
        gesto: GestureView,
    },
    /// `{"customizableState": bool}`
    CustomizableState {
        /// Whether the bind may be replaced.
        #[serde(rename = "customizableState")]
        customizable_state: bool,
    },
    /// `{"camera_selecionada": ...}`
    SelectedCamera {
        /// Persisted camera name.
        camera_selecionada: Option<String>,
    },
    /// `{"cameras_disponiveis": [...]}`
    Cameras {
        /// Camera names in backend order.
        cameras_disponiveis: Vec<String>,
    },
    /// `{"frame": "<base64 jpeg>"}`
    Frame {
        /// Base64 (standard alphabet) JPEG bytes.
        frame: String,
    },
    /// `{"frame": "ERRO", "message": ...}`
    FrameUnavailable {
        /// Always [`FRAME_UNAVAILABLE_MARKER`].
        frame: &'static str,
        /// Why there is no frame.
        message: String,
    },
    /// `{"error": ...}`
    Error {
        /// Client-facing error message.
        error: String,
    },
}

impl Response {
    /// `{"pong": true}`
    pub fn pong() -> Self {
        Response::Pong { pong: true }
    }

    /// Success status with a human-readable message.
    pub fn success(message: impl Into<String>) -> Self {
        Response::Success {
            status: "success",
            message: message.into(),
        }
    }

    /// Error response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    /// Active session without a frame yet.
    pub fn frame_unavailable(message: impl Into<String>) -> Self {
        Response::FrameUnavailable {
            frame: FRAME_UNAVAILABLE_MARKER,
            message: message.into(),
        }
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> String {
        encode_json(self)
    }
}

/// Unsolicited messages pushed to the client between responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    /// `{"gestoDetectado": "<name>"}`
    GestureDetected {
        /// Recognised gesture.
        #[serde(rename = "gestoDetectado")]
        gesture: String,
    },
}

impl Notification {
    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> String {
        encode_json(self)
    }
}

fn encode_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode message");
        r#"{"error":"internal encoding error"}"#.to_string()
    })
}
