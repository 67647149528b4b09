use crate::{binds::BindMode, protocol::DecodeError};

use std::panic::Location;

use error_location::ErrorLocation;
use serde::Deserialize;
use serde_json::{Map, Value};

/// The fixed set of operations a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Liveness check.
    Ping,
    /// Start (or reuse) the detection session.
    StartDetection,
    /// Stop the detection session.
    StopDetection,
    /// Turn crop-hand mode on or off.
    SetCropHandMode,
    /// List every saved bind.
    GetAllBinds,
    /// Look up one gesture and its bind.
    GetGestureByName,
    /// Whether a gesture's bind may be replaced.
    GetCustomizableState,
    /// Create or replace a bind.
    SaveGesture,
    /// Persist the selected camera.
    SetCamera,
    /// Read the selected camera.
    GetCamera,
    /// Enumerate cameras.
    ListCameras,
    /// Latest frame of the running session.
    GetFrame,
    /// Rebuild the gesture catalog from its sources.
    ReloadGestures,
}

impl CommandKind {
    /// Canonical wire key, used in logs and error messages.
    pub fn wire_name(self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::StartDetection => "startDetection",
            CommandKind::StopDetection => "stopDetection",
            CommandKind::SetCropHandMode => "setCropHandMode",
            CommandKind::GetAllBinds => "getAllGestos",
            CommandKind::GetGestureByName => "getGestoByName",
            CommandKind::GetCustomizableState => "getCustomizableState",
            CommandKind::SaveGesture => "saveGesto",
            CommandKind::SetCamera => "setCamera",
            CommandKind::GetCamera => "getCamera",
            CommandKind::ListCameras => "getCamerasDisponiveis",
            CommandKind::GetFrame => "getFrame",
            CommandKind::ReloadGestures => "reloadGestos",
        }
    }
}

/// Command keys in the order they are checked. The first key present wins.
const COMMAND_KEYS: &[(&str, CommandKind)] = &[
    ("ping", CommandKind::Ping),
    ("startDetection", CommandKind::StartDetection),
    ("stopDetection", CommandKind::StopDetection),
    ("setCropHandMode", CommandKind::SetCropHandMode),
    ("startCropHandMode", CommandKind::SetCropHandMode),
    ("stopCropHandMode", CommandKind::SetCropHandMode),
    ("getAllGestos", CommandKind::GetAllBinds),
    ("getAllBinds", CommandKind::GetAllBinds),
    ("getGestoByName", CommandKind::GetGestureByName),
    ("getGesto", CommandKind::GetGestureByName),
    ("getCustomizableState", CommandKind::GetCustomizableState),
    ("saveGesto", CommandKind::SaveGesture),
    ("setCamera", CommandKind::SetCamera),
    ("getCamera", CommandKind::GetCamera),
    ("getCamerasDisponiveis", CommandKind::ListCameras),
    ("getFrame", CommandKind::GetFrame),
    ("reloadGestos", CommandKind::ReloadGestures),
];

/// Request modifier that may sit next to `saveGesto` instead of inside it.
const OVERWRITE_KEY: &str = "sobreescrever";

/// Bind to create or replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveGesture {
    /// Gesture the bind belongs to.
    pub name: String,
    /// Key name to inject.
    pub key: String,
    /// Hold or toggle.
    pub mode: BindMode,
    /// Hold duration in milliseconds.
    pub hold_duration_ms: u64,
    /// Replace an existing bind (defaults to true).
    pub overwrite: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveGesturePayload {
    nome: String,
    bind: String,
    modo_toggle: bool,
    tempo_pressionado: u64,
    #[serde(default)]
    sobreescrever: Option<bool>,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `ping`
    Ping,
    /// `startDetection`
    StartDetection,
    /// `stopDetection`
    StopDetection,
    /// `setCropHandMode`, `startCropHandMode`, `stopCropHandMode`
    SetCropHandMode {
        /// Desired crop-hand state.
        enabled: bool,
    },
    /// `getAllGestos` / `getAllBinds`
    GetAllBinds,
    /// `getGestoByName` / `getGesto`
    GetGestureByName {
        /// Gesture to look up.
        name: String,
    },
    /// `getCustomizableState`
    GetCustomizableState {
        /// Gesture to query.
        name: String,
    },
    /// `saveGesto`
    SaveGesture(SaveGesture),
    /// `setCamera`
    SetCamera {
        /// Camera name to persist.
        name: String,
    },
    /// `getCamera`
    GetCamera,
    /// `getCamerasDisponiveis`
    ListCameras,
    /// `getFrame`
    GetFrame,
    /// `reloadGestos`
    ReloadGestures,
}

impl Request {
    /// Decode one inbound text message.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidInput`] if `text` is not a JSON object.
    /// - [`DecodeError::UnknownCommand`] if no command key is present.
    /// - [`DecodeError::InvalidPayload`] if the command's value has the wrong shape.
    #[track_caller]
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::InvalidInput {
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let Value::Object(mut object) = value else {
            return Err(DecodeError::InvalidInput {
                reason: "request is not a JSON object".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let Some(&(key, kind)) = COMMAND_KEYS
            .iter()
            .find(|(key, _)| object.contains_key(*key))
        else {
            return Err(DecodeError::UnknownCommand {
                keys: object.keys().cloned().collect(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let payload = object.remove(key).unwrap_or(Value::Null);

        let request = match kind {
            CommandKind::Ping => Request::Ping,
            CommandKind::StartDetection => Request::StartDetection,
            CommandKind::StopDetection => Request::StopDetection,
            CommandKind::SetCropHandMode => {
                let enabled = match key {
                    "startCropHandMode" => true,
                    "stopCropHandMode" => false,
                    _ => payload.as_bool().ok_or_else(|| DecodeError::InvalidPayload {
                        command: kind.wire_name(),
                        reason: "expected a boolean".to_string(),
                        location: ErrorLocation::from(Location::caller()),
                    })?,
                };
                Request::SetCropHandMode { enabled }
            }
            CommandKind::GetAllBinds => Request::GetAllBinds,
            CommandKind::GetGestureByName => Request::GetGestureByName {
                name: string_payload(kind, payload)?,
            },
            CommandKind::GetCustomizableState => Request::GetCustomizableState {
                name: string_payload(kind, payload)?,
            },
            CommandKind::SaveGesture => Request::SaveGesture(save_payload(payload, &object)?),
            CommandKind::SetCamera => Request::SetCamera {
                name: string_payload(kind, payload)?,
            },
            CommandKind::GetCamera => Request::GetCamera,
            CommandKind::ListCameras => Request::ListCameras,
            CommandKind::GetFrame => Request::GetFrame,
            CommandKind::ReloadGestures => Request::ReloadGestures,
        };

        Ok(request)
    }

    /// Which command this request invokes.
    pub fn kind(&self) -> CommandKind {
        match self {
            Request::Ping => CommandKind::Ping,
            Request::StartDetection => CommandKind::StartDetection,
            Request::StopDetection => CommandKind::StopDetection,
            Request::SetCropHandMode { .. } => CommandKind::SetCropHandMode,
            Request::GetAllBinds => CommandKind::GetAllBinds,
            Request::GetGestureByName { .. } => CommandKind::GetGestureByName,
            Request::GetCustomizableState { .. } => CommandKind::GetCustomizableState,
            Request::SaveGesture(_) => CommandKind::SaveGesture,
            Request::SetCamera { .. } => CommandKind::SetCamera,
            Request::GetCamera => CommandKind::GetCamera,
            Request::ListCameras => CommandKind::ListCameras,
            Request::GetFrame => CommandKind::GetFrame,
            Request::ReloadGestures => CommandKind::ReloadGestures,
        }
    }
}

#[track_caller]
fn string_payload(kind: CommandKind, payload: Value) -> Result<String, DecodeError> {
    match payload {
        Value::String(s) => Ok(s),
        other => Err(DecodeError::InvalidPayload {
            command: kind.wire_name(),
            reason: format!("expected a string, got {other}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

#[track_caller]
fn save_payload(payload: Value, rest: &Map<String, Value>) -> Result<SaveGesture, DecodeError> {
    let parsed: SaveGesturePayload =
        serde_json::from_value(payload).map_err(|e| DecodeError::InvalidPayload {
            command: CommandKind::SaveGesture.wire_name(),
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let overwrite = parsed
        .sobreescrever
        .or_else(|| rest.get(OVERWRITE_KEY).and_then(Value::as_bool))
        .unwrap_or(true);

    Ok(SaveGesture {
        name: parsed.nome,
        key: parsed.bind,
        mode: BindMode::from_toggle(parsed.modo_toggle),
        hold_duration_ms: parsed.tempo_pressionado,
        overwrite,
    })
}
