//! Routes decoded requests to the bind store, gesture catalog and detection
//! session, and turns every outcome into exactly one [`Response`].

use crate::{
    CoreError, CoreResult,
    attributes::{AttributeStore, SELECTED_CAMERA_KEY},
    binds::{BindMode, BindStore},
    catalog::{GestureMetadata, GestureRegistry},
    protocol::{GestureView, Request, Response, SaveGesture, WireBind},
    session::{DetectionSession, FrameState, StartOutcome},
};

use std::{panic::Location, sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use error_location::ErrorLocation;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

/// Protocol core. Holds the process-wide dependencies explicitly.
///
/// Requests are handled one at a time in the order the transport delivers
/// them; the dispatcher itself never retries or reorders.
pub struct CommandDispatcher {
    binds: Arc<BindStore>,
    gestures: Arc<GestureRegistry>,
    session: Arc<DetectionSession>,
    config: Arc<dyn AttributeStore>,
    operation_timeout: Duration,
}

impl CommandDispatcher {
    /// Wire the dispatcher to its collaborators.
    ///
    /// `operation_timeout` bounds blocking session and storage operations.
    pub fn new(
        binds: Arc<BindStore>,
        gestures: Arc<GestureRegistry>,
        session: Arc<DetectionSession>,
        config: Arc<dyn AttributeStore>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            binds,
            gestures,
            session,
            config,
            operation_timeout,
        }
    }

    /// Decode `text` and execute it. Decode failures become error responses.
    pub async fn handle_text(&self, text: &str) -> Response {
        match Request::decode(text) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "Rejected undecodable request");
                Response::error(e.client_message())
            }
        }
    }

    /// Execute one request. Errors are converted into error responses here.
    #[instrument(skip(self, request), fields(command = request.kind().wire_name()))]
    pub async fn dispatch(&self, request: Request) -> Response {
        let kind = request.kind();

        match self.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(command = kind.wire_name(), error = %e, "Command failed");
                Response::error(e.client_message())
            }
        }
    }

    async fn execute(&self, request: Request) -> CoreResult<Response> {
        match request {
            Request::Ping => {
                trace!("Ping");
                Ok(Response::pong())
            }
            Request::StartDetection => self.start_detection().await,
            Request::StopDetection => self.stop_detection().await,
            Request::SetCropHandMode { enabled } => {
                self.session.set_crop_hand_mode(enabled)?;
                let message = if enabled {
                    "Crop-hand mode enabled."
                } else {
                    "Crop-hand mode disabled."
                };
                Ok(Response::success(message))
            }
            Request::GetAllBinds => {
                let all_binds = self
                    .binds
                    .all()
                    .iter()
                    .map(|(name, bind)| (name.clone(), WireBind::from(bind)))
                    .collect();
                debug!("Returning all binds");
                Ok(Response::AllBinds { all_binds })
            }
            Request::GetGestureByName { name } => self.gesture_by_name(name),
            Request::GetCustomizableState { name } => {
                let customizable_state = self.binds.is_customizable(&name);
                debug!(gesture = %name, customizable_state, "Returning customizable state");
                Ok(Response::CustomizableState { customizable_state })
            }
            Request::SaveGesture(save) => self.save_gesture(save).await,
            Request::SetCamera { name } => {
                self.config.update_attribute(SELECTED_CAMERA_KEY, &name)?;
                info!(camera = %name, "Selected camera updated");
                Ok(Response::success(format!("Camera '{name}' selected.")))
            }
            Request::GetCamera => {
                let camera_selecionada = self.config.read_attribute(SELECTED_CAMERA_KEY)?;
                debug!(camera = ?camera_selecionada, "Returning selected camera");
                Ok(Response::SelectedCamera { camera_selecionada })
            }
            Request::ListCameras => self.list_cameras().await,
            Request::GetFrame => self.frame(),
            Request::ReloadGestures => {
                let gestures = Arc::clone(&self.gestures);
                let count = run_to_completion("reload gestures", move || gestures.reload()).await?;
                Ok(Response::success(format!(
                    "Gesture catalog reloaded: {count} gestures."
                )))
            }
        }
    }

    /// A start that fails here, including by timeout, is abandoned so the
    /// session never ends up Active behind an error reply.
    async fn start_detection(&self) -> CoreResult<Response> {
        let camera = self.config.read_attribute(SELECTED_CAMERA_KEY)?;
        let session = Arc::clone(&self.session);
        let session_id = Uuid::new_v4();

        let started = self
            .run_blocking("start detection", move || {
                session.start_as(session_id, camera.as_deref())
            })
            .await;

        let outcome = match started {
            Ok(outcome) => outcome,
            Err(e) => {
                let session = Arc::clone(&self.session);
                let abandoned =
                    run_to_completion("abandon start", move || session.abandon_start(session_id));
                match abandoned.await {
                    Ok(true) => info!(session_id = %session_id, "Rolled back late start"),
                    Ok(false) => {}
                    Err(rollback) => warn!(error = ?rollback, "Failed to roll back start"),
                }
                return Err(e);
            }
        };

        let message = match outcome {
            StartOutcome::Started { .. } => "Detection started.",
            StartOutcome::AlreadyActive { .. } => "Detection already running.",
        };

        Ok(Response::success(message))
    }

    async fn stop_detection(&self) -> CoreResult<Response> {
        let session = Arc::clone(&self.session);

        let was_active = self
            .run_blocking("stop detection", move || session.stop())
            .await?;

        let message = if was_active {
            "Detection stopped."
        } else {
            "Detection was not running."
        };

        Ok(Response::success(message))
    }

    /// Catalog entry plus bind. Binds may reference gestures the catalog does
    /// not know; those are returned with empty metadata.
    fn gesture_by_name(&self, name: String) -> CoreResult<Response> {
        let catalog = self.gestures.snapshot();
        let bind = self.binds.get(&name).as_ref().map(WireBind::from);

        let metadata = match (catalog.lookup(&name), &bind) {
            (Ok(gesture), _) => gesture.metadata.clone(),
            (Err(_), Some(_)) => GestureMetadata::new(),
            (Err(e), None) => return Err(e),
        };

        debug!(gesture = %name, has_bind = bind.is_some(), "Returning gesture");

        Ok(Response::Gesture {
            gesto: GestureView {
                nome: name,
                metadata,
                bind,
            },
        })
    }

    async fn save_gesture(&self, save: SaveGesture) -> CoreResult<Response> {
        let binds = Arc::clone(&self.binds);
        let SaveGesture {
            name,
            key,
            mode,
            hold_duration_ms,
            overwrite,
        } = save;

        let saved_name = name.clone();
        let bind = run_to_completion("save gesture", move || {
            binds.save(&name, &key, hold_duration_ms, mode, overwrite)
        })
        .await?;

        let mode = match bind.mode {
            BindMode::Hold => "hold",
            BindMode::Toggle => "toggle",
        };

        Ok(Response::success(format!(
            "Gesture '{saved_name}' saved: bind {}; mode {mode}; hold {}ms; overwrite {overwrite}.",
            bind.key, bind.hold_duration_ms
        )))
    }

    async fn list_cameras(&self) -> CoreResult<Response> {
        let session = Arc::clone(&self.session);

        let cameras = self
            .run_blocking("list cameras", move || session.list_cameras())
            .await?;

        if cameras.is_empty() {
            return Err(CoreError::CameraUnavailable {
                reason: "no cameras found".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Response::Cameras {
            cameras_disponiveis: cameras.into_iter().map(|c| c.name).collect(),
        })
    }

    #[track_caller]
    fn frame(&self) -> CoreResult<Response> {
        match self.session.frame_state() {
            FrameState::Ready(frame) => {
                trace!(frame_bytes = frame.len(), "Returning frame");
                Ok(Response::Frame {
                    frame: BASE64.encode(frame.as_bytes()),
                })
            }
            FrameState::Pending => Ok(Response::frame_unavailable("frame not yet available")),
            FrameState::NoSession => Err(CoreError::NoActiveSession {
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Run a blocking operation on the blocking pool, bounded by the
    /// operation timeout. A timed-out operation keeps running in the
    /// background, so only operations that are read-only or can be rolled
    /// back go through here.
    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> CoreResult<T> + Send + 'static,
    {
        match tokio::time::timeout(self.operation_timeout, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(CoreError::OperationFailed {
                operation,
                reason: format!("worker task failed: {}", e),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(_) => Err(CoreError::OperationFailed {
                operation,
                reason: format!("timed out after {}ms", self.operation_timeout.as_millis()),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// Run a blocking operation and wait for it to finish, however long it takes.
/// Used for writes, so the reply always matches what was stored.
async fn run_to_completion<T, F>(operation: &'static str, f: F) -> CoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::OperationFailed {
            operation,
            reason: format!("worker task failed: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?
}
