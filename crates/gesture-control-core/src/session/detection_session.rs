use crate::{
    CoreError, CoreResult,
    camera::{CameraBackend, CameraDescriptor, Frame},
    session::{
        DetectionEvent,
        producer::{self, ProducerHandle, ProducerState},
    },
};

use std::{
    mem,
    panic::Location,
    sync::{Arc, Mutex, MutexGuard, mpsc::RecvTimeoutError},
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Result of [`DetectionSession::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was created.
    Started {
        /// Id of the new session.
        session_id: Uuid,
    },
    /// A session was already running and was reused.
    AlreadyActive {
        /// Id of the running session.
        session_id: Uuid,
    },
}

impl StartOutcome {
    /// Id of the session that is active after the call.
    pub fn session_id(self) -> Uuid {
        match self {
            StartOutcome::Started { session_id } | StartOutcome::AlreadyActive { session_id } => {
                session_id
            }
        }
    }
}

/// What a frame read observed, taken in one consistent look at the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameState {
    /// No session is running.
    NoSession,
    /// A session is running but has not produced a frame yet.
    Pending,
    /// Latest frame of the running session.
    Ready(Frame),
}

struct ActiveSession {
    id: Uuid,
    state: Arc<ProducerState>,
    producer: ProducerHandle,
}

impl ActiveSession {
    /// A session whose producer gave up or died counts as stopped.
    fn is_live(&self) -> bool {
        !self.state.is_shut_down() && !self.producer.thread.is_finished()
    }
}

enum SessionState {
    Stopped,
    /// The camera is being opened for the session with this id.
    Starting {
        session_id: Uuid,
    },
    Active(ActiveSession),
}

/// Lifecycle of the single camera + detector run.
///
/// States are Stopped, Starting (camera open in progress) and Active. The
/// state lock is only held for transitions and reads, never across a device
/// open or a producer join, so readers are never stuck behind a slow camera.
///
/// # Thread Safety
///
/// All methods take `&self` and may be called from any thread. `start` and
/// `stop` block (device open, producer join) and belong on a blocking pool
/// when called from async code. The read methods return immediately.
pub struct DetectionSession {
    backend: Arc<dyn CameraBackend>,
    events: mpsc::Sender<DetectionEvent>,
    stop_timeout: Duration,
    state: Mutex<SessionState>,
}

impl DetectionSession {
    /// Create a stopped session that will open cameras through `backend` and
    /// report gestures on `events`.
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        events: mpsc::Sender<DetectionEvent>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            events,
            stop_timeout,
            state: Mutex::new(SessionState::Stopped),
        }
    }

    /// Open the camera and start producing frames.
    ///
    /// Starting while Active is a no-op that reports the existing session. A
    /// session whose producer has exited is replaced by a new one.
    ///
    /// # Errors
    ///
    /// See [`DetectionSession::start_as`].
    #[track_caller]
    pub fn start(&self, camera: Option<&str>) -> CoreResult<StartOutcome> {
        self.start_as(Uuid::new_v4(), camera)
    }

    /// [`DetectionSession::start`] with the id the new session will carry.
    ///
    /// A caller that stops waiting can cancel the start with
    /// [`DetectionSession::abandon_start`] using the same id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::CameraUnavailable`] if the backend cannot open a device
    ///   or the producer thread cannot be spawned.
    /// - [`CoreError::OperationFailed`] if another start is in progress, or
    ///   this one was abandoned or stopped while the camera was opening.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn start_as(&self, session_id: Uuid, camera: Option<&str>) -> CoreResult<StartOutcome> {
        let location = Location::caller();

        let exited = {
            let mut state = self.lock();
            match &*state {
                SessionState::Active(session) if session.is_live() => {
                    debug!(session_id = %session.id, "Detection already active, reusing session");
                    return Ok(StartOutcome::AlreadyActive {
                        session_id: session.id,
                    });
                }
                SessionState::Starting { .. } => {
                    return Err(CoreError::OperationFailed {
                        operation: "start detection",
                        reason: "another start is in progress".to_string(),
                        location: ErrorLocation::from(location),
                    });
                }
                SessionState::Active(_) | SessionState::Stopped => {}
            }

            match mem::replace(&mut *state, SessionState::Starting { session_id }) {
                SessionState::Active(session) => Some(session),
                _ => None,
            }
        };

        if let Some(session) = exited {
            warn!(session_id = %session.id, "Frame producer had exited, replacing session");
            if let Err(e) = self.teardown(session) {
                warn!(error = ?e, "Exited session did not shut down cleanly");
            }
        }

        let session = match self.open_session(session_id, camera, location) {
            Ok(session) => session,
            Err(e) => {
                let mut state = self.lock();
                if matches!(&*state, SessionState::Starting { session_id: id } if *id == session_id)
                {
                    *state = SessionState::Stopped;
                }
                return Err(e);
            }
        };

        {
            let mut state = self.lock();
            if matches!(&*state, SessionState::Starting { session_id: id } if *id == session_id) {
                *state = SessionState::Active(session);
                info!(session_id = %session_id, camera = ?camera, "Detection session started");
                return Ok(StartOutcome::Started { session_id });
            }
        }

        warn!(session_id = %session_id, "Start was cancelled while the camera opened, discarding");
        if let Err(e) = self.teardown(session) {
            warn!(error = ?e, "Cancelled session did not shut down cleanly");
        }

        Err(CoreError::OperationFailed {
            operation: "start detection",
            reason: "start was cancelled".to_string(),
            location: ErrorLocation::from(location),
        })
    }

    /// Cancel the start that was given `session_id`.
    ///
    /// If the camera is still opening, the start will discard it when the
    /// open returns. If the start already completed, that session is stopped.
    /// Any other session is left alone. Returns whether a running session was
    /// stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProducerStopTimeout`] as [`DetectionSession::stop`]
    /// does.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn abandon_start(&self, session_id: Uuid) -> CoreResult<bool> {
        let session = {
            let mut state = self.lock();
            let pending =
                matches!(&*state, SessionState::Starting { session_id: id } if *id == session_id);
            let running = matches!(&*state, SessionState::Active(s) if s.id == session_id);

            if pending {
                *state = SessionState::Stopped;
                info!(session_id = %session_id, "Pending start abandoned");
                return Ok(false);
            }
            if !running {
                return Ok(false);
            }

            match mem::replace(&mut *state, SessionState::Stopped) {
                SessionState::Active(session) => session,
                _ => return Ok(false),
            }
        };

        info!(session_id = %session_id, "Late start completed, stopping it");
        self.teardown(session)?;

        Ok(true)
    }

    /// Stop the producer, release the camera and discard session state.
    ///
    /// Returns `Ok(false)` if nothing was running. A start still opening the
    /// camera is cancelled. The frame slot is closed before waiting, so no
    /// frame is written after this returns even if the producer is slow to
    /// exit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProducerStopTimeout`] if the producer thread did
    /// not exit in time. The session is Stopped regardless.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn stop(&self) -> CoreResult<bool> {
        let session = match mem::replace(&mut *self.lock(), SessionState::Stopped) {
            SessionState::Active(session) => session,
            SessionState::Starting { session_id } => {
                info!(session_id = %session_id, "Stop cancelled a pending start");
                return Ok(false);
            }
            SessionState::Stopped => {
                debug!("Stop requested with no active session");
                return Ok(false);
            }
        };

        let was_live = session.is_live();
        self.teardown(session)?;

        Ok(was_live)
    }

    /// Turn crop-hand mode on or off for the running session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveSession`] while Stopped.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn set_crop_hand_mode(&self, enabled: bool) -> CoreResult<()> {
        let state = self.lock();

        let session = live(&state).ok_or_else(|| CoreError::NoActiveSession {
            location: ErrorLocation::from(Location::caller()),
        })?;

        session.state.set_crop_hand(enabled);

        info!(session_id = %session.id, enabled, "Crop-hand mode updated");

        Ok(())
    }

    /// Current crop-hand flag, or `None` while Stopped.
    pub fn crop_hand_mode(&self) -> Option<bool> {
        live(&self.lock()).map(|s| s.state.crop_hand())
    }

    /// Whether a session is running and whether it has a frame yet.
    ///
    /// Never returns a frame from an earlier session.
    pub fn frame_state(&self) -> FrameState {
        let state = self.lock();
        match live(&state) {
            None => FrameState::NoSession,
            Some(session) => match session.state.latest() {
                Some(frame) => FrameState::Ready(frame),
                None => FrameState::Pending,
            },
        }
    }

    /// Latest frame of the running session.
    ///
    /// `None` while Stopped or before the first frame arrives.
    pub fn snapshot(&self) -> Option<Frame> {
        match self.frame_state() {
            FrameState::Ready(frame) => Some(frame),
            FrameState::NoSession | FrameState::Pending => None,
        }
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        live(&self.lock()).is_some()
    }

    /// Id of the running session.
    pub fn session_id(&self) -> Option<Uuid> {
        live(&self.lock()).map(|s| s.id)
    }

    /// Devices the backend can open.
    ///
    /// # Errors
    ///
    /// Propagates the backend's error; callers turn it into a response.
    #[instrument(skip(self))]
    pub fn list_cameras(&self) -> CoreResult<Vec<CameraDescriptor>> {
        let cameras = self.backend.list_cameras()?;
        debug!(camera_count = cameras.len(), "Cameras listed");
        Ok(cameras)
    }

    fn open_session(
        &self,
        session_id: Uuid,
        camera: Option<&str>,
        location: &'static Location<'static>,
    ) -> CoreResult<ActiveSession> {
        let source = self.backend.open(camera)?;
        let state = Arc::new(ProducerState::new());

        let producer = producer::spawn(
            session_id,
            source,
            Arc::clone(&state),
            self.events.clone(),
        )
        .map_err(|e| CoreError::CameraUnavailable {
            reason: format!("Failed to spawn frame producer: {}", e),
            location: ErrorLocation::from(location),
        })?;

        Ok(ActiveSession {
            id: session_id,
            state,
            producer,
        })
    }

    /// Shut down a session that is no longer reachable from `state`.
    ///
    /// `SessionEnded` is emitted exactly once per session, by whichever of the
    /// producer or this call closes the slot first.
    #[track_caller]
    fn teardown(&self, session: ActiveSession) -> CoreResult<()> {
        let closed_here = session.state.shut_down();

        let timed_out = match session.producer.done.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if session.producer.thread.join().is_err() {
                    error!(session_id = %session.id, "Frame producer panicked");
                }
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    session_id = %session.id,
                    timeout_ms = self.stop_timeout.as_millis(),
                    "Frame producer did not stop in time, detaching"
                );
                true
            }
        };

        if closed_here {
            producer::emit(
                &self.events,
                DetectionEvent::SessionEnded {
                    session_id: session.id,
                },
            );
        }

        info!(session_id = %session.id, "Detection session stopped");

        if timed_out {
            return Err(CoreError::ProducerStopTimeout {
                timeout_ms: u64::try_from(self.stop_timeout.as_millis()).unwrap_or(u64::MAX),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| {
            error!("Session lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}

fn live(state: &SessionState) -> Option<&ActiveSession> {
    match state {
        SessionState::Active(session) if session.is_live() => Some(session),
        _ => None,
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = ?e, "Failed to stop detection session on drop");
        }
    }
}
