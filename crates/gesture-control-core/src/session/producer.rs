use crate::{
    camera::{CaptureSource, Frame},
    session::DetectionEvent,
};

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc,
    },
    thread::JoinHandle,
    time::Duration,
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Capture failures in a row before the producer gives up on the device.
pub(crate) const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Pause after a failed capture before retrying (about one frame at 30 fps).
const FAILURE_BACKOFF: Duration = Duration::from_millis(33);

/// State shared between one session's producer thread and the command loop.
///
/// A fresh instance is created for every session, so nothing written during a
/// previous session can be observed by a later one.
pub(crate) struct ProducerState {
    latest: Mutex<Option<Frame>>,
    crop_hand: AtomicBool,
    /// Set under the `latest` lock; the producer checks it under the same
    /// lock before every write.
    shutdown: AtomicBool,
}

impl ProducerState {
    pub(crate) fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            crop_hand: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Store `frame` as the latest one. Returns `false` once shut down.
    pub(crate) fn publish(&self, frame: Frame) -> bool {
        let mut slot = self.slot();
        if self.shutdown.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(frame);
        true
    }

    pub(crate) fn latest(&self) -> Option<Frame> {
        self.slot().clone()
    }

    /// Stop accepting frames and discard the current one. Returns `true` for
    /// the call that closed the slot.
    pub(crate) fn shut_down(&self) -> bool {
        let mut slot = self.slot();
        let was_open = !self.shutdown.swap(true, Ordering::AcqRel);
        *slot = None;
        was_open
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn crop_hand(&self) -> bool {
        self.crop_hand.load(Ordering::Acquire)
    }

    pub(crate) fn set_crop_hand(&self, enabled: bool) {
        self.crop_hand.store(enabled, Ordering::Release);
    }

    fn slot(&self) -> MutexGuard<'_, Option<Frame>> {
        // The slot only ever holds a whole frame, so a poisoned lock still
        // guards valid data.
        self.latest.lock().unwrap_or_else(|e| {
            error!("Frame slot lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }
}

/// Handle to a running producer thread.
pub(crate) struct ProducerHandle {
    pub(crate) thread: JoinHandle<()>,
    /// Disconnects when the thread exits.
    pub(crate) done: std_mpsc::Receiver<()>,
}

/// Start the producer loop on its own OS thread.
pub(crate) fn spawn(
    session_id: Uuid,
    mut source: Box<dyn CaptureSource>,
    state: Arc<ProducerState>,
    events: mpsc::Sender<DetectionEvent>,
) -> std::io::Result<ProducerHandle> {
    let (done_tx, done_rx) = std_mpsc::channel::<()>();

    let thread = std::thread::Builder::new()
        .name(format!("gesture-producer-{session_id}"))
        .spawn(move || {
            // Dropped when this closure returns, which wakes up `stop()`.
            let _done = done_tx;
            let mut last_gesture: Option<String> = None;
            let mut failures = 0u32;

            info!(session_id = %session_id, "Frame producer started");

            while !state.is_shut_down() {
                match source.next_detection(state.crop_hand()) {
                    Ok(detection) => {
                        failures = 0;

                        if !state.publish(detection.frame) {
                            break;
                        }

                        if detection.gesture != last_gesture {
                            if let Some(gesture) = &detection.gesture {
                                emit(
                                    &events,
                                    DetectionEvent::GestureDetected {
                                        session_id,
                                        gesture: gesture.clone(),
                                    },
                                );
                            }
                            last_gesture = detection.gesture;
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(session_id = %session_id, failures, error = %e, "Capture failed");

                        if failures >= MAX_CONSECUTIVE_FAILURES {
                            error!(session_id = %session_id, "Too many capture failures, producer exiting");
                            if state.shut_down() {
                                emit(&events, DetectionEvent::SessionEnded { session_id });
                            }
                            break;
                        }

                        std::thread::sleep(FAILURE_BACKOFF);
                    }
                }
            }

            drop(source);
            info!(session_id = %session_id, "Frame producer stopped");
        })?;

    Ok(ProducerHandle {
        thread,
        done: done_rx,
    })
}

/// Non-blocking send; a slow consumer loses events instead of stalling capture.
pub(crate) fn emit(events: &mpsc::Sender<DetectionEvent>, event: DetectionEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => warn!(?event, "Detection event channel full, dropping"),
        Err(TrySendError::Closed(_)) => debug!("Detection event channel closed"),
    }
}
