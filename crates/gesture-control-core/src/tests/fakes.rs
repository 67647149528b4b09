//! Test doubles for the camera collaborator and config accessor.

use crate::{
    AttributeStore, CameraBackend, CameraDescriptor, CaptureSource, CoreError, CoreResult,
    Detection, Frame, SELECTED_CAMERA_KEY,
};

use std::{
    collections::HashMap,
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use error_location::ErrorLocation;

/// How sources opened by [`FakeBackend`] behave.
#[derive(Debug, Clone)]
pub(crate) enum SourceBehaviour {
    /// Produce a frame every few milliseconds, reporting gestures from the
    /// script (the last entry repeats).
    Frames { gestures: Vec<Option<String>> },
    /// Block this long inside every capture call.
    Stall(Duration),
    /// Fail every capture.
    Failing,
    /// Produce this many frames, then fail every capture.
    FramesThenFailing(usize),
}

pub(crate) struct FakeBackend {
    cameras: Vec<CameraDescriptor>,
    behaviour: SourceBehaviour,
    fail_open: bool,
    open_delay: Duration,
    opens: AtomicUsize,
    opened_with: Mutex<Vec<Option<String>>>,
}

impl FakeBackend {
    pub(crate) fn new(behaviour: SourceBehaviour) -> Self {
        Self {
            cameras: vec![
                CameraDescriptor {
                    index: 0,
                    name: "Integrated Camera".to_string(),
                },
                CameraDescriptor {
                    index: 1,
                    name: "USB Camera".to_string(),
                },
            ],
            behaviour,
            fail_open: false,
            open_delay: Duration::ZERO,
            opens: AtomicUsize::new(0),
            opened_with: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn frames() -> Self {
        Self::new(SourceBehaviour::Frames {
            gestures: vec![None],
        })
    }

    pub(crate) fn unavailable() -> Self {
        let mut backend = Self::frames();
        backend.fail_open = true;
        backend
    }

    /// Every open blocks for `delay` before succeeding.
    pub(crate) fn slow_open(delay: Duration) -> Self {
        let mut backend = Self::frames();
        backend.open_delay = delay;
        backend
    }

    pub(crate) fn without_cameras() -> Self {
        let mut backend = Self::frames();
        backend.cameras.clear();
        backend
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    #[allow(clippy::unwrap_used)]
    pub(crate) fn opened_with(&self) -> Vec<Option<String>> {
        self.opened_with.lock().unwrap().clone()
    }
}

impl CameraBackend for FakeBackend {
    fn list_cameras(&self) -> CoreResult<Vec<CameraDescriptor>> {
        Ok(self.cameras.clone())
    }

    #[allow(clippy::unwrap_used)]
    fn open(&self, camera: Option<&str>) -> CoreResult<Box<dyn CaptureSource>> {
        std::thread::sleep(self.open_delay);

        if self.fail_open {
            return Err(CoreError::CameraUnavailable {
                reason: "device busy".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let generation = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        self.opened_with
            .lock()
            .unwrap()
            .push(camera.map(str::to_string));

        Ok(Box::new(FakeSource {
            generation,
            produced: 0,
            behaviour: self.behaviour.clone(),
        }))
    }
}

struct FakeSource {
    generation: usize,
    produced: usize,
    behaviour: SourceBehaviour,
}

impl CaptureSource for FakeSource {
    fn next_detection(&mut self, crop_hand: bool) -> CoreResult<Detection> {
        match &self.behaviour {
            SourceBehaviour::Frames { gestures } => {
                std::thread::sleep(Duration::from_millis(2));
                let gesture = gestures
                    .get(self.produced)
                    .or_else(|| gestures.last())
                    .cloned()
                    .flatten();
                self.produced += 1;

                Ok(Detection {
                    frame: frame_bytes(self.generation, crop_hand),
                    gesture,
                })
            }
            SourceBehaviour::Stall(duration) => {
                std::thread::sleep(*duration);
                Ok(Detection {
                    frame: frame_bytes(self.generation, crop_hand),
                    gesture: None,
                })
            }
            SourceBehaviour::FramesThenFailing(frames) if self.produced < *frames => {
                std::thread::sleep(Duration::from_millis(2));
                self.produced += 1;
                Ok(Detection {
                    frame: frame_bytes(self.generation, crop_hand),
                    gesture: None,
                })
            }
            SourceBehaviour::Failing | SourceBehaviour::FramesThenFailing(_) => {
                std::thread::sleep(Duration::from_millis(1));
                Err(CoreError::CameraUnavailable {
                    reason: "capture failed".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }
}

/// Frames encode the session generation and crop flag so tests can tell
/// which session produced them.
pub(crate) fn frame_bytes(generation: usize, crop_hand: bool) -> Frame {
    Frame::from_jpeg(format!("session-{generation}-crop-{crop_hand}").into_bytes())
}

/// In-memory stand-in for the persisted config.
#[derive(Default)]
pub(crate) struct MemoryAttributes {
    values: Mutex<HashMap<String, String>>,
}

impl AttributeStore for MemoryAttributes {
    #[allow(clippy::unwrap_used)]
    fn read_attribute(&self, key: &str) -> CoreResult<Option<String>> {
        check_key(key)?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    #[allow(clippy::unwrap_used)]
    fn update_attribute(&self, key: &str, value: &str) -> CoreResult<()> {
        check_key(key)?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn check_key(key: &str) -> CoreResult<()> {
    if key == SELECTED_CAMERA_KEY {
        Ok(())
    } else {
        Err(CoreError::UnknownAttribute {
            key: key.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub(crate) fn shared(backend: FakeBackend) -> Arc<FakeBackend> {
    Arc::new(backend)
}
