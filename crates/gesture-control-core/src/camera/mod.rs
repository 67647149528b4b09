//! Contracts for the external camera and gesture detector.
//!
//! The session engine never touches capture hardware or the classification
//! model directly. A [`CameraBackend`] enumerates devices and opens a
//! [`CaptureSource`], which the session's producer thread then polls for
//! [`Detection`]s.

use crate::CoreResult;

use std::sync::Arc;

use serde::Serialize;

/// One encoded camera frame (JPEG bytes).
///
/// Cloning is cheap; readers always see a complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    jpeg: Arc<[u8]>,
}

impl Frame {
    /// Wrap already-encoded JPEG bytes.
    pub fn from_jpeg(bytes: Vec<u8>) -> Self {
        Self {
            jpeg: Arc::from(bytes),
        }
    }

    /// The encoded image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.jpeg
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    /// Whether the frame carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

/// A capture device the backend can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraDescriptor {
    /// Backend-specific device index.
    pub index: u32,
    /// Human-readable device name, also used to select the device.
    pub name: String,
}

/// Output of one capture + classification step.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The frame that was analysed (already cropped when crop-hand mode is on).
    pub frame: Frame,
    /// Name of the gesture recognised in this frame, if any.
    pub gesture: Option<String>,
}

/// Device enumeration and opening.
pub trait CameraBackend: Send + Sync + 'static {
    /// Available devices in backend order.
    fn list_cameras(&self) -> CoreResult<Vec<CameraDescriptor>>;

    /// Open `camera` by name, or the default device when `None`.
    ///
    /// Fails with [`crate::CoreError::CameraUnavailable`] if nothing can be opened.
    fn open(&self, camera: Option<&str>) -> CoreResult<Box<dyn CaptureSource>>;
}

/// An opened camera feeding the gesture detector.
///
/// Dropping the source releases the device.
pub trait CaptureSource: Send + 'static {
    /// Block until the next frame is captured and classified.
    fn next_detection(&mut self, crop_hand: bool) -> CoreResult<Detection>;
}
