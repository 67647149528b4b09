use crate::{
    PatternCameraBackend,
    pattern_camera::{PATTERN_CAMERA_NAME, encode_jpeg, render_pattern},
};

use gesture_control_core::{CameraBackend, CoreError};

use image::{GenericImageView, ImageFormat};

/// WHAT: The backend lists exactly one synthetic camera
/// WHY: getCamerasDisponiveis needs a non-empty list to be useful
#[test]
#[allow(clippy::unwrap_used)]
fn given_pattern_backend_when_listing_then_single_camera() {
    // Given
    let backend = PatternCameraBackend;

    // When
    let cameras = backend.list_cameras().unwrap();

    // Then
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].name, PATTERN_CAMERA_NAME);
}

/// WHAT: Opening an unknown camera fails with CameraUnavailable
/// WHY: A stale selection must surface as a start error
#[test]
fn given_unknown_camera_when_opening_then_camera_unavailable() {
    // Given
    let backend = PatternCameraBackend;

    // When
    let result = backend.open(Some("USB Camera"));

    // Then
    assert!(matches!(result, Err(CoreError::CameraUnavailable { .. })));
}

/// WHAT: Captured frames are JPEG; crop mode yields the centre half
/// WHY: Clients render frames directly as JPEG images
#[test]
#[allow(clippy::unwrap_used)]
fn given_pattern_source_when_capturing_then_jpeg_frames_and_crop_halves_size() {
    // Given
    let backend = PatternCameraBackend;
    let mut source = backend.open(None).unwrap();

    // When
    let full = source.next_detection(false).unwrap();
    let cropped = source.next_detection(true).unwrap();

    // Then
    let full_image =
        image::load_from_memory_with_format(full.frame.as_bytes(), ImageFormat::Jpeg).unwrap();
    let cropped_image =
        image::load_from_memory_with_format(cropped.frame.as_bytes(), ImageFormat::Jpeg).unwrap();
    assert_eq!(full_image.dimensions(), (320, 240));
    assert_eq!(cropped_image.dimensions(), (160, 120));
    assert!(full.gesture.is_none());
    assert!(cropped.gesture.is_none());
}

/// WHAT: The pattern moves between ticks
/// WHY: A static frame would hide a stalled producer
#[test]
#[allow(clippy::unwrap_used)]
fn given_consecutive_ticks_when_rendering_then_frames_differ() {
    // Given/When
    let first = encode_jpeg(&render_pattern(1)).unwrap();
    let second = encode_jpeg(&render_pattern(2)).unwrap();

    // Then
    assert_ne!(first, second);
    assert_eq!(&first[..2], &[0xFF, 0xD8]);
}
