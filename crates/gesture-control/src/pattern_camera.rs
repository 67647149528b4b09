//! Synthetic camera that renders a moving test pattern.
//!
//! Stands in for a physical capture device: it produces real JPEG frames at
//! a steady rate but never recognises a gesture.

use gesture_control_core::{
    CameraBackend, CameraDescriptor, CaptureSource, CoreError, CoreResult, Detection, Frame,
};

use std::{
    panic::Location,
    time::{Duration, Instant},
};

use error_location::ErrorLocation;
use image::{ImageBuffer, Rgb, RgbImage, codecs::jpeg::JpegEncoder, imageops};
use tracing::{debug, info};

/// Name of the single camera this backend exposes.
pub const PATTERN_CAMERA_NAME: &str = "Test Pattern";

const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 240;
const FRAME_INTERVAL: Duration = Duration::from_millis(66);
const JPEG_QUALITY: u8 = 75;

/// [`CameraBackend`] with one synthetic device.
#[derive(Debug, Default)]
pub struct PatternCameraBackend;

impl CameraBackend for PatternCameraBackend {
    fn list_cameras(&self) -> CoreResult<Vec<CameraDescriptor>> {
        Ok(vec![CameraDescriptor {
            index: 0,
            name: PATTERN_CAMERA_NAME.to_string(),
        }])
    }

    #[track_caller]
    fn open(&self, camera: Option<&str>) -> CoreResult<Box<dyn CaptureSource>> {
        match camera {
            None | Some(PATTERN_CAMERA_NAME) => {
                info!(camera = PATTERN_CAMERA_NAME, "Opening synthetic camera");
                Ok(Box::new(PatternSource::default()))
            }
            Some(other) => Err(CoreError::CameraUnavailable {
                reason: format!("unknown camera '{other}'"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

#[derive(Default)]
struct PatternSource {
    tick: u32,
    last_frame: Option<Instant>,
}

impl PatternSource {
    fn pace(&mut self) {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < FRAME_INTERVAL {
                std::thread::sleep(FRAME_INTERVAL - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }
}

impl CaptureSource for PatternSource {
    fn next_detection(&mut self, crop_hand: bool) -> CoreResult<Detection> {
        self.pace();
        self.tick = self.tick.wrapping_add(1);

        let image = render_pattern(self.tick);
        let image = if crop_hand {
            imageops::crop_imm(
                &image,
                FRAME_WIDTH / 4,
                FRAME_HEIGHT / 4,
                FRAME_WIDTH / 2,
                FRAME_HEIGHT / 2,
            )
            .to_image()
        } else {
            image
        };

        let jpeg = encode_jpeg(&image)?;
        debug!(tick = self.tick, crop_hand, jpeg_bytes = jpeg.len(), "Pattern frame rendered");

        Ok(Detection {
            frame: Frame::from_jpeg(jpeg),
            gesture: None,
        })
    }
}

/// Diagonal colour bands that scroll one pixel per tick.
pub(crate) fn render_pattern(tick: u32) -> RgbImage {
    ImageBuffer::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        let band = x.wrapping_add(y).wrapping_add(tick) % 256;
        Rgb([band as u8, (255 - band) as u8, ((x * 255) / FRAME_WIDTH) as u8])
    })
}

#[track_caller]
pub(crate) fn encode_jpeg(image: &RgbImage) -> CoreResult<Vec<u8>> {
    let mut jpeg = Vec::new();

    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgb8.into(),
        )
        .map_err(|e| CoreError::CameraUnavailable {
            reason: format!("jpeg encoding failed: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(jpeg)
}
