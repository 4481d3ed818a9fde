//! Image capture service — acquire, stabilise, grab one frame, encode,
//! release.
//!
//! [`ImageCaptureService::capture`] owns the camera [`DeviceHandle`] for the
//! whole operation and releases it on every exit path: success, device
//! failure, encoding failure, or session cancellation. The stabilisation
//! timer starts only once the camera is open, so the delay is never eaten
//! by a slow acquisition.
//!
//! [`DeviceHandle`]: crate::device::DeviceHandle

use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};
use tokio_util::sync::CancellationToken;

use crate::capture::timer::{CaptureTimer, TimerOutcome};
use crate::capture::CaptureError;
use crate::device::{CameraDevice, DeviceKind, DeviceRegistry, Frame, FrameFormat};

// ---------------------------------------------------------------------------
// EncodedImage
// ---------------------------------------------------------------------------

/// One captured still frame, JPEG-encoded and ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// ImageCaptureService
// ---------------------------------------------------------------------------

/// Captures exactly one encoded frame per call.
pub struct ImageCaptureService {
    registry: DeviceRegistry,
    camera: Arc<dyn CameraDevice>,
    /// Delay between acquisition and the frame grab.
    stabilize: Duration,
}

impl ImageCaptureService {
    pub fn new(
        registry: DeviceRegistry,
        camera: Arc<dyn CameraDevice>,
        stabilize: Duration,
    ) -> Self {
        Self {
            registry,
            camera,
            stabilize,
        }
    }

    /// Acquire the camera, wait the stabilisation delay, grab and encode one
    /// frame, and release the camera.
    ///
    /// # Errors
    ///
    /// * [`CaptureError::DeviceUnavailable`] — acquisition or open failed.
    /// * [`CaptureError::EncodingFailed`] — the frame grab or JPEG encode
    ///   failed after acquisition succeeded.
    /// * [`CaptureError::Cancelled`] — `cancel` fired mid-capture.
    pub async fn capture(&self, cancel: &CancellationToken) -> Result<EncodedImage, CaptureError> {
        // Holding `handle` for the full scope releases the camera on every
        // return below, including early `?` exits.
        let handle = self.registry.acquire(DeviceKind::Camera)?;

        let camera = Arc::clone(&self.camera);
        let open = tokio::task::spawn_blocking(move || camera.open());
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
            joined = open => joined.map_err(|e| CaptureError::Internal(e.to_string()))??,
        };

        // Stabilisation window; the subject gets time to be ready.
        let timer = CaptureTimer::start_linked(self.stabilize, cancel.clone());
        if timer.wait().await == TimerOutcome::Cancelled {
            return Err(CaptureError::Cancelled);
        }

        let frame_task = tokio::task::spawn_blocking(move || {
            let mut stream = stream;
            let frame = stream.read_frame();
            // `stream` drops here, closing the device node.
            frame
        });
        let frame = frame_task
            .await
            .map_err(|e| CaptureError::Internal(e.to_string()))?
            .map_err(|e| CaptureError::EncodingFailed(format!("frame grab failed: {e}")))?;

        let encoded = encode_jpeg(frame)?;
        log::debug!(
            "image capture: {}x{} frame, {} bytes jpeg",
            encoded.width,
            encoded.height,
            encoded.jpeg.len()
        );

        handle.release();
        Ok(encoded)
    }
}

// ---------------------------------------------------------------------------
// JPEG encoding
// ---------------------------------------------------------------------------

fn encode_jpeg(frame: Frame) -> Result<EncodedImage, CaptureError> {
    match frame.format {
        FrameFormat::Jpeg => {
            if frame.data.is_empty() {
                return Err(CaptureError::EncodingFailed("empty MJPEG frame".into()));
            }
            Ok(EncodedImage {
                jpeg: frame.data,
                width: frame.width,
                height: frame.height,
            })
        }
        FrameFormat::Rgb8 => {
            let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(frame.width, frame.height, frame.data).ok_or_else(|| {
                    CaptureError::EncodingFailed(format!(
                        "RGB frame size does not match {}x{}",
                        frame.width, frame.height
                    ))
                })?;

            let mut jpeg = Vec::new();
            JpegEncoder::new(&mut jpeg)
                .encode_image(&buffer)
                .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;

            Ok(EncodedImage {
                jpeg,
                width: frame.width,
                height: frame.height,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::camera::MockCamera;

    fn service(camera: MockCamera) -> (ImageCaptureService, DeviceRegistry) {
        let registry = DeviceRegistry::new();
        let service = ImageCaptureService::new(
            registry.clone(),
            Arc::new(camera),
            Duration::from_secs(3),
        );
        (service, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn capture_encodes_frame_and_releases_camera() {
        let (service, registry) = service(MockCamera::frame(8, 8));
        let cancel = CancellationToken::new();

        let image = service.capture(&cancel).await.unwrap();
        assert!(!image.jpeg.is_empty());
        assert_eq!((image.width, image.height), (8, 8));

        assert_eq!(registry.open_count(DeviceKind::Camera), 0);
        assert_eq!(registry.acquired_total(DeviceKind::Camera), 1);
        assert_eq!(registry.released_total(DeviceKind::Camera), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_failure_is_device_unavailable_and_releases() {
        let (service, registry) = service(MockCamera::open_fails());
        let cancel = CancellationToken::new();

        let err = service.capture(&cancel).await.unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(registry.open_count(DeviceKind::Camera), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn frame_read_failure_is_encoding_failed_and_releases() {
        let (service, registry) = service(MockCamera::read_fails());
        let cancel = CancellationToken::new();

        let err = service.capture(&cancel).await.unwrap_err();
        assert!(matches!(err, CaptureError::EncodingFailed(_)));
        assert_eq!(registry.open_count(DeviceKind::Camera), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_capture_never_grabs_and_releases_camera() {
        let (service, registry) = service(MockCamera::frame(8, 8));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service.capture(&cancel).await.unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(registry.open_count(DeviceKind::Camera), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_camera_is_rejected() {
        let (service, registry) = service(MockCamera::frame(8, 8));
        let held = registry.acquire(DeviceKind::Camera).unwrap();
        let cancel = CancellationToken::new();

        let err = service.capture(&cancel).await.unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        drop(held);
    }

    #[test]
    fn rgb_frame_with_wrong_size_fails_encoding() {
        let frame = Frame {
            format: FrameFormat::Rgb8,
            width: 4,
            height: 4,
            data: vec![0u8; 5], // not 4*4*3
        };
        assert!(matches!(
            encode_jpeg(frame),
            Err(CaptureError::EncodingFailed(_))
        ));
    }
}
