//! Camera seam — [`CameraDevice`] / [`CameraStream`] traits and the V4L2
//! production implementation.
//!
//! The traits keep the capture service testable without hardware: a mock
//! camera yields a synthetic [`Frame`], the production [`V4lCamera`] reads
//! MJPEG frames from a `/dev/video*` node. Both `open` and `read_frame`
//! block and belong on `tokio::task::spawn_blocking`.

use super::registry::{DeviceError, DeviceKind};

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Pixel layout of a captured [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Already JPEG-compressed (what V4L2 MJPEG streams deliver).
    Jpeg,
    /// Packed 8-bit RGB, `width * height * 3` bytes.
    Rgb8,
}

/// A single still frame as delivered by a camera stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub format: FrameFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// CameraDevice / CameraStream traits
// ---------------------------------------------------------------------------

/// A camera that can be opened into a live stream.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn CameraDevice>`.
pub trait CameraDevice: Send + Sync {
    /// Open the camera. Blocking; run on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Unavailable`] when the device is missing or access is
    /// denied, [`DeviceError::Stream`] when stream negotiation fails.
    fn open(&self) -> Result<Box<dyn CameraStream>, DeviceError>;
}

/// An open camera stream. Dropping it closes the device.
pub trait CameraStream: Send {
    /// Read the next frame. Blocking; run on the blocking thread pool.
    fn read_frame(&mut self) -> Result<Frame, DeviceError>;
}

// `Debug` for the trait object so tests can call `unwrap_err()` on
// `Result<Box<dyn CameraStream>, _>`; the concrete streams carry no printable state.
#[cfg(test)]
impl std::fmt::Debug for dyn CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CameraStream")
    }
}

// ---------------------------------------------------------------------------
// V4lCamera  (Linux)
// ---------------------------------------------------------------------------

/// V4L2 webcam negotiated to MJPEG output.
///
/// ```rust,no_run
/// use emotion_capture::device::{CameraDevice, V4lCamera};
///
/// let camera = V4lCamera::new(None); // platform default /dev/video0
/// let mut stream = camera.open().unwrap();
/// let frame = stream.read_frame().unwrap();
/// println!("{}x{} ({} bytes)", frame.width, frame.height, frame.data.len());
/// ```
#[cfg(target_os = "linux")]
pub struct V4lCamera {
    path: String,
}

#[cfg(target_os = "linux")]
impl V4lCamera {
    const DEFAULT_PATH: &'static str = "/dev/video0";

    /// Create a camera for `path`, or the platform default when `None`.
    pub fn new(path: Option<String>) -> Self {
        Self {
            path: path.unwrap_or_else(|| Self::DEFAULT_PATH.to_string()),
        }
    }
}

#[cfg(target_os = "linux")]
impl CameraDevice for V4lCamera {
    fn open(&self) -> Result<Box<dyn CameraStream>, DeviceError> {
        use v4l::video::Capture;
        use v4l::FourCC;

        let device = v4l::Device::with_path(&self.path).map_err(|e| {
            DeviceError::Unavailable(DeviceKind::Camera, format!("{}: {e}", self.path))
        })?;

        // Ask the driver for MJPEG so the frame is already JPEG-compressed.
        let mut format = device
            .format()
            .map_err(|e| DeviceError::Stream(DeviceKind::Camera, e.to_string()))?;
        format.fourcc = FourCC::new(b"MJPG");
        let format = device
            .set_format(&format)
            .map_err(|e| DeviceError::Stream(DeviceKind::Camera, e.to_string()))?;

        if format.fourcc != FourCC::new(b"MJPG") {
            return Err(DeviceError::Stream(
                DeviceKind::Camera,
                format!("{} does not support MJPEG output", self.path),
            ));
        }

        log::debug!(
            "camera: opened {} at {}x{} MJPG",
            self.path,
            format.width,
            format.height
        );

        Ok(Box::new(V4lStream {
            device,
            width: format.width,
            height: format.height,
        }))
    }
}

#[cfg(target_os = "linux")]
struct V4lStream {
    device: v4l::Device,
    width: u32,
    height: u32,
}

#[cfg(target_os = "linux")]
impl CameraStream for V4lStream {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        use v4l::buffer::Type;
        use v4l::io::traits::CaptureStream;

        // The mmap stream borrows the device, so it lives only for this
        // read; one still frame is all the pipeline ever takes.
        let mut stream = v4l::io::mmap::Stream::new(&self.device, Type::VideoCapture)
            .map_err(|e| DeviceError::Stream(DeviceKind::Camera, e.to_string()))?;

        let (data, _meta) = stream
            .next()
            .map_err(|e| DeviceError::Stream(DeviceKind::Camera, e.to_string()))?;

        if data.is_empty() {
            return Err(DeviceError::Stream(
                DeviceKind::Camera,
                "driver returned an empty frame".into(),
            ));
        }

        Ok(Frame {
            format: FrameFormat::Jpeg,
            width: self.width,
            height: self.height,
            data: data.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockCamera  (test-only)
// ---------------------------------------------------------------------------

/// Test double producing a synthetic frame, a failed open, or a failed read.
#[cfg(test)]
pub struct MockCamera {
    behaviour: MockCameraBehaviour,
}

#[cfg(test)]
#[derive(Clone)]
pub enum MockCameraBehaviour {
    /// `open` succeeds, `read_frame` yields one solid-colour RGB frame.
    Frame { width: u32, height: u32 },
    /// `open` fails as if the device were missing or permission was denied.
    OpenFails,
    /// `open` succeeds, `read_frame` fails.
    ReadFails,
}

#[cfg(test)]
impl MockCamera {
    pub fn frame(width: u32, height: u32) -> Self {
        Self {
            behaviour: MockCameraBehaviour::Frame { width, height },
        }
    }

    pub fn open_fails() -> Self {
        Self {
            behaviour: MockCameraBehaviour::OpenFails,
        }
    }

    pub fn read_fails() -> Self {
        Self {
            behaviour: MockCameraBehaviour::ReadFails,
        }
    }
}

#[cfg(test)]
impl CameraDevice for MockCamera {
    fn open(&self) -> Result<Box<dyn CameraStream>, DeviceError> {
        match self.behaviour {
            MockCameraBehaviour::OpenFails => Err(DeviceError::Unavailable(
                DeviceKind::Camera,
                "mock camera denied".into(),
            )),
            ref behaviour => Ok(Box::new(MockCameraStream {
                behaviour: behaviour.clone(),
            })),
        }
    }
}

#[cfg(test)]
struct MockCameraStream {
    behaviour: MockCameraBehaviour,
}

#[cfg(test)]
impl CameraStream for MockCameraStream {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        match self.behaviour {
            MockCameraBehaviour::Frame { width, height } => Ok(Frame {
                format: FrameFormat::Rgb8,
                width,
                height,
                data: vec![0x7f; (width * height * 3) as usize],
            }),
            _ => Err(DeviceError::Stream(
                DeviceKind::Camera,
                "mock frame read failed".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_camera_yields_rgb_frame_of_requested_size() {
        let camera = MockCamera::frame(4, 2);
        let mut stream = camera.open().unwrap();
        let frame = stream.read_frame().unwrap();

        assert_eq!(frame.format, FrameFormat::Rgb8);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
    }

    #[test]
    fn mock_open_failure_is_unavailable() {
        let camera = MockCamera::open_fails();
        let err = camera.open().unwrap_err();
        assert!(matches!(err, DeviceError::Unavailable(DeviceKind::Camera, _)));
    }

    #[test]
    fn frame_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Frame>();
    }
}
