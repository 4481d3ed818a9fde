//! Capture services — timed image capture and windowed audio recording.
//!
//! # Pipeline
//!
//! ```text
//! ImageCaptureService: acquire camera → stabilise → one frame → JPEG → release
//! AudioCaptureService: acquire mic → chunks → 16 kHz mono → WAV → release
//!                                       └─▶ optional listener (transcription)
//! ```
//!
//! Both services take their exclusive [`DeviceHandle`] from the shared
//! [`DeviceRegistry`] and release it on every exit path.
//!
//! [`DeviceHandle`]: crate::device::DeviceHandle
//! [`DeviceRegistry`]: crate::device::DeviceRegistry

pub mod audio;
pub mod image;
pub mod pcm;
pub mod timer;

use thiserror::Error;

use crate::device::DeviceError;

pub use audio::{AudioCaptureService, AudioRecorder, EncodedAudio};
pub use image::{EncodedImage, ImageCaptureService};
pub use timer::{CaptureTimer, TimerOutcome};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors from the image and audio capture services.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Acquisition failed — permission denied, hardware busy or missing.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(#[from] DeviceError),

    /// The captured frame or recording could not be serialised.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// The session was torn down while the capture was in flight. Never
    /// shown to the user; the orchestrator swallows it during teardown.
    #[error("capture cancelled")]
    Cancelled,

    /// Internal failure (e.g. a joined task panicked).
    #[error("internal capture error: {0}")]
    Internal(String),
}
