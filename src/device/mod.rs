//! Device layer — exclusive hardware handles and the camera/microphone seams.
//!
//! # Architecture
//!
//! ```text
//! DeviceRegistry ──acquire(kind)──▶ DeviceHandle (RAII, at most one per kind)
//!
//! CameraDevice (trait) ──open()──▶ CameraStream ──read_frame()──▶ Frame
//! MicrophoneDevice (trait) ──start(tx)──▶ MicStream (RAII)
//!                                     └──▶ AudioChunk over the channel
//! ```
//!
//! The registry enforces the session invariant that no two components ever
//! hold the same physical device concurrently; the traits are the seams that
//! let the capture services run against mock hardware in tests.

pub mod camera;
pub mod microphone;
pub mod registry;

pub use camera::{CameraDevice, CameraStream, Frame, FrameFormat};
pub use microphone::{AudioChunk, MicStream, MicrophoneDevice};
pub use registry::{DeviceError, DeviceHandle, DeviceKind, DeviceRegistry};

#[cfg(target_os = "linux")]
pub use camera::V4lCamera;
pub use microphone::CpalMicrophone;
