//! Multi-modal emotion capture pipeline.
//!
//! Captures a facial image and a spoken voice sample in a timed sequence,
//! submits both (plus a live transcript) to remote analysis services, and
//! merges the results into one empathetic chat response.
//!
//! # Modules
//!
//! * [`config`] — settings, defaults and TOML persistence.
//! * [`device`] — exclusive device handles and the camera/microphone seams.
//! * [`capture`] — the image and audio capture services.
//! * [`transcribe`] — live transcription over the recording window.
//! * [`analysis`] — the three remote analysis endpoints and the chat prompt.
//! * [`pipeline`] — the capture session state machine and its orchestrator.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use emotion_capture::analysis::HttpAnalysisClient;
//! use emotion_capture::capture::{AudioCaptureService, ImageCaptureService};
//! use emotion_capture::config::AppConfig;
//! use emotion_capture::device::{CpalMicrophone, DeviceRegistry};
//! use emotion_capture::pipeline::{new_shared_session, CaptureOrchestrator};
//! use emotion_capture::transcribe::{LiveTranscription, NullRecognizer};
//!
//! # #[cfg(target_os = "linux")]
//! # async fn example() {
//! # use emotion_capture::device::V4lCamera;
//! let config = AppConfig::default();
//! let registry = DeviceRegistry::new();
//! let session = new_shared_session();
//!
//! let orchestrator = CaptureOrchestrator::new(
//!     Arc::clone(&session),
//!     ImageCaptureService::new(
//!         registry.clone(),
//!         Arc::new(V4lCamera::new(None)),
//!         Duration::from_millis(config.capture.image_delay_ms),
//!     ),
//!     AudioCaptureService::new(
//!         registry.clone(),
//!         Arc::new(CpalMicrophone::new()),
//!         config.capture.sample_rate,
//!     ),
//!     LiveTranscription::new(Arc::new(NullRecognizer), 1.0),
//!     Arc::new(HttpAnalysisClient::from_config(&config.analysis)),
//!     Duration::from_millis(config.capture.record_window_ms),
//! );
//!
//! let (_commands, command_rx) = tokio::sync::mpsc::channel(8);
//! orchestrator.run(command_rx).await;
//! println!("{:?}", session.lock().unwrap().snapshot());
//! # }
//! ```

pub mod analysis;
pub mod capture;
pub mod config;
pub mod device;
pub mod pipeline;
pub mod transcribe;
