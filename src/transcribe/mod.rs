//! Live transcription — an incremental recognition stream over the
//! recording window.
//!
//! # Architecture
//!
//! ```text
//! AudioChunk feed ──▶ LiveTranscription worker ──▶ RecognitionEngine
//!                         │                            (whisper / null)
//!                         └─▶ transcript (replaced on every update)
//! ```
//!
//! The service consumes a copy of the recording's chunk stream, re-decodes
//! the accumulated window on every update and **replaces** the running
//! transcript rather than appending, so interim and final results never
//! duplicate fragments. A platform without a recognition engine degrades to
//! a silent no-op: the transcript is simply always empty.

pub mod engine;
pub mod live;

pub use engine::{NullRecognizer, RecognitionEngine, RecognitionError, WhisperRecognizer};
pub use live::LiveTranscription;
