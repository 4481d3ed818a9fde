//! Pipeline — the capture session state machine and its orchestrator.
//!
//! # Stage flow
//!
//! ```text
//! Initial ──start──▶ Capturing ──frame + image analysis──▶ Recording
//!                        │                                     │ window / stop
//!                        │ failure (fatal)                     ▼
//!                        ▼                                 Analyzing
//!                    Initial  ◀────────────────┐              │ all calls resolved
//!                                              │              ▼
//!                         StartVoicePass ──────┴───────── Complete
//! ```
//!
//! The orchestrator is the **single writer** of the [`CaptureSession`]; the
//! capture services, transcription and analysis client only return values.
//! The consumer reads [`SessionSnapshot`]s and drives re-entrant voice
//! passes with [`SessionCommand`]s.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{CaptureOrchestrator, SessionCommand};
pub use state::{
    new_shared_session, CaptureSession, SessionSnapshot, SharedSession, Stage,
};
