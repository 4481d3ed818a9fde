//! Analysis boundary — the three remote emotion/chat endpoints.
//!
//! This module provides:
//! * [`AnalysisClient`] — async trait implemented by all analysis backends.
//! * [`HttpAnalysisClient`] — production client over `reqwest`
//!   (multipart uploads for image/audio, JSON for chat).
//! * [`AudioAnalysis`] — label + optional raw tone code from the audio
//!   endpoint.
//! * [`PromptBuilder`] / [`EmotionContext`] — composes the empathetic chat
//!   prompt from the transcript and the known emotion signals.
//! * [`normalize_tone`] — maps raw tone codes onto the fixed vocabulary
//!   {Happy, Angry, Sad, neutral}.
//! * [`AnalysisError`] — error variants for all three operations.

pub mod client;
pub mod prompt;
pub mod tone;

pub use client::{AnalysisClient, AnalysisError, AudioAnalysis, HttpAnalysisClient};
pub use prompt::{EmotionContext, PromptBuilder};
pub use tone::normalize_tone;
