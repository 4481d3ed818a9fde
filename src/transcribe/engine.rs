//! Recognition engine trait and implementations.
//!
//! [`RecognitionEngine`] is the seam between the live transcription service
//! and whatever speech model the platform offers. [`WhisperRecognizer`]
//! wraps a `whisper_rs::WhisperContext`; [`NullRecognizer`] stands in when
//! no model is present and keeps the pipeline running with an empty
//! transcript.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Shortest window worth decoding: 0.5 s at 16 kHz. Anything shorter
/// recognises as nothing rather than erroring, since live windows grow from
/// zero.
const MIN_DECODE_SAMPLES: usize = 8_000;

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Errors from the recognition subsystem.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The GGML model file was not found at the given path.
    #[error("recognition model not found: {0}")]
    ModelNotFound(String),

    /// whisper-rs failed to initialise a context or state.
    #[error("recognizer initialisation failed: {0}")]
    Init(String),

    /// The inference pass itself failed.
    #[error("recognition failed: {0}")]
    Recognition(String),
}

// ---------------------------------------------------------------------------
// RecognitionEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe speech recognizer.
///
/// # Contract
///
/// - `audio` is the **entire** accumulated window so far, 16 kHz mono `f32`;
///   the returned text is the full transcript of that window, not a delta.
/// - Windows shorter than half a second recognise as `""`.
pub trait RecognitionEngine: Send + Sync {
    /// Decode `audio` and return the transcript of the whole window.
    fn recognize(&self, audio: &[f32]) -> Result<String, RecognitionError>;

    /// Whether a real engine backs this recognizer. `false` makes the live
    /// transcription service a silent no-op.
    fn is_available(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// WhisperRecognizer
// ---------------------------------------------------------------------------

/// Production recognizer wrapping a `whisper_rs::WhisperContext`.
///
/// A fresh `WhisperState` is created per [`recognize`] call so the
/// recognizer can be shared across threads without locking.
///
/// [`recognize`]: RecognitionEngine::recognize
pub struct WhisperRecognizer {
    ctx: WhisperContext,
    language: String,
}

impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send`/`Sync` in whisper-rs — the model weights are read-only
// after loading, and the per-call state is created fresh each time.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperRecognizer {}
unsafe impl Sync for WhisperRecognizer {}

impl WhisperRecognizer {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`RecognitionError::ModelNotFound`] — the file does not exist.
    /// - [`RecognitionError::Init`] — whisper-rs failed to load it.
    pub fn load(model_path: impl AsRef<Path>, language: &str) -> Result<Self, RecognitionError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(RecognitionError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            RecognitionError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| RecognitionError::Init(e.to_string()))?;

        Ok(Self {
            ctx,
            language: language.to_string(),
        })
    }
}

impl RecognitionEngine for WhisperRecognizer {
    fn recognize(&self, audio: &[f32]) -> Result<String, RecognitionError> {
        if audio.len() < MIN_DECODE_SAMPLES {
            return Ok(String::new());
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang: Option<&str> = if self.language == "auto" {
            None
        } else {
            Some(self.language.as_str())
        };
        params.set_language(lang);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RecognitionError::Init(e.to_string()))?;

        state
            .full(params, audio)
            .map_err(|e| RecognitionError::Recognition(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| RecognitionError::Recognition(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| RecognitionError::Recognition(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// NullRecognizer
// ---------------------------------------------------------------------------

/// Stand-in recognizer for platforms without a speech model.
///
/// Reports itself unavailable, so the live transcription service skips the
/// decode loop entirely and the transcript stays empty — never a
/// user-visible error.
#[derive(Debug, Default)]
pub struct NullRecognizer;

impl RecognitionEngine for NullRecognizer {
    fn recognize(&self, _audio: &[f32]) -> Result<String, RecognitionError> {
        Ok(String::new())
    }

    fn is_available(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// MockRecognizer  (test-only)
// ---------------------------------------------------------------------------

/// Test double with deterministic output and no model file.
#[cfg(test)]
pub struct MockRecognizer {
    mode: MockMode,
}

#[cfg(test)]
enum MockMode {
    /// Always return the same text.
    Fixed(String),
    /// Return `"heard N samples"` so tests can observe replacement.
    SampleCount,
    /// Always fail.
    Fails,
}

#[cfg(test)]
impl MockRecognizer {
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            mode: MockMode::Fixed(text.into()),
        }
    }

    pub fn sample_count() -> Self {
        Self {
            mode: MockMode::SampleCount,
        }
    }

    pub fn fails() -> Self {
        Self {
            mode: MockMode::Fails,
        }
    }
}

#[cfg(test)]
impl RecognitionEngine for MockRecognizer {
    fn recognize(&self, audio: &[f32]) -> Result<String, RecognitionError> {
        match &self.mode {
            MockMode::Fixed(text) => Ok(text.clone()),
            MockMode::SampleCount => Ok(format!("heard {} samples", audio.len())),
            MockMode::Fails => Err(RecognitionError::Recognition("mock failure".into())),
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
    fn null_recognizer_is_unavailable_and_silent() {
        let engine = NullRecognizer;
        assert!(!engine.is_available());
        assert_eq!(engine.recognize(&[0.0; 16_000]).unwrap(), "");
    }

    #[test]
    fn whisper_load_with_missing_model_is_model_not_found() {
        let err = WhisperRecognizer::load("/nonexistent/ggml-base.bin", "en").unwrap_err();
        assert!(matches!(err, RecognitionError::ModelNotFound(_)));
    }

    #[test]
    fn mock_sample_count_reflects_window_growth() {
        let engine = MockRecognizer::sample_count();
        assert_eq!(engine.recognize(&[0.0; 100]).unwrap(), "heard 100 samples");
        assert_eq!(engine.recognize(&[0.0; 200]).unwrap(), "heard 200 samples");
    }

    #[test]
    fn engine_is_object_safe() {
        let engine: Box<dyn RecognitionEngine> = Box::new(NullRecognizer);
        drop(engine);
    }
}
