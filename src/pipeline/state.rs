//! Capture session state — [`Stage`], [`CaptureSession`] and the shared
//! handle the consumer reads snapshots through.
//!
//! [`CaptureSession`] is mutated exclusively by the orchestrator; everything
//! else sees it through [`SharedSession`] as point-in-time
//! [`SessionSnapshot`]s, so no partial merge is ever observable.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Stages of one capture-and-analyze session.
///
/// The transitions are:
///
/// ```text
/// Initial ──session start──▶ Capturing
///         ──frame + image emotion ok──▶ Recording
///         ──window elapsed / stopped──▶ Analyzing
///         ──all calls resolved───────▶ Complete
/// Complete ──StartVoicePass──▶ Recording   (re-entrant voice pass)
/// ```
///
/// Errors do not get their own stage: an image-stage failure reverts to
/// `Initial`, a voice-stage failure still advances to `Complete`, and the
/// failure text lives in [`CaptureSession::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Nothing captured yet; the entry state, and the state an image-stage
    /// failure returns to so a fresh session can be started.
    #[default]
    Initial,

    /// Camera is held; waiting out the stabilisation delay before the grab.
    Capturing,

    /// Microphone is held; audio and live transcription are running.
    Recording,

    /// Recording closed; analysis calls for this pass are in flight.
    Analyzing,

    /// All calls for the pass resolved. Re-entrant: another voice pass may
    /// be started from here.
    Complete,
}

impl Stage {
    /// Returns `true` while the pipeline holds a device or has calls in
    /// flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Stage::Capturing | Stage::Recording | Stage::Analyzing)
    }

    /// A short status line for the consumer to display.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Initial => "Starting analysis...",
            Stage::Capturing => "Capturing image...",
            Stage::Recording => "Recording voice...",
            Stage::Analyzing => "Analyzing results...",
            Stage::Complete => "Analysis complete!",
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// The aggregate state of one end-to-end capture-and-analyze run.
///
/// Field invariants: `image_emotion` is only set once the session has left
/// `Capturing`; `voice_emotion`, `voice_tone` and `chat_response` only at or
/// after `Analyzing`. Later results overwrite earlier ones of the same
/// field.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    /// Current pipeline stage.
    pub stage: Stage,

    /// Emotion label from the captured face image.
    pub image_emotion: Option<String>,

    /// Emotion label from the analysed voice recording. Carried over
    /// unchanged on passes that skip the audio analysis.
    pub voice_emotion: Option<String>,

    /// Normalised voice tone ({Happy, Angry, Sad, neutral}).
    pub voice_tone: Option<String>,

    /// The generated empathetic reply; refreshed on every voice pass.
    pub chat_response: Option<String>,

    /// Advisory failure text shown alongside whatever partial results
    /// exist. Cleared at the start of the next session or pass.
    pub error: Option<String>,

    /// `true` until a voice pass fully succeeds; later passes skip the
    /// audio-emotion call and reuse the stored `voice_emotion`.
    pub is_first_voice_pass: bool,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            stage: Stage::Initial,
            image_emotion: None,
            voice_emotion: None,
            voice_tone: None,
            chat_response: None,
            error: None,
            is_first_voice_pass: true,
        }
    }

    /// The consumer-facing read-only view.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            image_emotion: self.image_emotion.clone(),
            voice_emotion: self.voice_emotion.clone(),
            voice_tone: self.voice_tone.clone(),
            chat_response: self.chat_response.clone(),
            error: self.error.clone(),
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the consumer-visible session fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub stage: Stage,
    pub image_emotion: Option<String>,
    pub voice_emotion: Option<String>,
    pub voice_tone: Option<String>,
    pub chat_response: Option<String>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`CaptureSession`].
///
/// Cheap to clone (`Arc` clone). Lock for a short critical section; do
/// **not** hold the lock across `.await` points.
pub type SharedSession = Arc<Mutex<CaptureSession>>;

/// Construct a new [`SharedSession`] in the `Initial` stage.
pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(CaptureSession::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Stage ---

    #[test]
    fn default_stage_is_initial() {
        assert_eq!(Stage::default(), Stage::Initial);
    }

    #[test]
    fn busy_stages_are_the_device_holding_ones() {
        assert!(!Stage::Initial.is_busy());
        assert!(Stage::Capturing.is_busy());
        assert!(Stage::Recording.is_busy());
        assert!(Stage::Analyzing.is_busy());
        assert!(!Stage::Complete.is_busy());
    }

    #[test]
    fn every_stage_has_a_label() {
        for stage in [
            Stage::Initial,
            Stage::Capturing,
            Stage::Recording,
            Stage::Analyzing,
            Stage::Complete,
        ] {
            assert!(!stage.label().is_empty());
        }
    }

    // ---- CaptureSession ---

    #[test]
    fn new_session_is_blank_and_first_pass() {
        let session = CaptureSession::new();
        assert_eq!(session.stage, Stage::Initial);
        assert!(session.image_emotion.is_none());
        assert!(session.voice_emotion.is_none());
        assert!(session.voice_tone.is_none());
        assert!(session.chat_response.is_none());
        assert!(session.error.is_none());
        assert!(session.is_first_voice_pass);
    }

    #[test]
    fn snapshot_copies_the_consumer_fields() {
        let mut session = CaptureSession::new();
        session.stage = Stage::Complete;
        session.image_emotion = Some("Happy".into());
        session.chat_response = Some("Glad to hear it!".into());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.stage, Stage::Complete);
        assert_eq!(snapshot.image_emotion.as_deref(), Some("Happy"));
        assert_eq!(snapshot.chat_response.as_deref(), Some("Glad to hear it!"));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn shared_session_is_send_sync_and_cloneable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedSession>();

        let shared = new_shared_session();
        let shared2 = Arc::clone(&shared);
        shared.lock().unwrap().stage = Stage::Recording;
        assert_eq!(shared2.lock().unwrap().stage, Stage::Recording);
    }
}
