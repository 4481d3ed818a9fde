//! Capture orchestrator — drives the full image → voice → analysis loop.
//!
//! [`CaptureOrchestrator`] owns the [`SharedSession`] and is its only
//! writer. It sequences the stage machine, owns the lifecycle of both
//! device acquisitions and the live transcription window, fans out to the
//! analysis client, and guarantees teardown on completion, error and
//! cancellation alike.
//!
//! # Session flow
//!
//! ```text
//! run()
//!   └─▶ Capturing: ImageCaptureService::capture → analyze_image
//!         ├─ Ok  → image_emotion, stage = Recording, first voice pass
//!         └─ Err → error, stage = Initial, session halts      [fatal]
//!
//! voice pass (re-entrant from Complete via StartVoicePass)
//!   └─▶ begin recording + live transcription (same acquisition)
//!       window elapses (authoritative) or StopVoicePass
//!         └─▶ Analyzing: analyze_audio (first pass only) ∥ chat
//!               └─▶ merge results, stage = Complete            [never fatal]
//! ```
//!
//! # Cancellation
//!
//! When the consumer is torn down it cancels the token from
//! [`cancellation_token`](CaptureOrchestrator::cancellation_token) (or drops
//! the command sender). The orchestrator then, in order: halts the live
//! transcription, aborts the audio recorder discarding unflushed chunks,
//! releases any held device handle (RAII on every path), and discards
//! pending network responses — after the token fires no timer, callback or
//! late response mutates the session again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::analysis::{normalize_tone, AnalysisClient, EmotionContext, PromptBuilder};
use crate::capture::{
    AudioCaptureService, CaptureError, CaptureTimer, ImageCaptureService, TimerOutcome,
};
use crate::pipeline::state::{SharedSession, Stage};
use crate::transcribe::LiveTranscription;

// ---------------------------------------------------------------------------
// Error texts
// ---------------------------------------------------------------------------

/// Shown when the camera cannot be acquired or the frame grab fails.
const CAMERA_ERROR: &str =
    "Failed to access camera. Please ensure camera permissions are granted.";
/// Shown when the image-emotion call fails.
const IMAGE_ERROR: &str = "Failed to analyze image";
/// Shown when anything in a voice pass fails; the pass still completes.
const VOICE_ERROR: &str = "Failed to process voice recording";

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// Imperative controls the consumer may send while a session runs.
///
/// Both are meaningful only in specific stages; anything else is a no-op
/// guarded by the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Begin another voice pass (valid in `Complete`).
    StartVoicePass,
    /// Close the current recording window early (valid in `Recording`).
    StopVoicePass,
}

/// How a recording window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassEnd {
    /// The fixed window elapsed.
    Window,
    /// The consumer stopped the pass explicitly.
    Stopped,
    /// The session was torn down mid-window.
    TornDown,
}

// ---------------------------------------------------------------------------
// CaptureOrchestrator
// ---------------------------------------------------------------------------

/// Drives one capture session from `Initial` to `Complete` and through any
/// number of re-entrant voice passes.
///
/// Create with [`CaptureOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task. `run` returns when the session halts on a fatal
/// image-stage failure, the consumer drops the command sender, or the
/// cancellation token fires.
pub struct CaptureOrchestrator {
    session: SharedSession,
    image: ImageCaptureService,
    audio: AudioCaptureService,
    transcription: LiveTranscription,
    client: Arc<dyn AnalysisClient>,
    prompt: PromptBuilder,
    record_window: Duration,
    cancel: CancellationToken,
}

impl CaptureOrchestrator {
    pub fn new(
        session: SharedSession,
        image: ImageCaptureService,
        audio: AudioCaptureService,
        transcription: LiveTranscription,
        client: Arc<dyn AnalysisClient>,
        record_window: Duration,
    ) -> Self {
        Self {
            session,
            image,
            audio,
            transcription,
            client,
            prompt: PromptBuilder::new(),
            record_window,
            cancel: CancellationToken::new(),
        }
    }

    /// Token the consumer cancels on unmount. Cloning is cheap.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run the session to its end.
    ///
    /// The first voice pass starts automatically once the image stage
    /// succeeds; afterwards the orchestrator waits in `Complete` for
    /// [`SessionCommand::StartVoicePass`] until the channel closes or the
    /// session is cancelled.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        if !self.image_stage().await {
            log::info!("orchestrator: session halted in image stage");
            return;
        }

        loop {
            if self.voice_pass(&mut commands).await {
                log::info!("orchestrator: session torn down");
                return;
            }

            // Stage is Complete; wait for the consumer's next move.
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    command = commands.recv() => match command {
                        Some(SessionCommand::StartVoicePass) => {
                            self.apply(|s| {
                                s.error = None;
                                s.stage = Stage::Recording;
                            });
                            break;
                        }
                        Some(SessionCommand::StopVoicePass) => {
                            log::debug!("orchestrator: no recording in flight, stop ignored");
                        }
                        None => return,
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Image stage
    // -----------------------------------------------------------------------

    /// `Initial → Capturing → Recording`. Returns `false` when the session
    /// must halt: a fatal capture/analysis failure (stage reverts to
    /// `Initial`) or cancellation.
    async fn image_stage(&mut self) -> bool {
        self.apply(|s| {
            s.error = None;
            s.stage = Stage::Capturing;
        });

        let image = match self.image.capture(&self.cancel).await {
            Ok(image) => image,
            Err(CaptureError::Cancelled) => return false,
            Err(e) => {
                log::error!("orchestrator: image capture failed: {e}");
                self.apply(|s| {
                    s.error = Some(CAMERA_ERROR.into());
                    s.stage = Stage::Initial;
                });
                return false;
            }
        };

        let analysis = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            result = self.client.analyze_image(&image.jpeg) => result,
        };

        match analysis {
            Ok(label) => {
                log::info!("orchestrator: image emotion = {label:?}");
                self.apply(|s| {
                    s.image_emotion = Some(label);
                    s.stage = Stage::Recording;
                });
                true
            }
            Err(e) => {
                log::error!("orchestrator: image analysis failed: {e}");
                self.apply(|s| {
                    s.error = Some(IMAGE_ERROR.into());
                    s.stage = Stage::Initial;
                });
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Voice pass
    // -----------------------------------------------------------------------

    /// One recording-plus-analysis cycle. Returns `true` when the session
    /// was torn down mid-pass; any other outcome — including every failure —
    /// ends in `Complete`.
    async fn voice_pass(&mut self, commands: &mut mpsc::Receiver<SessionCommand>) -> bool {
        // Live transcription shares the recorder's single microphone
        // acquisition via the chunk feed. `None` means no engine on this
        // platform; the pass continues with an empty transcript.
        let feed = self.transcription.start();

        let recorder = match self.audio.begin(feed) {
            Ok(recorder) => recorder,
            Err(e) => {
                log::error!("orchestrator: microphone unavailable: {e}");
                self.transcription.halt().await;
                self.apply(|s| {
                    s.error = Some(VOICE_ERROR.into());
                    s.stage = Stage::Complete;
                });
                return false;
            }
        };

        // The window timer starts only after acquisition completed, so a
        // firing timer never races a mid-acquisition device.
        let timer = CaptureTimer::start_linked(self.record_window, self.cancel.clone());
        let end = loop {
            tokio::select! {
                biased;
                outcome = timer.wait() => break match outcome {
                    TimerOutcome::Cancelled => PassEnd::TornDown,
                    TimerOutcome::Elapsed => PassEnd::Window,
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::StopVoicePass) => break PassEnd::Stopped,
                    Some(SessionCommand::StartVoicePass) => {
                        log::debug!("orchestrator: recording already in flight, start ignored");
                    }
                    None => break PassEnd::TornDown,
                }
            }
        };

        if end == PassEnd::TornDown {
            // Teardown order: transcription first, then the recorder, which
            // discards unflushed chunks and releases the microphone.
            self.transcription.halt().await;
            recorder.abort().await;
            return true;
        }

        log::debug!("orchestrator: recording window closed ({end:?})");
        self.apply(|s| s.stage = Stage::Analyzing);

        // Stop capture and transcription together. Finishing the recorder
        // closes the chunk feed, which lets the transcription worker run its
        // final decode before `stop` returns.
        let (encoded, ()) = tokio::join!(recorder.finish(), self.transcription.stop());

        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                log::error!("orchestrator: audio capture failed: {e}");
                self.apply(|s| {
                    s.error = Some(VOICE_ERROR.into());
                    s.stage = Stage::Complete;
                });
                return false;
            }
        };

        let transcript = self.transcription.current_transcript();

        // Prompt context is the most recently *known* state: within a pass
        // the chat call runs concurrently with the audio analysis, so it
        // sees the previous pass's voice signals.
        let (first_pass, prompt) = {
            let session = self.session.lock().unwrap();
            let context = EmotionContext {
                image_emotion: session.image_emotion.as_deref(),
                voice_emotion: session.voice_emotion.as_deref(),
                voice_tone: session.voice_tone.as_deref(),
            };
            (
                session.is_first_voice_pass,
                self.prompt.build(&transcript, &context),
            )
        };

        // Audio-emotion (first pass only) and chat are issued together and
        // awaited jointly; a torn-down session discards both results.
        let results = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            results = async {
                if first_pass {
                    let (audio, chat) = tokio::join!(
                        self.client.analyze_audio(&encoded.wav),
                        self.client.chat(&prompt),
                    );
                    (Some(audio), chat)
                } else {
                    (None, self.client.chat(&prompt).await)
                }
            } => Some(results),
        };

        let Some((audio_result, chat_result)) = results else {
            return true;
        };

        let mut pass_failed = false;

        let voice_update = match audio_result {
            Some(Ok(analysis)) => {
                log::info!("orchestrator: voice emotion = {:?}", analysis.emotion);
                Some(analysis)
            }
            Some(Err(e)) => {
                log::error!("orchestrator: audio analysis failed: {e}");
                pass_failed = true;
                None
            }
            // Later passes reuse the stored voice emotion.
            None => None,
        };

        let chat_update = match chat_result {
            Ok(reply) => Some(reply),
            Err(e) => {
                log::error!("orchestrator: chat failed: {e}");
                pass_failed = true;
                None
            }
        };

        // One atomic merge per transition: the consumer never observes a
        // half-applied pass.
        self.apply(|s| {
            if let Some(analysis) = voice_update {
                if let Some(code) = &analysis.tone_code {
                    s.voice_tone = Some(normalize_tone(code).to_string());
                }
                s.voice_emotion = Some(analysis.emotion);
            }
            if let Some(reply) = chat_update {
                s.chat_response = Some(reply);
            }
            if pass_failed {
                s.error = Some(VOICE_ERROR.into());
            } else {
                s.is_first_voice_pass = false;
            }
            s.stage = Stage::Complete;
        });

        false
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Mutate the session under the lock — unless the session has been
    /// cancelled, in which case late results are silently discarded.
    fn apply<F: FnOnce(&mut crate::pipeline::state::CaptureSession)>(&self, mutate: F) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut session = self.session.lock().unwrap();
        mutate(&mut session);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
