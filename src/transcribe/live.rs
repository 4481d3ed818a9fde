//! The live transcription service.
//!
//! [`LiveTranscription`] runs for the duration of one recording window. It
//! consumes a copy of the microphone chunk stream, accumulates a 16 kHz
//! mono window, and re-decodes the whole window through its
//! [`RecognitionEngine`] every time enough new audio has arrived — each
//! update **replaces** the transcript, so nothing is ever appended twice.
//!
//! Stoppable two ways:
//! * [`stop`](LiveTranscription::stop) — graceful; waits for the feed to
//!   close, runs one final decode over any undecoded tail.
//! * [`halt`](LiveTranscription::halt) — immediate; for session teardown.
//!   No fragment is processed after the halt.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::pcm;
use crate::device::AudioChunk;
use crate::transcribe::engine::RecognitionEngine;

/// Mono sample rate the recognition window is kept at.
const WINDOW_HZ: u32 = 16_000;

// ---------------------------------------------------------------------------
// LiveTranscription
// ---------------------------------------------------------------------------

/// Accumulates a running transcript for one recording window at a time.
pub struct LiveTranscription {
    engine: Arc<dyn RecognitionEngine>,
    transcript: Arc<Mutex<String>>,
    /// New samples required between two decodes.
    update_samples: usize,
    halt: CancellationToken,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl LiveTranscription {
    /// `update_interval_secs` controls how much new audio accumulates
    /// between recognition updates.
    pub fn new(engine: Arc<dyn RecognitionEngine>, update_interval_secs: f32) -> Self {
        let update_samples = ((update_interval_secs.max(0.1)) * WINDOW_HZ as f32) as usize;
        Self {
            engine,
            transcript: Arc::new(Mutex::new(String::new())),
            update_samples,
            halt: CancellationToken::new(),
            worker: None,
        }
    }

    /// Begin a transcription window and return the chunk feed to wire into
    /// the audio recorder.
    ///
    /// Returns `None` — a silent no-op — when no recognition engine is
    /// available on this platform, or when a window is already running. The
    /// transcript is reset either way, so each voice pass starts blank.
    pub fn start(&mut self) -> Option<mpsc::UnboundedSender<AudioChunk>> {
        if self.worker.is_some() {
            log::warn!("transcription: window already running, start ignored");
            return None;
        }

        self.transcript.lock().unwrap().clear();

        if !self.engine.is_available() {
            log::debug!("transcription: no engine on this platform, transcript stays empty");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel::<AudioChunk>();
        self.halt = CancellationToken::new();

        let worker = tokio::spawn(run_window(
            Arc::clone(&self.engine),
            Arc::clone(&self.transcript),
            self.update_samples,
            self.halt.clone(),
            rx,
        ));
        self.worker = Some(worker);

        Some(tx)
    }

    /// Graceful stop: waits for the feed to close (the recorder dropping its
    /// listener) and for the final decode to land.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    /// Immediate stop for teardown; skips the final decode and drops any
    /// chunks still queued on the feed.
    pub async fn halt(&mut self) {
        self.halt.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    /// The transcript accumulated so far, flattened to one string.
    pub fn current_transcript(&self) -> String {
        self.transcript.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run_window(
    engine: Arc<dyn RecognitionEngine>,
    transcript: Arc<Mutex<String>>,
    update_samples: usize,
    halt: CancellationToken,
    mut rx: mpsc::UnboundedReceiver<AudioChunk>,
) {
    let mut window: Vec<f32> = Vec::new();
    let mut decoded_len: usize = 0;

    loop {
        tokio::select! {
            biased;
            _ = halt.cancelled() => return,
            received = rx.recv() => match received {
                Some(chunk) => {
                    window.extend(pcm::normalize_chunk(
                        &chunk.samples,
                        chunk.channels,
                        chunk.sample_rate,
                        WINDOW_HZ,
                    ));
                    if window.len() - decoded_len >= update_samples {
                        decoded_len = window.len();
                        decode_into(&engine, &transcript, &window).await;
                    }
                }
                None => break,
            }
        }
    }

    // Feed closed normally: one final decode over the undecoded tail.
    if !halt.is_cancelled() && window.len() > decoded_len {
        decode_into(&engine, &transcript, &window).await;
    }
}

/// Decode the full window and replace the transcript with the result.
async fn decode_into(
    engine: &Arc<dyn RecognitionEngine>,
    transcript: &Arc<Mutex<String>>,
    window: &[f32],
) {
    let engine = Arc::clone(engine);
    let audio = window.to_vec();
    let result = tokio::task::spawn_blocking(move || engine.recognize(&audio)).await;

    match result {
        Ok(Ok(text)) => {
            *transcript.lock().unwrap() = text;
        }
        Ok(Err(e)) => {
            // A failed update keeps the previous transcript; the stream
            // continues.
            log::warn!("transcription: recognition update failed: {e}");
        }
        Err(e) => {
            log::warn!("transcription: decode task failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::engine::{MockRecognizer, NullRecognizer};

    fn chunk(samples: usize) -> AudioChunk {
        AudioChunk {
            samples: vec![0.1; samples],
            sample_rate: WINDOW_HZ,
            channels: 1,
        }
    }

    #[tokio::test]
    async fn absent_engine_is_a_silent_no_op() {
        let mut lt = LiveTranscription::new(Arc::new(NullRecognizer), 1.0);

        assert!(lt.start().is_none());
        assert!(!lt.is_running());
        assert_eq!(lt.current_transcript(), "");
    }

    #[tokio::test]
    async fn updates_replace_rather_than_append() {
        // Decode after every 0.1 s (1 600 samples) of new audio.
        let mut lt = LiveTranscription::new(Arc::new(MockRecognizer::sample_count()), 0.1);

        let feed = lt.start().unwrap();
        feed.send(chunk(1_600)).unwrap();
        feed.send(chunk(1_600)).unwrap();
        drop(feed);
        lt.stop().await;

        // Two updates ran; the transcript is the latest full-window result,
        // not a concatenation of both.
        assert_eq!(lt.current_transcript(), "heard 3200 samples");
    }

    #[tokio::test]
    async fn stop_runs_a_final_decode_over_the_tail() {
        // Threshold far above what we feed, so only the final decode runs.
        let mut lt = LiveTranscription::new(Arc::new(MockRecognizer::sample_count()), 60.0);

        let feed = lt.start().unwrap();
        feed.send(chunk(160)).unwrap();
        drop(feed);
        lt.stop().await;

        assert_eq!(lt.current_transcript(), "heard 160 samples");
    }

    #[tokio::test]
    async fn halt_skips_the_final_decode() {
        let mut lt = LiveTranscription::new(Arc::new(MockRecognizer::sample_count()), 60.0);

        let feed = lt.start().unwrap();
        feed.send(chunk(160)).unwrap();
        lt.halt().await;
        drop(feed);

        assert_eq!(lt.current_transcript(), "");
        assert!(!lt.is_running());
    }

    #[tokio::test]
    async fn restart_resets_the_transcript() {
        let mut lt = LiveTranscription::new(Arc::new(MockRecognizer::sample_count()), 60.0);

        let feed = lt.start().unwrap();
        feed.send(chunk(160)).unwrap();
        drop(feed);
        lt.stop().await;
        assert_ne!(lt.current_transcript(), "");

        let feed = lt.start().unwrap();
        assert_eq!(lt.current_transcript(), "");
        drop(feed);
        lt.stop().await;
    }

    #[tokio::test]
    async fn second_start_while_running_is_rejected() {
        let mut lt = LiveTranscription::new(Arc::new(MockRecognizer::fixed("x")), 1.0);

        let feed = lt.start().unwrap();
        assert!(lt.start().is_none());
        drop(feed);
        lt.stop().await;
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_transcript() {
        let mut lt = LiveTranscription::new(Arc::new(MockRecognizer::fails()), 0.01);

        let feed = lt.start().unwrap();
        feed.send(chunk(160)).unwrap();
        drop(feed);
        lt.stop().await;

        assert_eq!(lt.current_transcript(), "");
    }
}
