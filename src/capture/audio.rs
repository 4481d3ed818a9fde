//! Audio capture service — windowed microphone recording to a WAV blob.
//!
//! [`AudioCaptureService::begin`] acquires the microphone and starts
//! collecting chunks; the returned [`AudioRecorder`] is finished (encode and
//! release) or aborted (discard and release). [`AudioCaptureService::record`]
//! wraps the pair with a fixed window timer for the automatic path.
//!
//! An optional listener receives a copy of every chunk while recording is
//! live — that is how live transcription shares the single microphone
//! acquisition instead of opening the device twice.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::pcm;
use crate::capture::timer::{CaptureTimer, TimerOutcome};
use crate::capture::CaptureError;
use crate::device::{AudioChunk, DeviceHandle, DeviceKind, DeviceRegistry, MicStream, MicrophoneDevice};

// ---------------------------------------------------------------------------
// EncodedAudio
// ---------------------------------------------------------------------------

/// One finished voice recording, WAV-encoded and ready for upload.
///
/// A recording stopped before any audio arrived is an empty-but-valid WAV —
/// it simply analyses as silence downstream.
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub wav: Vec<u8>,
    pub duration_secs: f32,
}

// ---------------------------------------------------------------------------
// AudioCaptureService
// ---------------------------------------------------------------------------

/// Records one bounded voice window per [`begin`](Self::begin) call.
pub struct AudioCaptureService {
    registry: DeviceRegistry,
    mic: Arc<dyn MicrophoneDevice>,
    /// Mono sample rate the recording is normalised to (16 kHz).
    target_hz: u32,
}

impl AudioCaptureService {
    pub fn new(registry: DeviceRegistry, mic: Arc<dyn MicrophoneDevice>, target_hz: u32) -> Self {
        Self {
            registry,
            mic,
            target_hz,
        }
    }

    /// Acquire the microphone and start buffering.
    ///
    /// Every chunk is normalised to `target_hz` mono for the encode buffer;
    /// `listener`, when present, receives the raw chunks in parallel.
    ///
    /// # Errors
    ///
    /// [`CaptureError::DeviceUnavailable`] when the microphone is busy,
    /// missing, or permission is denied. The device handle is released
    /// before returning the error.
    pub fn begin(
        &self,
        listener: Option<mpsc::UnboundedSender<AudioChunk>>,
    ) -> Result<AudioRecorder, CaptureError> {
        let handle = self.registry.acquire(DeviceKind::Microphone)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<AudioChunk>();
        // `handle` drops (and releases) if the hardware refuses to start.
        let stream = self.mic.start(tx)?;

        let discard = CancellationToken::new();
        let target_hz = self.target_hz;
        let collector = tokio::spawn({
            let discard = discard.clone();
            async move {
                let mut samples: Vec<f32> = Vec::new();
                loop {
                    tokio::select! {
                        biased;
                        _ = discard.cancelled() => {
                            // Teardown: unflushed chunks are thrown away.
                            samples.clear();
                            break;
                        }
                        received = rx.recv() => match received {
                            Some(chunk) => {
                                if let Some(listener) = &listener {
                                    let _ = listener.send(chunk.clone());
                                }
                                samples.extend(pcm::normalize_chunk(
                                    &chunk.samples,
                                    chunk.channels,
                                    chunk.sample_rate,
                                    target_hz,
                                ));
                            }
                            None => break,
                        }
                    }
                }
                samples
            }
        });

        Ok(AudioRecorder {
            handle,
            stream,
            collector,
            discard,
            target_hz,
        })
    }

    /// Record one full window: begin, wait for the window to elapse (or the
    /// session to be cancelled), then finish.
    pub async fn record(
        &self,
        window: Duration,
        cancel: &CancellationToken,
    ) -> Result<EncodedAudio, CaptureError> {
        let recorder = self.begin(None)?;

        let timer = CaptureTimer::start_linked(window, cancel.clone());
        if timer.wait().await == TimerOutcome::Cancelled {
            recorder.abort().await;
            return Err(CaptureError::Cancelled);
        }

        recorder.finish().await
    }
}

// ---------------------------------------------------------------------------
// AudioRecorder
// ---------------------------------------------------------------------------

/// One in-flight recording window.
///
/// Must be consumed by [`finish`](Self::finish) (timer-driven or explicit
/// stop) or [`abort`](Self::abort) (cancellation). Either way the
/// microphone handle is released.
pub struct AudioRecorder {
    handle: DeviceHandle,
    stream: Box<dyn MicStream>,
    collector: tokio::task::JoinHandle<Vec<f32>>,
    discard: CancellationToken,
    target_hz: u32,
}

// `Debug` so tests can call `unwrap_err()` on `Result<AudioRecorder, _>`;
// the recorder owns a live stream handle with no meaningful printable state.
#[cfg(test)]
impl std::fmt::Debug for AudioRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AudioRecorder")
    }
}

impl AudioRecorder {
    /// Stop capturing, concatenate everything buffered so far into one WAV
    /// blob, and release the microphone.
    pub async fn finish(self) -> Result<EncodedAudio, CaptureError> {
        // Dropping the stream stops the producer; the collector drains the
        // chunks already delivered and then sees the channel close.
        drop(self.stream);

        let samples = self
            .collector
            .await
            .map_err(|e| CaptureError::Internal(e.to_string()))?;

        let wav = encode_wav(&samples, self.target_hz)?;
        let duration_secs = samples.len() as f32 / self.target_hz as f32;
        log::debug!(
            "audio capture: {} samples ({duration_secs:.2} s) → {} bytes wav",
            samples.len(),
            wav.len()
        );

        self.handle.release();
        Ok(EncodedAudio { wav, duration_secs })
    }

    /// Stop capturing, discard all buffered audio, and release the
    /// microphone. Used on session teardown.
    pub async fn abort(self) {
        self.discard.cancel();
        drop(self.stream);
        let _ = self.collector.await;
        self.handle.release();
        log::debug!("audio capture: aborted, recording discarded");
    }
}

// ---------------------------------------------------------------------------
// WAV encoding
// ---------------------------------------------------------------------------

/// Encode 16-bit mono PCM WAV into memory. Zero samples still produce a
/// valid (header-only) file.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let cursor = Cursor::new(&mut bytes);
        let mut writer = hound::WavWriter::new(cursor, spec)
            .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;

        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;
    }

    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::microphone::MockMicrophone;

    fn service(mic: MockMicrophone) -> (AudioCaptureService, DeviceRegistry) {
        let registry = DeviceRegistry::new();
        let service = AudioCaptureService::new(registry.clone(), Arc::new(mic), 16_000);
        (service, registry)
    }

    #[tokio::test]
    async fn begin_then_finish_encodes_wav_and_releases() {
        let (service, registry) = service(MockMicrophone::chunks(4, 160));

        let recorder = service.begin(None).unwrap();
        assert_eq!(registry.open_count(DeviceKind::Microphone), 1);

        let audio = recorder.finish().await.unwrap();
        // 4 chunks × 160 mono samples at 16 kHz, 16-bit → 44-byte header + data.
        assert_eq!(audio.wav.len(), 44 + 4 * 160 * 2);
        assert!((audio.duration_secs - 640.0 / 16_000.0).abs() < 1e-6);

        assert_eq!(registry.open_count(DeviceKind::Microphone), 0);
        assert_eq!(registry.released_total(DeviceKind::Microphone), 1);
    }

    #[tokio::test]
    async fn empty_recording_is_a_valid_wav() {
        let (service, _registry) = service(MockMicrophone::chunks(0, 0));

        let audio = service.begin(None).unwrap().finish().await.unwrap();
        assert_eq!(audio.wav.len(), 44); // header only
        assert_eq!(audio.duration_secs, 0.0);
    }

    #[tokio::test]
    async fn unavailable_microphone_fails_begin_and_releases() {
        let (service, registry) = service(MockMicrophone::unavailable());

        let err = service.begin(None).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(registry.open_count(DeviceKind::Microphone), 0);
    }

    #[tokio::test]
    async fn busy_microphone_is_rejected() {
        let (service, registry) = service(MockMicrophone::chunks(1, 160));
        let held = registry.acquire(DeviceKind::Microphone).unwrap();

        let err = service.begin(None).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        drop(held);
    }

    #[tokio::test]
    async fn abort_discards_audio_and_releases() {
        let (service, registry) = service(MockMicrophone::chunks(4, 160));

        let recorder = service.begin(None).unwrap();
        recorder.abort().await;

        assert_eq!(registry.open_count(DeviceKind::Microphone), 0);
        assert_eq!(registry.released_total(DeviceKind::Microphone), 1);
    }

    #[tokio::test]
    async fn listener_receives_a_copy_of_every_chunk() {
        let (service, _registry) = service(MockMicrophone::chunks(3, 160));
        let (listener_tx, mut listener_rx) = mpsc::unbounded_channel();

        let recorder = service.begin(Some(listener_tx)).unwrap();
        let audio = recorder.finish().await.unwrap();
        assert!(!audio.wav.is_empty());

        let mut forwarded = 0;
        while listener_rx.try_recv().is_ok() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn record_waits_for_the_window_then_finishes() {
        let (service, registry) = service(MockMicrophone::chunks(2, 160));
        let cancel = CancellationToken::new();

        let audio = service
            .record(Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert_eq!(audio.wav.len(), 44 + 2 * 160 * 2);
        assert_eq!(registry.open_count(DeviceKind::Microphone), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn record_cancelled_mid_window_discards() {
        let (service, registry) = service(MockMicrophone::chunks(2, 160));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service
            .record(Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(registry.open_count(DeviceKind::Microphone), 0);
    }

    #[test]
    fn encode_wav_clamps_out_of_range_samples() {
        let wav = encode_wav(&[2.0, -2.0], 16_000).unwrap();
        assert_eq!(wav.len(), 44 + 4);
    }
}
