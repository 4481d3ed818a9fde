//! Microphone seam — [`MicrophoneDevice`] / [`MicStream`] traits and the
//! cpal production implementation.
//!
//! [`CpalMicrophone`] owns the cpal host/device/stream lifecycle on a
//! dedicated worker thread (a `cpal::Stream` is not `Send` on every
//! platform, so it must never cross threads). The returned [`MicStream`]
//! guard is RAII — dropping it stops the worker and with it the underlying
//! hardware stream.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use super::registry::{DeviceError, DeviceKind};

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the capture callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]` at the device's
/// native rate; use [`crate::capture::pcm`] to downmix and resample before
/// recognition or encoding.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// MicrophoneDevice / MicStream traits
// ---------------------------------------------------------------------------

/// A microphone that can start streaming [`AudioChunk`]s.
pub trait MicrophoneDevice: Send + Sync {
    /// Begin capturing and send chunks to `tx` until the returned guard is
    /// dropped. The sender is dropped when capture stops, closing the
    /// channel from the consumer's point of view.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Unavailable`] when no input device exists or access is
    /// denied, [`DeviceError::Stream`] when the stream cannot be built or
    /// started.
    fn start(
        &self,
        tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<Box<dyn MicStream>, DeviceError>;
}

/// RAII guard for one live microphone stream; dropping it stops capture.
pub trait MicStream: Send {}

// `Debug` for the trait object so tests can call `unwrap_err()` on
// `Result<Box<dyn MicStream>, _>`; the concrete guards carry no printable state.
#[cfg(test)]
impl std::fmt::Debug for dyn MicStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn MicStream")
    }
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// Production microphone using the system default cpal input device.
///
/// ```rust,no_run
/// use emotion_capture::device::{CpalMicrophone, MicrophoneDevice};
///
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let mic = CpalMicrophone::new();
/// let _guard = mic.start(tx).unwrap();
/// // chunks arrive on rx; drop `_guard` to stop recording
/// ```
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

impl MicrophoneDevice for CpalMicrophone {
    fn start(
        &self,
        tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<Box<dyn MicStream>, DeviceError> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), DeviceError>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let worker = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture(tx, ready_tx, stop_rx))
            .map_err(|e| DeviceError::Stream(DeviceKind::Microphone, e.to_string()))?;

        // The worker reports once the stream is playing (or failed to).
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStreamGuard {
                stop_tx: Some(stop_tx),
                worker: Some(worker),
            })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(DeviceError::Stream(
                    DeviceKind::Microphone,
                    "capture worker exited before reporting readiness".into(),
                ))
            }
        }
    }
}

/// Worker-thread body: build the stream, report readiness, park until stop.
fn run_capture(
    tx: mpsc::UnboundedSender<AudioChunk>,
    ready_tx: std::sync::mpsc::Sender<Result<(), DeviceError>>,
    stop_rx: std::sync::mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(DeviceError::Unavailable(
                DeviceKind::Microphone,
                "no input device found on the default audio host".into(),
            )));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(DeviceError::Unavailable(
                DeviceKind::Microphone,
                e.to_string(),
            )));
            return;
        }
    };

    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let chunk = AudioChunk {
                samples: data.to_vec(),
                sample_rate,
                channels,
            };
            // Ignore send errors; the receiver may have been dropped.
            let _ = tx.send(chunk);
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None, // no timeout
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(DeviceError::Stream(
                DeviceKind::Microphone,
                e.to_string(),
            )));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(DeviceError::Stream(
            DeviceKind::Microphone,
            e.to_string(),
        )));
        return;
    }

    log::debug!("microphone: capturing at {sample_rate} Hz, {channels} ch");
    let _ = ready_tx.send(Ok(()));

    // Block until the guard is dropped (or the sender disconnects); the
    // stream stops when it goes out of scope here.
    let _ = stop_rx.recv();
    drop(stream);
    log::debug!("microphone: capture stopped");
}

struct CpalStreamGuard {
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicStream for CpalStreamGuard {}

impl Drop for CpalStreamGuard {
    fn drop(&mut self) {
        // Dropping the sender disconnects stop_rx and wakes the worker.
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// MockMicrophone  (test-only)
// ---------------------------------------------------------------------------

/// Test double that delivers a fixed set of chunks, or fails to start.
#[cfg(test)]
pub struct MockMicrophone {
    chunks: Vec<AudioChunk>,
    fail_start: bool,
}

#[cfg(test)]
impl MockMicrophone {
    /// Deliver `count` chunks of `samples_per_chunk` mono samples at 16 kHz.
    pub fn chunks(count: usize, samples_per_chunk: usize) -> Self {
        let chunks = (0..count)
            .map(|i| AudioChunk {
                samples: vec![(i as f32 * 0.01).sin(); samples_per_chunk],
                sample_rate: 16_000,
                channels: 1,
            })
            .collect();
        Self {
            chunks,
            fail_start: false,
        }
    }

    /// Fail `start` as if the device were missing or permission was denied.
    pub fn unavailable() -> Self {
        Self {
            chunks: Vec::new(),
            fail_start: true,
        }
    }
}

#[cfg(test)]
impl MicrophoneDevice for MockMicrophone {
    fn start(
        &self,
        tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<Box<dyn MicStream>, DeviceError> {
        if self.fail_start {
            return Err(DeviceError::Unavailable(
                DeviceKind::Microphone,
                "mock microphone denied".into(),
            ));
        }
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone());
        }
        // The mock keeps the sender alive inside the guard so the channel
        // only closes when the guard is dropped, like a real stream.
        Ok(Box::new(MockMicGuard { _tx: tx }))
    }
}

#[cfg(test)]
struct MockMicGuard {
    _tx: mpsc::UnboundedSender<AudioChunk>,
}

#[cfg(test)]
impl MicStream for MockMicGuard {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_microphone_delivers_chunks_then_closes_on_drop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mic = MockMicrophone::chunks(3, 160);
        let guard = mic.start(tx).unwrap();

        for _ in 0..3 {
            let chunk = rx.recv().await.unwrap();
            assert_eq!(chunk.samples.len(), 160);
            assert_eq!(chunk.sample_rate, 16_000);
        }

        drop(guard);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn mock_unavailable_fails_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mic = MockMicrophone::unavailable();
        let err = mic.start(tx).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Unavailable(DeviceKind::Microphone, _)
        ));
    }

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }
}
