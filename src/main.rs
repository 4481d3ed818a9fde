//! Application entry point — headless emotion-capture runner.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the camera, microphone and recognition engine, degrading to a
//!    null recognizer when no whisper model is installed.
//! 4. Spawn the [`CaptureOrchestrator`] on the tokio runtime.
//! 5. Relay stage changes to stdout; Enter starts another voice pass from
//!    `Complete`, Ctrl-C tears the session down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use emotion_capture::analysis::HttpAnalysisClient;
use emotion_capture::capture::{AudioCaptureService, ImageCaptureService};
use emotion_capture::config::{AppConfig, AppPaths};
use emotion_capture::device::{CameraDevice, CpalMicrophone, DeviceRegistry};
use emotion_capture::pipeline::{
    new_shared_session, CaptureOrchestrator, SessionCommand, SessionSnapshot, Stage,
};
use emotion_capture::transcribe::{
    LiveTranscription, NullRecognizer, RecognitionEngine, WhisperRecognizer,
};

// ---------------------------------------------------------------------------
// Platform camera
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
fn open_camera(config: &AppConfig) -> Result<Arc<dyn CameraDevice>> {
    use emotion_capture::device::V4lCamera;
    Ok(Arc::new(V4lCamera::new(
        config.capture.camera_device.clone(),
    )))
}

#[cfg(not(target_os = "linux"))]
fn open_camera(_config: &AppConfig) -> Result<Arc<dyn CameraDevice>> {
    anyhow::bail!("no camera backend is available on this platform")
}

// ---------------------------------------------------------------------------
// Recognition engine
// ---------------------------------------------------------------------------

/// Load the whisper model, or degrade to the null recognizer so the
/// pipeline still runs — just with an empty transcript.
fn build_recognizer(config: &AppConfig) -> Arc<dyn RecognitionEngine> {
    let model_path = AppPaths::new()
        .models_dir
        .join(format!("{}.bin", config.transcribe.model));

    match WhisperRecognizer::load(&model_path, &config.transcribe.language) {
        Ok(engine) => {
            log::info!("whisper model loaded: {}", model_path.display());
            Arc::new(engine)
        }
        Err(e) => {
            log::warn!(
                "could not load whisper model ({}): {e}; continuing without live transcription",
                model_path.display()
            );
            Arc::new(NullRecognizer)
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_snapshot(snapshot: &SessionSnapshot) {
    let field = |value: &Option<String>| value.as_deref().unwrap_or("-").to_string();

    println!();
    println!("  image emotion: {}", field(&snapshot.image_emotion));
    println!("  voice emotion: {}", field(&snapshot.voice_emotion));
    println!("  voice tone:    {}", field(&snapshot.voice_tone));
    println!("  response:      {}", field(&snapshot.chat_response));
    if let Some(error) = &snapshot.error {
        println!("  error:         {error}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("emotion-capture starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Devices and services
    let registry = DeviceRegistry::new();
    let session = new_shared_session();

    let image = ImageCaptureService::new(
        registry.clone(),
        open_camera(&config)?,
        Duration::from_millis(config.capture.image_delay_ms),
    );
    let audio = AudioCaptureService::new(
        registry.clone(),
        Arc::new(CpalMicrophone::new()),
        config.capture.sample_rate,
    );
    let transcription = LiveTranscription::new(
        build_recognizer(&config),
        config.transcribe.update_interval_secs,
    );
    let client = Arc::new(HttpAnalysisClient::from_config(&config.analysis));

    // 4. Orchestrator
    let orchestrator = CaptureOrchestrator::new(
        Arc::clone(&session),
        image,
        audio,
        transcription,
        client,
        Duration::from_millis(config.capture.record_window_ms),
    );
    let cancel = orchestrator.cancellation_token();

    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(8);
    let mut runner = tokio::spawn(orchestrator.run(command_rx));

    // 5. Relay stage changes; Enter re-records, Ctrl-C cancels.
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_stage: Option<Stage> = None;

    loop {
        tokio::select! {
            joined = &mut runner => {
                joined?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted, tearing the session down");
                cancel.cancel();
            }
            line = stdin.next_line(), if stdin_open => {
                match line? {
                    Some(_) if session.lock().unwrap().stage == Stage::Complete => {
                        let _ = command_tx.send(SessionCommand::StartVoicePass).await;
                    }
                    Some(_) => {}
                    None => stdin_open = false,
                }
            }
            _ = ticker.tick() => {
                let snapshot = session.lock().unwrap().snapshot();
                if last_stage != Some(snapshot.stage) {
                    last_stage = Some(snapshot.stage);
                    println!("{}", snapshot.stage.label());
                    if snapshot.stage == Stage::Complete {
                        print_snapshot(&snapshot);
                        println!("press Enter for another voice pass, Ctrl-C to exit");
                    }
                }
            }
        }
    }

    let snapshot = session.lock().unwrap().snapshot();
    print_snapshot(&snapshot);
    Ok(())
}
