//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Settings for the remote analysis endpoints.
///
/// All three operations (`/upload`, `/analyze-audio`, `/chat`) hang off one
/// base URL; the hub service routes them to the individual models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of the analysis hub (e.g. `http://localhost:7000`).
    pub base_url: String,
    /// Maximum seconds to wait for an analysis response before timing out.
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7000".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for camera and microphone capture timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Camera device path — `None` means the platform default
    /// (`/dev/video0` on Linux).
    pub camera_device: Option<String>,
    /// Delay between camera acquisition and the still-frame grab, giving the
    /// device time to stabilise and the subject time to be ready.
    pub image_delay_ms: u64,
    /// Length of one voice-recording window. The consumer may stop a pass
    /// earlier; the window elapsing is authoritative.
    pub record_window_ms: u64,
    /// Sample rate recorded audio is normalised to before WAV encoding and
    /// recognition (must be 16 000 for the whisper engine).
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_device: None,
            image_delay_ms: 3_000,
            record_window_ms: 5_000,
            sample_rate: 16_000,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscribeConfig
// ---------------------------------------------------------------------------

/// Settings for the live transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeConfig {
    /// GGML model name / file stem (e.g. `"ggml-base"`), resolved inside
    /// [`AppPaths::models_dir`]. A missing file degrades the pipeline to an
    /// empty transcript instead of failing.
    pub model: String,
    /// Speech language as an ISO-639-1 code, or `"auto"` for built-in
    /// language detection.
    pub language: String,
    /// Seconds of newly buffered audio between two recognition updates.
    pub update_interval_secs: f32,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base".into(),
            language: "en".into(),
            update_interval_secs: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use emotion_capture::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote analysis endpoint settings.
    pub analysis: AnalysisConfig,
    /// Camera / microphone capture timing.
    pub capture: CaptureConfig,
    /// Live transcription engine settings.
    pub transcribe: TranscribeConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating the config directory on first run.
    pub fn save(&self) -> Result<()> {
        let paths = AppPaths::new();
        std::fs::create_dir_all(&paths.config_dir)?;
        self.save_to(&paths.settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.analysis.base_url, "http://localhost:7000");
        assert_eq!(config.capture.image_delay_ms, 3_000);
        assert_eq!(config.capture.record_window_ms, 5_000);
        assert_eq!(config.capture.sample_rate, 16_000);
        assert_eq!(config.transcribe.language, "en");
    }

    #[test]
    fn load_from_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.analysis.base_url, AppConfig::default().analysis.base_url);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut config = AppConfig::default();
        config.analysis.base_url = "http://example.test:9000".into();
        config.capture.record_window_ms = 8_000;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.analysis.base_url, "http://example.test:9000");
        assert_eq!(loaded.capture.record_window_ms, 8_000);
    }

    #[test]
    fn load_from_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is { not toml").unwrap();

        assert!(AppConfig::load_from(&path).is_err());
    }
}
