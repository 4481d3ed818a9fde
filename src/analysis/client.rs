//! Core `AnalysisClient` trait and `HttpAnalysisClient` implementation.
//!
//! The production client talks to the analysis hub's three endpoints —
//! `/upload` (image emotion), `/analyze-audio` (voice emotion + tone code)
//! and `/chat` (empathetic reply). All connection details come from
//! [`AnalysisConfig`]; nothing is hardcoded. Each operation is one
//! request/response exchange with no retry — the pipeline's retry unit is a
//! whole user-triggered pass.
//!
//! [`AnalysisConfig`]: crate::config::AnalysisConfig

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AnalysisConfig;

// ---------------------------------------------------------------------------
// AnalysisError
// ---------------------------------------------------------------------------

/// Errors from the analysis endpoints.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("analysis request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse analysis response: {0}")]
    Parse(String),

    /// The endpoint returned a response with no usable content.
    #[error("analysis service returned an empty result")]
    EmptyResponse,
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else {
            AnalysisError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// AudioAnalysis
// ---------------------------------------------------------------------------

/// Result of one `/analyze-audio` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAnalysis {
    /// Freeform voice-emotion label.
    pub emotion: String,
    /// Raw tone code (e.g. `"hap"`), when the endpoint reports one. Mapped
    /// onto the fixed vocabulary by [`crate::analysis::normalize_tone`]
    /// before it reaches the session.
    pub tone_code: Option<String>,
}

// ---------------------------------------------------------------------------
// AnalysisClient trait
// ---------------------------------------------------------------------------

/// Async boundary to the three remote analysis operations.
///
/// Implementors must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn AnalysisClient>`.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Upload one JPEG frame and return its emotion label.
    async fn analyze_image(&self, jpeg: &[u8]) -> Result<String, AnalysisError>;

    /// Upload one WAV recording and return its emotion label and tone code.
    async fn analyze_audio(&self, wav: &[u8]) -> Result<AudioAnalysis, AnalysisError>;

    /// Send the composed prompt and return the generated reply.
    async fn chat(&self, prompt: &str) -> Result<String, AnalysisError>;
}

// ---------------------------------------------------------------------------
// HttpAnalysisClient
// ---------------------------------------------------------------------------

/// Production client over `reqwest`.
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl HttpAnalysisClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`. A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze_image(&self, jpeg: &[u8]) -> Result<String, AnalysisError> {
        let part = reqwest::multipart::Part::bytes(jpeg.to_vec())
            .file_name("capture.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| AnalysisError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("/upload"))
            .multipart(form)
            .send()
            .await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        let label = json["response"]
            .as_str()
            .ok_or(AnalysisError::EmptyResponse)?
            .trim()
            .to_string();

        if label.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        Ok(label)
    }

    async fn analyze_audio(&self, wav: &[u8]) -> Result<AudioAnalysis, AnalysisError> {
        let part = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| AnalysisError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(self.endpoint("/analyze-audio"))
            .multipart(form)
            .send()
            .await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        let emotion = json["response"]
            .as_str()
            .ok_or(AnalysisError::EmptyResponse)?
            .trim()
            .to_string();

        if emotion.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        let tone_code = json["top_emotion"].as_str().map(|s| s.trim().to_string());

        Ok(AudioAnalysis { emotion, tone_code })
    }

    async fn chat(&self, prompt: &str) -> Result<String, AnalysisError> {
        let body = serde_json::json!({ "text": prompt });

        let response = self
            .client
            .post(self.endpoint("/chat"))
            .json(&body)
            .send()
            .await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        let reply = json["text"]
            .as_str()
            .ok_or(AnalysisError::EmptyResponse)?
            .trim()
            .to_string();

        if reply.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// MockAnalysisClient  (test-only)
// ---------------------------------------------------------------------------

/// Test double with scripted results, call counters, and an optional delay
/// for cancellation tests.
#[cfg(test)]
pub struct MockAnalysisClient {
    pub image_result: Result<String, AnalysisError>,
    pub audio_result: Result<AudioAnalysis, AnalysisError>,
    pub chat_result: Result<String, AnalysisError>,
    pub delay: Option<std::time::Duration>,
    pub image_calls: std::sync::atomic::AtomicUsize,
    pub audio_calls: std::sync::atomic::AtomicUsize,
    pub chat_calls: std::sync::atomic::AtomicUsize,
    pub last_prompt: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl MockAnalysisClient {
    /// All three operations succeed with the given values.
    pub fn ok(image: &str, audio: AudioAnalysis, chat: &str) -> Self {
        Self {
            image_result: Ok(image.to_string()),
            audio_result: Ok(audio),
            chat_result: Ok(chat.to_string()),
            delay: None,
            image_calls: std::sync::atomic::AtomicUsize::new(0),
            audio_calls: std::sync::atomic::AtomicUsize::new(0),
            chat_calls: std::sync::atomic::AtomicUsize::new(0),
            last_prompt: std::sync::Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn image_call_count(&self) -> usize {
        self.image_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn audio_call_count(&self) -> usize {
        self.audio_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn chat_call_count(&self) -> usize {
        self.chat_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// The prompt passed to the most recent `chat` call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
#[async_trait]
impl AnalysisClient for MockAnalysisClient {
    async fn analyze_image(&self, _jpeg: &[u8]) -> Result<String, AnalysisError> {
        self.image_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.pause().await;
        self.image_result.clone()
    }

    async fn analyze_audio(&self, _wav: &[u8]) -> Result<AudioAnalysis, AnalysisError> {
        self.audio_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.pause().await;
        self.audio_result.clone()
    }

    async fn chat(&self, prompt: &str) -> Result<String, AnalysisError> {
        self.chat_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        self.pause().await;
        self.chat_result.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> AnalysisConfig {
        AnalysisConfig {
            base_url: "http://localhost:7000".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _client = HttpAnalysisClient::from_config(&make_config());
    }

    #[test]
    fn endpoint_joins_base_url_and_path() {
        let client = HttpAnalysisClient::from_config(&make_config());
        assert_eq!(client.endpoint("/chat"), "http://localhost:7000/chat");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash_in_base_url() {
        let mut config = make_config();
        config.base_url = "http://localhost:7000/".into();
        let client = HttpAnalysisClient::from_config(&config);
        assert_eq!(client.endpoint("/upload"), "http://localhost:7000/upload");
    }

    /// Verify that `HttpAnalysisClient` is object-safe.
    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn AnalysisClient> =
            Box::new(HttpAnalysisClient::from_config(&make_config()));
        drop(client);
    }

    #[tokio::test]
    async fn mock_counts_calls_per_operation() {
        let mock = MockAnalysisClient::ok(
            "happy",
            AudioAnalysis {
                emotion: "sad".into(),
                tone_code: Some("sad".into()),
            },
            "I'm here for you",
        );

        let _ = mock.analyze_image(&[1, 2, 3]).await;
        let _ = mock.chat("hello").await;
        let _ = mock.chat("again").await;

        assert_eq!(mock.image_call_count(), 1);
        assert_eq!(mock.audio_call_count(), 0);
        assert_eq!(mock.chat_call_count(), 2);
    }
}
