//! Prompt builder for the empathetic chat endpoint.
//!
//! [`PromptBuilder`] composes the single text prompt sent to `/chat`: the
//! user's transcript plus whatever emotion signals the session has gathered
//! so far, followed by the standing instruction to respond empathetically
//! and match the user's affect.

use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// Standing instruction appended to every chat prompt.
const CHAT_INSTRUCTION: &str = "\
Respond empathetically based on the user's emotions. If the user seems \
happy, match their enthusiasm. If they seem sad or anxious, respond with \
warmth and reassurance. If they are angry or frustrated, acknowledge their \
feelings and provide calming support. Maintain a natural and understanding \
tone in your response.";

/// Placeholder for a signal the pipeline has not produced yet.
const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// EmotionContext
// ---------------------------------------------------------------------------

/// The most recently known emotion signals at prompt-build time.
///
/// Within a voice pass the chat call runs concurrently with the audio
/// analysis, so the voice fields here are the *previous* pass's results —
/// `None` renders as `unknown` on the first pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmotionContext<'a> {
    pub image_emotion: Option<&'a str>,
    pub voice_emotion: Option<&'a str>,
    pub voice_tone: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds chat prompts.
///
/// ```
/// use emotion_capture::analysis::{EmotionContext, PromptBuilder};
///
/// let builder = PromptBuilder::new();
/// let prompt = builder.build(
///     "I had a great day",
///     &EmotionContext {
///         image_emotion: Some("Happy"),
///         ..Default::default()
///     },
/// );
/// assert!(prompt.contains("\"I had a great day\""));
/// assert!(prompt.contains("Detected face emotion: Happy"));
/// ```
#[derive(Debug, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Compose the full chat prompt from the transcript and known signals.
    pub fn build(&self, transcript: &str, context: &EmotionContext<'_>) -> String {
        let mut prompt = String::with_capacity(512);

        let _ = writeln!(prompt, "User transcript: \"{transcript}\"");
        prompt.push('\n');
        let _ = writeln!(
            prompt,
            "Detected face emotion: {}",
            context.image_emotion.unwrap_or(UNKNOWN)
        );
        let _ = writeln!(
            prompt,
            "Detected voice emotion: {}",
            context.voice_emotion.unwrap_or(UNKNOWN)
        );
        let _ = writeln!(
            prompt,
            "Detected voice tone: {}",
            context.voice_tone.unwrap_or(UNKNOWN)
        );
        prompt.push('\n');
        prompt.push_str(CHAT_INSTRUCTION);

        prompt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
