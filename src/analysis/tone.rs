//! Voice-tone vocabulary.
//!
//! The audio endpoint reports tone as a short raw code (often a three-letter
//! abbreviation from the classifier's label set). The pipeline maps those
//! onto a small fixed vocabulary before they reach the session, defaulting
//! to `neutral` for anything unrecognised.

/// Map a raw tone code onto {`Happy`, `Angry`, `Sad`, `neutral`}.
///
/// Matching is case-insensitive and accepts both the abbreviated and the
/// spelled-out forms.
///
/// ```
/// use emotion_capture::analysis::normalize_tone;
///
/// assert_eq!(normalize_tone("hap"), "Happy");
/// assert_eq!(normalize_tone("Ang"), "Angry");
/// assert_eq!(normalize_tone("sad"), "Sad");
/// assert_eq!(normalize_tone("surprised"), "neutral");
/// ```
pub fn normalize_tone(code: &str) -> &'static str {
    match code.trim().to_ascii_lowercase().as_str() {
        "hap" | "happy" => "Happy",
        "ang" | "angry" => "Angry",
        "sad" => "Sad",
        _ => "neutral",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_vocabulary() {
        assert_eq!(normalize_tone("hap"), "Happy");
        assert_eq!(normalize_tone("ang"), "Angry");
        assert_eq!(normalize_tone("sad"), "Sad");
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        assert_eq!(normalize_tone("Hap"), "Happy");
        assert_eq!(normalize_tone("ANG"), "Angry");
        assert_eq!(normalize_tone(" sad "), "Sad");
    }

    #[test]
    fn spelled_out_labels_also_map() {
        assert_eq!(normalize_tone("Happy"), "Happy");
        assert_eq!(normalize_tone("angry"), "Angry");
    }

    #[test]
    fn anything_else_defaults_to_neutral() {
        assert_eq!(normalize_tone(""), "neutral");
        assert_eq!(normalize_tone("fear"), "neutral");
        assert_eq!(normalize_tone("disgust"), "neutral");
    }
}
