//! Response-language handling
//!
//! The frontend reports the speech-recognition locale of the user's input
//! (e.g. `hi-IN`). That locale is mapped to a language name, the user message
//! gets an explicit instruction prefix, and a two-message primer is prepended
//! to the upstream history so the model keeps replying in that language. The
//! primer is never stored in session history.

use crate::session::{Part, Turn};

/// Resolves a frontend locale code to the language the model should reply in.
///
/// Unknown or missing codes fall back to English.
///
/// # Examples
///
/// ```
/// use sahayak::language::target_language;
///
/// assert_eq!(target_language(Some("hi-IN")), "Hindi");
/// assert_eq!(target_language(Some("en-US")), "English");
/// assert_eq!(target_language(None), "English");
/// ```
pub fn target_language(locale: Option<&str>) -> &'static str {
    match locale {
        Some("en-US") | Some("en-IN") => "English",
        Some("hi-IN") => "Hindi",
        Some("kn-IN") => "Kannada",
        Some("te-IN") => "Telugu",
        Some("ta-IN") => "Tamil",
        Some("mr-IN") => "Marathi",
        Some("gu-IN") => "Gujarati",
        Some("bn-IN") => "Bengali",
        Some("pa-IN") => "Punjabi",
        _ => "English",
    }
}

/// Prefixes the user message with the reply-language instruction.
///
/// English messages pass through unchanged; the instruction is always added
/// for other languages, even mid-session, because the model otherwise drifts
/// back to English.
pub fn apply_language_instruction(message: String, language: &str) -> String {
    if language == "English" {
        message
    } else {
        format!("[RESPOND IN {} ONLY - NOT ENGLISH] {}", language.to_uppercase(), message)
    }
}

/// Builds the primer turns prepended to the upstream history for non-English
/// sessions.
///
/// Returns an empty vector for English. The primer is part of the outgoing
/// request only and must not be appended to session history.
pub fn language_primer(language: &str) -> Vec<Turn> {
    if language == "English" {
        return Vec::new();
    }

    vec![
        Turn::user(vec![Part::text(format!(
            "You must ALWAYS respond in {} language. NEVER use English.",
            language
        ))]),
        Turn::model_text(format!("I will respond only in {}.", language)),
    ]
}
