//! Follow-up suggestion extraction
//!
//! When the frontend asks for auto-analysis, the model reply often ends with
//! a numbered or bulleted list of questions the user could ask next. This
//! module pulls that list out of the reply text so the UI can render the
//! questions as tappable chips, stripping them from the main message.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum number of suggestions surfaced to the frontend.
pub const MAX_SUGGESTIONS: usize = 5;

/// Result of scanning a model reply for suggested questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSuggestions {
    /// Reply text with the suggestion list removed (unchanged when none found).
    pub message: String,
    /// Up to [`MAX_SUGGESTIONS`] extracted questions, in reply order.
    pub suggestions: Vec<String>,
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+[.)]|-|\*)\s*(.+)$").expect("list item regex"))
}

/// Extracts trailing suggested-question list items from a model reply.
///
/// The scan walks the reply line by line and collects the first contiguous
/// run of list items (`1.`, `2)`, `-`, `*`). When items are found they are
/// removed from the message; otherwise the message passes through unchanged
/// and the caller may fall back to asking the model for suggestions directly.
///
/// # Examples
///
/// ```
/// use sahayak::suggestions::extract_suggestions;
///
/// let reply = "This is a cat.\n\nQuestions you can ask:\n1. What breed is it?\n2. How old is it?";
/// let extracted = extract_suggestions(reply);
/// assert_eq!(extracted.suggestions.len(), 2);
/// assert!(extracted.message.starts_with("This is a cat."));
/// assert!(!extracted.message.contains("What breed"));
/// ```
pub fn extract_suggestions(message: &str) -> ExtractedSuggestions {
    let mut suggestions = Vec::new();
    let mut kept_lines = Vec::new();
    let mut in_list = false;

    for line in message.lines() {
        let trimmed = line.trim();
        if let Some(captures) = list_item_re().captures(trimmed) {
            if suggestions.len() < MAX_SUGGESTIONS {
                let question = captures[2].trim().to_string();
                if !question.is_empty() {
                    suggestions.push(question);
                    in_list = true;
                    continue;
                }
            }
            // A sixth-or-later item is still dropped from the message so the
            // list is removed as a whole.
            if in_list {
                continue;
            }
        } else if in_list && trimmed.is_empty() {
            continue;
        } else {
            in_list = false;
        }
        kept_lines.push(line);
    }

    if suggestions.is_empty() {
        return ExtractedSuggestions {
            message: message.to_string(),
            suggestions,
        };
    }

    // Drop a dangling list header such as "Suggested questions:" left right
    // above the removed items.
    while let Some(last) = kept_lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() || is_suggestion_header(trimmed) {
            kept_lines.pop();
        } else {
            break;
        }
    }

    ExtractedSuggestions {
        message: kept_lines.join("\n").trim().to_string(),
        suggestions,
    }
}

fn is_suggestion_header(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^(suggested questions?|questions? you can ask|you might ask|try asking):?$")
            .expect("header regex")
    });
    re.is_match(line)
}

/// Cleans model output produced by a direct ask-for-suggestions prompt.
///
/// Splits on newlines, trims, drops meta lines starting with "question",
/// "suggestion", "you can", or "try", and caps the result at
/// [`MAX_SUGGESTIONS`].
pub fn parse_generated_suggestions(text: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let meta = RE.get_or_init(|| {
        Regex::new(r"(?i)^(question|suggestion|you can|try)").expect("meta regex")
    });

    text.lines()
        .map(|line| {
            let trimmed = line.trim();
            match list_item_re().captures(trimmed) {
                Some(captures) => captures[2].trim().to_string(),
                None => trimmed.to_string(),
            }
        })
        .filter(|line| !line.is_empty() && !meta.is_match(line))
        .take(MAX_SUGGESTIONS)
        .collect()
}
