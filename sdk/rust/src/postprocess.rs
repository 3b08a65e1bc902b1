//! Post-processing pipeline applied to raw generator output
//! (spec.md §4.3 "Post-processing, applied in order").

use crate::types::{Class, Context};

/// Sentence-final punctuation used when truncation needs to back up to a
/// clean boundary.
const SENTENCE_ENDERS: &[char] = &['.', '!', '?'];

/// Step 2: strip a self-introduction prefix like "SynapseBot: hi there,".
/// Case-insensitive, matches `{bot_name}` followed by a common salutation
/// separator.
pub fn strip_self_introduction(bot_name: &str, text: &str) -> String {
    let lower = text.to_lowercase();
    let bot_lower = bot_name.to_lowercase();

    for sep in [":", ",", " -", " here,", " here:"] {
        let needle = format!("{bot_lower}{sep}");
        if let Some(pos) = lower.find(&needle) {
            if pos == 0 {
                let rest = &text[needle.len()..];
                return rest.trim_start().to_string();
            }
        }
    }
    text.to_string()
}

/// Step 3: scan for the first drift phrase and truncate there, then hard
/// truncate to `max_chars`, preferring to cut back to the last sentence
/// boundary; otherwise append an ellipsis + end marker.
pub fn truncate_drift_and_hard_limit(
    text: &str,
    drift_phrases: &[String],
    max_chars: usize,
    end_marker: &str,
) -> String {
    let lower = text.to_lowercase();
    let mut cut_at = text.len();
    for phrase in drift_phrases {
        if let Some(pos) = lower.find(phrase.to_lowercase().as_str())
            && pos < cut_at
        {
            cut_at = pos;
        }
    }
    let drifted = &text[..cut_at];
    let drift_hit = cut_at < text.len();

    let hard_truncated = hard_truncate(drifted, max_chars);
    if drift_hit || hard_truncated.1 {
        format!("{} {}", hard_truncated.0.trim_end(), end_marker)
    } else {
        hard_truncated.0
    }
}

/// Step 4: hard-truncate to `max_chars`, no end marker (used for the
/// `ask` context's 250-char ceiling).
pub fn truncate_ask(text: &str, max_chars: usize) -> String {
    hard_truncate(text, max_chars).0
}

/// Cuts `text` to at most `max_chars` characters, backing up to the last
/// sentence-final punctuation if one exists past the halfway point,
/// otherwise appending an ellipsis. Returns `(truncated, did_truncate)`.
fn hard_truncate(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let truncated: String = text.chars().take(max_chars).collect();
    if let Some(idx) = truncated.rfind(SENTENCE_ENDERS) {
        if idx >= max_chars / 2 {
            return (truncated[..=idx].to_string(), true);
        }
    }
    (format!("{}...", truncated.trim_end()), true)
}

/// Step 5: if the generator stopped because it hit `max_tokens`
/// (`finish_reason == "length"`) and the output doesn't already end with
/// an ellipsis, trim trailing punctuation and append `"..."`.
pub fn apply_length_finish_trim(text: &str, finish_reason: Option<&str>) -> String {
    if finish_reason != Some("length") || text.trim_end().ends_with("...") {
        return text.to_string();
    }
    let trimmed = text.trim_end().trim_end_matches(|c: char| c.is_ascii_punctuation());
    format!("{trimmed}...")
}

/// Step 6 / validity gate: non-empty, at least 3 characters, and not a
/// bare trivial word (`yes`/`no`/`ok`, any casing) as the entire response.
pub fn is_valid_response(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !matches!(lower.as_str(), "yes" | "no" | "ok")
}

/// Applies steps 1–6 for the `gen_long` / `ask` context combination. The
/// caller (LocalBackend/CloudBackend) is responsible for invoking this
/// after assembling the full streamed/non-streamed body.
pub fn postprocess(
    raw: &str,
    bot_name: &str,
    context: Context,
    class: Class,
    drift_phrases: &[String],
    finish_reason: Option<&str>,
    end_marker: &str,
) -> Option<String> {
    let mut text = raw.trim().to_string();
    text = strip_self_introduction(bot_name, &text);

    if class == Class::GenLong {
        text = truncate_drift_and_hard_limit(&text, drift_phrases, 400, end_marker);
    }
    if context == Context::Ask {
        text = truncate_ask(&text, 250);
    }
    text = apply_length_finish_trim(&text, finish_reason);

    if is_valid_response(&text) {
        Some(text)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_self_intro() {
        let out = strip_self_introduction("SynapseBot", "SynapseBot: hi there, how can I help?");
        assert_eq!(out, "hi there, how can I help?");
    }

    #[test]
    fn drift_phrase_truncates_at_offset() {
        let text = "Entropy measures uncertainty. in summary, it is complicated and long.";
        let drift = vec!["in summary".to_string()];
        let out = truncate_drift_and_hard_limit(&text, &drift, 400, "[END]");
        assert!(out.starts_with("Entropy measures uncertainty."));
        assert!(out.ends_with("[END]"));
        assert!(out.len() < text.len());
    }

    #[test]
    fn hard_truncate_prefers_sentence_boundary() {
        let text = "a".repeat(10) + ". " + &"b".repeat(300);
        let (out, truncated) = hard_truncate(&text, 250);
        assert!(truncated);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn ask_truncates_to_250() {
        let long = "x".repeat(400);
        let out = truncate_ask(&long, 250);
        assert!(out.chars().count() <= 253); // allow ellipsis
    }

    #[test]
    fn length_finish_reason_appends_ellipsis() {
        let out = apply_length_finish_trim("cut off mid sentence", Some("length"));
        assert!(out.ends_with("..."));
    }

    #[test]
    fn length_finish_reason_noop_if_already_ellipsis() {
        let out = apply_length_finish_trim("already done...", Some("length"));
        assert_eq!(out, "already done...");
    }

    #[test]
    fn rejects_trivial_bare_word() {
        assert!(!is_valid_response("ok"));
        assert!(!is_valid_response("OK"));
        assert!(!is_valid_response("No"));
        assert!(is_valid_response("no problem"));
        assert!(!is_valid_response("hi"));
    }
}
