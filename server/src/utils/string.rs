//! String utility functions

/// Default maximum length for preview text (in characters)
pub const PREVIEW_MAX_LENGTH: usize = 200;

/// Truncate text to max length with ellipsis
pub fn truncate_preview(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max_len {
        format!("{}...", text.chars().take(max_len).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_preview_short() {
        assert_eq!(truncate_preview("hello", PREVIEW_MAX_LENGTH), "hello");
    }

    #[test]
    fn test_truncate_preview_long() {
        let long_text = "a".repeat(300);
        let truncated = truncate_preview(&long_text, PREVIEW_MAX_LENGTH);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= PREVIEW_MAX_LENGTH + 3);
    }

    #[test]
    fn test_truncate_preview_trims_whitespace() {
        assert_eq!(truncate_preview("  hello  ", 100), "hello");
    }
}
