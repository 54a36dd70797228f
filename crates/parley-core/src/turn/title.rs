//! Chat titles derived from the first user utterance.

/// Longest title, in characters, before truncation.
pub const MAX_TITLE_CHARS: usize = 48;

/// Derive a chat title from an utterance.
///
/// Takes the first non-blank line, collapses runs of whitespace, and
/// truncates to [`MAX_TITLE_CHARS`] with a trailing ellipsis. Returns `None`
/// when the utterance has no visible text.
pub fn derive_title(utterance: &str) -> Option<String> {
    let line = utterance.lines().find(|line| !line.trim().is_empty())?;
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return Some(collapsed);
    }

    let truncated: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    Some(format!("{}…", truncated.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_utterance_is_title() {
        assert_eq!(derive_title("hello").as_deref(), Some("hello"));
    }

    #[test]
    fn test_first_line_and_collapsed_whitespace() {
        let title = derive_title("\n\n  plan   a\ttrip  \nto Tokyo").unwrap();
        assert_eq!(title, "plan a trip");
    }

    #[test]
    fn test_long_utterance_truncated_on_char_boundary() {
        let input = "ü".repeat(60);
        let title = derive_title(&input).unwrap();
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_blank_utterance_has_no_title() {
        assert!(derive_title("  \n\t ").is_none());
    }
}
