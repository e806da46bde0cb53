//! Small text transforms shared by every category parser.

use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));

static REFERENCE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\[[^\]]*\]").expect("valid regex"));

static LINK_DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[[^\]]+\]:\s*.*$").expect("valid regex"));

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));

static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s*").expect("valid regex"));

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Turn a display name into a kebab-case identifier.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_SLUG_RE.replace_all(&lowered, "");
    SEPARATOR_RE
        .replace_all(&stripped, "-")
        .trim_matches('-')
        .to_string()
}

/// Replace Markdown links with their display text and drop link
/// definition lines.
pub fn strip_markdown_links(text: &str) -> String {
    let text = INLINE_LINK_RE.replace_all(text, "$1");
    let text = REFERENCE_LINK_RE.replace_all(&text, "$1");
    LINK_DEFINITION_RE.replace_all(&text, "").to_string()
}

/// Unwrap `**bold**` spans.
pub fn strip_bold(text: &str) -> String {
    BOLD_RE.replace_all(text, "$1").to_string()
}

/// Remove leading `>` quote markers from every line.
pub fn strip_blockquotes(text: &str) -> String {
    BLOCKQUOTE_RE.replace_all(text, "").to_string()
}

/// Collapse runs of three or more newlines down to a paragraph break.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES_RE.replace_all(text, "\n\n").to_string()
}

/// Map an English count word (`one` through `five`) or a digit string to
/// a number.
pub fn word_to_number(word: &str) -> Option<u64> {
    match word.to_lowercase().as_str() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        other => other.parse().ok(),
    }
}

/// Everything in `text` before the first match of `end`, or all of it
/// when `end` never matches.
pub fn take_until<'a>(text: &'a str, end: &Regex) -> &'a str {
    match end.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

/// The span between the end of the first `head` match and the following
/// `end` match (or end of input). `None` when `head` never matches.
pub fn section<'a>(text: &'a str, head: &Regex, end: &Regex) -> Option<&'a str> {
    let m = head.find(text)?;
    Some(take_until(&text[m.end()..], end))
}

/// Split prose into sentences on whitespace that follows `.`, `!` or `?`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j > i + 1 {
                sentences.push(&text[start..=i]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_punctuation_and_joins_with_hyphens() {
        assert_eq!(slugify("Shadow College"), "shadow-college");
        assert_eq!(slugify("I Am the Law!"), "i-am-the-law");
        assert_eq!(slugify("  Dwarf  "), "dwarf");
    }

    #[test]
    fn strip_links_handles_inline_and_reference_styles() {
        assert_eq!(
            strip_markdown_links("see [Fury](../Classes/Fury.md) and [Kits][kits]"),
            "see Fury and Kits"
        );
        assert_eq!(
            strip_markdown_links("text\n[kits]: ../Kits/_Index.md\nmore"),
            "text\n\nmore"
        );
    }

    #[test]
    fn word_to_number_accepts_words_and_digits() {
        assert_eq!(word_to_number("Two"), Some(2));
        assert_eq!(word_to_number("3"), Some(3));
        assert_eq!(word_to_number("several"), None);
    }

    #[test]
    fn section_slices_between_heading_and_terminator() {
        let head = Regex::new(r"### Basics\s*\n\n").unwrap();
        let end = Regex::new(r"###").unwrap();
        let text = "### Basics\n\nStarting text here.\n\n### Next\n\nOther.";
        assert_eq!(section(text, &head, &end), Some("Starting text here.\n\n"));
        assert_eq!(section("no headings", &head, &end), None);
    }

    #[test]
    fn take_until_returns_whole_text_without_a_match() {
        let end = Regex::new(r"STOP").unwrap();
        assert_eq!(take_until("abc STOP def", &end), "abc ");
        assert_eq!(take_until("abc def", &end), "abc def");
    }

    #[test]
    fn split_sentences_breaks_on_terminal_punctuation() {
        let parts = split_sentences("You gain 2 wrath. When you deal damage, you gain 1 wrath!");
        assert_eq!(
            parts,
            ["You gain 2 wrath.", "When you deal damage, you gain 1 wrath!"]
        );
    }

    #[test]
    fn split_sentences_keeps_inline_decimals_together() {
        assert_eq!(split_sentences("Your size is 1.5 squares"), ["Your size is 1.5 squares"]);
    }

    #[test]
    fn strip_blockquotes_unwraps_quoted_lines() {
        assert_eq!(strip_blockquotes("> first\n> second\nplain"), "first\nsecond\nplain");
    }

    #[test]
    fn collapse_blank_lines_normalizes_paragraph_gaps() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb"), "a\n\nb");
    }
}
