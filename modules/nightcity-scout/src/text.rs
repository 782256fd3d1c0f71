use std::sync::LazyLock;

use regex::Regex;

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip `[12]`-style reference markers and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let without_refs = REFERENCE_RE.replace_all(raw, "");
    WHITESPACE_RE.replace_all(&without_refs, " ").trim().to_string()
}

/// [`clean_text`], or `None` when nothing is left.
pub fn clean_opt(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Cut to at most `max_chars` characters at a word boundary, marking the cut with `...`.
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let head = match cut.rsplit_once(' ') {
        Some((head, _)) if !head.trim().is_empty() => head,
        _ => cut.as_str(),
    };
    format!("{}...", head.trim_end())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Occurrences of `word` in `haystack` bounded by non-word characters on both sides.
/// Both arguments are expected lowercase.
pub fn count_word(haystack: &str, word: &str) -> usize {
    if word.is_empty() {
        return 0;
    }
    haystack
        .match_indices(word)
        .filter(|(start, matched)| {
            let before = haystack[..*start].chars().next_back();
            let after = haystack[start + matched.len()..].chars().next();
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
        .count()
}

pub fn contains_word(haystack: &str, word: &str) -> bool {
    count_word(haystack, word) > 0
}
