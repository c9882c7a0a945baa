// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Text normalization, tokenization, and phrase parsing.
//!
//! Tokenization is a pure function: identical input yields identical output
//! on every platform. There is no locale dependence anywhere - case folding
//! is plain `to_lowercase`, and diacritics are stripped via NFKD so that
//! "café" and "cafe" index to the same term.
//!
//! Positions are assigned to *kept* tokens only: whitespace runs collapse and
//! punctuation disappears, so "a, b" tokenizes to positions 0 and 1, not 0
//! and 2. Both the index builder and the query parser go through this exact
//! path - any asymmetry here breaks phrase matching.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A normalized term with its 0-based kept-token ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Normalize a string for indexing and matching.
///
/// 1. NFKD (compatibility decomposition, so ligatures and width variants fold)
/// 2. Drop combining marks ("café" → "cafe")
/// 3. Lowercase
/// 4. Everything that is not a letter, digit, whitespace, or hyphen becomes
///    a single space
/// 5. Collapse whitespace runs
pub fn normalize(value: &str) -> String {
    value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokenize a string into normalized terms with kept-token positions.
///
/// Idempotent on normalized input: `tokenize(s)` equals
/// `tokenize(&normalize(s))` term-for-term.
pub fn tokenize(value: &str) -> Vec<Token> {
    normalize(value)
        .split(' ')
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(i, t)| Token {
            term: t.to_string(),
            position: i as u32,
        })
        .collect()
}

/// Quote characters that delimit a phrase. Straight double quotes and both
/// curly variants open and close interchangeably - real-world text mixes them.
fn is_phrase_quote(c: char) -> bool {
    matches!(c, '"' | '\u{201C}' | '\u{201D}')
}

/// Extract quoted phrases as ordered term sequences.
///
/// Contents between a quote character and the next one are tokenized through
/// the normal path. Phrases with zero surviving tokens are discarded, as is
/// a trailing unterminated quote.
pub fn extract_phrases(value: &str) -> Vec<Vec<String>> {
    let mut phrases = Vec::new();
    let mut current: Option<String> = None;

    for c in value.chars() {
        if is_phrase_quote(c) {
            match current.take() {
                Some(span) => {
                    let terms: Vec<String> =
                        tokenize(&span).into_iter().map(|t| t.term).collect();
                    if !terms.is_empty() {
                        phrases.push(terms);
                    }
                }
                None => current = Some(String::new()),
            }
        } else if let Some(span) = current.as_mut() {
            span.push(c);
        }
    }

    phrases
}

/// Strip the query of its quoted spans, leaving the free terms.
///
/// The quote characters and everything between matched pairs are removed so
/// that free-term tokenization does not double-count phrase words.
pub fn strip_phrases(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_phrase = false;

    for c in value.chars() {
        if is_phrase_quote(c) {
            in_phrase = !in_phrase;
            out.push(' ');
        } else if !in_phrase {
            out.push(c);
        }
    }

    out
}

/// Reduce markdown source to its visible text.
///
/// Block text is stored markdown-stripped so snippets read cleanly and so
/// formatting characters never leak into the lexicon. This handles the
/// common cases: heading markers, emphasis, inline code, fences, links, and
/// images. Plain text passes through unchanged.
pub fn strip_markdown(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_fence = false;

    for line in value.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            // Fenced code is kept verbatim minus the fence markers.
            push_line(&mut out, line);
            continue;
        }

        let line = trimmed.trim_start_matches('#').trim_start();
        let line = strip_links(line);
        let line: String = line
            .chars()
            .filter(|c| !matches!(c, '*' | '_' | '`' | '>'))
            .collect();
        push_line(&mut out, line.trim());
    }

    out.trim().to_string()
}

fn push_line(out: &mut String, line: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(line);
}

/// Rewrite `[text](url)` and `![alt](url)` to their text.
fn strip_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '!' if chars.peek() == Some(&'[') => {} // image marker, drop
            '[' => {
                // Copy the link text, then skip the (url) part if present.
                let mut text = String::new();
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    text.push(inner);
                }
                out.push_str(&text);
                if chars.peek() == Some(&'(') {
                    for inner in chars.by_ref() {
                        if inner == ')' {
                            break;
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(value: &str) -> Vec<String> {
        tokenize(value).into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn normalize_strips_diacritics_and_case() {
        assert_eq!(normalize("Café au Lait"), "cafe au lait");
        assert_eq!(normalize("naïve"), "naive");
    }

    #[test]
    fn normalize_replaces_punctuation_with_space() {
        assert_eq!(normalize("rate-limiting, applied!"), "rate-limiting applied");
        assert_eq!(normalize("a.b.c"), "a b c");
    }

    #[test]
    fn normalize_keeps_hyphens() {
        assert_eq!(normalize("local-first"), "local-first");
    }

    #[test]
    fn tokenize_positions_count_kept_tokens_only() {
        let tokens = tokenize("Hello,   cruel -- World!");
        let got: Vec<(&str, u32)> = tokens
            .iter()
            .map(|t| (t.term.as_str(), t.position))
            .collect();
        assert_eq!(got, vec![("hello", 0), ("cruel", 1), ("--", 2), ("world", 3)]);
    }

    #[test]
    fn tokenize_is_idempotent_on_normalized_input() {
        let raw = "Thé  QUICK,  brown—fox";
        let once = terms(raw);
        let twice = terms(&normalize(raw));
        assert_eq!(once, twice);
    }

    #[test]
    fn tokenize_empty_and_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n ").is_empty());
    }

    #[test]
    fn phrases_straight_quotes() {
        let phrases = extract_phrases(r#"find "react native bridge" throttling"#);
        assert_eq!(phrases, vec![vec!["react", "native", "bridge"]]);
    }

    #[test]
    fn phrases_curly_quotes() {
        let phrases = extract_phrases("find \u{201C}event rate\u{201D} now");
        assert_eq!(phrases, vec![vec!["event", "rate"]]);
    }

    #[test]
    fn phrases_mixed_quote_styles_pair_up() {
        // A curly close quote also opens: ”alpha beta” is a valid phrase.
        let phrases = extract_phrases("\u{201D}alpha beta\u{201D}");
        assert_eq!(phrases, vec![vec!["alpha", "beta"]]);
    }

    #[test]
    fn empty_phrase_discarded() {
        assert!(extract_phrases(r#"a "" b"#).is_empty());
        assert!(extract_phrases(r#""..,!""#).is_empty());
    }

    #[test]
    fn unterminated_quote_discarded() {
        assert!(extract_phrases(r#"just "dangling"#).is_empty());
    }

    #[test]
    fn strip_phrases_removes_quoted_spans() {
        let free = strip_phrases(r#""react native bridge" throttling"#);
        assert_eq!(terms(&free), vec!["throttling"]);
    }

    #[test]
    fn strip_markdown_headings_and_emphasis() {
        let md = "## Heading\n\nSome **bold** and `code` text.";
        assert_eq!(strip_markdown(md), "Heading\n\nSome bold and code text.");
    }

    #[test]
    fn strip_markdown_links_keep_text() {
        assert_eq!(
            strip_markdown("see [the docs](https://example.com) here"),
            "see the docs here"
        );
        assert_eq!(strip_markdown("![alt text](img.png)"), "alt text");
    }

    #[test]
    fn strip_markdown_fences() {
        let md = "before\n```rust\nlet x = 1;\n```\nafter";
        assert_eq!(strip_markdown(md), "before\nlet x = 1;\nafter");
    }
}
