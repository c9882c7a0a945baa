// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Budget-bounded context patch projection.
//!
//! A pure projection from ranked hits to the structured shape downstream
//! prompt assembly expects: a couple of orienting background sentences, the
//! snippets themselves with their sources, and (for now empty) definition
//! and fact slots kept stable so consumers never need shape migrations.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::query::Hit;

/// Budget presets mapping to `(max_snippets, max_chars)` per snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchBudget {
    /// (3, 240)
    Mini,
    /// (6, 420)
    #[default]
    Small,
    /// (10, 900)
    Full,
}

impl PatchBudget {
    fn limits(self) -> (usize, usize) {
        match self {
            PatchBudget::Mini => (3, 240),
            PatchBudget::Small => (6, 420),
            PatchBudget::Full => (10, 900),
        }
    }
}

/// One projected snippet.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The projected patch. `definitions` and `facts` are always present and
/// currently always empty.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextPatch {
    pub background: Vec<String>,
    pub snippets: Vec<Snippet>,
    pub definitions: Vec<String>,
    pub facts: Vec<String>,
}

/// A sentence of 10-200 characters terminated by `.`, `!`, or `?`.
static FIRST_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*(.{9,199}?[.!?])").expect("sentence regex compiles"));

/// Fallback prefix length when no bounded sentence is found.
const BACKGROUND_FALLBACK_CHARS: usize = 160;

/// How many leading snippets contribute a background sentence.
const BACKGROUND_SNIPPETS: usize = 2;

/// Project ranked hits into a budgeted patch.
pub fn make_context_patch(hits: &[Hit], budget: PatchBudget) -> ContextPatch {
    let (max_snippets, max_chars) = budget.limits();

    let snippets: Vec<Snippet> = hits
        .iter()
        .take(max_snippets)
        .map(|hit| Snippet {
            text: truncate_chars(&hit.text, max_chars),
            source: hit.source.clone(),
        })
        .collect();

    let background = hits
        .iter()
        .take(BACKGROUND_SNIPPETS)
        .filter_map(|hit| first_sentence(&hit.text))
        .collect();

    ContextPatch {
        background,
        snippets,
        definitions: Vec::new(),
        facts: Vec::new(),
    }
}

/// Truncate at a char bound, appending an ellipsis on overflow.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut count = 0;
    for (byte_index, _) in text.char_indices() {
        if count == max_chars {
            return format!("{}…", &text[..byte_index]);
        }
        count += 1;
    }
    text.to_string()
}

fn first_sentence(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    match FIRST_SENTENCE.captures(text) {
        Some(caps) => Some(caps[1].trim().to_string()),
        None => Some(truncate_chars(text.trim(), BACKGROUND_FALLBACK_CHARS)),
    }
}
