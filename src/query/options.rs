// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Query options and their eager validation.
//!
//! Options deserialize from JSON with `deny_unknown_fields`, so a typo'd
//! option is a hard error rather than a silent no-op. Range checks run in
//! [`validate_query_options`] before any scan touches the pack; invalid
//! shapes never reach the pipeline.

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Options for [`crate::query`]. All fields have defaults; `QueryOptions::default()`
/// is a plain top-10 lexical query with expansion enabled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct QueryOptions {
    /// Maximum hits returned after diversification.
    pub top_k: usize,
    /// Drop hits whose pre-diversification score falls below this.
    pub min_score: Option<f64>,
    /// Additional phrases that must appear (normalized), on top of any
    /// quoted phrases in the query text.
    pub require_phrases: Vec<String>,
    /// Restrict to blocks whose normalized namespace matches one of these.
    /// Accepts a single string or an array in JSON.
    #[serde(deserialize_with = "one_or_many")]
    pub namespace: Vec<String>,
    /// Restrict to blocks whose normalized doc id matches one of these.
    #[serde(deserialize_with = "one_or_many")]
    pub source: Vec<String>,
    pub query_expansion: ExpansionOptions,
    pub semantic: SemanticOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: None,
            require_phrases: Vec::new(),
            namespace: Vec::new(),
            source: Vec::new(),
            query_expansion: ExpansionOptions::default(),
            semantic: SemanticOptions::default(),
        }
    }
}

/// Deterministic pseudo-relevance feedback knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ExpansionOptions {
    pub enabled: bool,
    /// How many top-ranked blocks feed the term pool.
    pub docs: usize,
    /// How many expansion terms to keep.
    pub terms: usize,
    /// Base weight of an expansion occurrence relative to a real query term.
    pub weight: f64,
    /// Terms shorter than this never expand.
    pub min_term_length: usize,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            docs: 3,
            terms: 4,
            weight: 0.35,
            min_term_length: 3,
        }
    }
}

/// Semantic rerank knobs. Off by default; when enabled the rerank still only
/// fires on low lexical confidence unless `force` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SemanticOptions {
    pub enabled: bool,
    pub mode: SemanticMode,
    /// How many top candidates enter the rerank.
    pub top_n: usize,
    /// Rerank fires when lexical confidence falls below this (in `[0, 1]`).
    pub min_lex_confidence: f64,
    pub blend: BlendOptions,
    /// The caller's query embedding, same model and dimensionality as the
    /// pack's semantic section. Required whenever `enabled` is set.
    pub query_embedding: Option<Vec<f32>>,
    /// Rerank unconditionally, and error instead of skipping when the pack
    /// has no semantic section.
    pub force: bool,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SemanticMode::Rerank,
            top_n: 50,
            min_lex_confidence: 0.35,
            blend: BlendOptions::default(),
            query_embedding: None,
            force: false,
        }
    }
}

/// The only semantic mode today: bounded-N rerank of lexical candidates.
/// (Not an ANN search; the pack carries no neighbor index.)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticMode {
    #[default]
    Rerank,
}

/// Lexical/semantic score blending.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BlendOptions {
    pub enabled: bool,
    pub w_lex: f64,
    pub w_sem: f64,
}

impl Default for BlendOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            w_lex: 0.75,
            w_sem: 0.25,
        }
    }
}

/// Accept `"one"` or `["one", "two"]` for scoping filters.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Validate option shapes before any scan. Fails on the first problem,
/// naming the offending field.
pub fn validate_query_options(options: &QueryOptions) -> Result<()> {
    if let Some(min_score) = options.min_score {
        if !min_score.is_finite() {
            return Err(Error::InvalidInput("minScore: must be finite".into()));
        }
    }

    let expansion = &options.query_expansion;
    if !expansion.weight.is_finite() || expansion.weight < 0.0 {
        return Err(Error::InvalidInput(
            "queryExpansion.weight: must be a non-negative number".into(),
        ));
    }

    let semantic = &options.semantic;
    if !(0.0..=1.0).contains(&semantic.min_lex_confidence) {
        return Err(Error::InvalidInput(
            "semantic.minLexConfidence: must be within [0, 1]".into(),
        ));
    }
    if !semantic.blend.w_lex.is_finite()
        || !semantic.blend.w_sem.is_finite()
        || semantic.blend.w_lex < 0.0
        || semantic.blend.w_sem < 0.0
    {
        return Err(Error::InvalidInput(
            "semantic.blend: weights must be non-negative numbers".into(),
        ));
    }
    if semantic.enabled {
        match &semantic.query_embedding {
            None => {
                return Err(Error::InvalidInput(
                    "semantic.queryEmbedding: required when semantic rerank is enabled".into(),
                ))
            }
            Some(embedding) => {
                if embedding.is_empty() {
                    return Err(Error::InvalidInput(
                        "semantic.queryEmbedding: must not be empty".into(),
                    ));
                }
                if !embedding.iter().all(|v| v.is_finite()) {
                    return Err(Error::InvalidInput(
                        "semantic.queryEmbedding: contains a non-finite value".into(),
                    ));
                }
            }
        }
    }

    Ok(())
}
