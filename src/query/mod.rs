// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The query pipeline: where the rubber meets the road.
//!
//! Ten ordered steps, all in-memory, no I/O, no locks:
//!
//! 1. parse the query into free terms and a required phrase set
//! 2. one linear scan of the posting stream (candidates + query-time DF)
//! 3. phrase rescue when free terms alone matched nothing
//! 4. namespace/source filters and phrase enforcement
//! 5. heading overlap
//! 6. BM25L with proximity, phrase, and heading adjustments
//! 7. deterministic pseudo-relevance expansion
//! 8. KNS tie-break
//! 9. optional semantic rerank, gated on lexical confidence
//! 10. hand the bounded pool to the diversifier
//!
//! Given identical pack bytes and identical inputs the output is
//! bit-for-bit identical: every map that feeds a float accumulation is
//! ordered, and every sort has a total key.

mod expansion;
mod options;
mod scoring;
mod semantic;

pub use options::{
    validate_query_options, BlendOptions, ExpansionOptions, QueryOptions, SemanticMode,
    SemanticOptions,
};
pub use semantic::lex_confidence;

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::diversify::diversify;
use crate::error::Result;
use crate::index::walk_stream;
use crate::pack::Pack;
use crate::signature::{kns_distance, kns_signature};
use crate::text::{extract_phrases, normalize, strip_phrases, tokenize};

/// One ranked result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    pub block_id: u32,
    pub score: f64,
    pub text: String,
    /// The originating document's external id, when it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Per-block scratch state accumulated across the pipeline. Ordered maps
/// keep float accumulation order stable.
#[derive(Debug, Clone, Default)]
pub(crate) struct Candidate {
    pub block_id: u32,
    pub tf: BTreeMap<u32, f64>,
    pub pos: BTreeMap<u32, Vec<u32>>,
    pub has_phrase: bool,
    pub heading_score: f64,
    pub score: f64,
}

/// Run a query against a mounted pack. See [`QueryOptions`] for the knobs.
///
/// An empty candidate set after filtering is an empty result, not an error.
pub fn query(pack: &Pack, query_text: &str, options: &QueryOptions) -> Result<Vec<Hit>> {
    validate_query_options(options)?;
    let cfg = ScoringConfig::default();

    // ---- Step 1: parse ----------------------------------------------------
    let free_terms: Vec<String> = tokenize(&strip_phrases(query_text))
        .into_iter()
        .map(|t| t.term)
        .collect();
    let quoted = extract_phrases(query_text);

    let mut required: Vec<Vec<String>> = quoted.clone();
    for phrase in &options.require_phrases {
        let terms: Vec<String> = tokenize(phrase).into_iter().map(|t| t.term).collect();
        if !terms.is_empty() {
            required.push(terms);
        }
    }

    let free_ids: HashSet<u32> = free_terms
        .iter()
        .filter_map(|t| pack.term_id(t))
        .collect();

    // ---- Step 2: candidate scan -------------------------------------------
    // DF is collected for every term in the stream, over all blocks - the
    // same pass later serves expansion terms without rescanning for counts.
    let (df, mut candidates) = scan(pack, &free_ids)?;

    // ---- Step 3: phrase rescue --------------------------------------------
    if candidates.is_empty() && !required.is_empty() {
        let phrase_ids: HashSet<u32> = required
            .iter()
            .flatten()
            .filter_map(|t| pack.term_id(t))
            .collect();
        candidates = scan(pack, &phrase_ids)?.1;
    }

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    // ---- Step 4: filters and phrase enforcement ---------------------------
    let namespace_filter: HashSet<String> =
        options.namespace.iter().map(|s| normalize(s)).collect();
    let source_filter: HashSet<String> = options.source.iter().map(|s| normalize(s)).collect();

    candidates.retain(|_, cand| passes_filters(pack, cand.block_id, &namespace_filter, &source_filter));

    if !required.is_empty() {
        candidates.retain(|_, cand| {
            let block = &pack.blocks[cand.block_id as usize];
            let text_terms: Vec<String> =
                tokenize(&block.text).into_iter().map(|t| t.term).collect();
            required.iter().all(|p| contains_phrase(&text_terms, p))
        });
        if !quoted.is_empty() {
            for cand in candidates.values_mut() {
                cand.has_phrase = true;
            }
        }
    }

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    // ---- Step 5: heading overlap ------------------------------------------
    let query_term_set: HashSet<String> =
        tokenize(query_text).into_iter().map(|t| t.term).collect();
    score_headings(pack, &query_term_set, &mut candidates);

    // ---- Step 6: BM25L ----------------------------------------------------
    score_candidates(pack, &df, &cfg, &mut candidates);

    // ---- Step 7: expansion ------------------------------------------------
    if options.query_expansion.enabled && options.query_expansion.terms > 0 {
        let mut base_terms: HashSet<String> = free_terms.iter().cloned().collect();
        for phrase in &required {
            base_terms.extend(phrase.iter().cloned());
        }
        let expanded = expansion::expand(
            pack,
            &options.query_expansion,
            &base_terms,
            &mut candidates,
            required.is_empty(),
            &namespace_filter,
            &source_filter,
        )?;
        if expanded {
            score_headings(pack, &query_term_set, &mut candidates);
            score_candidates(pack, &df, &cfg, &mut candidates);
        }
    }

    // ---- Step 8: KNS tie-break --------------------------------------------
    let query_sig = kns_signature(&normalize(query_text));
    for cand in candidates.values_mut() {
        let block_sig = kns_signature(&normalize(&pack.blocks[cand.block_id as usize].text));
        let distance = kns_distance(query_sig, block_sig);
        cand.score *= 1.0 + cfg.kns_strength * (1.0 - distance);
    }

    let mut ordered: Vec<Candidate> = candidates.into_values().collect();
    sort_by_score(&mut ordered);

    // ---- Step 9: semantic rerank ------------------------------------------
    semantic::maybe_rerank(pack, &options.semantic, &mut ordered)?;

    if let Some(min_score) = options.min_score {
        ordered.retain(|c| c.score >= min_score);
    }

    // ---- Step 10: diversify -----------------------------------------------
    let pool: Vec<Hit> = ordered
        .into_iter()
        .take(options.top_k.saturating_mul(5))
        .map(|cand| {
            let block = &pack.blocks[cand.block_id as usize];
            Hit {
                block_id: cand.block_id,
                score: cand.score,
                text: block.text.clone(),
                source: block.doc_id.clone(),
                namespace: block.namespace.clone(),
            }
        })
        .collect();

    log::trace!("query {:?}: {} pooled candidates", query_text, pool.len());
    Ok(diversify(pool, options.top_k, &cfg))
}

/// One linear pass over the posting stream. Returns query-time document
/// frequencies for *every* scanned term plus candidate entries for the
/// relevant ones.
fn scan(
    pack: &Pack,
    relevant: &HashSet<u32>,
) -> Result<(BTreeMap<u32, u32>, BTreeMap<u32, Candidate>)> {
    let mut df: BTreeMap<u32, u32> = BTreeMap::new();
    let mut candidates: BTreeMap<u32, Candidate> = BTreeMap::new();

    walk_stream(&pack.postings, pack.block_bias, |term_id, block_id, positions| {
        *df.entry(term_id).or_insert(0) += 1;
        if relevant.contains(&term_id) {
            let cand = candidates.entry(block_id).or_insert_with(|| Candidate {
                block_id,
                ..Candidate::default()
            });
            cand.tf.insert(term_id, positions.len() as f64);
            cand.pos.insert(term_id, positions.to_vec());
        }
    })?;

    Ok((df, candidates))
}

fn passes_filters(
    pack: &Pack,
    block_id: u32,
    namespace_filter: &HashSet<String>,
    source_filter: &HashSet<String>,
) -> bool {
    let block = &pack.blocks[block_id as usize];
    if !namespace_filter.is_empty() {
        match &block.namespace {
            Some(ns) if namespace_filter.contains(&normalize(ns)) => {}
            _ => return false,
        }
    }
    if !source_filter.is_empty() {
        match &block.doc_id {
            Some(id) if source_filter.contains(&normalize(id)) => {}
            _ => return false,
        }
    }
    true
}

/// Ordered contiguous match of the phrase's normalized tokens.
fn contains_phrase(text_terms: &[String], phrase: &[String]) -> bool {
    if phrase.is_empty() || phrase.len() > text_terms.len() {
        return phrase.is_empty();
    }
    text_terms.windows(phrase.len()).any(|window| window == phrase)
}

/// `|unique(query) ∩ unique(heading)| / |unique(query)|`, zero without a
/// heading. Skipped entirely when no block carries a heading - observably
/// identical and saves the tokenization.
fn score_headings(pack: &Pack, query_terms: &HashSet<String>, candidates: &mut BTreeMap<u32, Candidate>) {
    if query_terms.is_empty() || pack.blocks.iter().all(|b| b.heading.is_none()) {
        return;
    }

    for cand in candidates.values_mut() {
        let block = &pack.blocks[cand.block_id as usize];
        cand.heading_score = match &block.heading {
            Some(heading) => {
                let heading_terms: HashSet<String> =
                    tokenize(heading).into_iter().map(|t| t.term).collect();
                let overlap = query_terms.intersection(&heading_terms).count();
                overlap as f64 / query_terms.len() as f64
            }
            None => 0.0,
        };
    }
}

/// BM25L over each candidate's term map, then the multiplicative
/// adjustments in order: proximity, phrase, heading.
fn score_candidates(
    pack: &Pack,
    df: &BTreeMap<u32, u32>,
    cfg: &ScoringConfig,
    candidates: &mut BTreeMap<u32, Candidate>,
) {
    let doc_count = pack.stats().blocks as f64;
    let avg_len = pack.avg_block_len();

    for cand in candidates.values_mut() {
        let persisted = pack.blocks[cand.block_id as usize].token_len;
        let len = if persisted > 0 {
            persisted as f64
        } else {
            cand.tf.values().sum()
        };

        let mut score = 0.0;
        for (term_id, tf) in &cand.tf {
            let term_df = df.get(term_id).copied().unwrap_or(0) as f64;
            let idf = scoring::idf(doc_count, term_df);
            score += scoring::bm25l_term(*tf, idf, len, avg_len, cfg);
        }

        let lists: Vec<&[u32]> = cand.pos.values().map(|v| v.as_slice()).collect();
        score *= scoring::proximity_multiplier(scoring::min_cover_span(&lists), cfg.proximity_strength);
        if cand.has_phrase {
            score *= 1.0 + cfg.phrase_boost;
        }
        score *= 1.0 + cfg.heading_boost * cand.heading_score;

        cand.score = score;
    }
}

/// Score descending, block id ascending. The KNS multiplier is already baked
/// into the score, so this is the full ordering contract.
pub(crate) fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.block_id.cmp(&b.block_id))
    });
}
