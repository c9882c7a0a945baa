// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Deterministic pseudo-relevance query expansion.
//!
//! After the first ranking, the top blocks vote for co-occurring terms: any
//! lexicon term long enough and not already in the query accumulates weight
//! proportional to its frequency, discounted by how far the block's score
//! sits below the best. The winners are rescanned as fractional term
//! frequencies - positions are not collected, so proximity keeps rewarding
//! only the original query terms.
//!
//! Everything ties off deterministically: the term pool is an ordered map
//! and the final pick sorts by (weight desc, term asc).

use std::collections::{BTreeMap, HashSet};

use super::Candidate;
use crate::error::Result;
use crate::index::walk_stream;
use crate::pack::Pack;
use crate::query::options::ExpansionOptions;
use crate::text::tokenize;

/// Minimum vote discount for low-scoring feedback blocks.
const MIN_BLOCK_CONTRIBUTION: f64 = 0.2;

/// Clamp range for a term's accumulated weight before applying the base.
const CLAMP_LO: f64 = 0.5;
const CLAMP_HI: f64 = 1.5;

/// Run the expansion step. Returns `true` when any candidate gained term
/// mass (the caller then re-scores).
///
/// `allow_new` is false when required phrases constrain the result set - a
/// block that never matched the phrases must not enter through expansion.
pub(crate) fn expand(
    pack: &Pack,
    options: &ExpansionOptions,
    base_terms: &HashSet<String>,
    candidates: &mut BTreeMap<u32, Candidate>,
    allow_new: bool,
    namespace_filter: &HashSet<String>,
    source_filter: &HashSet<String>,
) -> Result<bool> {
    // Rank the current candidates to pick feedback blocks.
    let mut ranked: Vec<(u32, f64)> = candidates
        .values()
        .map(|c| (c.block_id, c.score))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let best_score = match ranked.first() {
        Some((_, score)) if *score > 0.0 => *score,
        _ => return Ok(false),
    };

    // Accumulate term votes from the top blocks.
    let mut votes: BTreeMap<String, f64> = BTreeMap::new();
    for (block_id, block_score) in ranked.iter().take(options.docs) {
        let contribution = (block_score / best_score).max(MIN_BLOCK_CONTRIBUTION);

        let mut freq: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(&pack.blocks[*block_id as usize].text) {
            *freq.entry(token.term).or_insert(0) += 1;
        }

        for (term, count) in freq {
            if term.chars().count() < options.min_term_length
                || base_terms.contains(&term)
                || pack.term_id(&term).is_none()
            {
                continue;
            }
            *votes.entry(term).or_insert(0.0) += count as f64 * contribution;
        }
    }
    if votes.is_empty() {
        return Ok(false);
    }

    // Top `terms` by accumulated weight, term string as the tie-break.
    let mut pool: Vec<(String, f64)> = votes.into_iter().collect();
    pool.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    pool.truncate(options.terms);

    let weights: BTreeMap<u32, f64> = pool
        .into_iter()
        .filter_map(|(term, accumulated)| {
            let w = options.weight * accumulated.clamp(CLAMP_LO, CLAMP_HI);
            pack.term_id(&term).map(|id| (id, w))
        })
        .collect();

    // Rescan just these terms, folding occurrences into candidate tf.
    let mut changed = false;
    walk_stream(&pack.postings, pack.block_bias, |term_id, block_id, positions| {
        let Some(w) = weights.get(&term_id) else {
            return;
        };
        let mass = positions.len() as f64 * w;

        if let Some(cand) = candidates.get_mut(&block_id) {
            *cand.tf.entry(term_id).or_insert(0.0) += mass;
            changed = true;
        } else if allow_new
            && super::passes_filters(pack, block_id, namespace_filter, source_filter)
        {
            let mut cand = Candidate {
                block_id,
                ..Candidate::default()
            };
            cand.tf.insert(term_id, mass);
            candidates.insert(block_id, cand);
            changed = true;
        }
    })?;

    Ok(changed)
}
