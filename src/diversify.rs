// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Near-duplicate suppression and MMR diversification.
//!
//! A result list where three hits say the same thing in the same words is
//! worse than one hit plus two different angles. Similarity is 5-character
//! shingle Jaccard over normalized text; at or above the threshold two
//! blocks count as the same thing and only one survives.
//!
//! **Invariant**: no two returned hits have `jaccard5 ≥ sim_threshold`, the
//! first hit is always the top-scoring candidate, and the output is
//! deterministic given input order.

use std::collections::HashSet;

use crate::config::ScoringConfig;
use crate::query::Hit;
use crate::text::normalize;

/// 5-character shingle Jaccard similarity after normalization.
///
/// Strings shorter than one shingle fall back to whole-string comparison;
/// two empty strings are identical (similarity 1).
pub fn jaccard5(a: &str, b: &str) -> f64 {
    let sa = shingles(&normalize(a));
    let sb = shingles(&normalize(b));

    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }

    let intersection = sa.intersection(&sb).count();
    let union = sa.len() + sb.len() - intersection;
    intersection as f64 / union as f64
}

fn shingles(value: &str) -> HashSet<String> {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return HashSet::new();
    }
    if chars.len() < 5 {
        return HashSet::from([value.to_string()]);
    }
    chars.windows(5).map(|w| w.iter().collect()).collect()
}

/// MMR selection with duplicate skip over a score-ordered pool.
///
/// Each round: candidates whose max similarity to the kept set crosses the
/// threshold are duplicates; among the rest, the one maximizing
/// `λ·score − (1−λ)·maxsim` wins. When every remaining candidate is a
/// duplicate the next-by-score is tried instead, but the final threshold
/// check still applies - so a pure duplicate gets dropped, never appended.
pub(crate) fn diversify(pool: Vec<Hit>, k: usize, cfg: &ScoringConfig) -> Vec<Hit> {
    let mut pool = pool;
    pool.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.block_id.cmp(&b.block_id))
    });

    let mut kept: Vec<Hit> = Vec::with_capacity(k.min(pool.len()));

    while !pool.is_empty() && kept.len() < k {
        // Max similarity of each remaining candidate to the kept set.
        let maxsims: Vec<f64> = pool
            .iter()
            .map(|h| {
                kept.iter()
                    .map(|kept_hit| jaccard5(&h.text, &kept_hit.text))
                    .fold(0.0, f64::max)
            })
            .collect();

        let pick = pool
            .iter()
            .enumerate()
            .filter(|(i, _)| maxsims[*i] < cfg.sim_threshold)
            .max_by(|(i, a), (j, b)| {
                let score_a = cfg.mmr_lambda * a.score - (1.0 - cfg.mmr_lambda) * maxsims[*i];
                let score_b = cfg.mmr_lambda * b.score - (1.0 - cfg.mmr_lambda) * maxsims[*j];
                score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // stable pick: earlier pool position wins ties
                    .then(j.cmp(i))
            })
            .map(|(i, _)| i)
            // All duplicates: advance by the next best score.
            .unwrap_or(0);

        let candidate = pool.remove(pick);
        // Final safety check; drops the candidate when the duplicate-advance
        // path picked something over the threshold.
        let maxsim = kept
            .iter()
            .map(|kept_hit| jaccard5(&candidate.text, &kept_hit.text))
            .fold(0.0, f64::max);
        if maxsim < cfg.sim_threshold {
            kept.push(candidate);
        }
    }

    kept
}
