// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! BM25L scoring and the minimal-cover-span proximity bonus.
//!
//! IDF is computed at query time from document frequencies gathered during
//! the candidate scan - the pack persists no per-term statistics, which
//! keeps the format simple and lets filtered corpora score correctly.

use crate::config::ScoringConfig;

/// Query-time IDF: `ln(1 + (N − df + 0.5) / (df + 0.5))`.
///
/// Always positive, even for terms in every block - a term the user typed
/// should never subtract from a score.
#[inline]
pub(crate) fn idf(doc_count: f64, df: f64) -> f64 {
    (1.0 + (doc_count - df + 0.5) / (df + 0.5)).ln()
}

/// One term's BM25L contribution.
///
/// `idf · tf·(k1+1) / (tf + k1·(1 − b + b·len/avg_len))`. The fractional
/// `tf` values produced by query expansion flow through unchanged.
#[inline]
pub(crate) fn bm25l_term(tf: f64, idf: f64, len: f64, avg_len: f64, cfg: &ScoringConfig) -> f64 {
    let length_norm = 1.0 - cfg.b + cfg.b * (len / avg_len.max(1.0));
    idf * (tf * (cfg.k1 + 1.0)) / (tf + cfg.k1 * length_norm)
}

/// Minimal cover span: the smallest `max − min` over tuples picking one
/// position from each list. `None` when there are no lists.
///
/// Standard sweep: keep one index per list, record the current tuple's span,
/// advance the index owning the minimum, stop when any list is exhausted.
/// Lists must be sorted ascending (positions from the stream always are).
pub(crate) fn min_cover_span(lists: &[&[u32]]) -> Option<u32> {
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return None;
    }

    let mut indices = vec![0usize; lists.len()];
    let mut best: Option<u32> = None;

    loop {
        let mut min_value = u32::MAX;
        let mut max_value = 0u32;
        let mut min_list = 0usize;

        for (j, list) in lists.iter().enumerate() {
            let value = list[indices[j]];
            if value < min_value {
                min_value = value;
                min_list = j;
            }
            max_value = max_value.max(value);
        }

        let span = max_value - min_value;
        best = Some(best.map_or(span, |b| b.min(span)));

        indices[min_list] += 1;
        if indices[min_list] >= lists[min_list].len() {
            return best;
        }
    }
}

/// Proximity multiplier: `1 + strength / (1 + span)`, or `1` when the span
/// is undefined. Bounded by `1 + strength`.
#[inline]
pub(crate) fn proximity_multiplier(span: Option<u32>, strength: f64) -> f64 {
    match span {
        Some(span) => 1.0 + strength / (1.0 + span as f64),
        None => 1.0,
    }
}
