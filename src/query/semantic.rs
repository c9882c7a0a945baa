// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Semantic rerank, gated on lexical confidence.
//!
//! The rerank is a bounded-N post-pass, not a nearest-neighbor search: the
//! top lexical candidates get a dequantized dot product against the query
//! embedding, scores are min-max normalized over that subset, and the subset
//! is re-ordered in place ahead of the untouched tail. Min-max is part of
//! the contract - other normalizations would change observable rankings.
//!
//! The gate: rerank fires only when the pack has vectors, the caller opted
//! in, and either `force` is set or the lexical ranking looks ambiguous
//! (confidence below the threshold). A forced rerank on a vector-less pack
//! is an error; an unforced one silently skips.

use super::{sort_by_score, Candidate, Hit};
use crate::error::{Error, Result};
use crate::pack::Pack;
use crate::quant::{quantize, similarity};
use crate::query::options::SemanticOptions;

/// Lexical confidence of a ranked list: `(s₁ − s₂) / s₁` over the top two
/// scores, `1` with a single hit, `0` when empty.
pub fn lex_confidence(hits: &[Hit]) -> f64 {
    confidence(hits.iter().map(|h| h.score))
}

fn confidence(mut scores: impl Iterator<Item = f64>) -> f64 {
    let Some(first) = scores.next() else {
        return 0.0;
    };
    let Some(second) = scores.next() else {
        return 1.0;
    };
    if first <= 0.0 {
        return 0.0;
    }
    (first - second) / first
}

/// Apply the semantic rerank when the gate opens. `ordered` must already be
/// sorted by score descending.
pub(crate) fn maybe_rerank(
    pack: &Pack,
    options: &SemanticOptions,
    ordered: &mut [Candidate],
) -> Result<()> {
    if !options.enabled {
        return Ok(());
    }
    let Some(section) = pack.semantic.as_ref() else {
        if options.force {
            return Err(Error::SemanticMissing);
        }
        return Ok(()); // requested but unavailable: silently skip
    };

    if !options.force {
        let conf = confidence(ordered.iter().map(|c| c.score));
        if conf >= options.min_lex_confidence {
            return Ok(());
        }
    }
    if ordered.is_empty() {
        return Ok(());
    }

    // Validated present by validate_query_options; dims only checkable here.
    let embedding = options.query_embedding.as_ref().ok_or_else(|| {
        Error::InvalidInput("semantic.queryEmbedding: required when semantic rerank is enabled".into())
    })?;
    if embedding.len() != section.info.dims as usize {
        return Err(Error::InvalidInput(format!(
            "semantic.queryEmbedding: expected dims {}, got {}",
            section.info.dims,
            embedding.len()
        )));
    }

    let q = quantize(embedding);
    let q_scale = q.scale.to_f32();

    let n = options.top_n.min(ordered.len());
    let subset = &mut ordered[..n];

    let sims: Vec<f64> = subset
        .iter()
        .map(|cand| {
            let c_scale = section.scale(cand.block_id);
            similarity(&q.values, q_scale, section.vector(cand.block_id), c_scale) as f64
        })
        .collect();

    if options.blend.enabled {
        let lex: Vec<f64> = subset.iter().map(|c| c.score).collect();
        let lex_norm = min_max(&lex);
        let sem_norm = min_max(&sims);
        for (cand, (l, s)) in subset.iter_mut().zip(lex_norm.iter().zip(sem_norm.iter())) {
            cand.score = options.blend.w_lex * l + options.blend.w_sem * s;
        }
    } else {
        for (cand, sim) in subset.iter_mut().zip(sims.iter()) {
            cand.score = *sim;
        }
    }

    sort_by_score(subset);
    log::trace!("semantic rerank over {n} candidates");
    Ok(())
}

/// Min-max normalize into `[0, 1]`; a degenerate range maps to all zeros.
fn min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f64) -> Hit {
        Hit {
            block_id: 0,
            score,
            text: String::new(),
            source: None,
            namespace: None,
        }
    }

    #[test]
    fn confidence_over_top_two() {
        assert_eq!(lex_confidence(&[]), 0.0);
        assert_eq!(lex_confidence(&[hit(2.0)]), 1.0);
        assert!((lex_confidence(&[hit(2.0), hit(1.0)]) - 0.5).abs() < 1e-12);
        // Near-tie means low confidence.
        assert!(lex_confidence(&[hit(1.0), hit(0.99)]) < 0.05);
    }

    #[test]
    fn min_max_normalizes_into_unit_range() {
        assert_eq!(min_max(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(min_max(&[5.0, 5.0]), vec![0.0, 0.0]);
    }
}
