// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Scoring knobs and their defaults.
//!
//! Every tunable in the ranking pipeline lives here, passed explicitly -
//! no global state. The defaults are the contract: identical pack bytes plus
//! identical inputs must produce bit-identical rankings, so changing any of
//! these changes observable output.
//!
//! | Knob | Default | Why this value |
//! |---|---|---|
//! | `k1` | 1.5 | term-frequency saturation; slightly above the classic 1.2 for short blocks |
//! | `b` | 0.75 | the standard length-normalization strength |
//! | `phrase_boost` | 0.6 | a quoted phrase match is strong evidence, but must not drown BM25 |
//! | `heading_boost` | 0.3 | scaled by heading overlap, so the ceiling is +30% |
//! | `proximity_strength` | 0.15 | cap of the cover-span multiplier (≤ 1.15, gentle) |
//! | `kns_strength` | 0.02 | tie-breaker only; ≤ 2% can never reorder distinct scores |
//! | `mmr_lambda` | 0.8 | relevance-leaning diversification |
//! | `sim_threshold` | 0.92 | jaccard5 above this is a near-duplicate |
//! | `expansion_weight` | 0.35 | expansion terms count as ~1/3 of a real query term |

/// All ranking parameters in one place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// BM25L term-frequency saturation.
    pub k1: f64,
    /// BM25L length-normalization strength.
    pub b: f64,
    /// Multiplier bonus when a quoted phrase matches: `score *= 1 + phrase_boost`.
    pub phrase_boost: f64,
    /// Multiplier bonus scaled by heading term overlap.
    pub heading_boost: f64,
    /// Cap of the minimal-cover-span proximity multiplier.
    pub proximity_strength: f64,
    /// Cap of the KNS tie-breaker multiplier.
    pub kns_strength: f64,
    /// MMR relevance/diversity balance.
    pub mmr_lambda: f64,
    /// jaccard5 at or above this marks a near-duplicate.
    pub sim_threshold: f64,
    /// Base weight for pseudo-relevance expansion terms.
    pub expansion_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            phrase_boost: 0.6,
            heading_boost: 0.3,
            proximity_strength: 0.15,
            kns_strength: 0.02,
            mmr_lambda: 0.8,
            sim_threshold: 0.92,
            expansion_weight: 0.35,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_breaker_cannot_reorder_distinct_scores() {
        // Two scores 3% apart stay apart under the worst-case KNS multiplier.
        let cfg = ScoringConfig::default();
        let low = 1.0 * (1.0 + cfg.kns_strength);
        let high = 1.03;
        assert!(high > low);
    }

    #[test]
    fn proximity_is_bounded() {
        let cfg = ScoringConfig::default();
        assert!(1.0 + cfg.proximity_strength <= 1.15 + 1e-12);
    }
}
