// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Deterministic int8 L2-norm quantization.
//!
//! One embedding in, one `(i8 vector, f16 scale)` pair out. The vector is
//! unit-normalized first, then scaled so the largest component maps exactly
//! to ±127. The clamp bound is -127 rather than -128 to keep the
//! representable range symmetric - asymmetry would bias every dot product.
//!
//! Round-trip error for a unit-norm vector is bounded by half a quantization
//! step: `||v − s·q||∞ ≤ 1/127`. That is tight enough that a rerank over
//! dequantized dot products tracks the float ranking for any realistic gap.

use half::f16;

/// A quantized embedding: int8 components plus a per-vector scale.
///
/// The decoded approximation of the original unit vector is `scale · q`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedVector {
    pub values: Vec<i8>,
    /// Stored on the wire as IEEE-754 float16, little-endian u16.
    pub scale: f16,
}

/// Quantize one raw embedding.
///
/// 1. `n = e / ||e||₂` (a zero-norm input yields all zeros and scale 0,
///    which downstream rerank treats as "no vector")
/// 2. `s = max|n_i| / 127`
/// 3. `q_i = clamp(round(n_i / s), -127, 127)` with round half away from zero
pub fn quantize(embedding: &[f32]) -> QuantizedVector {
    let norm = embedding.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return QuantizedVector {
            values: vec![0; embedding.len()],
            scale: f16::from_f32(0.0),
        };
    }

    let normalized: Vec<f64> = embedding.iter().map(|v| *v as f64 / norm).collect();
    let max_abs = normalized.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let scale = max_abs / 127.0;

    let values = normalized
        .iter()
        // f64::round is round-half-away-from-zero, exactly what the format wants
        .map(|v| (v / scale).round().clamp(-127.0, 127.0) as i8)
        .collect();

    QuantizedVector {
        values,
        scale: f16::from_f32(scale as f32),
    }
}

/// Dequantized dot product of two quantized unit-norm vectors.
///
/// `⟨q, c⟩ · q_scale · c_scale`, approximately the cosine similarity of the
/// original vectors, in roughly `[-1, 1]`. The integer accumulation is exact;
/// only the two scale multiplications round.
pub fn similarity(q: &[i8], q_scale: f32, c: &[i8], c_scale: f32) -> f32 {
    debug_assert_eq!(q.len(), c.len());
    let dot: i32 = q
        .iter()
        .zip(c.iter())
        .map(|(a, b)| i32::from(*a) * i32::from(*b))
        .sum();
    dot as f32 * q_scale * c_scale
}
