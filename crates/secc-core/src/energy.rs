//! # Energy Normalization
//!
//! Window energies used to turn raw correlation into a correlation
//! coefficient:
//!
//! ```text
//!               sum_n d[t + n] * q[n]
//! ccc[t] = -------------------------------------
//!          sqrt(sum_n d[t + n]^2) * sqrt(sum_n q[n]^2)
//! ```
//!
//! The template norm is a single scalar per template. The data norm changes
//! with every lag; it is computed for a whole segment at once from a running
//! sum of squares, so each window costs one subtraction instead of a full
//! re-summation.
//!
//! A window whose energy is exactly zero (silence, dead channel, zero
//! padding) yields a coefficient of zero rather than a division by zero.

/// Euclidean norm of a template: `sqrt(sum(q^2))`.
pub fn template_rms(template: &[f64]) -> f64 {
    template.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Sliding-window norms of every block in a column-major segment buffer.
///
/// For each block and each row `r >= window - 1`, `out[r]` receives
/// `sqrt(sum(block[r - window + 1..=r]^2))`. Rows before that only see a
/// partial window and hold the norm of the partial sum; they fall in the
/// overlap-save discard region and are never used.
///
/// # Panics
/// Panics if `window == 0`, `segment_len == 0`, or buffer lengths differ
/// or are not a multiple of `segment_len`.
pub fn sliding_rms(segments: &[f64], segment_len: usize, window: usize, out: &mut [f64]) {
    assert!(window > 0, "window must be > 0");
    assert!(segment_len > 0, "segment_len must be > 0");
    assert_eq!(segments.len(), out.len(), "output must match segment buffer");
    assert_eq!(segments.len() % segment_len, 0, "segment buffer must hold whole blocks");

    for (block, energy) in segments
        .chunks_exact(segment_len)
        .zip(out.chunks_exact_mut(segment_len))
    {
        // Running sum of squares
        let mut acc = 0.0;
        for (e, &x) in energy.iter_mut().zip(block.iter()) {
            acc += x * x;
            *e = acc;
        }
        // Trailing-window difference, walking backwards so the earlier
        // prefix sums are still intact when they are subtracted.
        for r in (window..segment_len).rev() {
            energy[r] -= energy[r - window];
        }
        for e in energy.iter_mut() {
            // Cancellation can leave a tiny negative residue
            *e = e.max(0.0).sqrt();
        }
    }
}

/// Normalized correlation coefficient with the zero-energy policy applied.
#[inline]
pub fn normalize(raw: f64, data_rms: f64, template_rms: f64) -> f64 {
    let denom = data_rms * template_rms;
    if denom == 0.0 {
        0.0
    } else {
        raw / denom
    }
}
