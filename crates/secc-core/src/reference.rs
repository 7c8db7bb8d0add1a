//! Direct (time-domain) matched filter for testing and reference.
//!
//! O(len_data × len_template) per channel. Slow, but free of segmentation
//! and FFT rounding, which makes it the oracle the spectral engine is
//! checked against.

use crate::energy::normalize;
use crate::tensor::{Moveouts, ScoreMatrix, Templates, Waveforms, Weights};

/// Normalized sliding dot product of `template` over `signal`.
///
/// Returns `signal.len() - template.len() + 1` coefficients, or an empty
/// vector when the template is empty or longer than the signal.
pub fn direct_normalized_correlation(signal: &[f64], template: &[f64]) -> Vec<f64> {
    if template.is_empty() || template.len() > signal.len() {
        return vec![];
    }
    let rms_q = template.iter().map(|x| x * x).sum::<f64>().sqrt();
    signal
        .windows(template.len())
        .map(|window| {
            let dot: f64 = window.iter().zip(template.iter()).map(|(a, b)| a * b).sum();
            let rms_d = window.iter().map(|x| x * x).sum::<f64>().sqrt();
            normalize(dot, rms_d, rms_q)
        })
        .collect()
}

/// Brute-force multi-station matched filter with the same moveout and
/// weighting semantics as [`crate::matched_filter::compute_matched_filter`].
///
/// Inputs are assumed to be shape-consistent.
pub fn direct_matched_filter(
    data: &Waveforms,
    templates: &Templates,
    moveouts: &Moveouts,
    weights: &Weights,
) -> ScoreMatrix {
    let (len_template, n_component, n_station, n_template) = templates.shape();
    let out_len = data.len() + 1 - len_template;
    let lead = moveouts.to_lead_times();
    let mut ccc_sum = ScoreMatrix::zeros(out_len, n_template);

    for i in 0..n_station {
        for j in 0..n_component {
            let signal = data.channel(i, j);
            for l in 0..n_template {
                let trace = direct_normalized_correlation(signal, templates.template(i, j, l));
                let shift = lead.get(i, l);
                let w = weights.get(i, l);
                let column = ccc_sum.column_mut(l);
                for (t, &c) in trace.iter().enumerate() {
                    if let Some(slot) = column.get_mut(t + shift) {
                        *slot += w * c;
                    }
                }
            }
        }
    }

    ccc_sum
}
