//! Correlation Core
//!
//! Per-channel normalized cross-correlation of one data trace against a bank
//! of templates, using overlap-save blocks and spectral multiplication.
//!
//! For one (station, component) channel:
//!
//! ```text
//! data ──► segment ──► sliding rms ──┐
//!              │                     │
//!              └──► FFT ──┐          │
//!                         × ──► IFFT ──► discard overlap ──► ÷ (rms_d · rms_q) ──► trace
//! templates ──► reverse ──► FFT ──┘
//! ```
//!
//! Multiplying by the spectrum of the *time-reversed* template turns the
//! circular convolution computed by the FFT into a correlation. The trace
//! is then shifted by the station's moveout, weighted and added into the
//! template's score column by [`accumulate_shifted`].
//!
//! [`ChannelWorkspace`] owns every buffer this needs. It is sized once for a
//! given layout and template count and refilled for each channel.

use rustfft::num_complex::Complex64;

use crate::energy::{normalize, sliding_rms, template_rms};
use crate::error::{MatchedFilterError, SeccResult};
use crate::segment::SegmentLayout;
use crate::spectral::SpectralEngine;

/// Scratch buffers for correlating one channel against its template bank.
#[derive(Debug, Clone)]
pub struct ChannelWorkspace {
    layout: SegmentLayout,
    len_template: usize,
    n_template: usize,
    /// Segmented data, `(k, n_segments)`; clobbered by the forward FFT.
    segments: Vec<f64>,
    /// Sliding window norm for every segment row.
    data_rms: Vec<f64>,
    /// Data spectrum, `(k/2 + 1, n_segments)`.
    data_spectra: Vec<Complex64>,
    /// Reversed, zero-padded templates, `(k, n_template)`.
    template_block: Vec<f64>,
    /// Template spectra, `(k/2 + 1, n_template)`.
    template_spectra: Vec<Complex64>,
    template_rms: Vec<f64>,
    /// Product spectrum for one template; clobbered by the inverse FFT.
    product: Vec<Complex64>,
    /// Raw circular correlation, `(k, n_segments)`.
    correlation: Vec<f64>,
    /// Normalized coefficient per output lag.
    trace: Vec<f64>,
}

impl ChannelWorkspace {
    /// Allocate buffers for `n_template` templates of `len_template` samples
    /// correlated over `layout`.
    pub fn new(
        engine: &SpectralEngine,
        layout: SegmentLayout,
        len_template: usize,
        n_template: usize,
    ) -> SeccResult<Self> {
        if engine.segment_len() != layout.segment_len() {
            return Err(MatchedFilterError::shape(
                "spectral engine length",
                layout.segment_len(),
                engine.segment_len(),
            ));
        }
        if layout.overlap() + 1 != len_template {
            return Err(MatchedFilterError::shape(
                "segment overlap",
                len_template.saturating_sub(1),
                layout.overlap(),
            ));
        }

        let k = layout.segment_len();
        let n_seg = layout.n_segments();

        Ok(Self {
            layout,
            len_template,
            n_template,
            segments: vec![0.0; layout.buffer_len()],
            data_rms: vec![0.0; layout.buffer_len()],
            data_spectra: engine.make_spectrum(n_seg),
            template_block: vec![0.0; k * n_template],
            template_spectra: engine.make_spectrum(n_template),
            template_rms: vec![0.0; n_template],
            product: engine.make_spectrum(n_seg),
            correlation: vec![0.0; layout.buffer_len()],
            trace: vec![0.0; layout.output_len()],
        })
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    pub fn n_template(&self) -> usize {
        self.n_template
    }

    /// Norm of template `l` on the currently loaded channel.
    pub fn template_rms(&self, l: usize) -> f64 {
        self.template_rms[l]
    }

    /// Load one channel: segment and transform the data, and reverse, pad
    /// and transform the channel's templates.
    ///
    /// `bank` holds the `n_template` templates back to back.
    pub fn load_channel(&mut self, engine: &SpectralEngine, signal: &[f64], bank: &[f64]) -> SeccResult<()> {
        let k = self.layout.segment_len();
        let lt = self.len_template;
        if signal.len() != self.layout.len_data() {
            return Err(MatchedFilterError::shape("channel length", self.layout.len_data(), signal.len()));
        }
        if bank.len() != lt * self.n_template {
            return Err(MatchedFilterError::shape("template bank", lt * self.n_template, bank.len()));
        }

        self.layout.segment_into(signal, &mut self.segments);
        // Energies first: the forward transform consumes the segment buffer.
        sliding_rms(&self.segments, k, lt, &mut self.data_rms);
        engine.forward(&mut self.segments, &mut self.data_spectra)?;

        for ((template, column), rms) in bank
            .chunks_exact(lt)
            .zip(self.template_block.chunks_exact_mut(k))
            .zip(self.template_rms.iter_mut())
        {
            *rms = template_rms(template);
            column.fill(0.0);
            for (dst, &src) in column.iter_mut().zip(template.iter().rev()) {
                *dst = src;
            }
        }
        engine.forward(&mut self.template_block, &mut self.template_spectra)?;

        Ok(())
    }

    /// Normalized correlation of the loaded channel with template `l`.
    ///
    /// The returned trace has one coefficient per fully-overlapping lag
    /// (`len_data - len_template + 1` values), unshifted and unweighted.
    pub fn correlate(&mut self, engine: &SpectralEngine, l: usize) -> SeccResult<&[f64]> {
        let h = engine.spectrum_len();
        let template_spectrum = &self.template_spectra[l * h..(l + 1) * h];
        multiply_broadcast(&self.data_spectra, template_spectrum, &mut self.product);
        engine.inverse(&mut self.product, &mut self.correlation)?;

        let k = self.layout.segment_len();
        let rms_q = self.template_rms[l];
        for s in 0..self.layout.n_segments() {
            for r in self.layout.overlap()..k {
                if let Some(o) = self.layout.output_index(s, r) {
                    let idx = s * k + r;
                    self.trace[o] = normalize(self.correlation[idx], self.data_rms[idx], rms_q);
                }
            }
        }

        Ok(self.trace.as_slice())
    }
}

/// Multiply every column of `spectra` by the single column `kernel`.
///
/// # Panics
/// Panics if `spectra` is not a whole number of `kernel`-length columns or
/// `out` differs in length from `spectra`.
pub fn multiply_broadcast(spectra: &[Complex64], kernel: &[Complex64], out: &mut [Complex64]) {
    let h = kernel.len();
    assert!(h > 0, "kernel must not be empty");
    assert_eq!(spectra.len() % h, 0, "spectra must hold whole columns");
    assert_eq!(spectra.len(), out.len(), "output must match spectra");

    for (src, dst) in spectra.chunks_exact(h).zip(out.chunks_exact_mut(h)) {
        for ((d, &s), &q) in dst.iter_mut().zip(src.iter()).zip(kernel.iter()) {
            *d = s * q;
        }
    }
}

/// Add `weight * trace`, delayed by `lead` samples, into `column`.
///
/// The first `lead` entries of `column` receive nothing and the tail of
/// `trace` that would run past the end is dropped. Returns `false` when the
/// delay pushes the whole trace out of the window.
pub fn accumulate_shifted(column: &mut [f64], trace: &[f64], lead: usize, weight: f64) -> bool {
    if lead >= column.len() {
        return false;
    }
    for (c, &t) in column[lead..].iter_mut().zip(trace.iter()) {
        *c += weight * t;
    }
    true
}
