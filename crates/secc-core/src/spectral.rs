//! Spectral Transform Engine
//!
//! Real-to-complex and complex-to-real FFTs over column-major blocks of
//! fixed length `segment_len` (the `k` of the overlap-save layout). One
//! engine is built per matched-filter call and reused for every station,
//! component and template, so FFT planning happens exactly once.
//!
//! The engine holds the three transforms a channel needs:
//!
//! - forward transform of the `(k, n_segments)` data block,
//! - forward transform of the `(k, n_template)` reversed-template block,
//! - inverse transform of the `(k/2 + 1, n_segments)` product spectrum.
//!
//! Both forward transforms have the same length and share one plan.
//!
//! Columns are independent, so each call fans them out across a dedicated
//! rayon pool whose size is fixed when the engine is built. A single-thread
//! engine has no pool and runs columns on the calling thread. Every call
//! blocks until all columns are done.
//!
//! ## Example
//!
//! ```rust
//! use secc_core::spectral::SpectralEngine;
//!
//! let engine = SpectralEngine::new(8, 2).unwrap();
//! let mut block = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
//! let mut spectrum = engine.make_spectrum(1);
//! engine.forward(&mut block, &mut spectrum).unwrap();
//!
//! // An impulse has a flat spectrum
//! assert!(spectrum.iter().all(|c| (c.re - 1.0).abs() < 1e-12 && c.im.abs() < 1e-12));
//!
//! let mut back = vec![0.0; 8];
//! engine.inverse(&mut spectrum, &mut back).unwrap();
//! assert!((back[0] - 1.0).abs() < 1e-12);
//! ```

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex64;

use crate::error::{MatchedFilterError, SeccResult};

/// Planned FFTs plus the worker pool that executes them.
pub struct SpectralEngine {
    segment_len: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl fmt::Debug for SpectralEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralEngine")
            .field("segment_len", &self.segment_len)
            .field("threads", &self.threads)
            .finish()
    }
}

impl SpectralEngine {
    /// Plan transforms of length `segment_len` executed by `threads` workers.
    pub fn new(segment_len: usize, threads: usize) -> SeccResult<Self> {
        if segment_len == 0 {
            return Err(MatchedFilterError::InvalidParameter(
                "segment length must be > 0".into(),
            ));
        }
        if threads == 0 {
            return Err(MatchedFilterError::InvalidParameter(
                "thread count must be > 0".into(),
            ));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(segment_len);
        let inverse = planner.plan_fft_inverse(segment_len);

        let pool = if threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("secc-fft-{}", i))
                    .build()?,
            )
        } else {
            None
        };

        tracing::debug!(segment_len, threads, "planned spectral transforms");

        Ok(Self {
            segment_len,
            forward,
            inverse,
            pool,
            threads,
        })
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Bins per column of a spectrum: `segment_len / 2 + 1`.
    pub fn spectrum_len(&self) -> usize {
        self.segment_len / 2 + 1
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Zeroed spectrum buffer for `columns` columns.
    pub fn make_spectrum(&self, columns: usize) -> Vec<Complex64> {
        vec![Complex64::new(0.0, 0.0); self.spectrum_len() * columns]
    }

    /// Forward-transform every column of `blocks` into `spectra`.
    ///
    /// `blocks` is used as transform scratch and holds garbage afterwards.
    ///
    /// # Panics
    /// Panics if the buffers do not hold the same whole number of columns.
    pub fn forward(&self, blocks: &mut [f64], spectra: &mut [Complex64]) -> SeccResult<()> {
        let columns = self.check_columns(blocks.len(), spectra.len());
        let k = self.segment_len;
        let h = self.spectrum_len();
        let forward = &self.forward;

        let Some(pool) = self.pool.as_ref().filter(|_| columns > 1) else {
            let mut scratch = forward.make_scratch_vec();
            for (block, spectrum) in blocks.chunks_exact_mut(k).zip(spectra.chunks_exact_mut(h)) {
                forward.process_with_scratch(block, spectrum, &mut scratch)?;
            }
            return Ok(());
        };

        pool.install(|| {
            blocks
                .par_chunks_exact_mut(k)
                .zip(spectra.par_chunks_exact_mut(h))
                .try_for_each_init(
                    || forward.make_scratch_vec(),
                    |scratch, (block, spectrum)| {
                        forward.process_with_scratch(block, spectrum, scratch)
                    },
                )
        })?;

        Ok(())
    }

    /// Inverse-transform every column of `spectra` into `blocks`, scaled by
    /// `1 / segment_len` so that `inverse(forward(x)) == x`.
    ///
    /// `spectra` is used as transform scratch and holds garbage afterwards.
    pub fn inverse(&self, spectra: &mut [Complex64], blocks: &mut [f64]) -> SeccResult<()> {
        let columns = self.check_columns(blocks.len(), spectra.len());
        let k = self.segment_len;
        let h = self.spectrum_len();
        let inverse = &self.inverse;
        let scale = 1.0 / k as f64;
        let even = k % 2 == 0;

        let run = |scratch: &mut Vec<Complex64>,
                   (spectrum, block): (&mut [Complex64], &mut [f64])|
         -> Result<(), realfft::FftError> {
            // DC (and Nyquist for even lengths) of a real signal are real;
            // clear rounding residue so the c2r transform accepts them.
            spectrum[0].im = 0.0;
            if even {
                spectrum[h - 1].im = 0.0;
            }
            inverse.process_with_scratch(spectrum, block, scratch)?;
            for x in block.iter_mut() {
                *x *= scale;
            }
            Ok(())
        };

        let Some(pool) = self.pool.as_ref().filter(|_| columns > 1) else {
            let mut scratch = inverse.make_scratch_vec();
            for pair in spectra.chunks_exact_mut(h).zip(blocks.chunks_exact_mut(k)) {
                run(&mut scratch, pair)?;
            }
            return Ok(());
        };

        pool.install(|| {
            spectra
                .par_chunks_exact_mut(h)
                .zip(blocks.par_chunks_exact_mut(k))
                .try_for_each_init(|| inverse.make_scratch_vec(), |scratch, pair| run(scratch, pair))
        })?;

        Ok(())
    }

    fn check_columns(&self, real_len: usize, complex_len: usize) -> usize {
        let k = self.segment_len;
        let h = self.spectrum_len();
        assert_eq!(real_len % k, 0, "real buffer must hold whole columns of {}", k);
        assert_eq!(
            complex_len,
            (real_len / k) * h,
            "spectrum buffer must hold {} bins per column",
            h
        );
        real_len / k
    }
}
