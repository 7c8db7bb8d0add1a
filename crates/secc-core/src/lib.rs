//! # Segmented Spectral-Domain Matched Filter
//!
//! This crate computes the stacked normalized cross-correlation (the
//! "matched filter" of template-matching earthquake detection) of a bank of
//! template waveforms against continuous multi-station, multi-component
//! seismic recordings.
//!
//! ## Overview
//!
//! For every station, component and template the engine evaluates the
//! normalized cross-correlation coefficient at every fully-overlapping lag,
//! shifts it by the station's moveout, weights it and sums everything into
//! one score per (lag, template). The correlation is done in the frequency
//! domain over overlap-save segments of a caller-chosen length `k`, which
//! bounds memory and FFT size independently of the record length.
//!
//! - **Segmentation**: overlapping blocks of the data ([`segment`])
//! - **Spectral engine**: planned real FFTs on a fixed thread pool ([`spectral`])
//! - **Energy**: sliding window norms for the normalization ([`energy`])
//! - **Correlation**: one channel against its template bank ([`correlate`])
//! - **Stacking**: moveouts, weights and the station loop ([`matched_filter`])
//!
//! ## Signal Flow
//!
//! ```text
//! data[i,j] ─► segment ─► FFT ─┐
//!                              × ─► IFFT ─► ÷ norms ─► shift by lead ─► × weight ─► Σ ─► ccc_sum
//! template[i,j,l] ─► reverse ─► FFT ─┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use secc_core::prelude::*;
//!
//! let mut data = Waveforms::zeros(500, 3, 2);
//! for i in 0..2 {
//!     for j in 0..3 {
//!         for (t, x) in data.channel_mut(i, j).iter_mut().enumerate() {
//!             *x = ((t * (i + 1) + j) as f64 * 0.13).sin();
//!         }
//!     }
//! }
//! let templates = Templates::zeros(40, 3, 2, 4);
//! let moveouts = Moveouts::zeros(2, 4);
//! let weights = Weights::filled(2, 4, 1.0);
//!
//! let ccc_sum = compute_matched_filter(&data, &templates, 128, &moveouts, &weights).unwrap();
//! assert_eq!(ccc_sum.shape(), (461, 4));
//! ```

pub mod config;
pub mod correlate;
pub mod energy;
pub mod error;
pub mod io;
pub mod matched_filter;
pub mod observe;
pub mod reference;
pub mod segment;
pub mod sink;
pub mod spectral;
pub mod tensor;

// Re-export main types
pub use config::{ConfigError, EngineConfig, ExecutionMode, SeccConfig};
pub use error::{MatchedFilterError, SeccResult};
pub use io::{DirectorySink, IoError, MatchedFilterInput, ScoreReport};
pub use matched_filter::{compute_matched_filter, compute_with_config, Dimensions, MatchedFilter};
pub use sink::{Channel, CorrelationSink, MemorySink, NullSink};
pub use tensor::{Moveouts, ScoreMatrix, Templates, Waveforms, Weights};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EngineConfig, ExecutionMode};
    pub use crate::error::{MatchedFilterError, SeccResult};
    pub use crate::matched_filter::{compute_matched_filter, compute_with_config, MatchedFilter};
    pub use crate::sink::{Channel, CorrelationSink, NullSink};
    pub use crate::tensor::{Moveouts, ScoreMatrix, Templates, Waveforms, Weights};
}
