//! Overlap-Save Segmentation
//!
//! Splits a long 1-D signal into fixed-length blocks that overlap their
//! predecessor by `overlap = len_template - 1` samples. Each block is
//! correlated independently in the frequency domain; the circular
//! wrap-around that block spectral multiplication produces only pollutes the
//! first `overlap` outputs of each block, which are discarded.
//!
//! The signal is treated as if it were prefixed with `overlap` zeros, so
//! block `i` holds original samples
//! `[i * hop - overlap, i * hop - overlap + segment_len)` with
//! `hop = segment_len - overlap`. Positions outside the real signal are zero.
//!
//! ```text
//!  signal (zero-left-padded):  000|xxxxxxxxxxxxxxxxxxxxxxxxxxxxxx
//!  block 0                     [000xxxxxxxx]
//!  block 1                             [xxxxxxxxxxx]
//!  block 2                                     [xxxxxxxxxxx]
//!                                      ^^^ overlap
//! ```
//!
//! ## Example
//!
//! ```rust
//! use secc_core::segment::SegmentLayout;
//!
//! let layout = SegmentLayout::new(10, 4, 2).unwrap();
//! assert_eq!(layout.n_segments(), 5);
//!
//! let signal: Vec<f64> = (1..=10).map(|x| x as f64).collect();
//! let blocks = layout.buffer(&signal);
//! assert_eq!(&blocks[0..4], &[0.0, 0.0, 1.0, 2.0]);
//! assert_eq!(&blocks[4..8], &[1.0, 2.0, 3.0, 4.0]);
//! ```

use crate::error::{MatchedFilterError, SeccResult};

/// Geometry of an overlap-save decomposition.
///
/// Blocks are stored column-major: block `i` occupies
/// `buf[i * segment_len..(i + 1) * segment_len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    len_data: usize,
    segment_len: usize,
    overlap: usize,
    n_segments: usize,
}

impl SegmentLayout {
    /// Describe the tiling of a `len_data`-sample signal into blocks of
    /// `segment_len` samples overlapping by `overlap`.
    pub fn new(len_data: usize, segment_len: usize, overlap: usize) -> SeccResult<Self> {
        if segment_len == 0 {
            return Err(MatchedFilterError::InvalidParameter(
                "segment length must be > 0".into(),
            ));
        }
        if overlap >= segment_len {
            return Err(MatchedFilterError::InvalidParameter(format!(
                "segment length {} must exceed overlap {}",
                segment_len, overlap
            )));
        }
        // At least one fully-overlapping lag
        if len_data <= overlap {
            return Err(MatchedFilterError::shape("data length", overlap + 1, len_data));
        }

        let hop = segment_len - overlap;
        let n_segments = (len_data + hop - 1) / hop;

        Ok(Self {
            len_data,
            segment_len,
            overlap,
            n_segments,
        })
    }

    /// Layout for correlating `len_template`-sample templates with
    /// `segment_len`-sample blocks.
    pub fn for_template(len_data: usize, segment_len: usize, len_template: usize) -> SeccResult<Self> {
        if len_template == 0 {
            return Err(MatchedFilterError::InvalidParameter(
                "template length must be > 0".into(),
            ));
        }
        if segment_len < len_template {
            return Err(MatchedFilterError::InvalidParameter(format!(
                "segment length {} is shorter than template length {}",
                segment_len, len_template
            )));
        }
        Self::new(len_data, segment_len, len_template - 1)
    }

    pub fn len_data(&self) -> usize {
        self.len_data
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// New samples contributed by each block.
    pub fn hop(&self) -> usize {
        self.segment_len - self.overlap
    }

    pub fn n_segments(&self) -> usize {
        self.n_segments
    }

    /// Total samples of a segment buffer (`segment_len * n_segments`).
    pub fn buffer_len(&self) -> usize {
        self.segment_len * self.n_segments
    }

    /// Number of fully-overlapping correlation lags.
    pub fn output_len(&self) -> usize {
        self.len_data - self.overlap
    }

    /// Output lag of row `row` in block `segment`, if that row is kept.
    ///
    /// Rows inside the overlap region, windows reaching into the virtual
    /// left padding, and windows running past the data end map to `None`.
    pub fn output_index(&self, segment: usize, row: usize) -> Option<usize> {
        if row < self.overlap || row >= self.segment_len {
            return None;
        }
        let end = segment * self.hop() + row;
        let start = end.checked_sub(2 * self.overlap)?;
        (start < self.output_len()).then_some(start)
    }

    /// Fill `out` with the segmented form of `signal`.
    ///
    /// `out` is fully overwritten, so a buffer can be reused across channels.
    ///
    /// # Panics
    /// Panics if `signal.len() != len_data` or `out.len() != buffer_len()`.
    pub fn segment_into(&self, signal: &[f64], out: &mut [f64]) {
        assert_eq!(signal.len(), self.len_data, "signal length must match layout");
        assert_eq!(out.len(), self.buffer_len(), "segment buffer has wrong size");

        let hop = self.hop();
        for (i, block) in out.chunks_exact_mut(self.segment_len).enumerate() {
            block.fill(0.0);

            // Block i starts at original index i * hop - overlap.
            let padded_start = i * hop;
            let dst_start = self.overlap.saturating_sub(padded_start);
            let src_start = padded_start.saturating_sub(self.overlap);
            if src_start >= self.len_data {
                continue;
            }
            let n = (self.segment_len - dst_start).min(self.len_data - src_start);
            block[dst_start..dst_start + n].copy_from_slice(&signal[src_start..src_start + n]);
        }
    }

    /// Segment `signal` into a freshly allocated buffer.
    pub fn buffer(&self, signal: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.buffer_len()];
        self.segment_into(signal, &mut out);
        out
    }
}
