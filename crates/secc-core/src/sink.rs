//! # Per-Channel Correlation Capture
//!
//! The matched filter only returns the stacked score matrix. When the
//! individual channel coefficients are wanted (debugging a station, picking
//! on a single component, building a detection catalogue) a
//! [`CorrelationSink`] receives each one as it is produced.
//!
//! The sink is called once per (station, component, template) with the
//! normalized trace *before* moveout shifting and weighting, i.e. exactly
//! `len_data - len_template + 1` coefficients.
//!
//! ```rust
//! use secc_core::sink::{Channel, CorrelationSink, MemorySink};
//!
//! let mut sink = MemorySink::new();
//! sink.record(Channel { station: 0, component: 1, template: 2 }, &[0.5, 0.25]);
//! assert_eq!(sink.get(Channel { station: 0, component: 1, template: 2 }), Some(&[0.5, 0.25][..]));
//! ```

use std::collections::BTreeMap;

/// Identifies one channel-template pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel {
    pub station: usize,
    pub component: usize,
    pub template: usize,
}

/// Receiver for individual channel coefficients.
pub trait CorrelationSink {
    /// Called with the unshifted, unweighted coefficients of one channel.
    fn record(&mut self, channel: Channel, ccc: &[f64]);

    /// Whether the engine should call [`record`](Self::record) at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CorrelationSink for NullSink {
    fn record(&mut self, _channel: Channel, _ccc: &[f64]) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Keeps every trace in memory, ordered by channel.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    traces: BTreeMap<Channel, Vec<f64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: Channel) -> Option<&[f64]> {
        self.traces.get(&channel).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Channel, &Vec<f64>)> {
        self.traces.iter()
    }

    pub fn into_inner(self) -> BTreeMap<Channel, Vec<f64>> {
        self.traces
    }
}

impl CorrelationSink for MemorySink {
    fn record(&mut self, channel: Channel, ccc: &[f64]) {
        self.traces.insert(channel, ccc.to_vec());
    }
}

impl<S: CorrelationSink + ?Sized> CorrelationSink for &mut S {
    fn record(&mut self, channel: Channel, ccc: &[f64]) {
        (**self).record(channel, ccc);
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}
