//! Dense input and output tensors for multi-station matched filtering.
//!
//! All tensors store `f64` samples in a flat `Vec`, laid out so that the
//! innermost (contiguous) axis is time. That makes the per-channel slices the
//! engine works on (`data[:, component, station]`,
//! `template[:, component, station, l]`, `ccc_sum[:, l]`) plain borrowed
//! slices with no copying.
//!
//! The logical index order still follows the conventional seismic layout:
//!
//! ```text
//! data      [time, component, station]
//! template  [time, component, station, template]
//! moveout   [station, template]
//! weight    [station, template]
//! ccc_sum   [time - len_template + 1, template]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use secc_core::tensor::{Waveforms, Templates};
//!
//! let mut data = Waveforms::zeros(100, 3, 2);
//! data.channel_mut(1, 0)[10] = 1.0;
//! assert_eq!(data.get(10, 0, 1), 1.0);
//!
//! let templates = Templates::zeros(8, 3, 2, 4);
//! assert_eq!(templates.shape(), (8, 3, 2, 4));
//! ```

use crate::error::{MatchedFilterError, SeccResult};

/// Continuous waveform data, `data[time, component, station]`.
///
/// Storage index: `(station * n_component + component) * len + time`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveforms {
    len: usize,
    n_component: usize,
    n_station: usize,
    samples: Vec<f64>,
}

impl Waveforms {
    /// Create an all-zero waveform tensor.
    pub fn zeros(len: usize, n_component: usize, n_station: usize) -> Self {
        Self {
            len,
            n_component,
            n_station,
            samples: vec![0.0; len * n_component * n_station],
        }
    }

    /// Build from one vector per channel, indexed `[station][component]`.
    ///
    /// Every channel must have the same length.
    pub fn from_channels(channels: Vec<Vec<Vec<f64>>>) -> SeccResult<Self> {
        let n_station = channels.len();
        let n_component = channels.first().map_or(0, Vec::len);
        let len = channels
            .first()
            .and_then(|s| s.first())
            .map_or(0, Vec::len);

        let mut samples = Vec::with_capacity(len * n_component * n_station);
        for station in channels {
            if station.len() != n_component {
                return Err(MatchedFilterError::shape("data components", n_component, station.len()));
            }
            for channel in station {
                if channel.len() != len {
                    return Err(MatchedFilterError::shape("data length", len, channel.len()));
                }
                samples.extend_from_slice(&channel);
            }
        }

        Ok(Self {
            len,
            n_component,
            n_station,
            samples,
        })
    }

    /// Shape as `(len, n_component, n_station)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.len, self.n_component, self.n_station)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn n_component(&self) -> usize {
        self.n_component
    }

    pub fn n_station(&self) -> usize {
        self.n_station
    }

    #[inline]
    fn offset(&self, component: usize, station: usize) -> usize {
        (station * self.n_component + component) * self.len
    }

    /// The time series recorded by `component` at `station`.
    pub fn channel(&self, station: usize, component: usize) -> &[f64] {
        let start = self.offset(component, station);
        &self.samples[start..start + self.len]
    }

    pub fn channel_mut(&mut self, station: usize, component: usize) -> &mut [f64] {
        let start = self.offset(component, station);
        &mut self.samples[start..start + self.len]
    }

    /// Element at `[time, component, station]`.
    #[inline]
    pub fn get(&self, time: usize, component: usize, station: usize) -> f64 {
        self.samples[self.offset(component, station) + time]
    }

    #[inline]
    pub fn set(&mut self, time: usize, component: usize, station: usize, v: f64) {
        let idx = self.offset(component, station) + time;
        self.samples[idx] = v;
    }
}

/// Template bank, `template[time, component, station, template]`.
///
/// Storage index:
/// `((station * n_component + component) * n_template + template) * len + time`,
/// so all templates of one channel are adjacent.
#[derive(Clone, Debug, PartialEq)]
pub struct Templates {
    len: usize,
    n_component: usize,
    n_station: usize,
    n_template: usize,
    samples: Vec<f64>,
}

impl Templates {
    pub fn zeros(len: usize, n_component: usize, n_station: usize, n_template: usize) -> Self {
        Self {
            len,
            n_component,
            n_station,
            n_template,
            samples: vec![0.0; len * n_component * n_station * n_template],
        }
    }

    /// Shape as `(len, n_component, n_station, n_template)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.len, self.n_component, self.n_station, self.n_template)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn n_component(&self) -> usize {
        self.n_component
    }

    pub fn n_station(&self) -> usize {
        self.n_station
    }

    pub fn n_template(&self) -> usize {
        self.n_template
    }

    #[inline]
    fn offset(&self, component: usize, station: usize, template: usize) -> usize {
        ((station * self.n_component + component) * self.n_template + template) * self.len
    }

    /// One template waveform on one channel.
    pub fn template(&self, station: usize, component: usize, template: usize) -> &[f64] {
        let start = self.offset(component, station, template);
        &self.samples[start..start + self.len]
    }

    pub fn template_mut(&mut self, station: usize, component: usize, template: usize) -> &mut [f64] {
        let start = self.offset(component, station, template);
        &mut self.samples[start..start + self.len]
    }

    /// All templates of one channel, back to back (`n_template * len` samples).
    pub fn channel_bank(&self, station: usize, component: usize) -> &[f64] {
        let start = self.offset(component, station, 0);
        &self.samples[start..start + self.n_template * self.len]
    }

    /// Element at `[time, component, station, template]`.
    #[inline]
    pub fn get(&self, time: usize, component: usize, station: usize, template: usize) -> f64 {
        self.samples[self.offset(component, station, template) + time]
    }

    #[inline]
    pub fn set(&mut self, time: usize, component: usize, station: usize, template: usize, v: f64) {
        let idx = self.offset(component, station, template) + time;
        self.samples[idx] = v;
    }
}

/// A `[station, template]` matrix (row-major), used for moveouts and weights.
#[derive(Clone, Debug, PartialEq)]
pub struct StationMatrix<T> {
    n_station: usize,
    n_template: usize,
    values: Vec<T>,
}

/// Integer sample delays per station and template.
pub type Moveouts = StationMatrix<i64>;

/// Contribution weight per station and template.
pub type Weights = StationMatrix<f64>;

impl<T: Copy + Default> StationMatrix<T> {
    /// Matrix filled with `T::default()`.
    pub fn zeros(n_station: usize, n_template: usize) -> Self {
        Self::filled(n_station, n_template, T::default())
    }

    pub fn filled(n_station: usize, n_template: usize, value: T) -> Self {
        Self {
            n_station,
            n_template,
            values: vec![value; n_station * n_template],
        }
    }

    /// Build from rows indexed `[station][template]`.
    pub fn from_rows(rows: Vec<Vec<T>>) -> SeccResult<Self> {
        let n_station = rows.len();
        let n_template = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(n_station * n_template);
        for row in rows {
            if row.len() != n_template {
                return Err(MatchedFilterError::shape("matrix columns", n_template, row.len()));
            }
            values.extend(row);
        }
        Ok(Self {
            n_station,
            n_template,
            values,
        })
    }

    /// Shape as `(n_station, n_template)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_station, self.n_template)
    }

    #[inline]
    pub fn get(&self, station: usize, template: usize) -> T {
        self.values[station * self.n_template + template]
    }

    #[inline]
    pub fn set(&mut self, station: usize, template: usize, v: T) {
        self.values[station * self.n_template + template] = v;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }
}

impl Moveouts {
    /// Convert raw delays into non-negative lead times relative to the
    /// slowest station of each template: `max_over_station(raw) - raw`.
    pub fn to_lead_times(&self) -> StationMatrix<usize> {
        let mut out = StationMatrix::<usize>::zeros(self.n_station, self.n_template);
        for l in 0..self.n_template {
            let latest = (0..self.n_station)
                .map(|i| self.get(i, l))
                .max()
                .unwrap_or(0);
            for i in 0..self.n_station {
                // latest >= raw; a gap wider than usize saturates and falls
                // outside any output window
                let lead = latest.abs_diff(self.get(i, l));
                out.set(i, l, usize::try_from(lead).unwrap_or(usize::MAX));
            }
        }
        out
    }
}

/// Output correlation stack, `ccc_sum[time, template]`.
///
/// Stored template-major so each template's series is one contiguous slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
    len: usize,
    n_template: usize,
    values: Vec<f64>,
}

impl ScoreMatrix {
    pub fn zeros(len: usize, n_template: usize) -> Self {
        Self {
            len,
            n_template,
            values: vec![0.0; len * n_template],
        }
    }

    /// Shape as `(len, n_template)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.len, self.n_template)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn n_template(&self) -> usize {
        self.n_template
    }

    /// Score series for one template.
    pub fn column(&self, template: usize) -> &[f64] {
        let start = template * self.len;
        &self.values[start..start + self.len]
    }

    pub(crate) fn column_mut(&mut self, template: usize) -> &mut [f64] {
        let start = template * self.len;
        &mut self.values[start..start + self.len]
    }

    /// Element at `[time, template]`.
    #[inline]
    pub fn get(&self, time: usize, template: usize) -> f64 {
        self.values[template * self.len + time]
    }

    /// Reset every score to zero, keeping the allocation.
    pub fn clear(&mut self) {
        self.values.fill(0.0);
    }

    /// Add `other` into `self` element by element.
    pub fn add_assign(&mut self, other: &ScoreMatrix) {
        assert_eq!(self.shape(), other.shape(), "score matrix shapes must match");
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += b;
        }
    }

    /// Largest absolute difference against `other` (shapes must match).
    pub fn max_abs_diff(&self, other: &ScoreMatrix) -> f64 {
        assert_eq!(self.shape(), other.shape(), "score matrix shapes must match");
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max)
    }

    /// Rows indexed `[time][template]`.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.len)
            .map(|t| (0..self.n_template).map(|l| self.get(t, l)).collect())
            .collect()
    }
}
