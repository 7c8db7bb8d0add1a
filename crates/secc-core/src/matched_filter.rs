//! # Multi-Station Matched Filter
//!
//! Stacks normalized cross-correlation coefficients of a template bank over
//! every station and component of a continuous recording:
//!
//! ```text
//! ccc_sum[t, l] = Σ_station Σ_component weight[i, l] · ccc_{i,j,l}[t − lead[i, l]]
//! ```
//!
//! where `lead[i, l] = max_i(moveout[·, l]) − moveout[i, l]` aligns every
//! station on the latest arrival.
//!
//! [`MatchedFilter`] owns the FFT plans and every scratch buffer for one
//! problem geometry. It is built once and reused across all channels (and
//! across calls with the same geometry); nothing is re-planned or
//! re-allocated inside the station/component/template loop.
//!
//! ## Example
//!
//! ```rust
//! use secc_core::matched_filter::compute_matched_filter;
//! use secc_core::tensor::{Moveouts, Templates, Waveforms, Weights};
//!
//! let mut data = Waveforms::zeros(256, 1, 1);
//! for (t, x) in data.channel_mut(0, 0).iter_mut().enumerate() {
//!     *x = (t as f64 * 0.2).sin() * (t as f64 * 0.031).cos();
//! }
//! let mut templates = Templates::zeros(16, 1, 1, 1);
//! let event = data.channel(0, 0)[100..116].to_vec();
//! templates.template_mut(0, 0, 0).copy_from_slice(&event);
//!
//! let ccc = compute_matched_filter(
//!     &data,
//!     &templates,
//!     64,
//!     &Moveouts::zeros(1, 1),
//!     &Weights::filled(1, 1, 1.0),
//! )
//! .unwrap();
//! assert_eq!(ccc.shape(), (241, 1));
//! assert!((ccc.get(100, 0) - 1.0).abs() < 1e-9);
//! ```

use rayon::prelude::*;

use crate::config::{EngineConfig, ExecutionMode};
use crate::correlate::{accumulate_shifted, ChannelWorkspace};
use crate::error::{MatchedFilterError, SeccResult};
use crate::segment::SegmentLayout;
use crate::sink::{Channel, CorrelationSink, NullSink};
use crate::spectral::SpectralEngine;
use crate::tensor::{Moveouts, ScoreMatrix, StationMatrix, Templates, Waveforms, Weights};

/// Problem geometry shared by all four input tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub len_data: usize,
    pub len_template: usize,
    pub n_component: usize,
    pub n_station: usize,
    pub n_template: usize,
}

impl Dimensions {
    /// Check that the tensors agree with each other and are non-empty.
    pub fn of(
        data: &Waveforms,
        templates: &Templates,
        moveouts: &Moveouts,
        weights: &Weights,
    ) -> SeccResult<Self> {
        let (len_template, n_component, n_station, n_template) = templates.shape();
        let (len_data, data_components, data_stations) = data.shape();

        for (name, value) in [
            ("template length", len_template),
            ("component count", n_component),
            ("station count", n_station),
            ("template count", n_template),
            ("data length", len_data),
        ] {
            if value == 0 {
                return Err(MatchedFilterError::InvalidParameter(format!("{} must be > 0", name)));
            }
        }

        if data_components != n_component {
            return Err(MatchedFilterError::shape("data components", n_component, data_components));
        }
        if data_stations != n_station {
            return Err(MatchedFilterError::shape("data stations", n_station, data_stations));
        }
        for (name, (rows, cols)) in [("moveout", moveouts.shape()), ("weight", weights.shape())] {
            if rows != n_station {
                return Err(MatchedFilterError::shape(format!("{} stations", name), n_station, rows));
            }
            if cols != n_template {
                return Err(MatchedFilterError::shape(format!("{} templates", name), n_template, cols));
            }
        }
        if len_data < len_template {
            return Err(MatchedFilterError::shape("data length", len_template, len_data));
        }

        Ok(Self {
            len_data,
            len_template,
            n_component,
            n_station,
            n_template,
        })
    }

    /// Number of fully-overlapping lags, `len_data - len_template + 1`.
    pub fn output_len(&self) -> usize {
        self.len_data + 1 - self.len_template
    }
}

/// Reusable matched-filter engine for one problem geometry.
#[derive(Debug)]
pub struct MatchedFilter {
    dims: Dimensions,
    engine: SpectralEngine,
    workspace: ChannelWorkspace,
}

impl MatchedFilter {
    /// Plan transforms and allocate buffers for `dims` with segment length
    /// `segment_len`, running FFT columns on `threads` workers.
    pub fn new(dims: Dimensions, segment_len: usize, threads: usize) -> SeccResult<Self> {
        let layout = SegmentLayout::for_template(dims.len_data, segment_len, dims.len_template)?;
        let engine = SpectralEngine::new(segment_len, threads)?;
        let workspace = ChannelWorkspace::new(&engine, layout, dims.len_template, dims.n_template)?;

        Ok(Self {
            dims,
            engine,
            workspace,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn layout(&self) -> &SegmentLayout {
        self.workspace.layout()
    }

    /// Run the full station × component × template stack.
    pub fn run<S: CorrelationSink>(
        &mut self,
        data: &Waveforms,
        templates: &Templates,
        moveouts: &Moveouts,
        weights: &Weights,
        sink: &mut S,
    ) -> SeccResult<ScoreMatrix> {
        let dims = Dimensions::of(data, templates, moveouts, weights)?;
        let built = self.dims;
        for (what, expected, actual) in [
            ("data length", built.len_data, dims.len_data),
            ("template length", built.len_template, dims.len_template),
            ("component count", built.n_component, dims.n_component),
            ("station count", built.n_station, dims.n_station),
            ("template count", built.n_template, dims.n_template),
        ] {
            if expected != actual {
                return Err(MatchedFilterError::shape(what, expected, actual));
            }
        }
        check_weights(weights)?;

        let lead = moveouts.to_lead_times();
        let mut ccc_sum = ScoreMatrix::zeros(dims.output_len(), dims.n_template);
        for i in 0..dims.n_station {
            self.run_station(i, data, templates, &lead, weights, &mut ccc_sum, sink)?;
        }
        Ok(ccc_sum)
    }

    /// Add station `i`'s contribution (all components, all templates) into
    /// `ccc_sum`.
    #[allow(clippy::too_many_arguments)]
    fn run_station<S: CorrelationSink>(
        &mut self,
        i: usize,
        data: &Waveforms,
        templates: &Templates,
        lead: &StationMatrix<usize>,
        weights: &Weights,
        ccc_sum: &mut ScoreMatrix,
        sink: &mut S,
    ) -> SeccResult<()> {
        let dims = self.dims;
        tracing::debug!(station = i, "correlating station");

        for l in 0..dims.n_template {
            if lead.get(i, l) >= dims.output_len() {
                tracing::warn!(
                    station = i,
                    template = l,
                    lead = lead.get(i, l),
                    "moveout shifts the whole contribution out of the window"
                );
            }
        }

        for j in 0..dims.n_component {
            tracing::trace!(station = i, component = j, "loading channel");
            self.workspace.load_channel(
                &self.engine,
                data.channel(i, j),
                templates.channel_bank(i, j),
            )?;

            for l in 0..dims.n_template {
                if self.workspace.template_rms(l) == 0.0 {
                    tracing::warn!(station = i, component = j, template = l, "template has zero energy");
                }
                let trace = self.workspace.correlate(&self.engine, l)?;
                if sink.is_enabled() {
                    sink.record(
                        Channel {
                            station: i,
                            component: j,
                            template: l,
                        },
                        trace,
                    );
                }
                accumulate_shifted(ccc_sum.column_mut(l), trace, lead.get(i, l), weights.get(i, l));
            }
        }

        Ok(())
    }
}

fn check_weights(weights: &Weights) -> SeccResult<()> {
    match weights.iter().find(|w| !w.is_finite()) {
        Some(w) => Err(MatchedFilterError::InvalidParameter(format!(
            "weights must be finite, found {}",
            w
        ))),
        None => Ok(()),
    }
}

/// Compute the stacked normalized cross-correlation with default settings
/// (sequential stations, FFT columns on all logical cores).
///
/// Returns `ccc_sum[len_data - len_template + 1, n_template]`.
pub fn compute_matched_filter(
    data: &Waveforms,
    templates: &Templates,
    segment_len: usize,
    moveouts: &Moveouts,
    weights: &Weights,
) -> SeccResult<ScoreMatrix> {
    compute_with_config(
        data,
        templates,
        segment_len,
        moveouts,
        weights,
        &EngineConfig::default(),
        &mut NullSink,
    )
}

/// Compute the stacked coefficients with explicit engine settings, feeding
/// every per-channel trace to `sink`.
pub fn compute_with_config<S: CorrelationSink>(
    data: &Waveforms,
    templates: &Templates,
    segment_len: usize,
    moveouts: &Moveouts,
    weights: &Weights,
    config: &EngineConfig,
    sink: &mut S,
) -> SeccResult<ScoreMatrix> {
    let dims = Dimensions::of(data, templates, moveouts, weights)?;
    check_weights(weights)?;
    let threads = config.resolved_threads();

    let scaled;
    let weights = if config.normalize_by_components {
        let mut w = weights.clone();
        for i in 0..dims.n_station {
            for l in 0..dims.n_template {
                w.set(i, l, weights.get(i, l) / dims.n_component as f64);
            }
        }
        scaled = w;
        &scaled
    } else {
        weights
    };

    let span = tracing::info_span!(
        "matched_filter",
        len_data = dims.len_data,
        len_template = dims.len_template,
        stations = dims.n_station,
        components = dims.n_component,
        templates = dims.n_template,
        segment_len,
        threads,
    );
    let _guard = span.enter();

    let ccc_sum = match config.execution {
        ExecutionMode::Sequential => {
            let mut filter = MatchedFilter::new(dims, segment_len, threads)?;
            tracing::info!(
                segments = filter.layout().n_segments(),
                "running sequential matched filter"
            );
            filter.run(data, templates, moveouts, weights, sink)?
        }
        ExecutionMode::StationParallel => {
            run_station_parallel(dims, data, templates, segment_len, moveouts, weights, threads, sink)?
        }
    };

    tracing::info!("matched filter complete");
    Ok(ccc_sum)
}

/// Stations processed concurrently, each worker with private plans and
/// buffers built once.
///
/// Stations are taken in ascending chunks of one station per worker. After
/// each chunk the partial stacks are added into the output and the captured
/// traces replayed into `sink`, both in station order, so memory stays
/// bounded by the worker count. The result is deterministic for a given
/// input but may differ from the sequential schedule in the last bits, since
/// component sums are formed per station before being added.
#[allow(clippy::too_many_arguments)]
fn run_station_parallel<S: CorrelationSink>(
    dims: Dimensions,
    data: &Waveforms,
    templates: &Templates,
    segment_len: usize,
    moveouts: &Moveouts,
    weights: &Weights,
    threads: usize,
    sink: &mut S,
) -> SeccResult<ScoreMatrix> {
    let capture = sink.is_enabled();
    let lead = moveouts.to_lead_times();
    let n_workers = threads.min(dims.n_station).max(1);

    // Fails on bad parameters before any thread is spawned
    let mut workers = (0..n_workers)
        .map(|_| StationWorker::new(dims, segment_len, capture))
        .collect::<SeccResult<Vec<_>>>()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .thread_name(|i| format!("secc-station-{}", i))
        .build()?;

    tracing::info!(workers = n_workers, "running station-parallel matched filter");

    let stations: Vec<usize> = (0..dims.n_station).collect();
    let mut ccc_sum = ScoreMatrix::zeros(dims.output_len(), dims.n_template);
    for chunk in stations.chunks(n_workers) {
        let active = &mut workers[..chunk.len()];
        pool.install(|| {
            active
                .par_iter_mut()
                .zip(chunk.par_iter())
                .try_for_each(|(worker, &i)| worker.run(i, data, templates, &lead, weights))
        })?;

        for worker in active.iter_mut() {
            ccc_sum.add_assign(&worker.partial);
            for (channel, trace) in worker.captured.traces.drain(..) {
                sink.record(channel, &trace);
            }
        }
    }
    Ok(ccc_sum)
}

/// One station-parallel worker: plans, scratch, and the partial stack of
/// the station it last processed.
struct StationWorker {
    filter: MatchedFilter,
    partial: ScoreMatrix,
    captured: CapturedTraces,
}

impl StationWorker {
    fn new(dims: Dimensions, segment_len: usize, capture: bool) -> SeccResult<Self> {
        Ok(Self {
            filter: MatchedFilter::new(dims, segment_len, 1)?,
            partial: ScoreMatrix::zeros(dims.output_len(), dims.n_template),
            captured: CapturedTraces {
                enabled: capture,
                traces: Vec::new(),
            },
        })
    }

    fn run(
        &mut self,
        station: usize,
        data: &Waveforms,
        templates: &Templates,
        lead: &StationMatrix<usize>,
        weights: &Weights,
    ) -> SeccResult<()> {
        self.partial.clear();
        self.captured.traces.clear();
        self.filter
            .run_station(station, data, templates, lead, weights, &mut self.partial, &mut self.captured)
    }
}

struct CapturedTraces {
    enabled: bool,
    traces: Vec<(Channel, Vec<f64>)>,
}

impl CorrelationSink for CapturedTraces {
    fn record(&mut self, channel: Channel, ccc: &[f64]) {
        self.traces.push((channel, ccc.to_vec()));
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::direct_matched_filter;
    use crate::sink::MemorySink;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    const TOL: f64 = 1e-9;

    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..len).map(|_| normal.sample(&mut rng)).collect()
    }

    /// Noise data with templates cut verbatim from it at `origins[l]`
    /// (shifted by each station's moveout).
    fn synthetic(
        len_data: usize,
        len_template: usize,
        n_component: usize,
        n_station: usize,
        origins: &[usize],
        moveouts: &Moveouts,
    ) -> (Waveforms, Templates) {
        let n_template = origins.len();
        let mut data = Waveforms::zeros(len_data, n_component, n_station);
        let mut templates = Templates::zeros(len_template, n_component, n_station, n_template);
        let mut seed = 7;
        for i in 0..n_station {
            for j in 0..n_component {
                seed += 1;
                data.channel_mut(i, j).copy_from_slice(&noise(len_data, seed));
                for (l, &origin) in origins.iter().enumerate() {
                    let start = (origin as i64 + moveouts.get(i, l)) as usize;
                    let cut = data.channel(i, j)[start..start + len_template].to_vec();
                    templates.template_mut(i, j, l).copy_from_slice(&cut);
                }
            }
        }
        (data, templates)
    }

    fn config(threads: usize) -> EngineConfig {
        EngineConfig::default().with_threads(threads)
    }

    fn argmax(xs: &[f64]) -> usize {
        xs.iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_zero_data_gives_zero_output() {
        let data = Waveforms::zeros(300, 2, 3);
        let mut templates = Templates::zeros(20, 2, 3, 2);
        for i in 0..3 {
            for j in 0..2 {
                for l in 0..2 {
                    let t: Vec<f64> = (0..20).map(|n| ((n + i + j + l) as f64).sin()).collect();
                    templates.template_mut(i, j, l).copy_from_slice(&t);
                }
            }
        }
        let moveouts = Moveouts::from_rows(vec![vec![0, 3], vec![5, 1], vec![2, 2]]).unwrap();
        let weights = Weights::filled(3, 2, 0.7);

        let ccc = compute_with_config(&data, &templates, 64, &moveouts, &weights, &config(2), &mut NullSink)
            .unwrap();
        assert_eq!(ccc.shape(), (281, 2));
        for l in 0..2 {
            assert!(ccc.column(l).iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_self_match_is_one() {
        let moveouts = Moveouts::zeros(1, 1);
        let (data, templates) = synthetic(1000, 50, 1, 1, &[412], &moveouts);
        let weights = Weights::filled(1, 1, 1.0);

        let ccc = compute_with_config(&data, &templates, 256, &moveouts, &weights, &config(2), &mut NullSink)
            .unwrap();
        let column = ccc.column(0);
        assert!((column[412] - 1.0).abs() < 1e-6, "peak = {}", column[412]);
        assert_eq!(argmax(column), 412);
        assert!(column.iter().all(|&c| c.abs() <= 1.0 + 1e-9));
    }

    #[test]
    fn test_matches_direct_computation() {
        let moveouts = Moveouts::from_rows(vec![vec![0, 4], vec![3, 0], vec![7, 2]]).unwrap();
        let (data, templates) = synthetic(400, 24, 2, 3, &[100, 250], &moveouts);
        let weights = Weights::from_rows(vec![vec![1.0, 0.5], vec![0.25, 1.0], vec![2.0, 0.75]]).unwrap();
        let expected = direct_matched_filter(&data, &templates, &moveouts, &weights);

        for &k in &[24, 25, 32, 64, 100, 512] {
            let ccc = compute_with_config(&data, &templates, k, &moveouts, &weights, &config(3), &mut NullSink)
                .unwrap();
            let err = ccc.max_abs_diff(&expected);
            assert!(err < TOL, "k={k}: max error = {err}");
        }
    }

    #[test]
    fn test_moveout_shifts_peak() {
        // Two stations, the template on station 1 arrives 9 samples later.
        let moveouts = Moveouts::from_rows(vec![vec![0], vec![9]]).unwrap();
        let (data, templates) = synthetic(600, 32, 1, 2, &[200], &moveouts);

        // Only station 0 contributes: its lead relative to station 1 is 9.
        let weights = Weights::from_rows(vec![vec![1.0], vec![0.0]]).unwrap();
        let ccc = compute_with_config(&data, &templates, 128, &moveouts, &weights, &config(1), &mut NullSink)
            .unwrap();
        let column = ccc.column(0);
        assert_eq!(argmax(column), 209);
        assert!((column[209] - 1.0).abs() < 1e-6);
        assert!(column[..9].iter().all(|&x| x == 0.0));

        // Both stations align on the same output sample.
        let both = Weights::filled(2, 1, 1.0);
        let ccc = compute_with_config(&data, &templates, 128, &moveouts, &both, &config(1), &mut NullSink)
            .unwrap();
        assert_eq!(argmax(ccc.column(0)), 209);
        assert!((ccc.get(209, 0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_moveout_beyond_window_contributes_nothing() {
        let data = Waveforms::from_channels(vec![
            vec![noise(100, 1)],
            vec![noise(100, 2)],
        ])
        .unwrap();
        let mut templates = Templates::zeros(10, 1, 2, 1);
        templates.template_mut(0, 0, 0).copy_from_slice(&noise(10, 3));
        templates.template_mut(1, 0, 0).copy_from_slice(&noise(10, 4));
        // Station 0 leads by 500 samples, far past the 91-sample output.
        let moveouts = Moveouts::from_rows(vec![vec![0], vec![500]]).unwrap();
        let only_station0 = Weights::from_rows(vec![vec![1.0], vec![0.0]]).unwrap();

        let ccc = compute_with_config(&data, &templates, 32, &moveouts, &only_station0, &config(1), &mut NullSink)
            .unwrap();
        assert!(ccc.column(0).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_weight_linearity() {
        let moveouts = Moveouts::from_rows(vec![vec![0, 2], vec![1, 0]]).unwrap();
        let (data, templates) = synthetic(300, 16, 2, 2, &[50, 120], &moveouts);
        let base = Weights::from_rows(vec![vec![1.0, 0.0], vec![0.0, 0.0]]).unwrap();
        let scaled = Weights::from_rows(vec![vec![3.5, 0.0], vec![0.0, 0.0]]).unwrap();

        let a = compute_with_config(&data, &templates, 64, &moveouts, &base, &config(2), &mut NullSink).unwrap();
        let b = compute_with_config(&data, &templates, 64, &moveouts, &scaled, &config(2), &mut NullSink).unwrap();
        for (x, y) in a.column(0).iter().zip(b.column(0).iter()) {
            assert!((3.5 * x - y).abs() < TOL);
        }
    }

    #[test]
    fn test_station_additivity() {
        let moveouts = Moveouts::from_rows(vec![vec![0, 1], vec![4, 0], vec![2, 6]]).unwrap();
        let (data, templates) = synthetic(500, 20, 3, 3, &[100, 300], &moveouts);
        let weights = Weights::from_rows(vec![vec![0.5, 1.0], vec![1.0, 0.2], vec![0.8, 0.9]]).unwrap();

        let all = compute_with_config(&data, &templates, 128, &moveouts, &weights, &config(2), &mut NullSink)
            .unwrap();

        let mut summed = ScoreMatrix::zeros(all.len(), all.n_template());
        for i in 0..3 {
            let mut single = Weights::zeros(3, 2);
            for l in 0..2 {
                single.set(i, l, weights.get(i, l));
            }
            let part = compute_with_config(&data, &templates, 128, &moveouts, &single, &config(2), &mut NullSink)
                .unwrap();
            summed.add_assign(&part);
        }
        let err = all.max_abs_diff(&summed);
        assert!(err < TOL, "additivity error = {err}");
    }

    #[test]
    fn test_station_parallel_matches_sequential() {
        let moveouts = Moveouts::from_rows(vec![vec![0, 3], vec![5, 0], vec![1, 1], vec![2, 8]]).unwrap();
        let (data, templates) = synthetic(700, 30, 2, 4, &[150, 400], &moveouts);
        let weights = Weights::filled(4, 2, 0.5);

        let sequential = compute_with_config(&data, &templates, 128, &moveouts, &weights, &config(2), &mut NullSink)
            .unwrap();
        let parallel_config = config(3).with_execution(ExecutionMode::StationParallel);
        let parallel =
            compute_with_config(&data, &templates, 128, &moveouts, &weights, &parallel_config, &mut NullSink)
                .unwrap();
        assert!(sequential.max_abs_diff(&parallel) < TOL);

        // Same schedule twice gives bit-identical output
        let again =
            compute_with_config(&data, &templates, 128, &moveouts, &weights, &parallel_config, &mut NullSink)
                .unwrap();
        assert_eq!(parallel, again);
    }

    #[test]
    fn test_normalize_by_components() {
        let moveouts = Moveouts::zeros(1, 1);
        let (data, templates) = synthetic(400, 25, 3, 1, &[123], &moveouts);
        let weights = Weights::filled(1, 1, 1.0);
        let cfg = config(1).with_normalize_by_components(true);
        let ccc = compute_with_config(&data, &templates, 64, &moveouts, &weights, &cfg, &mut NullSink).unwrap();
        assert!((ccc.get(123, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sink_receives_every_channel() {
        let moveouts = Moveouts::from_rows(vec![vec![0, 0], vec![3, 1]]).unwrap();
        let (data, templates) = synthetic(200, 12, 2, 2, &[40, 90], &moveouts);
        let weights = Weights::filled(2, 2, 1.0);

        for execution in [ExecutionMode::Sequential, ExecutionMode::StationParallel] {
            let mut sink = MemorySink::new();
            let cfg = config(2).with_execution(execution);
            compute_with_config(&data, &templates, 32, &moveouts, &weights, &cfg, &mut sink).unwrap();
            assert_eq!(sink.len(), 8);
            let ch = Channel {
                station: 1,
                component: 0,
                template: 1,
            };
            let trace = sink.get(ch).unwrap();
            assert_eq!(trace.len(), 189);
            // Unshifted: the self-match sits at the template's own origin.
            assert!((trace[91] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_engine_reuse() {
        let moveouts = Moveouts::zeros(2, 1);
        let (data, templates) = synthetic(300, 16, 1, 2, &[77], &moveouts);
        let weights = Weights::filled(2, 1, 1.0);
        let dims = Dimensions::of(&data, &templates, &moveouts, &weights).unwrap();

        let mut filter = MatchedFilter::new(dims, 64, 2).unwrap();
        let first = filter.run(&data, &templates, &moveouts, &weights, &mut NullSink).unwrap();
        let second = filter.run(&data, &templates, &moveouts, &weights, &mut NullSink).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shape_mismatch() {
        let data = Waveforms::zeros(100, 2, 3);
        let templates = Templates::zeros(10, 2, 2, 1);
        let err = compute_matched_filter(&data, &templates, 32, &Moveouts::zeros(2, 1), &Weights::zeros(2, 1))
            .unwrap_err();
        assert!(matches!(err, MatchedFilterError::ShapeMismatch { .. }));

        let templates = Templates::zeros(10, 2, 3, 2);
        let err = compute_matched_filter(&data, &templates, 32, &Moveouts::zeros(3, 1), &Weights::zeros(3, 2))
            .unwrap_err();
        assert!(matches!(err, MatchedFilterError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_data_shorter_than_template() {
        let data = Waveforms::zeros(8, 1, 1);
        let templates = Templates::zeros(10, 1, 1, 1);
        let err = compute_matched_filter(&data, &templates, 16, &Moveouts::zeros(1, 1), &Weights::zeros(1, 1))
            .unwrap_err();
        assert!(matches!(err, MatchedFilterError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_invalid_parameters() {
        let data = Waveforms::zeros(100, 1, 1);
        let templates = Templates::zeros(10, 1, 1, 1);
        let m = Moveouts::zeros(1, 1);
        let w = Weights::filled(1, 1, 1.0);

        for k in [0, 9] {
            let err = compute_matched_filter(&data, &templates, k, &m, &w).unwrap_err();
            assert!(matches!(err, MatchedFilterError::InvalidParameter(_)), "k={k}");
        }

        let err = compute_matched_filter(&data, &Templates::zeros(10, 1, 1, 0), 32, &Moveouts::zeros(1, 0), &Weights::zeros(1, 0))
            .unwrap_err();
        assert!(matches!(err, MatchedFilterError::InvalidParameter(_)));

        let err = compute_matched_filter(&data, &templates, 32, &m, &Weights::filled(1, 1, f64::NAN)).unwrap_err();
        assert!(matches!(err, MatchedFilterError::InvalidParameter(_)));
    }

    #[test]
    fn test_engine_rejects_other_geometry() {
        let data = Waveforms::zeros(100, 1, 1);
        let templates = Templates::zeros(10, 1, 1, 1);
        let m = Moveouts::zeros(1, 1);
        let w = Weights::filled(1, 1, 1.0);
        let dims = Dimensions::of(&data, &templates, &m, &w).unwrap();
        let mut filter = MatchedFilter::new(dims, 32, 1).unwrap();

        let longer = Waveforms::zeros(120, 1, 1);
        let err = filter.run(&longer, &templates, &m, &w, &mut NullSink).unwrap_err();
        assert_eq!(err, MatchedFilterError::shape("data length", 100, 120));
    }

    #[test]
    fn test_engine_from_hand_built_dimensions() {
        let dims = Dimensions {
            len_data: 5,
            len_template: 10,
            n_component: 1,
            n_station: 1,
            n_template: 1,
        };
        let err = MatchedFilter::new(dims, 16, 1).unwrap_err();
        assert!(matches!(err, MatchedFilterError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_extreme_moveouts_drop_contribution() {
        let data = Waveforms::from_channels(vec![vec![noise(100, 5)], vec![noise(100, 6)]]).unwrap();
        let mut templates = Templates::zeros(10, 1, 2, 1);
        templates.template_mut(0, 0, 0).copy_from_slice(&data.channel(0, 0)[20..30]);
        templates.template_mut(1, 0, 0).copy_from_slice(&noise(10, 7));
        let moveouts = Moveouts::from_rows(vec![vec![-1], vec![i64::MAX]]).unwrap();
        let only_station0 = Weights::from_rows(vec![vec![1.0], vec![0.0]]).unwrap();

        for execution in [ExecutionMode::Sequential, ExecutionMode::StationParallel] {
            let cfg = config(2).with_execution(execution);
            let ccc = compute_with_config(&data, &templates, 32, &moveouts, &only_station0, &cfg, &mut NullSink)
                .unwrap();
            assert!(ccc.column(0).iter().all(|&x| x == 0.0));
        }
    }

    /// Records the order in which channels arrive.
    #[derive(Default)]
    struct ChannelOrder(Vec<Channel>);

    impl CorrelationSink for ChannelOrder {
        fn record(&mut self, channel: Channel, _ccc: &[f64]) {
            self.0.push(channel);
        }
    }

    #[test]
    fn test_station_parallel_more_stations_than_workers() {
        let moveouts = Moveouts::from_rows(vec![vec![0], vec![2], vec![5], vec![1], vec![3]]).unwrap();
        let (data, templates) = synthetic(300, 16, 2, 5, &[120], &moveouts);
        let weights = Weights::from_rows(vec![vec![1.0], vec![0.5], vec![2.0], vec![0.25], vec![1.5]]).unwrap();

        let mut sequential_order = ChannelOrder::default();
        let sequential =
            compute_with_config(&data, &templates, 64, &moveouts, &weights, &config(1), &mut sequential_order)
                .unwrap();

        let mut parallel_order = ChannelOrder::default();
        let cfg = config(2).with_execution(ExecutionMode::StationParallel);
        let parallel =
            compute_with_config(&data, &templates, 64, &moveouts, &weights, &cfg, &mut parallel_order).unwrap();

        assert!(sequential.max_abs_diff(&parallel) < TOL);
        assert_eq!(parallel_order.0.len(), 10);
        assert_eq!(parallel_order.0, sequential_order.0);
    }

    #[test]
    fn test_silent_gap_scores_exactly_zero() {
        let mut trace = noise(600, 11);
        trace[250..350].fill(0.0);
        let data = Waveforms::from_channels(vec![vec![trace.clone()]]).unwrap();
        let mut templates = Templates::zeros(30, 1, 1, 1);
        templates.template_mut(0, 0, 0).copy_from_slice(&trace[100..130]);
        let moveouts = Moveouts::zeros(1, 1);
        let weights = Weights::filled(1, 1, 1.0);

        let ccc = compute_with_config(&data, &templates, 128, &moveouts, &weights, &config(1), &mut NullSink)
            .unwrap();
        // Windows lying wholly inside the gap
        for t in 250..=320 {
            assert_eq!(ccc.get(t, 0), 0.0, "lag {t}");
        }
        assert!((ccc.get(100, 0) - 1.0).abs() < 1e-6);

        // Windows clear of the gap are unaffected
        let expected = direct_matched_filter(&data, &templates, &moveouts, &weights);
        for t in (0..220).chain(350..ccc.len()) {
            let err = (ccc.get(t, 0) - expected.get(t, 0)).abs();
            assert!(err < TOL, "lag {t}: error = {err}");
        }
    }
}
