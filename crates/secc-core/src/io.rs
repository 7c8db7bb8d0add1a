//! # JSON Input and Output
//!
//! File formats used by the `secc` command-line tool. Arrays are nested in
//! time-first order:
//!
//! ```text
//! data      [time][component][station]
//! template  [time][component][station][template]
//! moveout   [station][template]
//! weight    [station][template]
//! ccc_sum   [time][template]
//! ```
//!
//! A ragged nesting (rows of unequal length at any depth) is rejected with
//! a shape error before anything is computed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MatchedFilterError;
use crate::sink::{Channel, CorrelationSink};
use crate::tensor::{Moveouts, ScoreMatrix, Templates, Waveforms, Weights};

/// Error type for file operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Shape(#[from] MatchedFilterError),
}

/// Matched-filter problem as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedFilterInput {
    pub data: Vec<Vec<Vec<f64>>>,
    pub template: Vec<Vec<Vec<Vec<f64>>>>,
    pub moveout: Vec<Vec<i64>>,
    pub weight: Vec<Vec<f64>>,
    /// Segment length; falls back to the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

/// The four tensors of a loaded problem.
#[derive(Debug, Clone)]
pub struct Problem {
    pub data: Waveforms,
    pub templates: Templates,
    pub moveouts: Moveouts,
    pub weights: Weights,
    pub k: Option<usize>,
}

impl MatchedFilterInput {
    pub fn load_json(path: &Path) -> Result<Self, IoError> {
        read_json(path)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), IoError> {
        write_json(path, self)
    }

    /// Validate the nesting and convert to tensors.
    pub fn into_problem(self) -> Result<Problem, IoError> {
        let data = waveforms_from_nested(&self.data)?;
        let templates = templates_from_nested(&self.template)?;
        let moveouts = Moveouts::from_rows(self.moveout)?;
        let weights = Weights::from_rows(self.weight)?;
        Ok(Problem {
            data,
            templates,
            moveouts,
            weights,
            k: self.k,
        })
    }

    /// Nest tensors back into the on-disk layout.
    pub fn from_problem(problem: &Problem) -> Self {
        let (len, n_component, n_station) = problem.data.shape();
        let data = (0..len)
            .map(|t| {
                (0..n_component)
                    .map(|j| (0..n_station).map(|i| problem.data.get(t, j, i)).collect())
                    .collect()
            })
            .collect();

        let (lt, tc, ts, nt) = problem.templates.shape();
        let template = (0..lt)
            .map(|t| {
                (0..tc)
                    .map(|j| {
                        (0..ts)
                            .map(|i| (0..nt).map(|l| problem.templates.get(t, j, i, l)).collect())
                            .collect()
                    })
                    .collect()
            })
            .collect();

        Self {
            data,
            template,
            moveout: matrix_rows(&problem.moveouts),
            weight: matrix_rows(&problem.weights),
            k: problem.k,
        }
    }
}

fn matrix_rows<T: Copy + Default>(m: &crate::tensor::StationMatrix<T>) -> Vec<Vec<T>> {
    let (rows, cols) = m.shape();
    (0..rows).map(|i| (0..cols).map(|l| m.get(i, l)).collect()).collect()
}

/// Length of every row in `rows`, or a shape error if they differ.
fn uniform_len<T>(rows: &[Vec<T>], what: &str) -> Result<usize, MatchedFilterError> {
    let expected = rows.first().map_or(0, Vec::len);
    match rows.iter().find(|r| r.len() != expected) {
        Some(r) => Err(MatchedFilterError::shape(what, expected, r.len())),
        None => Ok(expected),
    }
}

fn waveforms_from_nested(data: &[Vec<Vec<f64>>]) -> Result<Waveforms, MatchedFilterError> {
    let len = data.len();
    let n_component = uniform_len(data, "data components")?;
    let mut n_station = 0;
    for (t, row) in data.iter().enumerate() {
        let stations = uniform_len(row, "data stations")?;
        if t == 0 {
            n_station = stations;
        } else if stations != n_station {
            return Err(MatchedFilterError::shape("data stations", n_station, stations));
        }
    }

    let mut out = Waveforms::zeros(len, n_component, n_station);
    for (t, row) in data.iter().enumerate() {
        for (j, stations) in row.iter().enumerate() {
            for (i, &v) in stations.iter().enumerate() {
                out.set(t, j, i, v);
            }
        }
    }
    Ok(out)
}

fn templates_from_nested(template: &[Vec<Vec<Vec<f64>>>]) -> Result<Templates, MatchedFilterError> {
    let len = template.len();
    let n_component = uniform_len(template, "template components")?;
    let mut dims: Option<(usize, usize)> = None;
    for row in template {
        let n_station = uniform_len(row, "template stations")?;
        for stations in row {
            let n_template = uniform_len(stations, "template count")?;
            match dims {
                None => dims = Some((n_station, n_template)),
                Some((s, _)) if s != n_station => {
                    return Err(MatchedFilterError::shape("template stations", s, n_station));
                }
                Some((_, n)) if n != n_template => {
                    return Err(MatchedFilterError::shape("template count", n, n_template));
                }
                Some(_) => {}
            }
        }
    }
    let (n_station, n_template) = dims.unwrap_or((0, 0));

    let mut out = Templates::zeros(len, n_component, n_station, n_template);
    for (t, row) in template.iter().enumerate() {
        for (j, stations) in row.iter().enumerate() {
            for (i, values) in stations.iter().enumerate() {
                for (l, &v) in values.iter().enumerate() {
                    out.set(t, j, i, l, v);
                }
            }
        }
    }
    Ok(out)
}

/// Stacked coefficients plus the wall-clock time it took to compute them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub ccc_sum: Vec<Vec<f64>>,
    /// Elapsed seconds
    pub t_toc: f64,
}

impl ScoreReport {
    pub fn new(ccc_sum: &ScoreMatrix, t_toc: f64) -> Self {
        Self {
            ccc_sum: ccc_sum.to_rows(),
            t_toc,
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<(), IoError> {
        write_json(path, self)
    }

    pub fn load_json(path: &Path) -> Result<Self, IoError> {
        read_json(path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let content = fs::read_to_string(path).map_err(|source| IoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let content = serde_json::to_string(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| IoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Sink that writes each channel's trace to `CCC_<station>_<component>_<template>.json`.
///
/// `record` cannot fail, so the first write error is kept and reported by
/// [`DirectorySink::finish`]; later traces are skipped once one has failed.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: usize,
    error: Option<IoError>,
}

impl DirectorySink {
    /// Create `dir` (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, IoError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| IoError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            written: 0,
            error: None,
        })
    }

    pub fn path_for(&self, channel: Channel) -> PathBuf {
        self.dir.join(format!(
            "CCC_{}_{}_{}.json",
            channel.station, channel.component, channel.template
        ))
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of files written, or the first error.
    pub fn finish(self) -> Result<usize, IoError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.written),
        }
    }
}

impl CorrelationSink for DirectorySink {
    fn record(&mut self, channel: Channel, ccc: &[f64]) {
        if self.error.is_some() {
            return;
        }
        let path = self.path_for(channel);
        match write_json(&path, &ccc) {
            Ok(()) => self.written += 1,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "failed to write channel trace");
                self.error = Some(err);
            }
        }
    }
}
