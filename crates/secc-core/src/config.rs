//! # Engine Configuration
//!
//! YAML configuration for the matched-filter engine and its logging.
//!
//! ## Where It Is Read From
//!
//! The first existing file wins:
//! 1. Path specified via `SECC_CONFIG` environment variable
//! 2. `./secc.yaml` (current directory)
//! 3. `~/.config/secc/config.yaml` (user config, platform dependent)
//!
//! ## Example
//!
//! ```yaml
//! engine:
//!   threads: 0                 # 0 = all logical cores
//!   execution: sequential      # or station_parallel
//!   normalize_by_components: false
//!   segment_length: 4096
//!
//! logging:
//!   level: info
//!   format: compact
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::observe::LogConfig;

/// Failure to locate, read or validate a config file.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    ReadError(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),

    #[error("failed to write config: {0}")]
    WriteError(String),
}

/// How the station loop is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One station after another, sharing a single set of plans and buffers.
    /// FFT columns are spread over the thread pool.
    #[default]
    Sequential,
    /// Stations run concurrently, each with private plans and buffers.
    /// Per-station partial sums are merged in station order.
    StationParallel,
}

/// Matched-filter engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads (0 = available parallelism)
    pub threads: usize,
    /// Station scheduling
    pub execution: ExecutionMode,
    /// Divide every weight by the number of components, so a perfect match
    /// on all components of one station scores `weight`
    pub normalize_by_components: bool,
    /// Segment length used when the input does not specify one
    pub segment_length: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            execution: ExecutionMode::Sequential,
            normalize_by_components: false,
            segment_length: None,
        }
    }
}

impl EngineConfig {
    /// Thread count with `0` resolved to the number of logical cores.
    pub fn resolved_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            available_cpus()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_normalize_by_components(mut self, enabled: bool) -> Self {
        self.normalize_by_components = enabled;
        self
    }
}

/// Number of logical CPU cores (at least 1).
pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeccConfig {
    pub engine: EngineConfig,
    pub logging: LogConfig,
}

impl SeccConfig {
    /// Load from `SECC_CONFIG` or the first existing search path, falling
    /// back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("SECC_CONFIG") {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Read and validate one YAML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write as YAML to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::WriteError(format!("serializing: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", path.display(), e)))
    }

    /// Candidate config files, highest priority first.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./secc.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "secc") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.segment_length == Some(0) {
            return Err(ConfigError::ValidationError(
                "segment_length must be > 0".to_string(),
            ));
        }

        if let Some(ref filter) = self.logging.filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "logging.filter must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Default configuration rendered as YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            engine: EngineConfig {
                segment_length: Some(4096),
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
