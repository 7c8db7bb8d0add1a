//! Error types for the matched-filter engine.

/// Result type for matched-filter operations
pub type SeccResult<T> = Result<T, MatchedFilterError>;

/// Errors that abort a matched-filter computation.
///
/// All of them are detected before the first transform runs (or when the
/// transform machinery is built), so a failed call never returns a partial
/// score matrix.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchedFilterError {
    /// Input tensors disagree on a dimension, or the data is shorter than
    /// the templates.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The spectral transform could not be planned or executed.
    #[error("Transform failure: {0}")]
    TransformFailure(String),
}

impl MatchedFilterError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        MatchedFilterError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

impl From<realfft::FftError> for MatchedFilterError {
    fn from(err: realfft::FftError) -> Self {
        MatchedFilterError::TransformFailure(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for MatchedFilterError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        MatchedFilterError::TransformFailure(format!("thread pool: {}", err))
    }
}
