use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("insufficient history: {seen} points seen, {required} required to form a shingle")]
    InsufficientHistory { seen: u64, required: u64 },

    #[error("forest not ready: {seen} shingles seen, output after {required}")]
    NotReady { seen: u64, required: u64 },

    #[error("no near neighbors within the requested percentile")]
    NoNeighborsFound,

    #[error("percentile must be within [0, 100], got {0}")]
    InvalidPercentile(f64),

    #[error("sample {0} not found in tree")]
    NotFound(u64),

    #[error("sample {0} already present in tree")]
    DuplicateSample(u64),

    #[error("config error: {0}")]
    Config(String),
}

impl ForestError {
    /// True for conditions the caller can recover from by feeding more data.
    pub fn is_warming_up(&self) -> bool {
        matches!(
            self,
            ForestError::InsufficientHistory { .. } | ForestError::NotReady { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ForestError>;
