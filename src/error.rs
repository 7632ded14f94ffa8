use thiserror::Error;

// Unified error type for halo-spmv

#[derive(Error, Debug)]
pub enum SpmvError {
    #[error("file format error: {0}")]
    FileFormat(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("partition error: {0}")]
    Partition(String),
    #[error("communication error on worker {rank}: {reason}")]
    Communication { rank: usize, reason: String },
}

impl SpmvError {
    /// Shorthand for a fatal protocol failure observed by `rank`.
    pub fn comm(rank: usize, reason: impl Into<String>) -> Self {
        SpmvError::Communication { rank, reason: reason.into() }
    }

    /// True for the failures that can only surface once workers hold state.
    pub fn is_mid_run(&self) -> bool {
        matches!(self, SpmvError::Partition(_) | SpmvError::Communication { .. })
    }
}

pub type Result<T> = std::result::Result<T, SpmvError>;
