use thiserror::Error;

/// Errors raised by the price prediction search
///
/// All variants are fatal for the operation that produced them. Reaching an
/// iteration cap is not an error, see `ConvergenceRecord::converged`.
#[derive(Error, Debug)]
pub enum ScppError {
    /// Malformed distribution, mismatched bin edges or mismatched dimensionality
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or inconsistent configuration, detected before any simulation work
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A computed probability left [0, 1] beyond tolerance
    #[error("Domain error: {0}")]
    Domain(String),

    /// Parameter outside its admissible range (e.g. lambda outside [1, m])
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed serialized distribution
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

pub type ScppResult<T> = Result<T, ScppError>;
