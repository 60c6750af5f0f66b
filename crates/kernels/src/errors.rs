use thiserror::Error;

/// A result type for correlation kernel computations
pub type Result<T> = std::result::Result<T, KernelError>;

/// An error when computing distances, correlations or PLS coefficients
#[derive(Error, Debug)]
pub enum KernelError {
    /// When two arrays do not have compatible shapes
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When a spatial derivative is requested without its auxiliary input
    #[error("Missing derivative parameter `{0}`")]
    MissingDerivativeParams(&'static str),
    /// When the requested computation is not available for a correlation kernel
    #[error("{0} are not available for {1} correlation kernel")]
    NotAvailable(&'static str, String),
    /// When PLS fails
    #[error("PLS error: {0}")]
    PlsError(#[from] linfa_pls::PlsError),
}
