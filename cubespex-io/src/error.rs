//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FITS library error.
    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),

    /// Not a FITS file, or a FITS file without the expected content.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// A required HDU or header keyword is absent.
    #[error("missing {0}")]
    Missing(String),

    /// JSON export error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] cubespex_core::Error),
}
