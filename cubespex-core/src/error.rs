//! Error types for cubespex-core.

use thiserror::Error;

use crate::roi::{RoiId, RoiKind};

/// Result type alias for cubespex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for cubespex operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A parallel array does not match the cube shape.
    #[error("shape mismatch for {name}: expected {expected} samples, found {found}")]
    ShapeMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    /// The cube has no spatial or spectral extent.
    #[error("empty cube: {0}")]
    EmptyCube(String),

    /// No ROI with the given id.
    #[error("unknown aperture {0}")]
    UnknownRoi(RoiId),

    /// No view with the given index.
    #[error("unknown view {0}")]
    UnknownView(usize),

    /// An update tried to change the kind of an existing ROI.
    #[error("aperture {id} is a {expected}, cannot be updated with a {found}")]
    KindMismatch {
        id: RoiId,
        expected: RoiKind,
        found: RoiKind,
    },

    /// A polygon gesture finished with too few vertices.
    #[error("polygon needs at least {min} vertices, got {found}")]
    TooFewVertices { min: usize, found: usize },

    /// A drawing gesture produced a shape below the minimum size.
    #[error("shape too small: {0:.2} px")]
    ShapeTooSmall(f64),

    /// Crop or cut range selects nothing.
    #[error("empty selection: {0}")]
    EmptySelection(String),

    /// No contour level at the given position.
    #[error("unknown contour level {0}")]
    UnknownLevel(usize),

    /// Band not provided by the cube's instrument.
    #[error("band {0} not available for this cube")]
    BandUnavailable(String),
}
