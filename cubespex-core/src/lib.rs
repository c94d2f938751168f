//! cubespex-core: Aperture, view synchronization and spectrum extraction
//! engine for spectral cubes.
//!
//! Apertures live in world coordinates. Every image view derives its own
//! pixel geometry from them, and spectra are extracted from the reference
//! view, which shares the cube's pixel grid.
//!

pub mod aperture;
pub mod config;
pub mod contour;
pub mod cube;
pub mod error;
pub mod geometry;
pub mod interactor;
pub mod roi;
pub mod session;
pub mod spectrum;
pub mod stats;
pub mod view;
pub mod viewsync;
pub mod wcs;

pub use aperture::ApertureSync;
pub use config::{Combine, ExtractionConfig, InteractorConfig, ZoomConfig};
pub use contour::ContourLine;
pub use cube::{Band, Cube, Instrument};
pub use error::{Error, Result};
pub use geometry::{PixelShape, Point};
pub use interactor::{DragMode, Interactor, InteractorEvent, InteractorState};
pub use roi::{CardValue, HeaderCard, RoiId, RoiKind, RoiStore, WorldShape};
pub use session::{Draft, DragLock, Session};
pub use spectrum::{extract, extract_region, footprint, Footprint, Spectrum};
pub use view::{ImagePayload, Limits, View};
pub use viewsync::{LevelEdit, ViewSync};
pub use wcs::{CoordinateTransform, Wcs, ARCSEC_PER_DEG};
