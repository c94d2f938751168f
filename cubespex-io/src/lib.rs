//! cubespex-io: FITS ingestion and spectrum export for cubespex.
//!
//! Cubes and comparison images are read through `fitsio-pure`; spectra and
//! apertures are written as CSV and JSON.
//!

mod error;
mod export;
pub mod fits;
mod load;

pub use error::{Error, Result};
pub use export::{write_apertures_json, write_spectrum_csv, ApertureRecord};
pub use fits::{FitsFile, Hdu, Header, Value};
pub use load::{detect_instrument, load_cube, load_image, wcs_from_header};
