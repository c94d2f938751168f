//! Spectral cube data model.
//!
//! A [`Cube`] stores flux indexed by `(channel, y, x)` together with the
//! wavelength axis, the spatial WCS and whatever parallel arrays the
//! instrument pipeline provides.
//!
//! Data is stored in row-major order: `flux[channel * ny * nx + y * nx + x]`.

use std::fmt;
use std::ops::Range;

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::stats::{nanmedian, nansum};
use crate::wcs::Wcs;

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Instrument that produced the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instrument {
    /// FIFI-LS integral field spectrometer (flux, uncorrected flux, exposure).
    FifiLs,
    /// PACS spectrometer (flux, exposure).
    Pacs,
    /// GREAT heterodyne receiver (flux only).
    Great,
    /// Any other cube with a flux plane only.
    #[default]
    Generic,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::FifiLs => write!(f, "FIFI-LS"),
            Instrument::Pacs => write!(f, "PACS"),
            Instrument::Great => write!(f, "GREAT"),
            Instrument::Generic => write!(f, "Generic"),
        }
    }
}

impl Instrument {
    /// Image bands shown for this instrument, reference band first.
    #[must_use]
    pub fn available_bands(self) -> &'static [Band] {
        match self {
            Instrument::FifiLs => &[Band::Flux, Band::UncorrectedFlux, Band::Exposure],
            Instrument::Pacs => &[Band::Flux, Band::Exposure],
            Instrument::Great => &[Band::Flux, Band::ZeroMoment],
            Instrument::Generic => &[Band::Flux],
        }
    }
}

/// A 2-D image derived from the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Band {
    /// Median flux over the selected channels.
    Flux,
    /// Median uncorrected flux over the selected channels.
    UncorrectedFlux,
    /// Summed exposure over the selected channels.
    Exposure,
    /// Continuum-subtracted integrated line map.
    ZeroMoment,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Flux => write!(f, "Flux"),
            Band::UncorrectedFlux => write!(f, "uFlux"),
            Band::Exposure => write!(f, "Exp"),
            Band::ZeroMoment => write!(f, "M0"),
        }
    }
}

/// A spectral cube.
#[derive(Debug, Clone)]
pub struct Cube {
    flux: Vec<f64>,
    uflux: Option<Vec<f64>>,
    exposure: Option<Vec<f64>>,
    atran: Option<Vec<f64>>,
    wave: Vec<f64>,
    n_channels: usize,
    ny: usize,
    nx: usize,
    wcs: Wcs,
    instrument: Instrument,
    /// Source redshift.
    pub redshift: f64,
    /// Reference (rest) wavelength of the line of interest.
    pub l0: f64,
    /// Object name from the file header.
    pub object: String,
}

impl Cube {
    /// Create a cube from a flux array of shape `(n_channels, ny, nx)`.
    ///
    /// # Errors
    /// Returns an error if any dimension is zero, if `flux` does not hold
    /// `n_channels * ny * nx` samples, or if `wave` does not hold one value
    /// per channel.
    pub fn new(
        flux: Vec<f64>,
        (n_channels, ny, nx): (usize, usize, usize),
        wave: Vec<f64>,
        wcs: Wcs,
        instrument: Instrument,
    ) -> Result<Self> {
        if n_channels == 0 || ny == 0 || nx == 0 {
            return Err(Error::EmptyCube(format!("{n_channels}×{ny}×{nx}")));
        }
        let expected = n_channels * ny * nx;
        check_len("flux", expected, flux.len())?;
        check_len("wavelength", n_channels, wave.len())?;
        Ok(Self {
            flux,
            uflux: None,
            exposure: None,
            atran: None,
            wave,
            n_channels,
            ny,
            nx,
            wcs,
            instrument,
            redshift: 0.0,
            l0: f64::NAN,
            object: String::new(),
        })
    }

    /// Attach an uncorrected-flux cube.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the array does not match the flux shape.
    pub fn with_uflux(mut self, uflux: Vec<f64>) -> Result<Self> {
        check_len("uncorrected flux", self.flux.len(), uflux.len())?;
        self.uflux = Some(uflux);
        Ok(self)
    }

    /// Attach an exposure cube.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the array does not match the flux shape.
    pub fn with_exposure(mut self, exposure: Vec<f64>) -> Result<Self> {
        check_len("exposure", self.flux.len(), exposure.len())?;
        self.exposure = Some(exposure);
        Ok(self)
    }

    /// Attach an atmospheric transmission curve (one value per channel).
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the curve is not one value per channel.
    pub fn with_atran(mut self, atran: Vec<f64>) -> Result<Self> {
        check_len("transmission", self.n_channels, atran.len())?;
        self.atran = Some(atran);
        Ok(self)
    }

    /// Number of spectral channels.
    #[must_use]
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Width in pixels (X dimension).
    #[must_use]
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Height in pixels (Y dimension).
    #[must_use]
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Wavelength of each channel.
    #[must_use]
    pub fn wave(&self) -> &[f64] {
        &self.wave
    }

    /// Spatial WCS of the cube grid.
    #[must_use]
    pub fn wcs(&self) -> &Wcs {
        &self.wcs
    }

    /// Producing instrument.
    #[must_use]
    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// Flux samples in `(channel, y, x)` order.
    #[must_use]
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    /// Uncorrected flux samples, if the instrument provides them.
    #[must_use]
    pub fn uflux(&self) -> Option<&[f64]> {
        self.uflux.as_deref()
    }

    /// Exposure samples, if the instrument provides them.
    #[must_use]
    pub fn exposure(&self) -> Option<&[f64]> {
        self.exposure.as_deref()
    }

    /// Atmospheric transmission per channel, if available.
    #[must_use]
    pub fn atran(&self) -> Option<&[f64]> {
        self.atran.as_deref()
    }

    /// Flux at a specific position.
    #[must_use]
    #[inline]
    pub fn get(&self, channel: usize, y: usize, x: usize) -> Option<f64> {
        if channel < self.n_channels && y < self.ny && x < self.nx {
            Some(self.flux[self.index(channel, y, x)])
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn index(&self, channel: usize, y: usize, x: usize) -> usize {
        channel * self.ny * self.nx + y * self.nx + x
    }

    /// Channel indices covering `[wmin, wmax]`.
    ///
    /// Both ends use left-insertion points into the (ascending) wavelength
    /// axis; the upper end is clamped to the last channel.
    #[must_use]
    pub fn channel_range(&self, wmin: f64, wmax: f64) -> Range<usize> {
        let (lo, hi) = if wmin <= wmax { (wmin, wmax) } else { (wmax, wmin) };
        let start = self.wave.partition_point(|&w| w < lo);
        let end = self
            .wave
            .partition_point(|&w| w < hi)
            .min(self.n_channels - 1);
        start..end.max(start)
    }

    /// Crop the cube spatially, keeping every parallel array consistent.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] if the clamped ranges are empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn crop(&mut self, x_range: Range<usize>, y_range: Range<usize>) -> Result<()> {
        let x0 = x_range.start.min(self.nx);
        let x1 = x_range.end.min(self.nx);
        let y0 = y_range.start.min(self.ny);
        let y1 = y_range.end.min(self.ny);
        if x1 <= x0 || y1 <= y0 {
            return Err(Error::EmptySelection(format!(
                "crop x {x0}..{x1}, y {y0}..{y1}"
            )));
        }
        let (nx, ny, nc) = (self.nx, self.ny, self.n_channels);
        let crop_one = |data: &[f64]| -> Vec<f64> {
            let mut out = Vec::with_capacity(nc * (y1 - y0) * (x1 - x0));
            for c in 0..nc {
                for y in y0..y1 {
                    let row = c * ny * nx + y * nx;
                    out.extend_from_slice(&data[row + x0..row + x1]);
                }
            }
            out
        };
        self.flux = crop_one(&self.flux);
        self.uflux = self.uflux.as_deref().map(crop_one);
        self.exposure = self.exposure.as_deref().map(crop_one);
        self.nx = x1 - x0;
        self.ny = y1 - y0;
        self.wcs = self.wcs.shifted(x0 as f64, y0 as f64);
        info!("Cropped cube to {}×{} pixels", self.nx, self.ny);
        Ok(())
    }

    /// Keep only the given channels, keeping every parallel array consistent.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] if the clamped range is empty.
    pub fn cut(&mut self, channels: Range<usize>) -> Result<()> {
        let start = channels.start.min(self.n_channels);
        let end = channels.end.min(self.n_channels);
        if end <= start {
            return Err(Error::EmptySelection(format!("channels {start}..{end}")));
        }
        let plane = self.ny * self.nx;
        let cut_one = |data: &[f64]| data[start * plane..end * plane].to_vec();
        self.flux = cut_one(&self.flux);
        self.uflux = self.uflux.as_deref().map(cut_one);
        self.exposure = self.exposure.as_deref().map(cut_one);
        self.atran = self.atran.as_deref().map(|a| a[start..end].to_vec());
        self.wave = self.wave[start..end].to_vec();
        self.n_channels = end - start;
        info!("Cut cube to {} channels", self.n_channels);
        Ok(())
    }

    /// Collapse the cube into a 2-D band image over `channels`.
    ///
    /// Flux-like bands take the median, exposure is summed, and the
    /// zero-moment map always spans the whole cube.
    ///
    /// # Errors
    /// Returns [`Error::BandUnavailable`] if the cube lacks the parallel
    /// array the band needs.
    pub fn band_image(&self, band: Band, channels: Range<usize>) -> Result<Vec<f64>> {
        let start = channels.start.min(self.n_channels);
        let end = channels.end.min(self.n_channels).max(start);
        debug!("Collapsing {band} over channels {start}..{end}");
        match band {
            Band::Flux => Ok(self.collapse(&self.flux, start..end, Collapse::Median)),
            Band::UncorrectedFlux => {
                let data = self
                    .uflux
                    .as_deref()
                    .ok_or_else(|| Error::BandUnavailable(band.to_string()))?;
                Ok(self.collapse(data, start..end, Collapse::Median))
            }
            Band::Exposure => {
                let data = self
                    .exposure
                    .as_deref()
                    .ok_or_else(|| Error::BandUnavailable(band.to_string()))?;
                Ok(self.collapse(data, start..end, Collapse::Sum))
            }
            Band::ZeroMoment => Ok(self.zero_moment()),
        }
    }

    fn collapse(&self, data: &[f64], channels: Range<usize>, how: Collapse) -> Vec<f64> {
        let plane = self.ny * self.nx;
        (0..plane)
            .into_par_iter()
            .map(|pixel| {
                let samples = channels.clone().map(|c| data[c * plane + pixel]);
                match how {
                    Collapse::Median => nanmedian(samples),
                    Collapse::Sum => nansum(samples),
                }
            })
            .collect()
    }

    /// Zero-moment map in W/m² (Jy·Hz·1e-26).
    ///
    /// Each spaxel's spectrum is continuum subtracted with its median,
    /// converted from Jy to Jy·Hz/µm and integrated over wavelength.
    #[must_use]
    pub fn zero_moment(&self) -> Vec<f64> {
        let dw = channel_widths(&self.wave);
        let plane = self.ny * self.nx;
        (0..plane)
            .into_par_iter()
            .map(|pixel| {
                let spectrum: Vec<f64> = (0..self.n_channels)
                    .map(|c| self.flux[c * plane + pixel])
                    .collect();
                let continuum = nanmedian(spectrum.iter().copied());
                let integrated = nansum(spectrum.iter().zip(&self.wave).zip(&dw).map(
                    |((s, w), d)| SPEED_OF_LIGHT * (s - continuum) / (w * w) * 1.0e6 * d,
                ));
                if integrated.is_nan() {
                    0.0
                } else {
                    integrated * 1.0e-26
                }
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Collapse {
    Median,
    Sum,
}

fn check_len(name: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            name,
            expected,
            found,
        })
    }
}

/// Width of each wavelength channel (centred differences, one-sided at the ends).
fn channel_widths(wave: &[f64]) -> Vec<f64> {
    let n = wave.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            if i == 0 {
                wave[1] - wave[0]
            } else if i == n - 1 {
                wave[n - 1] - wave[n - 2]
            } else {
                (wave[i + 1] - wave[i - 1]) * 0.5
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp, clippy::cast_precision_loss)]
    use super::*;

    fn ramp_cube(nc: usize, ny: usize, nx: usize) -> Cube {
        let flux = (0..nc * ny * nx).map(|i| i as f64).collect();
        let wave = (0..nc).map(|c| 100.0 + c as f64).collect();
        Cube::new(
            flux,
            (nc, ny, nx),
            wave,
            Wcs::north_up((0.0, 0.0), (10.0, 20.0), 1.0),
            Instrument::Generic,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = Cube::new(
            vec![0.0; 5],
            (2, 2, 2),
            vec![1.0, 2.0],
            Wcs::north_up((0.0, 0.0), (0.0, 0.0), 1.0),
            Instrument::Generic,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { name: "flux", .. }));
    }

    #[test]
    fn test_parallel_array_mismatch_rejected() {
        let cube = ramp_cube(2, 2, 2);
        assert!(cube.clone().with_exposure(vec![1.0; 3]).is_err());
        assert!(cube.with_atran(vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_get() {
        let cube = ramp_cube(3, 4, 5);
        assert_eq!(cube.get(1, 2, 3), Some((20 + 2 * 5 + 3) as f64));
        assert_eq!(cube.get(3, 0, 0), None);
    }

    #[test]
    fn test_crop_keeps_parallel_arrays() {
        let cube = ramp_cube(2, 4, 4);
        let exposure = cube.flux().iter().map(|v| v * 10.0).collect();
        let mut cube = cube.with_exposure(exposure).unwrap();
        let before = cube.get(1, 2, 3).unwrap();
        cube.crop(1..4, 2..4).unwrap();
        assert_eq!(cube.nx(), 3);
        assert_eq!(cube.ny(), 2);
        assert_eq!(cube.flux().len(), 2 * 2 * 3);
        assert_eq!(cube.exposure().unwrap().len(), cube.flux().len());
        assert_eq!(cube.get(1, 0, 2), Some(before));
        assert_eq!(cube.exposure().unwrap()[cube.index(1, 0, 2)], before * 10.0);
        assert_eq!(cube.wcs().crpix, (-1.0, -2.0));
    }

    #[test]
    fn test_crop_empty_selection() {
        let mut cube = ramp_cube(2, 4, 4);
        assert!(cube.crop(3..3, 0..4).is_err());
        assert_eq!(cube.nx(), 4);
    }

    #[test]
    fn test_cut() {
        let mut cube = ramp_cube(5, 2, 2).with_atran(vec![0.5; 5]).unwrap();
        cube.cut(1..3).unwrap();
        assert_eq!(cube.n_channels(), 2);
        assert_eq!(cube.wave(), &[101.0, 102.0]);
        assert_eq!(cube.atran().unwrap().len(), 2);
        assert_eq!(cube.get(0, 0, 0), Some(4.0));
    }

    #[test]
    fn test_channel_range() {
        let cube = ramp_cube(10, 1, 1);
        assert_eq!(cube.channel_range(102.5, 105.0), 3..5);
        assert_eq!(cube.channel_range(105.0, 102.5), 3..5);
        assert_eq!(cube.channel_range(50.0, 500.0), 0..9);
    }

    #[test]
    fn test_band_images() {
        let cube = ramp_cube(3, 1, 2);
        let flux = cube.band_image(Band::Flux, 0..3).unwrap();
        assert_eq!(flux, vec![2.0, 3.0]);
        assert!(matches!(
            cube.band_image(Band::Exposure, 0..3),
            Err(Error::BandUnavailable(_))
        ));
        let cube = cube.with_exposure(vec![1.0; 6]).unwrap();
        assert_eq!(cube.band_image(Band::Exposure, 0..2).unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_zero_moment_flat_spectrum_is_zero() {
        let cube = Cube::new(
            vec![3.0; 4 * 2],
            (4, 1, 2),
            vec![100.0, 101.0, 102.0, 103.0],
            Wcs::north_up((0.0, 0.0), (0.0, 0.0), 1.0),
            Instrument::Great,
        )
        .unwrap();
        assert_eq!(cube.zero_moment(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_zero_moment_line_is_positive() {
        let mut flux = vec![1.0; 5];
        flux[2] = 11.0;
        let cube = Cube::new(
            flux,
            (5, 1, 1),
            vec![100.0, 101.0, 102.0, 103.0, 104.0],
            Wcs::north_up((0.0, 0.0), (0.0, 0.0), 1.0),
            Instrument::Great,
        )
        .unwrap();
        let m0 = cube.zero_moment()[0];
        let expected = SPEED_OF_LIGHT * 10.0 / (102.0 * 102.0) * 1.0e6 * 1.0e-26;
        assert!((m0 - expected).abs() < expected * 1e-12);
    }

    #[test]
    fn test_instrument_bands() {
        assert_eq!(Instrument::FifiLs.available_bands()[0], Band::Flux);
        assert_eq!(Instrument::Great.available_bands(), &[Band::Flux, Band::ZeroMoment]);
    }
}
