//! Aperture spectrum extraction.

use std::ops::Range;

use log::{debug, warn};
use rayon::prelude::*;

use crate::config::{Combine, ExtractionConfig};
use crate::cube::Cube;
use crate::geometry::PixelShape;
use crate::stats::{nanmedian, nansum};

/// Spatial pixels `(x, y)` covered by an aperture.
pub type Footprint = Vec<(usize, usize)>;

/// Integrated spectrum of one aperture.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spectrum {
    pub wave: Vec<f64>,
    pub flux: Vec<f64>,
    pub uflux: Option<Vec<f64>>,
    pub exposure: Option<Vec<f64>>,
    pub atran: Option<Vec<f64>>,
    pub redshift: f64,
    /// Reference wavelength.
    pub l0: f64,
    /// Number of spaxels in the footprint.
    pub n_pixels: usize,
}

/// Cube pixels whose centres lie inside `shape`, given in the cube's pixel grid.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn footprint(shape: &PixelShape, nx: usize, ny: usize) -> Footprint {
    let (min_x, max_x, min_y, max_y) = shape.bounds();
    if nx == 0 || ny == 0 || max_x < 0.0 || max_y < 0.0 {
        return Vec::new();
    }
    let x0 = min_x.floor().max(0.0) as usize;
    let y0 = min_y.floor().max(0.0) as usize;
    let x1 = (max_x.ceil().max(0.0) as usize).min(nx - 1);
    let y1 = (max_y.ceil().max(0.0) as usize).min(ny - 1);
    if x0 > x1 || y0 > y1 {
        return Vec::new();
    }
    let mut pixels = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            if shape.contains((x as f64, y as f64)) {
                pixels.push((x, y));
            }
        }
    }
    pixels
}

/// Rectangular footprint, clipped to the cube.
#[must_use]
pub fn region_footprint(x_range: Range<usize>, y_range: Range<usize>, nx: usize, ny: usize) -> Footprint {
    let xs = x_range.start.min(nx)..x_range.end.min(nx);
    let ys = y_range.start.min(ny)..y_range.end.min(ny);
    ys.flat_map(|y| xs.clone().map(move |x| (x, y))).collect()
}

/// Combine the footprint samples of one cube-shaped array per channel.
fn reduce(cube: &Cube, data: &[f64], footprint: &[(usize, usize)], combine: Combine) -> Vec<f64> {
    (0..cube.n_channels())
        .into_par_iter()
        .map(|c| {
            let samples = footprint.iter().map(|&(x, y)| data[cube.index(c, y, x)]);
            match combine {
                Combine::Sum => nansum(samples),
                Combine::Median => nanmedian(samples),
            }
        })
        .collect()
}

/// Extract the spectrum of `footprint` from `cube`.
///
/// Flux, uncorrected flux and exposure follow the same combine rule; the
/// atmospheric transmission is copied. An empty footprint yields NaN in
/// every channel.
#[must_use]
pub fn extract(cube: &Cube, footprint: &[(usize, usize)], config: &ExtractionConfig) -> Spectrum {
    if footprint.is_empty() {
        warn!("aperture covers no cube pixels, spectrum is undefined");
    }
    let combine = config.combine;
    let spectrum = Spectrum {
        wave: cube.wave().to_vec(),
        flux: reduce(cube, cube.flux(), footprint, combine),
        uflux: cube.uflux().map(|d| reduce(cube, d, footprint, combine)),
        exposure: cube.exposure().map(|d| reduce(cube, d, footprint, combine)),
        atran: cube.atran().map(<[f64]>::to_vec),
        redshift: cube.redshift,
        l0: cube.l0,
        n_pixels: footprint.len(),
    };
    debug!(
        "extracted {} channels over {} pixels",
        spectrum.flux.len(),
        spectrum.n_pixels
    );
    spectrum
}

/// Spectrum of every spaxel in a pixel box (the "All" spectrum of the zoomed region).
#[must_use]
pub fn extract_region(
    cube: &Cube,
    x_range: Range<usize>,
    y_range: Range<usize>,
    config: &ExtractionConfig,
) -> Spectrum {
    let pixels = region_footprint(x_range, y_range, cube.nx(), cube.ny());
    extract(cube, &pixels, config)
}

impl Spectrum {
    /// Recompute the channel arrays in place, keeping this spectrum's own
    /// redshift and reference wavelength.
    pub fn recompute(&mut self, cube: &Cube, footprint: &[(usize, usize)], config: &ExtractionConfig) {
        let (redshift, l0) = (self.redshift, self.l0);
        *self = extract(cube, footprint, config);
        self.redshift = redshift;
        self.l0 = l0;
    }

    /// Whether redshift or reference wavelength differ from the cube's.
    #[must_use]
    pub fn disagrees_with(&self, cube: &Cube) -> bool {
        !same(self.redshift, cube.redshift) || !same(self.l0, cube.l0)
    }

    /// Settle a redshift / reference wavelength mismatch with the cube.
    ///
    /// With `accept` the cube adopts this spectrum's values, otherwise the
    /// spectrum reverts to the cube's. Returns `true` if anything changed.
    pub fn reconcile(&mut self, cube: &mut Cube, accept: bool) -> bool {
        if !self.disagrees_with(cube) {
            return false;
        }
        if accept {
            debug!("cube adopts z={} l0={}", self.redshift, self.l0);
            cube.redshift = self.redshift;
            cube.l0 = self.l0;
        } else {
            self.redshift = cube.redshift;
            self.l0 = cube.l0;
        }
        true
    }

    /// Rest-frame wavelengths.
    #[must_use]
    pub fn rest_wave(&self) -> Vec<f64> {
        self.wave.iter().map(|w| w / (1.0 + self.redshift)).collect()
    }

    /// `true` if no channel holds a number.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        self.flux.iter().all(|v| v.is_nan())
    }
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::cube::Instrument;
    use crate::wcs::Wcs;
    use approx::assert_abs_diff_eq;

    fn cube() -> Cube {
        // 2 channels × 4 × 4, value = channel * 100 + y * 4 + x
        let mut flux = Vec::new();
        for c in 0..2 {
            for y in 0..4 {
                for x in 0..4 {
                    flux.push(f64::from(c * 100 + y * 4 + x));
                }
            }
        }
        Cube::new(
            flux.clone(),
            (2, 4, 4),
            vec![50.0, 51.0],
            Wcs::north_up((2.0, 2.0), (10.0, 20.0), 1.0),
            Instrument::FifiLs,
        )
        .unwrap()
        .with_exposure(vec![1.0; 32])
        .unwrap()
        .with_atran(vec![0.9, 0.8])
        .unwrap()
    }

    #[test]
    fn test_footprint_clips_to_grid() {
        let shape = PixelShape::Rectangle {
            center: (0.0, 0.0),
            width: 2.0,
            height: 2.0,
            angle: 0.0,
        };
        let mut fp = footprint(&shape, 4, 4);
        fp.sort_unstable();
        assert_eq!(fp, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_extract_sums_footprint() {
        let cube = cube();
        let spec = extract(&cube, &[(0, 0), (1, 0)], &ExtractionConfig::default());
        assert_eq!(spec.flux, vec![1.0, 201.0]);
        assert_eq!(spec.exposure, Some(vec![2.0, 2.0]));
        assert_eq!(spec.atran, Some(vec![0.9, 0.8]));
        assert!(spec.uflux.is_none());
        assert_eq!(spec.n_pixels, 2);
    }

    #[test]
    fn test_extract_median() {
        let cube = cube();
        let config = ExtractionConfig::default().with_combine(Combine::Median);
        let spec = extract(&cube, &[(0, 0), (1, 0), (3, 0)], &config);
        assert_eq!(spec.flux, vec![1.0, 101.0]);
    }

    #[test]
    fn test_empty_footprint_is_nan() {
        let cube = cube();
        let shape = PixelShape::Circle {
            center: (-20.0, -20.0),
            radius: 3.0,
        };
        let fp = footprint(&shape, cube.nx(), cube.ny());
        assert!(fp.is_empty());
        let spec = extract(&cube, &fp, &ExtractionConfig::default());
        assert!(spec.is_undefined());
        assert_eq!(spec.flux.len(), 2);
    }

    #[test]
    fn test_extract_region() {
        let cube = cube();
        let spec = extract_region(&cube, 0..2, 0..10, &ExtractionConfig::default());
        assert_eq!(spec.n_pixels, 8);
        // x in {0,1}, y in 0..4: sum of y*4+x = 4*(0+1) + 2*4*(0+1+2+3)
        assert_eq!(spec.flux[0], 52.0);
    }

    #[test]
    fn test_recompute_keeps_redshift() {
        let cube = cube();
        let mut spec = extract(&cube, &[(0, 0)], &ExtractionConfig::default());
        spec.redshift = 0.01;
        spec.recompute(&cube, &[(1, 0)], &ExtractionConfig::default());
        assert_eq!(spec.flux[0], 1.0);
        assert_eq!(spec.redshift, 0.01);
    }

    #[test]
    fn test_reconcile() {
        let mut cube = cube();
        let mut spec = extract(&cube, &[(0, 0)], &ExtractionConfig::default());
        assert!(!spec.reconcile(&mut cube, true));

        spec.redshift = 0.5;
        assert!(spec.reconcile(&mut cube, false));
        assert_eq!(spec.redshift, 0.0);

        spec.l0 = 157.74;
        assert!(spec.reconcile(&mut cube, true));
        assert_eq!(cube.l0, 157.74);
        assert_abs_diff_eq!(spec.rest_wave()[0], 50.0);
    }
}
