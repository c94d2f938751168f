//! Pixel ↔ world coordinate transforms.
//!
//! Every image view is bound to one [`CoordinateTransform`]. World
//! coordinates are `(lon, lat)` in degrees and are the authoritative frame
//! for aperture geometry; pixel coordinates are 0-based `(x, y)` and are
//! always derived.

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Conversion between a view's pixel grid and world coordinates.
pub trait CoordinateTransform: Send + Sync {
    /// Convert a pixel position to `(lon, lat)` in degrees.
    fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64);

    /// Convert `(lon, lat)` in degrees to a pixel position.
    fn world_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Linear pixel scale in arcsec/pixel.
    fn pixel_scale(&self) -> f64;

    /// Vectorised [`pixel_to_world`](Self::pixel_to_world).
    fn pixels_to_world(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points
            .iter()
            .map(|&(x, y)| self.pixel_to_world(x, y))
            .collect()
    }

    /// Vectorised [`world_to_pixel`](Self::world_to_pixel).
    fn worlds_to_pixel(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points
            .iter()
            .map(|&(lon, lat)| self.world_to_pixel(lon, lat))
            .collect()
    }
}

/// Gnomonic (TAN) world coordinate system with a CD matrix.
///
/// 1. Pixel to intermediate: `(xi, eta) = CD × (x - CRPIX1, y - CRPIX2)`
/// 2. Intermediate to sky: de-project from the tangent plane at CRVAL.
///
/// `crpix` is 0-based (FITS CRPIX minus one).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wcs {
    /// Reference pixel (0-based).
    pub crpix: (f64, f64),
    /// Reference world position in degrees.
    pub crval: (f64, f64),
    /// `[[CD1_1, CD1_2], [CD2_1, CD2_2]]` in degrees/pixel.
    pub cd: [[f64; 2]; 2],
}

impl Wcs {
    /// Create a WCS from its reference point and CD matrix.
    #[must_use]
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: [[f64; 2]; 2]) -> Self {
        Self { crpix, crval, cd }
    }

    /// Build a WCS from CDELT (degrees/pixel) and a CROTA2 rotation in degrees.
    #[must_use]
    pub fn from_cdelt(crpix: (f64, f64), crval: (f64, f64), cdelt: (f64, f64), crota: f64) -> Self {
        let (s, c) = crota.to_radians().sin_cos();
        let cd = [
            [cdelt.0 * c, -cdelt.1 * s],
            [cdelt.0 * s, cdelt.1 * c],
        ];
        Self { crpix, crval, cd }
    }

    /// North-up, east-left WCS with a square pixel scale in arcsec/pixel.
    #[must_use]
    pub fn north_up(crpix: (f64, f64), crval: (f64, f64), scale_arcsec: f64) -> Self {
        let d = scale_arcsec / ARCSEC_PER_DEG;
        Self::from_cdelt(crpix, crval, (-d, d), 0.0)
    }

    /// The same sky mapping for an image whose origin moved by `(dx, dy)` pixels.
    ///
    /// Used when a cube is cropped: pixel `(dx, dy)` of the old grid becomes
    /// pixel `(0, 0)` of the new one.
    #[must_use]
    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        Self {
            crpix: (self.crpix.0 - dx, self.crpix.1 - dy),
            ..self.clone()
        }
    }

    fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }
}

impl CoordinateTransform for Wcs {
    fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.crpix.0;
        let dy = y - self.crpix.1;
        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

        let ra0 = self.crval.0.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;
        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2(xi.hypot(denom));

        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    fn world_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (sin_dec, cos_dec) = lat.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (lon - self.crval.0).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let det = self.determinant();
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;
        (self.crpix.0 + dx, self.crpix.1 + dy)
    }

    fn pixel_scale(&self) -> f64 {
        self.determinant().abs().sqrt() * ARCSEC_PER_DEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let wcs = Wcs::north_up((50.0, 40.0), (10.0, 20.0), 1.0);
        let (lon, lat) = wcs.pixel_to_world(50.0, 40.0);
        assert_abs_diff_eq!(lon, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lat, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let wcs = Wcs::from_cdelt((32.0, 32.0), (150.1, 2.2), (-2.0e-4, 2.0e-4), 17.0);
        for &(x, y) in &[(0.0, 0.0), (12.5, 60.0), (63.0, 1.0)] {
            let (lon, lat) = wcs.pixel_to_world(x, y);
            let (px, py) = wcs.world_to_pixel(lon, lat);
            assert_abs_diff_eq!(px, x, epsilon = 1e-7);
            assert_abs_diff_eq!(py, y, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_pixel_scale() {
        let wcs = Wcs::north_up((0.0, 0.0), (0.0, 0.0), 0.5);
        assert_abs_diff_eq!(wcs.pixel_scale(), 0.5, epsilon = 1e-12);
        let rotated = Wcs::from_cdelt((0.0, 0.0), (0.0, 0.0), (-1.0e-3, 1.0e-3), 33.0);
        assert_abs_diff_eq!(rotated.pixel_scale(), 3.6, epsilon = 1e-9);
    }

    #[test]
    fn test_east_is_left() {
        let wcs = Wcs::north_up((10.0, 10.0), (180.0, 0.0), 1.0);
        let (lon_right, _) = wcs.pixel_to_world(11.0, 10.0);
        assert!(lon_right < 180.0);
    }

    #[test]
    fn test_shifted_preserves_sky() {
        let wcs = Wcs::north_up((20.0, 20.0), (45.0, -30.0), 2.0);
        let cropped = wcs.shifted(5.0, 7.0);
        let a = wcs.pixel_to_world(9.0, 11.0);
        let b = cropped.pixel_to_world(4.0, 4.0);
        assert_abs_diff_eq!(a.0, b.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.1, b.1, epsilon = 1e-12);
    }

    #[test]
    fn test_vectorised_matches_scalar() {
        let wcs = Wcs::north_up((3.0, 3.0), (1.0, 1.0), 1.5);
        let pts = [(0.0, 0.0), (1.0, 2.0)];
        let world = wcs.pixels_to_world(&pts);
        assert_eq!(world[1], wcs.pixel_to_world(1.0, 2.0));
        let back = wcs.worlds_to_pixel(&world);
        assert_abs_diff_eq!(back[1].1, 2.0, epsilon = 1e-9);
    }
}
