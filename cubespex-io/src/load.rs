//! Cube and comparison-image loading.
//!
//! Instrument layouts:
//! - FIFI-LS: named `FLUX`, `UNCORRECTED_FLUX`, `EXPOSURE_MAP`, `WAVELENGTH`
//!   and `TRANSMISSION` extensions.
//! - PACS: flux in the `image` extension (or the primary HDU), wavelengths in
//!   a `WAVELENGTH` image or the `wavelen` column of `wcs-tab`, exposure in
//!   `coverage`.
//! - GREAT and anything else: a 3-axis image whose third axis is described
//!   by `CRVAL3`/`CDELT3`/`CRPIX3`.

use crate::fits::{FitsFile, Hdu, Header};
use crate::{Error, Result};
use cubespex_core::cube::SPEED_OF_LIGHT;
use cubespex_core::{Cube, ImagePayload, Instrument, Wcs};
use log::{debug, info, warn};
use std::path::Path;

/// Instrument named by the primary header's `INSTRUME` keyword.
#[must_use]
pub fn detect_instrument(fits: &FitsFile) -> Instrument {
    let name = fits
        .primary()
        .header
        .text("INSTRUME")
        .unwrap_or_default()
        .to_ascii_uppercase();
    if name.contains("FIFI") {
        Instrument::FifiLs
    } else if name.contains("PACS") {
        Instrument::Pacs
    } else if name.contains("GREAT") {
        Instrument::Great
    } else {
        Instrument::Generic
    }
}

/// Celestial WCS from `CRPIX`/`CRVAL` plus either a CD matrix, a PC matrix
/// with `CDELT`, or `CDELT` with `CROTA2`. `CRPIX` is converted to 0-based.
///
/// # Errors
/// Returns [`Error::Missing`] if a reference keyword or the pixel scale is absent.
pub fn wcs_from_header(header: &Header) -> Result<Wcs> {
    let num = |key: &str| {
        header
            .number(key)
            .ok_or_else(|| Error::Missing(format!("WCS keyword {key}")))
    };
    let crpix = (num("CRPIX1")? - 1.0, num("CRPIX2")? - 1.0);
    let crval = (num("CRVAL1")?, num("CRVAL2")?);
    let opt = |key: &str, default: f64| header.number(key).unwrap_or(default);

    if header.contains("CD1_1") || header.contains("CD2_2") {
        let cd = [
            [opt("CD1_1", 0.0), opt("CD1_2", 0.0)],
            [opt("CD2_1", 0.0), opt("CD2_2", 0.0)],
        ];
        return Ok(Wcs::new(crpix, crval, cd));
    }
    let cdelt = (num("CDELT1")?, num("CDELT2")?);
    if header.contains("PC1_1") {
        let cd = [
            [cdelt.0 * opt("PC1_1", 1.0), cdelt.0 * opt("PC1_2", 0.0)],
            [cdelt.1 * opt("PC2_1", 0.0), cdelt.1 * opt("PC2_2", 1.0)],
        ];
        return Ok(Wcs::new(crpix, crval, cd));
    }
    Ok(Wcs::from_cdelt(crpix, crval, cdelt, opt("CROTA2", 0.0)))
}

/// `(n_channels, ny, nx)` of a cube HDU; trailing degenerate axes are allowed.
fn cube_shape(hdu: &Hdu) -> Result<(usize, usize, usize)> {
    match hdu.axes() {
        [nx, ny, nc, rest @ ..] if rest.iter().all(|&n| n == 1) => Ok((*nc, *ny, *nx)),
        other => Err(Error::InvalidFormat(format!(
            "expected a 3-axis cube, found axes {other:?}"
        ))),
    }
}

/// Multiplier from a spectral `CUNIT3` to microns, for wavelength units.
fn wavelength_factor(unit: &str) -> Option<f64> {
    Some(match unit.trim() {
        "" | "um" | "micron" | "microns" => 1.0,
        "m" => 1e6,
        "cm" => 1e4,
        "mm" => 1e3,
        "nm" => 1e-3,
        "Angstrom" | "angstrom" | "A" => 1e-4,
        _ => return None,
    })
}

/// Wavelengths in microns along axis 3.
///
/// Frequency axes (Hz, MHz, GHz) are converted through `c / ν`; velocity
/// axes need `RESTFRQ` and use the radio convention.
#[allow(clippy::cast_precision_loss)]
fn spectral_axis(header: &Header, n_channels: usize) -> Result<Vec<f64>> {
    let crval = header
        .number("CRVAL3")
        .ok_or_else(|| Error::Missing("spectral keyword CRVAL3".into()))?;
    let cdelt = header
        .number("CDELT3")
        .or_else(|| header.number("CD3_3"))
        .ok_or_else(|| Error::Missing("spectral keyword CDELT3".into()))?;
    let crpix = header.number("CRPIX3").unwrap_or(1.0);
    let ctype = header.text("CTYPE3").unwrap_or_default().to_ascii_uppercase();
    let unit = header.text("CUNIT3").unwrap_or_default();

    let raw = (0..n_channels).map(|k| crval + (k as f64 + 1.0 - crpix) * cdelt);

    if ctype.starts_with("FREQ") || unit.ends_with("Hz") {
        let scale = match unit {
            "GHz" => 1e9,
            "MHz" => 1e6,
            "kHz" => 1e3,
            _ => 1.0,
        };
        return Ok(raw.map(|f| SPEED_OF_LIGHT / (f * scale) * 1e6).collect());
    }
    if ctype.starts_with("VELO") || ctype.starts_with("VRAD") {
        let rest = header
            .number("RESTFRQ")
            .or_else(|| header.number("RESTFREQ"))
            .ok_or_else(|| Error::Missing("RESTFRQ for a velocity axis".into()))?;
        let scale = if unit == "km/s" { 1e3 } else { 1.0 };
        let l0 = SPEED_OF_LIGHT / rest * 1e6;
        return Ok(raw.map(|v| l0 / (1.0 - v * scale / SPEED_OF_LIGHT)).collect());
    }
    let factor = wavelength_factor(unit)
        .ok_or_else(|| Error::InvalidFormat(format!("unsupported spectral unit {unit}")))?;
    Ok(raw.map(|w| w * factor).collect())
}

/// Rest wavelength of the target line in microns, if the header has one.
fn rest_wavelength(header: &Header, instrument: Instrument) -> Option<f64> {
    match instrument {
        Instrument::FifiLs => {
            let blue = header
                .text("CHANNEL")
                .is_some_and(|c| c.eq_ignore_ascii_case("BLUE"));
            header.number(if blue { "G_WAVE_B" } else { "G_WAVE_R" })
        }
        Instrument::Great => header
            .number("RESTFRQ")
            .or_else(|| header.number("RESTFREQ"))
            .map(|f| SPEED_OF_LIGHT / f * 1e6),
        Instrument::Pacs | Instrument::Generic => header.number("RESTWAV").map(|w| w * 1e6),
    }
}

fn wcs_with_fallback(fits: &FitsFile, hdu: &Hdu) -> Result<Wcs> {
    wcs_from_header(&hdu.header).or_else(|_| wcs_from_header(&fits.primary().header))
}

fn read_fifi(fits: &FitsFile) -> Result<Cube> {
    let flux = fits.require("FLUX")?;
    let shape = cube_shape(flux)?;
    let wave = fits.image(fits.require("WAVELENGTH")?)?;
    let wcs = wcs_with_fallback(fits, flux)?;
    let mut cube = Cube::new(fits.image(flux)?, shape, wave, wcs, Instrument::FifiLs)?;
    if let Some(hdu) = fits.hdu("UNCORRECTED_FLUX") {
        cube = cube.with_uflux(fits.image(hdu)?)?;
    }
    if let Some(hdu) = fits.hdu("EXPOSURE_MAP") {
        cube = cube.with_exposure(fits.image(hdu)?)?;
    }
    if let Some(hdu) = fits.hdu("TRANSMISSION") {
        cube = cube.with_atran(fits.image(hdu)?)?;
    }
    Ok(cube)
}

fn read_pacs(fits: &FitsFile) -> Result<Cube> {
    let flux = match fits.hdu("image") {
        Some(hdu) => hdu,
        None if fits.primary().has_image() => fits.primary(),
        None => return Err(Error::Missing("PACS image extension".into())),
    };
    let shape = cube_shape(flux)?;
    let wave = if let Some(hdu) = fits.hdu("WAVELENGTH") {
        fits.image(hdu)?
    } else {
        fits.column(fits.require("wcs-tab")?, "wavelen")?
    };
    let wcs = wcs_with_fallback(fits, flux)?;
    let mut cube = Cube::new(fits.image(flux)?, shape, wave, wcs, Instrument::Pacs)?;
    if let Some(hdu) = fits.hdu("coverage") {
        cube = cube.with_exposure(fits.image(hdu)?)?;
    }
    Ok(cube)
}

fn read_axis_cube(fits: &FitsFile, instrument: Instrument) -> Result<Cube> {
    let hdu = fits
        .hdus()
        .iter()
        .find(|h| h.has_image() && h.axes().len() >= 3)
        .ok_or_else(|| Error::InvalidFormat("no 3-axis image HDU".into()))?;
    let shape = cube_shape(hdu)?;
    let mut wave = spectral_axis(&hdu.header, shape.0)?;
    let mut flux = fits.image(hdu)?;
    if wave.first() > wave.last() {
        debug!("spectral axis is descending, reversing channels");
        wave.reverse();
        reverse_planes(&mut flux, shape.1 * shape.2);
    }
    let wcs = wcs_with_fallback(fits, hdu)?;
    Cube::new(flux, shape, wave, wcs, instrument).map_err(Error::from)
}

fn reverse_planes(data: &mut [f64], plane: usize) {
    let n = data.len() / plane;
    for k in 0..n / 2 {
        let (head, tail) = data.split_at_mut((n - 1 - k) * plane);
        head[k * plane..(k + 1) * plane].swap_with_slice(&mut tail[..plane]);
    }
}

/// Load a spectral cube, choosing the layout from `INSTRUME`.
///
/// # Errors
/// Returns an error if the file is not FITS, a required extension or
/// keyword is missing, or array shapes disagree.
pub fn load_cube<P: AsRef<Path>>(path: P) -> Result<Cube> {
    let fits = FitsFile::open(&path)?;
    let instrument = detect_instrument(&fits);
    let mut cube = match instrument {
        Instrument::FifiLs => read_fifi(&fits)?,
        Instrument::Pacs => read_pacs(&fits)?,
        Instrument::Great | Instrument::Generic => read_axis_cube(&fits, instrument)?,
    };

    let header = &fits.primary().header;
    cube.object = header
        .text("OBJECT")
        .or_else(|| header.text("OBJ_NAME"))
        .unwrap_or_default()
        .to_string();
    if let Some(z) = header.number("REDSHIFT") {
        cube.redshift = z;
    }
    match rest_wavelength(header, instrument) {
        Some(l0) => cube.l0 = l0,
        None => warn!("{}: no reference wavelength in header", path.as_ref().display()),
    }

    info!(
        "Loaded {} cube '{}' ({}×{}×{}) from {}",
        instrument,
        cube.object,
        cube.n_channels(),
        cube.ny(),
        cube.nx(),
        path.as_ref().display()
    );
    Ok(cube)
}

/// Load a 2-D comparison image with its WCS. Extra axes keep the first plane.
///
/// # Errors
/// Returns an error if the file holds no image with at least two axes or no
/// celestial WCS.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ImagePayload> {
    let fits = FitsFile::open(&path)?;
    let hdu = fits
        .hdus()
        .iter()
        .find(|h| h.has_image() && h.axes().len() >= 2)
        .ok_or_else(|| Error::InvalidFormat("no 2-D image HDU".into()))?;
    let axes = hdu.axes();
    let (nx, ny) = (axes[0], axes[1]);
    let mut image = fits.image(hdu)?;
    image.truncate(nx * ny);
    let wcs = wcs_from_header(&hdu.header)?;
    let name = path
        .as_ref()
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    info!("Loaded image '{name}' ({nx}×{ny})");
    Ok(ImagePayload {
        name,
        image,
        nx,
        ny,
        wcs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::testing::{write, Card, TestHdu};
    use approx::assert_abs_diff_eq;
    use cubespex_core::CoordinateTransform;
    use tempfile::tempdir;

    fn primary(instrument: &'static str) -> Vec<(&'static str, Card)> {
        vec![
            ("INSTRUME", Card::Text(instrument)),
            ("OBJECT", Card::Text("NGC 253")),
            ("REDSHIFT", Card::Float(0.000_8)),
        ]
    }

    fn celestial(hdu: TestHdu) -> TestHdu {
        hdu.with("CRPIX1", Card::Float(2.0))
            .with("CRPIX2", Card::Float(1.0))
            .with("CRVAL1", Card::Float(11.888))
            .with("CRVAL2", Card::Float(-25.288))
            .with("CDELT1", Card::Float(-1.0 / 3600.0))
            .with("CDELT2", Card::Float(1.0 / 3600.0))
    }

    fn celestial_header() -> Header {
        Header::default()
            .with("CRPIX1", 2.0)
            .with("CRPIX2", 1.0)
            .with("CRVAL1", 11.888)
            .with("CRVAL2", -25.288)
    }

    #[test]
    fn test_wcs_from_cdelt_crota() {
        assert!(matches!(
            wcs_from_header(&Header::default()),
            Err(Error::Missing(_))
        ));
        assert!(matches!(
            wcs_from_header(&celestial_header()),
            Err(Error::Missing(_))
        ));

        let header = celestial_header()
            .with("CDELT1", -1.0 / 3600.0)
            .with("CDELT2", 1.0 / 3600.0)
            .with("CROTA2", 30.0);
        let wcs = wcs_from_header(&header).unwrap();
        assert_eq!(wcs.crpix, (1.0, 0.0));
        assert_abs_diff_eq!(wcs.pixel_scale(), 1.0, epsilon = 1e-9);
        let expected = Wcs::from_cdelt(
            (1.0, 0.0),
            (11.888, -25.288),
            (-1.0 / 3600.0, 1.0 / 3600.0),
            30.0,
        );
        assert_abs_diff_eq!(wcs.cd[0][1], expected.cd[0][1], epsilon = 1e-15);
    }

    #[test]
    fn test_wcs_from_cd_and_pc() {
        let cd = celestial_header()
            .with("CD1_1", -2.0 / 3600.0)
            .with("CD2_2", 2.0 / 3600.0);
        let wcs = wcs_from_header(&cd).unwrap();
        assert_abs_diff_eq!(wcs.cd[0][0], -2.0 / 3600.0);
        assert_abs_diff_eq!(wcs.cd[0][1], 0.0);
        assert_abs_diff_eq!(wcs.pixel_scale(), 2.0, epsilon = 1e-9);

        let pc = celestial_header()
            .with("CDELT1", -1.0 / 3600.0)
            .with("CDELT2", 1.0 / 3600.0)
            .with("PC1_1", 0.0)
            .with("PC1_2", 1.0)
            .with("PC2_1", 1.0)
            .with("PC2_2", 0.0);
        let wcs = wcs_from_header(&pc).unwrap();
        assert_abs_diff_eq!(wcs.cd[0][1], -1.0 / 3600.0);
        assert_abs_diff_eq!(wcs.cd[1][0], 1.0 / 3600.0);
        assert_abs_diff_eq!(wcs.cd[0][0], 0.0);
    }

    #[test]
    fn test_velocity_axis_needs_rest_frequency() {
        let header = Header::default()
            .with("CTYPE3", "VRAD")
            .with("CUNIT3", "km/s")
            .with("CRVAL3", 0.0)
            .with("CDELT3", 10.0);
        assert!(matches!(spectral_axis(&header, 2), Err(Error::Missing(_))));

        let header = header.with("RESTFRQ", 1.900_536_9e12);
        let wave = spectral_axis(&header, 2).unwrap();
        let l0 = SPEED_OF_LIGHT / 1.900_536_9e12 * 1e6;
        assert_abs_diff_eq!(wave[0], l0, epsilon = 1e-12);
        assert!(wave[1] > wave[0]);
    }

    #[test]
    fn test_unknown_spectral_unit() {
        let header = Header::default()
            .with("CRVAL3", 1.0)
            .with("CDELT3", 1.0)
            .with("CUNIT3", "furlong");
        assert!(matches!(
            spectral_axis(&header, 3),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_generic_cube_with_metre_axis() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        let flux: Vec<f64> = (0..12).map(f64::from).collect();
        let hdu = celestial(TestHdu::image("CUBE", &[2, 2, 3], &flux))
            .with("CRVAL3", Card::Float(1.5e-4))
            .with("CDELT3", Card::Float(1e-7))
            .with("CRPIX3", Card::Float(1.0))
            .with("CUNIT3", Card::Text("m"));
        write(&path, &[("OBJECT", Card::Text("M82"))], &[hdu]);

        let cube = load_cube(&path).unwrap();
        assert_eq!(cube.instrument(), Instrument::Generic);
        assert_eq!((cube.n_channels(), cube.ny(), cube.nx()), (3, 2, 2));
        assert_abs_diff_eq!(cube.wave()[0], 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cube.wave()[2], 150.2, epsilon = 1e-9);
        assert_eq!(cube.get(1, 1, 0), Some(6.0));
        assert_eq!(cube.object, "M82");
        assert!(cube.l0.is_nan());
    }

    #[test]
    fn test_descending_frequency_axis_is_reversed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("great.fits");
        // one pixel, three channels at 1900, 1901, 1902 GHz
        let hdu = celestial(TestHdu::image("CUBE", &[1, 1, 3], &[1.0, 2.0, 3.0]))
            .with("CTYPE3", Card::Text("FREQ"))
            .with("CUNIT3", Card::Text("GHz"))
            .with("CRVAL3", Card::Float(1900.0))
            .with("CDELT3", Card::Float(1.0));
        write(
            &path,
            &[
                ("INSTRUME", Card::Text("GREAT")),
                ("RESTFRQ", Card::Float(1.900_536_9e12)),
            ],
            &[hdu],
        );

        let cube = load_cube(&path).unwrap();
        assert_eq!(cube.instrument(), Instrument::Great);
        assert!(cube.wave()[0] < cube.wave()[2]);
        assert_abs_diff_eq!(cube.wave()[2], SPEED_OF_LIGHT / 1.9e12 * 1e6, epsilon = 1e-9);
        assert_eq!(cube.flux(), &[3.0, 2.0, 1.0]);
        assert_abs_diff_eq!(cube.l0, 157.740_9, epsilon = 1e-3);
    }

    #[test]
    fn test_load_fifi_extensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fifi.fits");
        let flux: Vec<f64> = (0..8).map(f64::from).collect();
        let mut keys = primary("FIFI-LS");
        keys.push(("CHANNEL", Card::Text("RED")));
        keys.push(("G_WAVE_R", Card::Float(157.74)));
        write(
            &path,
            &keys,
            &[
                celestial(TestHdu::image("FLUX", &[2, 2, 2], &flux)),
                TestHdu::image("UNCORRECTED_FLUX", &[2, 2, 2], &flux),
                TestHdu::image("EXPOSURE_MAP", &[2, 2, 2], &[4.0; 8]),
                TestHdu::image("WAVELENGTH", &[2], &[157.0, 158.0]),
                TestHdu::image("TRANSMISSION", &[2], &[0.9, 0.8]),
            ],
        );

        let cube = load_cube(&path).unwrap();
        assert_eq!(cube.instrument(), Instrument::FifiLs);
        assert_eq!(cube.wave(), &[157.0, 158.0]);
        assert_eq!(cube.uflux().map(<[f64]>::len), Some(8));
        assert_eq!(cube.exposure().map(|e| e[0]), Some(4.0));
        assert_eq!(cube.atran(), Some(&[0.9, 0.8][..]));
        assert_eq!(cube.object, "NGC 253");
        assert_abs_diff_eq!(cube.redshift, 0.000_8);
        assert_abs_diff_eq!(cube.l0, 157.74);
    }

    #[test]
    fn test_load_pacs_with_wavelength_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pacs.fits");
        write(
            &path,
            &primary("PACS"),
            &[
                celestial(TestHdu::image("image", &[2, 1, 3], &[1.0; 6])),
                TestHdu::image("coverage", &[2, 1, 3], &[2.0; 6]),
                TestHdu::image("WAVELENGTH", &[3], &[63.1, 63.2, 63.3]),
            ],
        );
        let cube = load_cube(&path).unwrap();
        assert_eq!(cube.instrument(), Instrument::Pacs);
        assert_eq!(cube.wave(), &[63.1, 63.2, 63.3]);
        assert_eq!(cube.exposure().map(<[f64]>::len), Some(6));
        assert!(cube.uflux().is_none());
    }

    #[test]
    fn test_fifi_without_wavelength_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.fits");
        write(
            &path,
            &primary("FIFI-LS"),
            &[celestial(TestHdu::image("FLUX", &[2, 2, 2], &[0.0; 8]))],
        );
        assert!(matches!(load_cube(&path), Err(Error::Missing(_))));
    }

    #[test]
    fn test_image_is_not_a_cube() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flat.fits");
        write(
            &path,
            &[],
            &[celestial(TestHdu::image("IMAGE", &[2, 2], &[0.0; 4]))],
        );
        assert!(matches!(load_cube(&path), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_load_image_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("herschel_70um.fits");
        let pixels: Vec<f64> = (0..6).map(f64::from).collect();
        write(
            &path,
            &[],
            &[celestial(TestHdu::image("IMAGE", &[3, 2], &pixels))],
        );

        let payload = load_image(&path).unwrap();
        assert_eq!(payload.name, "herschel_70um");
        assert_eq!((payload.nx, payload.ny), (3, 2));
        assert_eq!(payload.image, pixels);
        let (lon, lat) = payload.wcs.pixel_to_world(1.0, 0.0);
        assert_abs_diff_eq!(lon, 11.888, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, -25.288, epsilon = 1e-9);
    }

    #[test]
    fn test_reverse_planes() {
        let mut data = vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0];
        reverse_planes(&mut data, 2);
        assert_eq!(data, vec![3.0, 3.0, 2.0, 2.0, 1.0, 1.0]);
    }
}
