//! Spectrum and aperture writers.

use crate::Result;
use cubespex_core::{Cube, HeaderCard, RoiId, RoiKind, RoiStore, Spectrum, WorldShape};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One aperture as written by [`write_apertures_json`].
#[derive(Debug, Serialize)]
pub struct ApertureRecord<'a> {
    pub id: RoiId,
    pub kind: RoiKind,
    pub shape: &'a WorldShape,
    pub area_arcsec2: f64,
    pub cards: Vec<HeaderCard>,
}

/// Write a spectrum as CSV.
///
/// The file starts with `#` comment lines carrying the object, instrument,
/// redshift, reference wavelength and, for an aperture spectrum, the
/// aperture's header cards. Columns are `wavelength,flux` followed by
/// `uflux`, `exposure` and `atran` when the spectrum has them.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_spectrum_csv<P: AsRef<Path>>(
    path: P,
    cube: &Cube,
    roi: Option<&WorldShape>,
    spectrum: &Spectrum,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(&path)?);
    writeln!(writer, "# Object name: {}", cube.object)?;
    writeln!(writer, "# Instrument: {}", cube.instrument())?;
    writeln!(writer, "# z: {:.8}", spectrum.redshift)?;
    writeln!(writer, "# Ref. Wav.: {:.8}", spectrum.l0)?;
    if let Some(shape) = roi {
        for card in shape.to_header_cards() {
            writeln!(writer, "# {} = {} / {}", card.key, card.value, card.comment)?;
        }
    }
    writeln!(writer, "# Pixels: {}", spectrum.n_pixels)?;

    let extras: Vec<(&str, &[f64])> = [
        ("uflux", spectrum.uflux.as_deref()),
        ("exposure", spectrum.exposure.as_deref()),
        ("atran", spectrum.atran.as_deref()),
    ]
    .into_iter()
    .filter_map(|(name, column)| column.map(|c| (name, c)))
    .collect();

    write!(writer, "wavelength,flux")?;
    for (name, _) in &extras {
        write!(writer, ",{name}")?;
    }
    writeln!(writer)?;
    for (i, (w, f)) in spectrum.wave.iter().zip(&spectrum.flux).enumerate() {
        write!(writer, "{w},{f}")?;
        for (_, column) in &extras {
            let value = column.get(i).copied().unwrap_or(f64::NAN);
            write!(writer, ",{value}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    info!("Wrote spectrum to {}", path.as_ref().display());
    Ok(())
}

/// Write every aperture, with its area and header cards, as a JSON array.
///
/// # Errors
/// Returns an error if the file cannot be created or serialisation fails.
pub fn write_apertures_json<P: AsRef<Path>>(path: P, rois: &RoiStore) -> Result<()> {
    let records: Vec<ApertureRecord<'_>> = rois
        .iter()
        .map(|(id, shape)| ApertureRecord {
            id,
            kind: shape.kind(),
            shape,
            area_arcsec2: shape.area_arcsec2(),
            cards: shape.to_header_cards(),
        })
        .collect();
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.flush()?;
    info!(
        "Wrote {} apertures to {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubespex_core::{Instrument, Wcs};
    use tempfile::NamedTempFile;

    fn cube() -> Cube {
        let mut cube = Cube::new(
            vec![1.0; 8],
            (2, 2, 2),
            vec![157.0, 158.0],
            Wcs::north_up((0.5, 0.5), (10.0, 20.0), 1.0),
            Instrument::Pacs,
        )
        .unwrap();
        cube.object = "M82".into();
        cube
    }

    fn spectrum() -> Spectrum {
        Spectrum {
            wave: vec![157.0, 158.0],
            flux: vec![4.0, f64::NAN],
            uflux: None,
            exposure: Some(vec![8.0, 8.0]),
            atran: None,
            redshift: 0.001,
            l0: 157.74,
            n_pixels: 4,
        }
    }

    #[test]
    fn test_write_spectrum_csv() {
        let file = NamedTempFile::new().unwrap();
        let roi = WorldShape::Circle {
            center: (10.0, 20.0),
            radius: 3.0,
        };
        write_spectrum_csv(file.path(), &cube(), Some(&roi), &spectrum()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("# Object name: M82"));
        assert!(content.contains("# Instrument: PACS"));
        assert!(content.contains("# z: 0.00100000"));
        assert!(content.contains("# APERTURE = 'Circle'"));
        assert!(content.contains("# Pixels: 4"));
        let rows: Vec<&str> = content.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows, vec!["wavelength,flux,exposure", "157,4,8", "158,NaN,8"]);
    }

    #[test]
    fn test_write_all_spectrum_without_aperture() {
        let file = NamedTempFile::new().unwrap();
        write_spectrum_csv(file.path(), &cube(), None, &spectrum()).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(!content.contains("APERTURE"));
    }

    #[test]
    fn test_write_apertures_json() {
        let mut rois = RoiStore::new();
        rois.create(WorldShape::Rectangle {
            center: (10.0, 20.0),
            width: 6.0,
            height: 4.0,
            angle: 30.0,
        });
        rois.create(WorldShape::Polygon {
            vertices: vec![(10.0, 20.0), (10.001, 20.0), (10.0, 20.001)],
        });
        let file = NamedTempFile::new().unwrap();
        write_apertures_json(file.path(), &rois).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], 0);
        assert_eq!(records[0]["kind"], "Rectangle");
        assert_eq!(records[0]["shape"]["Rectangle"]["width"], 6.0);
        assert_eq!(records[1]["kind"], "Polygon");
        assert!(records[1]["area_arcsec2"].as_f64().unwrap() > 0.0);
        assert!(records[1]["cards"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["key"] == "APNVERT"));
    }
}
