//! FITS access through `fitsio-pure`.
//!
//! Opening a file indexes every HDU and snapshots the header keywords cube
//! loading reads (extension name, axes, celestial and spectral WCS, target
//! metadata). Pixel and column data are read on demand.
//!

use crate::{Error, Result};
use fitsio::compat::fitsfile::FitsFile as RawFits;
use fitsio::compat::hdu::FitsHdu;
use fitsio::compat::images::ReadImage;
use fitsio::compat::tables::ReadsCol;
use log::debug;
use std::path::{Path, PathBuf};

/// Text keywords kept in the header snapshot.
const TEXT_KEYS: &[&str] = &[
    "EXTNAME", "XTENSION", "INSTRUME", "OBJECT", "OBJ_NAME", "CHANNEL", "CTYPE3", "CUNIT3",
];

/// Numeric keywords kept in the header snapshot.
const NUMBER_KEYS: &[&str] = &[
    "NAXIS", "REDSHIFT", "G_WAVE_B", "G_WAVE_R", "RESTFRQ", "RESTFREQ", "RESTWAV", "CRPIX1",
    "CRPIX2", "CRPIX3", "CRVAL1", "CRVAL2", "CRVAL3", "CDELT1", "CDELT2", "CDELT3", "CD1_1",
    "CD1_2", "CD2_1", "CD2_2", "CD3_3", "PC1_1", "PC1_2", "PC2_1", "PC2_2", "CROTA2",
];

/// Header keyword value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Snapshot of the keywords cube loading uses, in read order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, Value)>,
}

impl Header {
    /// Add or replace a keyword.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key.to_string(), value)),
        }
        self
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Non-empty text value, trailing blanks removed.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Value::Text(s) => Some(s.trim_end()).filter(|s| !s.is_empty()),
            Value::Number(_) => None,
        }
    }

    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Integer keywords come back as `i64`; everything else numeric as `f64`.
#[allow(clippy::cast_precision_loss)]
fn read_number(raw: &RawFits, hdu: &FitsHdu, key: &str) -> Option<f64> {
    hdu.read_key::<f64>(raw, key)
        .ok()
        .or_else(|| hdu.read_key::<i64>(raw, key).ok().map(|v| v as f64))
}

fn snapshot(raw: &RawFits, hdu: &FitsHdu) -> Header {
    let mut header = Header::default();
    for &key in TEXT_KEYS {
        if let Ok(text) = hdu.read_key::<String>(raw, key) {
            header = header.with(key, Value::Text(text));
        }
    }
    for &key in NUMBER_KEYS {
        if let Some(v) = read_number(raw, hdu, key) {
            header = header.with(key, v);
        }
    }
    header
}

fn read_axes(raw: &RawFits, hdu: &FitsHdu) -> Vec<usize> {
    let naxis = hdu.read_key::<i64>(raw, "NAXIS").unwrap_or(0);
    (1..=naxis)
        .map_while(|n| {
            let len = hdu.read_key::<i64>(raw, &format!("NAXIS{n}")).ok()?;
            usize::try_from(len).ok()
        })
        .collect()
}

/// One header/data unit.
#[derive(Debug, Clone)]
pub struct Hdu {
    pub header: Header,
    index: usize,
    axes: Vec<usize>,
}

impl Hdu {
    /// `EXTNAME`, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.header.text("EXTNAME")
    }

    /// Position in the file, 0 for the primary HDU.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// `NAXISn` values, fastest axis first.
    #[must_use]
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// Whether the HDU is an image holding data.
    #[must_use]
    pub fn has_image(&self) -> bool {
        let is_image = self.header.text("XTENSION").map_or(true, |x| x == "IMAGE");
        is_image && !self.axes.is_empty() && self.axes.iter().all(|&n| n > 0)
    }

    fn is_table(&self) -> bool {
        self.header.text("XTENSION") == Some("BINTABLE")
    }
}

/// An open FITS file with its HDUs indexed.
pub struct FitsFile {
    raw: RawFits,
    path: PathBuf,
    hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Open a file and index its HDUs.
    ///
    /// # Errors
    /// Returns [`Error::Fits`] if the file cannot be opened or is not FITS.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = RawFits::open(&path)?;
        let mut hdus = Vec::new();
        let mut index = 0;
        while let Ok(hdu) = raw.hdu(index) {
            hdus.push(Hdu {
                header: snapshot(&raw, &hdu),
                index,
                axes: read_axes(&raw, &hdu),
            });
            index += 1;
        }
        if hdus.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "{}: no HDUs",
                path.as_ref().display()
            )));
        }
        debug!("{}: {} HDUs", path.as_ref().display(), hdus.len());
        Ok(Self {
            raw,
            path: path.as_ref().to_path_buf(),
            hdus,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    /// The primary HDU (always present after a successful open).
    #[must_use]
    pub fn primary(&self) -> &Hdu {
        &self.hdus[0]
    }

    /// Extension by `EXTNAME`, case-insensitive.
    #[must_use]
    pub fn hdu(&self, name: &str) -> Option<&Hdu> {
        self.hdus
            .iter()
            .find(|h| h.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Extension that must be present.
    ///
    /// # Errors
    /// Returns [`Error::Missing`] if no HDU has that `EXTNAME`.
    pub fn require(&self, name: &str) -> Result<&Hdu> {
        self.hdu(name)
            .ok_or_else(|| Error::Missing(format!("extension {name} in {}", self.path.display())))
    }

    /// Image pixels as physical values, in file order.
    ///
    /// # Errors
    /// Returns an error for an HDU without image data or a failed read.
    pub fn image(&self, hdu: &Hdu) -> Result<Vec<f64>> {
        if !hdu.has_image() {
            return Err(Error::InvalidFormat(format!(
                "HDU {} has no image data",
                hdu.name().unwrap_or("PRIMARY")
            )));
        }
        let raw = self.raw.hdu(hdu.index)?;
        Ok(f64::read_image(&self.raw, &raw)?)
    }

    /// All values of a numeric binary-table column, row by row.
    ///
    /// # Errors
    /// Returns an error if the HDU is not a binary table or the column
    /// cannot be read.
    pub fn column(&self, hdu: &Hdu, name: &str) -> Result<Vec<f64>> {
        if !hdu.is_table() {
            return Err(Error::InvalidFormat(format!(
                "HDU {} is not a binary table",
                hdu.name().unwrap_or("PRIMARY")
            )));
        }
        let raw = self.raw.hdu(hdu.index)?;
        Ok(f64::read_col(&self.raw, &raw, name)?)
    }
}

/// Fixture writer for tests. Images always go into named extensions; the
/// primary HDU only carries keywords.
#[cfg(test)]
pub(crate) mod testing {
    use super::RawFits;
    use fitsio::compat::hdu::FitsHdu;
    use fitsio::compat::images::{ImageDescription, ImageType, WriteImage};
    use std::path::Path;

    pub enum Card {
        Int(i64),
        Float(f64),
        Text(&'static str),
    }

    impl Card {
        fn write(&self, fptr: &mut RawFits, hdu: &FitsHdu, key: &str) {
            match self {
                Self::Int(v) => hdu.write_key(fptr, key, v).unwrap(),
                Self::Float(v) => hdu.write_key(fptr, key, v).unwrap(),
                Self::Text(v) => hdu.write_key(fptr, key, &(*v).to_string()).unwrap(),
            }
        }
    }

    pub struct TestHdu {
        name: &'static str,
        axes: Vec<usize>,
        pixels: Vec<f64>,
        cards: Vec<(&'static str, Card)>,
    }

    impl TestHdu {
        /// Double-precision image extension; `axes` is fastest first.
        pub fn image(name: &'static str, axes: &[usize], pixels: &[f64]) -> Self {
            assert_eq!(axes.iter().product::<usize>(), pixels.len());
            Self {
                name,
                axes: axes.to_vec(),
                pixels: pixels.to_vec(),
                cards: Vec::new(),
            }
        }

        pub fn with(mut self, key: &'static str, value: Card) -> Self {
            self.cards.push((key, value));
            self
        }
    }

    /// Write `primary` keywords and the extensions, overwriting `path`.
    pub fn write(path: &Path, primary: &[(&'static str, Card)], extensions: &[TestHdu]) {
        let mut fptr = RawFits::create(path).overwrite().open().unwrap();
        let head = fptr.hdu(0).unwrap();
        for (key, card) in primary {
            card.write(&mut fptr, &head, key);
        }
        for ext in extensions {
            let description = ImageDescription {
                data_type: ImageType::Double,
                dimensions: ext.axes.clone(),
            };
            let name = ext.name.to_string();
            let hdu = fptr.create_image(&name, &description).unwrap();
            f64::write_image(&mut fptr, &hdu, &ext.pixels).unwrap();
            hdu.write_key(&mut fptr, "EXTNAME", &name).unwrap();
            for (key, card) in &ext.cards {
                card.write(&mut fptr, &hdu, key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{write, Card, TestHdu};
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_header_lookup() {
        let header = Header::default()
            .with("CDELT1", 1.5e-3)
            .with("OBJECT", "   ")
            .with("CTYPE3", "WAVE    ")
            .with("CDELT1", 2.0e-3);
        assert_eq!(header.len(), 3);
        assert_eq!(header.number("CDELT1"), Some(2.0e-3));
        assert_eq!(header.text("CTYPE3"), Some("WAVE"));
        assert_eq!(header.text("OBJECT"), None);
        assert!(header.contains("OBJECT"));
        assert_eq!(header.number("CTYPE3"), None);
        assert!(!header.contains("NAXIS3"));
    }

    #[test]
    fn test_open_indexes_extensions() {
        let file = NamedTempFile::new().unwrap();
        write(
            file.path(),
            &[("INSTRUME", Card::Text("FIFI-LS")), ("REDSHIFT", Card::Float(0.01))],
            &[
                TestHdu::image("FLUX", &[3, 2], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
                    .with("CRPIX1", Card::Int(2)),
                TestHdu::image("WAVELENGTH", &[4], &[50.0, 51.0, 52.0, 53.0]),
            ],
        );
        let fits = FitsFile::open(file.path()).unwrap();
        assert_eq!(fits.hdus().len(), 3);
        assert_eq!(fits.primary().header.text("INSTRUME"), Some("FIFI-LS"));
        assert_eq!(fits.primary().header.number("REDSHIFT"), Some(0.01));
        assert!(!fits.primary().has_image());

        let flux = fits.require("flux").unwrap();
        assert_eq!(flux.index(), 1);
        assert_eq!(flux.axes(), &[3, 2]);
        assert_eq!(flux.header.number("CRPIX1"), Some(2.0));
        assert_eq!(fits.image(flux).unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let wave = fits.image(fits.require("WAVELENGTH").unwrap()).unwrap();
        assert_eq!(wave, vec![50.0, 51.0, 52.0, 53.0]);
        assert!(fits.hdu("EXPOSURE_MAP").is_none());
        assert!(matches!(fits.require("EXPOSURE_MAP"), Err(Error::Missing(_))));
    }

    #[test]
    fn test_reads_need_the_right_hdu_kind() {
        let file = NamedTempFile::new().unwrap();
        write(file.path(), &[], &[TestHdu::image("IMAGE", &[2], &[1.0, 2.0])]);
        let fits = FitsFile::open(file.path()).unwrap();
        assert!(matches!(
            fits.image(fits.primary()),
            Err(Error::InvalidFormat(_))
        ));
        let image = fits.require("IMAGE").unwrap();
        assert!(matches!(
            fits.column(image, "wavelen"),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_not_fits() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![b'x'; 2880]).unwrap();
        assert!(FitsFile::open(file.path()).is_err());
    }
}
