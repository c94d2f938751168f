//! cubespex CLI: inspect spectral cubes and extract aperture spectra.
//!
//! This binary exposes the extraction engine without the GUI.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};

use cubespex_core::stats::{finite_max, finite_mean_std, nanmedian};
use cubespex_core::viewsync::default_levels;
use cubespex_core::{
    contour, Combine, CoordinateTransform, ExtractionConfig, InteractorConfig, Session,
    WorldShape, ZoomConfig,
};
use cubespex_io::{load_cube, write_apertures_json, write_spectrum_csv};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    CubespexIo(#[from] cubespex_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] cubespex_core::Error),

    #[error("{0}")]
    Usage(String),
}

/// Aperture shape selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    Square,
    Rectangle,
    Circle,
    Ellipse,
    Polygon,
}

/// Spaxel combination.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CombineArg {
    /// NaN-ignoring sum (flux)
    Sum,
    /// NaN-ignoring median
    Median,
}

impl From<CombineArg> for Combine {
    fn from(arg: CombineArg) -> Self {
        match arg {
            CombineArg::Sum => Combine::Sum,
            CombineArg::Median => Combine::Median,
        }
    }
}

/// Spectral cube explorer.
#[derive(Parser)]
#[command(name = "cubespex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a cube
    Info {
        /// Input FITS cube
        input: PathBuf,
    },

    /// Extract the spectrum of one aperture (or of the whole cube)
    Extract {
        /// Input FITS cube
        input: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Aperture shape; omit to extract the whole field
        #[arg(short, long, value_enum)]
        shape: Option<Shape>,

        /// Aperture centre in degrees
        #[arg(long, num_args = 2, value_names = ["LON", "LAT"], allow_negative_numbers = true)]
        center: Option<Vec<f64>>,

        /// Square side (arcsec)
        #[arg(long)]
        size: Option<f64>,

        /// Rectangle/ellipse width (arcsec)
        #[arg(long)]
        width: Option<f64>,

        /// Rectangle/ellipse height (arcsec)
        #[arg(long)]
        height: Option<f64>,

        /// Circle radius (arcsec)
        #[arg(long)]
        radius: Option<f64>,

        /// Rotation of the shape's x-axis from east towards north (degrees)
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        angle: f64,

        /// Polygon vertex as LON,LAT in degrees (repeat for each vertex)
        #[arg(long = "vertex", value_parser = parse_pair, allow_negative_numbers = true)]
        vertices: Vec<(f64, f64)>,

        /// How spaxels are combined
        #[arg(short, long, value_enum, default_value = "sum")]
        combine: CombineArg,

        /// Keep only channels between these wavelengths (microns)
        #[arg(long, num_args = 2, value_names = ["WMIN", "WMAX"])]
        cut: Option<Vec<f64>>,

        /// Also write the aperture as JSON
        #[arg(long)]
        apertures: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Summarise the band images over a wavelength range
    Slice {
        /// Input FITS cube
        input: PathBuf,

        /// Lower wavelength (microns)
        #[arg(long)]
        wmin: f64,

        /// Upper wavelength (microns)
        #[arg(long)]
        wmax: f64,

        /// Trace default contour levels on the flux image
        #[arg(long)]
        contours: bool,
    },
}

fn parse_pair(s: &str) -> std::result::Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LON,LAT, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad coordinate '{v}': {e}"))
    };
    Ok((parse(a)?, parse(b)?))
}

/// Arguments describing an aperture in world units.
struct ApertureArgs {
    shape: Shape,
    center: Option<Vec<f64>>,
    size: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    radius: Option<f64>,
    angle: f64,
    vertices: Vec<(f64, f64)>,
}

impl ApertureArgs {
    fn into_world(self) -> Result<WorldShape> {
        let need = |value: Option<f64>, name: &str| {
            value.ok_or_else(|| CliError::Usage(format!("--{name} is required for {:?}", self.shape)))
        };
        let center = || match self.center.as_deref() {
            Some(&[lon, lat]) => Ok((lon, lat)),
            _ => Err(CliError::Usage("--center LON LAT is required".into())),
        };
        let angle = self.angle;
        Ok(match self.shape {
            Shape::Square => WorldShape::Square {
                center: center()?,
                size: need(self.size, "size")?,
                angle,
            },
            Shape::Rectangle => WorldShape::Rectangle {
                center: center()?,
                width: need(self.width, "width")?,
                height: need(self.height, "height")?,
                angle,
            },
            Shape::Circle => WorldShape::Circle {
                center: center()?,
                radius: need(self.radius, "radius")?,
            },
            Shape::Ellipse => WorldShape::Ellipse {
                center: center()?,
                width: need(self.width, "width")?,
                height: need(self.height, "height")?,
                angle,
            },
            Shape::Polygon => {
                if self.vertices.len() < 3 {
                    return Err(CliError::Usage(format!(
                        "a polygon needs at least 3 --vertex values, got {}",
                        self.vertices.len()
                    )));
                }
                WorldShape::Polygon {
                    vertices: self.vertices.clone(),
                }
            }
        })
    }
}

fn summarise(name: &str, image: &[f64]) {
    let finite = image.iter().filter(|v| v.is_finite()).count();
    match (finite_mean_std(image), finite_max(image)) {
        (Some((mean, std)), Some(max)) => println!(
            "{:<6} | {:>8} | {:>12.4e} | {:>12.4e} | {:>12.4e} | {:>12.4e}",
            name,
            finite,
            mean,
            std,
            nanmedian(image.iter().copied()),
            max
        ),
        _ => println!("{:<6} | {:>8} | no finite pixels", name, finite),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let cube = load_cube(&input)?;
            let wave = cube.wave();
            println!("File: {}", input.display());
            println!("Object: {}", cube.object);
            println!("Instrument: {}", cube.instrument());
            println!(
                "Shape: {} channels × {} × {} pixels",
                cube.n_channels(),
                cube.ny(),
                cube.nx()
            );
            if let (Some(first), Some(last)) = (wave.first(), wave.last()) {
                println!("Wavelength: {:.5} - {:.5} um", first, last);
            }
            println!("Pixel scale: {:.3} arcsec", cube.wcs().pixel_scale());
            let (lon, lat) = cube
                .wcs()
                .pixel_to_world((cube.nx() as f64 - 1.0) / 2.0, (cube.ny() as f64 - 1.0) / 2.0);
            println!("Centre: {:.6} {:+.6} deg", lon, lat);
            println!("Redshift: {}", cube.redshift);
            println!("Ref. wavelength: {} um", cube.l0);
            let bands: Vec<String> = cube
                .instrument()
                .available_bands()
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("Bands: {}", bands.join(", "));
        }

        Commands::Extract {
            input,
            output,
            shape,
            center,
            size,
            width,
            height,
            radius,
            angle,
            vertices,
            combine,
            cut,
            apertures,
            verbose,
        } => {
            let start = Instant::now();
            let extraction = ExtractionConfig::default().with_combine(combine.into());
            let mut session = Session::with_config(
                load_cube(&input)?,
                extraction,
                InteractorConfig::default(),
                ZoomConfig::default(),
            )?;
            if let Some(&[wmin, wmax]) = cut.as_deref() {
                session.cut(wmin, wmax)?;
                if verbose {
                    eprintln!(
                        "Cut to {} channels between {} and {} um",
                        session.cube().n_channels(),
                        wmin,
                        wmax
                    );
                }
            }

            let roi = match shape {
                Some(shape) => {
                    let world = ApertureArgs {
                        shape,
                        center,
                        size,
                        width,
                        height,
                        radius,
                        angle,
                        vertices,
                    }
                    .into_world()?;
                    let id = session.create_aperture(world);
                    Some(id)
                }
                None => None,
            };

            let (shape, spectrum) = match roi {
                Some(id) => (
                    Some(session.apertures().rois().get(id)?),
                    session.apertures().spectrum(id)?,
                ),
                None => (None, session.all_spectrum()),
            };
            if spectrum.is_undefined() {
                eprintln!("Warning: the aperture covers no valid spaxels; spectrum is NaN");
            }
            write_spectrum_csv(&output, session.cube(), shape, spectrum)?;
            if let Some(path) = apertures {
                write_apertures_json(&path, session.apertures().rois())?;
                if verbose {
                    eprintln!("Apertures written to: {}", path.display());
                }
            }

            println!(
                "Extracted {} channels over {} spaxels in {:.2}s",
                spectrum.flux.len(),
                spectrum.n_pixels,
                start.elapsed().as_secs_f64()
            );
            println!("Output: {}", output.display());
        }

        Commands::Slice {
            input,
            wmin,
            wmax,
            contours,
        } => {
            let mut session = Session::new(load_cube(&input)?)?;
            let channels = session.slice(wmin, wmax)?;
            let wave = session.cube().wave();
            println!(
                "Channels {}..{} ({:.5} - {:.5} um)",
                channels.start,
                channels.end,
                wave[channels.start],
                wave[channels.end.saturating_sub(1).max(channels.start)]
            );
            println!(
                "{:<6} | {:>8} | {:>12} | {:>12} | {:>12} | {:>12}",
                "Band", "Pixels", "Mean", "Std", "Median", "Max"
            );
            println!("{:-<76}", "");
            for view in session.views() {
                summarise(&view.name, view.image());
            }

            if contours {
                let flux = &session.views()[0];
                let levels = default_levels(flux.image());
                let lines = contour::trace(flux.image(), flux.nx(), flux.ny(), &levels);
                println!("Contour levels: {:?}", levels);
                for level in &levels {
                    let n = lines.iter().filter(|l| l.level == *level).count();
                    println!("  {:>12.4e}: {} paths", level, n);
                }
            }
        }
    }

    Ok(())
}
