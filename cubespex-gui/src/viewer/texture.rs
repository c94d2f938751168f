//! Texture generation for the image views.

use std::fmt;

use egui::{Color32, ColorImage};

use crate::util::{f64_to_f32, usize_to_f64};
use crate::viewer::Colormap;

/// Lower and upper clip percentiles.
const CLIP: (f64, f64) = (0.005, 0.995);

/// Intensity stretch applied after clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stretch {
    Linear,
    Sqrt,
    Log,
}

impl Stretch {
    pub const ALL: [Stretch; 3] = [Stretch::Linear, Stretch::Sqrt, Stretch::Log];

    fn apply(self, t: f64) -> f64 {
        match self {
            Stretch::Linear => t,
            Stretch::Sqrt => t.sqrt(),
            Stretch::Log => (1000.0 * t).ln_1p() / 1000_f64.ln_1p(),
        }
    }
}

impl fmt::Display for Stretch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stretch::Linear => write!(f, "Linear"),
            Stretch::Sqrt => write!(f, "Sqrt"),
            Stretch::Log => write!(f, "Log"),
        }
    }
}

/// Clip range of an image: the 0.5 and 99.5 percentiles of its finite
/// pixels. `None` if no pixel is finite.
#[must_use]
pub fn display_range(image: &[f64]) -> Option<(f64, f64)> {
    let mut finite: Vec<f64> = image.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let lo = finite[percentile_index(finite.len(), CLIP.0)];
    let hi = finite[percentile_index(finite.len(), CLIP.1)];
    Some(if hi > lo { (lo, hi) } else { (lo, lo + 1.0) })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentile_index(len: usize, quantile: f64) -> usize {
    (usize_to_f64(len - 1) * quantile).round() as usize
}

/// Render a row-major image whose row 0 is the bottom row, so that it
/// appears with y pointing up. Non-finite pixels are black.
#[must_use]
pub fn image_to_color(
    image: &[f64],
    nx: usize,
    ny: usize,
    colormap: Colormap,
    stretch: Stretch,
) -> ColorImage {
    if nx == 0 || ny == 0 {
        return ColorImage::new([1, 1], Color32::BLACK);
    }
    let range = display_range(image);
    let mut pixels = vec![0u8; nx * ny * 4];
    for (row, chunk) in pixels.chunks_exact_mut(nx * 4).enumerate() {
        let y = ny - 1 - row;
        for (x, rgba) in chunk.chunks_exact_mut(4).enumerate() {
            let value = image.get(y * nx + x).copied().unwrap_or(f64::NAN);
            let color = match range {
                Some((lo, hi)) if value.is_finite() => {
                    let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
                    colormap.apply(f64_to_f32(stretch.apply(t)))
                }
                _ => [0, 0, 0, 255],
            };
            rgba.copy_from_slice(&color);
        }
    }
    ColorImage::from_rgba_unmultiplied([nx, ny], &pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_range_ignores_nan() {
        assert_eq!(display_range(&[f64::NAN, 3.0, 1.0, 2.0]), Some((1.0, 3.0)));
        assert_eq!(display_range(&[f64::NAN]), None);
        // flat images still get a usable range
        assert_eq!(display_range(&[4.0, 4.0]), Some((4.0, 5.0)));
    }

    #[test]
    fn test_image_is_flipped_and_nan_is_black() {
        // bottom row [0, 1], top row [2, NaN]
        let image = [0.0, 1.0, 2.0, f64::NAN];
        let color = image_to_color(&image, 2, 2, Colormap::Grayscale, Stretch::Linear);
        assert_eq!(color.size, [2, 2]);
        assert_eq!(color.pixels[0], Color32::WHITE);
        assert_eq!(color.pixels[1], Color32::BLACK);
        assert_eq!(color.pixels[2], Color32::BLACK);
        assert_eq!(color.pixels[3], Color32::from_gray(128));
    }

    #[test]
    fn test_stretch_keeps_endpoints() {
        for stretch in Stretch::ALL {
            assert!(stretch.apply(0.0).abs() < 1e-12);
            assert!((stretch.apply(1.0) - 1.0).abs() < 1e-12);
        }
    }
}
