//! Colormap definitions and application logic.

use std::fmt;

use crate::util::{f32_to_u8, usize_to_f32};

/// Available colormaps for the image views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Black to white.
    Grayscale,
    /// Black through red and yellow to white.
    Heat,
    /// Blue through teal and green to yellow (approximate).
    Viridis,
    /// White to black, for printing.
    Inverted,
}

impl Colormap {
    pub const ALL: [Colormap; 4] = [
        Colormap::Grayscale,
        Colormap::Heat,
        Colormap::Viridis,
        Colormap::Inverted,
    ];

    fn stops(self) -> &'static [[f32; 3]] {
        match self {
            Colormap::Grayscale => &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            Colormap::Heat => &[
                [0.0, 0.0, 0.0],
                [0.9, 0.1, 0.0],
                [1.0, 0.85, 0.0],
                [1.0, 1.0, 1.0],
            ],
            Colormap::Viridis => &[
                [0.267, 0.005, 0.329],
                [0.230, 0.322, 0.546],
                [0.128, 0.567, 0.551],
                [0.369, 0.789, 0.383],
                [0.993, 0.906, 0.144],
            ],
            Colormap::Inverted => &[[1.0, 1.0, 1.0], [0.0, 0.0, 0.0]],
        }
    }

    /// Map a normalised value in [0, 1] to opaque RGBA bytes.
    #[must_use]
    pub fn apply(self, val: f32) -> [u8; 4] {
        let stops = self.stops();
        let val = if val.is_nan() { 0.0 } else { val.clamp(0.0, 1.0) };
        let scaled = val * usize_to_f32(stops.len() - 1);
        let lower = floor_index(scaled).min(stops.len() - 2);
        let t = scaled - usize_to_f32(lower);
        let (a, b) = (stops[lower], stops[lower + 1]);
        let channel = |i: usize| f32_to_u8((a[i] + (b[i] - a[i]) * t) * 255.0);
        [channel(0), channel(1), channel(2), 255]
    }
}

/// Index of the stop at or below a non-negative position.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_index(position: f32) -> usize {
    position.floor() as usize
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Colormap::Grayscale => write!(f, "Grayscale"),
            Colormap::Heat => write!(f, "Heat"),
            Colormap::Viridis => write!(f, "Viridis"),
            Colormap::Inverted => write!(f, "Inverted"),
        }
    }
}
