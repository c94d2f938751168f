//! Image rendering and plot overlays.

mod colormap;
pub mod overlay;
mod texture;

pub use colormap::Colormap;
pub use texture::{image_to_color, Stretch};
