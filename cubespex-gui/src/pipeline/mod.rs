//! Background loading of cubes and comparison images.

mod loader;

pub use loader::{load_cube_worker, load_image_worker, Generation};
