//! File loading workers.
//!
//! Each worker parses one FITS file on its own thread and sends exactly
//! one message back. Requests are numbered by a [`Generation`] counter;
//! the UI keeps only results of the newest request.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Instant;

use log::{info, warn};

use crate::message::AppMessage;

/// Monotonic request counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Generation {
    current: u64,
}

impl Generation {
    /// Start a new request, superseding every earlier one.
    pub fn next(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// Whether `generation` belongs to the newest request.
    #[must_use]
    pub fn is_current(self, generation: u64) -> bool {
        generation == self.current
    }
}

/// Load a spectral cube in a background thread.
pub fn load_cube_worker(path: &Path, tx: &Sender<AppMessage>, generation: u64) {
    let start = Instant::now();
    let message = match cubespex_io::load_cube(path) {
        Ok(cube) => {
            info!("cube {} parsed in {:?}", path.display(), start.elapsed());
            AppMessage::CubeLoaded {
                generation,
                cube: Box::new(cube),
                elapsed: start.elapsed(),
            }
        }
        Err(e) => {
            warn!("failed to load {}: {e}", path.display());
            AppMessage::CubeError {
                generation,
                error: e.to_string(),
            }
        }
    };
    // receiver gone means the app is shutting down
    let _ = tx.send(message);
}

/// Load a comparison image in a background thread.
pub fn load_image_worker(path: &Path, tx: &Sender<AppMessage>, generation: u64) {
    let message = match cubespex_io::load_image(path) {
        Ok(payload) => AppMessage::ImageLoaded {
            generation,
            payload,
        },
        Err(e) => {
            warn!("failed to load image {}: {e}", path.display());
            AppMessage::ImageError {
                generation,
                error: e.to_string(),
            }
        }
    };
    let _ = tx.send(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_generation_supersedes() {
        let mut generation = Generation::default();
        let first = generation.next();
        assert!(generation.is_current(first));
        let second = generation.next();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }

    #[test]
    fn test_missing_cube_reports_error() {
        let (tx, rx) = channel();
        load_cube_worker(Path::new("/nonexistent/cube.fits"), &tx, 7);
        match rx.recv().unwrap() {
            AppMessage::CubeError { generation, error } => {
                assert_eq!(generation, 7);
                assert!(!error.is_empty());
            }
            _ => panic!("expected a cube error"),
        }
    }

    #[test]
    fn test_missing_image_reports_error() {
        let (tx, rx) = channel();
        load_image_worker(Path::new("/nonexistent/image.fits"), &tx, 3);
        assert!(matches!(
            rx.recv().unwrap(),
            AppMessage::ImageError { generation: 3, .. }
        ));
    }
}
