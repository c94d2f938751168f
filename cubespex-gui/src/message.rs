//! Application message types for async communication.
//!
//! Loader threads report back to the UI thread over a channel. Every
//! message carries the generation of the request that produced it so
//! results of superseded requests can be dropped.

use std::time::Duration;

use cubespex_core::{Cube, ImagePayload};

/// Messages sent from background workers to the UI thread.
pub enum AppMessage {
    /// Cube file parsed.
    CubeLoaded {
        generation: u64,
        cube: Box<Cube>,
        elapsed: Duration,
    },

    /// Cube loading failed.
    CubeError { generation: u64, error: String },

    /// Comparison image parsed, ready for [`cubespex_core::Session::add_view`].
    ImageLoaded {
        generation: u64,
        payload: ImagePayload,
    },

    /// Comparison image loading failed.
    ImageError { generation: u64, error: String },
}
