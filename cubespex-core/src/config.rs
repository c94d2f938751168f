//! Tunables for interaction, extraction and zoom.

/// Thresholds for the interactor mode decision.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InteractorConfig {
    /// Normalised radius beyond which a click counts as "on the border" (default: 0.6).
    pub border_tolerance: f64,
    /// Half-width in degrees of the window around a local axis (default: 30).
    pub cardinal_window: f64,
    /// Factor by which one drag component must dominate to pick a resize axis (default: 1.2).
    pub axis_dominance: f64,
    /// Smallest allowed extent in pixels (default: 1).
    pub min_size: f64,
    /// Handle pick radius in pixels (default: 3).
    pub pick_radius: f64,
}

impl Default for InteractorConfig {
    fn default() -> Self {
        Self {
            border_tolerance: 0.6,
            cardinal_window: 30.0,
            axis_dominance: 1.2,
            min_size: 1.0,
            pick_radius: 3.0,
        }
    }
}

impl InteractorConfig {
    /// Set the handle pick radius.
    #[must_use]
    pub fn with_pick_radius(mut self, radius: f64) -> Self {
        self.pick_radius = radius;
        self
    }

    /// Set the minimum shape extent.
    #[must_use]
    pub fn with_min_size(mut self, size: f64) -> Self {
        self.min_size = size;
        self
    }
}

/// How footprint samples are combined per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Combine {
    #[default]
    Sum,
    Median,
}

/// Spectrum extraction options.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractionConfig {
    pub combine: Combine,
}

impl ExtractionConfig {
    /// Set the combine rule.
    #[must_use]
    pub fn with_combine(mut self, combine: Combine) -> Self {
        self.combine = combine;
        self
    }
}

/// Mouse-wheel zoom factors applied to the axis half-widths.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZoomConfig {
    pub zoom_in: f64,
    pub zoom_out: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            zoom_in: 0.9,
            zoom_out: 1.1,
        }
    }
}

impl ZoomConfig {
    /// Factor for one wheel step; positive steps zoom in.
    #[must_use]
    pub fn factor(&self, step: f64) -> f64 {
        if step > 0.0 {
            self.zoom_in
        } else {
            self.zoom_out
        }
    }
}
