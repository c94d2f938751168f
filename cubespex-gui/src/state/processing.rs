//! Processing state for background loads.

/// Tracks the state of background loading.
pub struct ProcessingState {
    /// Whether a cube is currently being loaded.
    pub is_loading: bool,
    /// Whether a comparison image is currently being loaded.
    pub is_loading_image: bool,
    /// User-facing status message.
    pub status_text: String,
}

impl ProcessingState {
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_loading_image
    }
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            is_loading: false,
            is_loading_image: false,
            status_text: "Ready".to_string(),
        }
    }
}
