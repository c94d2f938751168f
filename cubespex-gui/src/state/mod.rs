//! Application state modules.

mod processing;
mod ui;

pub use processing::ProcessingState;
pub use ui::{CursorInfo, SpectrumTab, Tool, UiState};
