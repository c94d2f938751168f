//! UI state: active tool, display options and transient messages.

use std::fmt;
use std::time::{Duration, Instant};

use cubespex_core::{Point, RoiId, RoiKind};

use crate::viewer::{Colormap, Stretch};

/// How long a status-bar message stays visible.
const FLASH_TTL: Duration = Duration::from_secs(6);

/// Mouse tool for the image views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Drag pans, wheel zooms.
    #[default]
    Pan,
    /// Drag moves or reshapes apertures, right click deletes.
    Edit,
    /// Draw a new aperture.
    Draw(RoiKind),
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Pan => write!(f, "Pan"),
            Tool::Edit => write!(f, "Edit"),
            Tool::Draw(kind) => write!(f, "{kind}"),
        }
    }
}

/// Spectrum shown in the spectrum panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpectrumTab {
    #[default]
    All,
    Aperture(RoiId),
}

/// Pointer readout for the status bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorInfo {
    pub pixel: Point,
    pub world: Point,
    pub value: Option<f64>,
}

/// Transient status-bar message.
#[derive(Debug, Clone)]
pub struct Flash {
    pub text: String,
    pub is_error: bool,
    shown_at: Instant,
}

impl Flash {
    pub fn is_expired(&self) -> bool {
        self.shown_at.elapsed() > FLASH_TTL
    }
}

/// UI display state.
pub struct UiState {
    pub tool: Tool,
    pub colormap: Colormap,
    pub stretch: Stretch,
    /// Wavelength range typed into the slice controls.
    pub wmin: f64,
    pub wmax: f64,
    /// Value typed into the "add contour level" field.
    pub new_level: f64,
    pub spectrum_tab: SpectrumTab,
    pub show_uflux: bool,
    pub show_exposure: bool,
    pub show_atran: bool,
    /// Plot against rest-frame wavelength.
    pub rest_frame: bool,
    /// Aperture whose redshift / reference wavelength awaits a yes/no.
    pub reconcile: Option<RoiId>,
    pub cursor: Option<CursorInfo>,
    pub flash: Option<Flash>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            colormap: Colormap::Grayscale,
            stretch: Stretch::Linear,
            wmin: f64::NAN,
            wmax: f64::NAN,
            new_level: 0.0,
            spectrum_tab: SpectrumTab::default(),
            show_uflux: true,
            show_exposure: false,
            show_atran: false,
            rest_frame: false,
            reconcile: None,
            cursor: None,
            flash: None,
        }
    }
}

impl UiState {
    pub fn notify(&mut self, text: impl Into<String>) {
        self.flash = Some(Flash {
            text: text.into(),
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.flash = Some(Flash {
            text: text.into(),
            is_error: true,
            shown_at: Instant::now(),
        });
    }

    /// Current message, dropping it once expired.
    pub fn flash(&mut self) -> Option<&Flash> {
        if self.flash.as_ref().is_some_and(Flash::is_expired) {
            self.flash = None;
        }
        self.flash.as_ref()
    }

    /// Forget per-cube state after a new cube is opened.
    pub fn reset_for_cube(&mut self, wave: &[f64]) {
        self.wmin = wave.first().copied().unwrap_or(f64::NAN);
        self.wmax = wave.last().copied().unwrap_or(f64::NAN);
        self.spectrum_tab = SpectrumTab::All;
        self.reconcile = None;
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_messages() {
        let mut state = UiState::default();
        assert!(state.flash().is_none());
        state.error("bad file");
        let flash = state.flash().unwrap();
        assert!(flash.is_error);
        assert_eq!(flash.text, "bad file");
        state.notify("saved");
        assert!(!state.flash().unwrap().is_error);
    }

    #[test]
    fn test_reset_for_cube() {
        let mut state = UiState {
            spectrum_tab: SpectrumTab::Aperture(2),
            reconcile: Some(2),
            ..UiState::default()
        };
        state.reset_for_cube(&[157.0, 157.5, 158.0]);
        assert_eq!(state.spectrum_tab, SpectrumTab::All);
        assert!(state.reconcile.is_none());
        assert!((state.wmax - 158.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tool_labels() {
        assert_eq!(Tool::Pan.to_string(), "Pan");
        assert_eq!(Tool::Draw(RoiKind::Ellipse).to_string(), "Ellipse");
    }
}
