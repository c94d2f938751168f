//! Bottom panel with the "All" spectrum and one tab per aperture.

use anyhow::Context as _;
use cubespex_core::stats::finite_max;
use cubespex_core::{RoiId, Session, Spectrum};
use eframe::egui::{self, Align2, Color32};
use egui_plot::{Legend, Line, LineStyle, Plot, PlotPoints, PlotUi, VLine};

use crate::app::CubespexApp;
use crate::state::{SpectrumTab, UiState};
use crate::viewer::overlay::palette_color;

const UFLUX_COLOR: Color32 = Color32::from_rgb(0xf5, 0x9e, 0x0b);
const EXPOSURE_COLOR: Color32 = Color32::from_rgb(0x84, 0xcc, 0x16);
const ATRAN_COLOR: Color32 = Color32::from_rgb(0x8b, 0x5c, 0xff);

/// Edits made in the panel, applied after drawing.
#[derive(Default)]
struct PanelEdits {
    tab: Option<SpectrumTab>,
    frame: Option<(RoiId, f64, f64)>,
    frame_done: bool,
    disagrees: bool,
}

impl CubespexApp {
    pub(crate) fn render_spectrum_panel(&mut self, ctx: &egui::Context) {
        let mut edits = PanelEdits::default();
        egui::TopBottomPanel::bottom("spectrum_panel")
            .resizable(true)
            .default_height(280.0)
            .show(ctx, |ui| {
                let Some(session) = self.session.as_ref() else {
                    ui.label("No cube open");
                    return;
                };
                if let SpectrumTab::Aperture(id) = self.ui_state.spectrum_tab {
                    if id >= session.apertures().len() {
                        self.ui_state.spectrum_tab = SpectrumTab::All;
                    }
                }
                render_tabs(ui, session, &mut self.ui_state, &mut edits);
                render_spectrum(ui, session, &self.ui_state, &mut edits);
            });
        self.apply_panel_edits(edits);
    }

    fn apply_panel_edits(&mut self, edits: PanelEdits) {
        if let Some(tab) = edits.tab {
            self.ui_state.spectrum_tab = tab;
            if let SpectrumTab::Aperture(id) = tab {
                let result = self
                    .session_mut()
                    .and_then(|s| s.select_aperture(id).context("cannot select aperture"));
                self.report(result);
            }
        }
        let mut disagrees = edits.disagrees;
        let mut roi = None;
        if let Some((id, redshift, l0)) = edits.frame {
            roi = Some(id);
            let result = self
                .session_mut()
                .and_then(|s| s.set_spectrum_frame(id, redshift, l0).context("cannot set redshift"));
            disagrees = self.report(result).unwrap_or(false);
        }
        if edits.frame_done && disagrees {
            if let SpectrumTab::Aperture(id) = self.ui_state.spectrum_tab {
                self.ui_state.reconcile = Some(roi.unwrap_or(id));
            }
        }
    }

    /// Yes/no prompt after an aperture's redshift or reference wavelength
    /// diverged from the cube's.
    pub(crate) fn render_reconcile_window(&mut self, ctx: &egui::Context) {
        let Some(roi) = self.ui_state.reconcile else {
            return;
        };
        let mut answer = None;
        egui::Window::new("Redshift / reference wavelength")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!(
                    "Aperture {roi} now differs from the cube.\nAdopt its redshift and reference wavelength for the cube?"
                ));
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("No").clicked() {
                        answer = Some(false);
                    }
                });
            });
        let Some(accept) = answer else {
            return;
        };
        self.ui_state.reconcile = None;
        let result = self
            .session_mut()
            .and_then(|s| s.reconcile_spectrum(roi, accept).context("cannot reconcile"));
        if self.report(result) == Some(true) && accept {
            self.ui_state.notify("Cube redshift updated");
        }
    }
}

fn render_tabs(ui: &mut egui::Ui, session: &Session, state: &mut UiState, edits: &mut PanelEdits) {
    ui.horizontal(|ui| {
        let current = state.spectrum_tab;
        if ui.selectable_label(current == SpectrumTab::All, "All").clicked() {
            edits.tab = Some(SpectrumTab::All);
        }
        for (id, shape) in session.apertures().rois().iter() {
            let tab = SpectrumTab::Aperture(id);
            let label = egui::RichText::new(format!("{} {id}", shape.kind())).color(palette_color(id));
            if ui.selectable_label(current == tab, label).clicked() {
                edits.tab = Some(tab);
            }
        }
        ui.separator();
        ui.checkbox(&mut state.show_uflux, "uFlux");
        ui.checkbox(&mut state.show_exposure, "Exposure");
        ui.checkbox(&mut state.show_atran, "ATRAN");
        ui.checkbox(&mut state.rest_frame, "Rest frame");
    });
}

fn render_spectrum(ui: &mut egui::Ui, session: &Session, state: &UiState, edits: &mut PanelEdits) {
    let tab = state.spectrum_tab;
    let (spectrum, color) = match tab {
        SpectrumTab::All => (session.all_spectrum(), Color32::LIGHT_GRAY),
        SpectrumTab::Aperture(id) => match session.apertures().spectrum(id) {
            Ok(spectrum) => (spectrum, palette_color(id)),
            Err(_) => return,
        },
    };

    ui.horizontal(|ui| {
        ui.label(format!("{} pixels", spectrum.n_pixels));
        if spectrum.is_undefined() {
            ui.colored_label(Color32::from_rgb(0xef, 0x44, 0x44), "outside the cube");
        }
        if let SpectrumTab::Aperture(id) = tab {
            ui.separator();
            let (mut redshift, mut l0) = (spectrum.redshift, spectrum.l0);
            ui.label("z");
            let z_response = ui.add(
                egui::DragValue::new(&mut redshift)
                    .speed(1e-5)
                    .max_decimals(6),
            );
            ui.label("λ₀ [µm]");
            let l0_response = ui.add(egui::DragValue::new(&mut l0).speed(1e-3).max_decimals(5));
            if z_response.changed() || l0_response.changed() {
                edits.frame = Some((id, redshift, l0));
            }
            edits.frame_done = [&z_response, &l0_response]
                .iter()
                .any(|r| r.drag_stopped() || r.lost_focus());
            edits.disagrees = spectrum.disagrees_with(session.cube());
        }
    });

    let wave = if state.rest_frame {
        spectrum.rest_wave()
    } else {
        spectrum.wave.clone()
    };
    let channels = session.channels();
    let range = wave
        .get(channels.start)
        .zip(channels.end.checked_sub(1).and_then(|i| wave.get(i)))
        .map(|(lo, hi)| (*lo, *hi));
    let reference = if state.rest_frame {
        spectrum.l0
    } else {
        spectrum.l0 * (1.0 + spectrum.redshift)
    };
    let x_label = if state.rest_frame {
        "Rest wavelength [µm]"
    } else {
        "Wavelength [µm]"
    };

    Plot::new("spectrum")
        .legend(Legend::default())
        .x_axis_label(x_label)
        .y_axis_label("Flux")
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(series(&wave, &spectrum.flux)).color(color).name("Flux"));
            draw_extras(plot_ui, &wave, spectrum, state);
            if let Some((lo, hi)) = range {
                for x in [lo, hi] {
                    plot_ui.vline(VLine::new(x).color(Color32::GRAY).style(LineStyle::dashed_loose()));
                }
            }
            if reference.is_finite() {
                plot_ui.vline(VLine::new(reference).color(UFLUX_COLOR).name("λ₀"));
            }
        });
}

/// Uncorrected flux as is; exposure and transmission scaled to the flux peak.
fn draw_extras(plot_ui: &mut PlotUi, wave: &[f64], spectrum: &Spectrum, state: &UiState) {
    if state.show_uflux {
        if let Some(uflux) = &spectrum.uflux {
            plot_ui.line(Line::new(series(wave, uflux)).color(UFLUX_COLOR).name("uFlux"));
        }
    }
    let peak = finite_max(&spectrum.flux).unwrap_or(1.0);
    let scaled = |values: &[f64]| -> Vec<f64> {
        let top = finite_max(values).filter(|m| *m > 0.0).unwrap_or(1.0);
        values.iter().map(|v| v / top * peak).collect()
    };
    if state.show_exposure {
        if let Some(exposure) = &spectrum.exposure {
            plot_ui.line(
                Line::new(series(wave, &scaled(exposure)))
                    .color(EXPOSURE_COLOR)
                    .name("Exposure (scaled)"),
            );
        }
    }
    if state.show_atran {
        if let Some(atran) = &spectrum.atran {
            plot_ui.line(
                Line::new(series(wave, &scaled(atran)))
                    .color(ATRAN_COLOR)
                    .name("ATRAN (scaled)"),
            );
        }
    }
}

/// Plot points with NaN channels left out.
fn series(wave: &[f64], values: &[f64]) -> PlotPoints {
    wave.iter()
        .zip(values)
        .filter(|(w, v)| w.is_finite() && v.is_finite())
        .map(|(w, v)| [*w, *v])
        .collect::<Vec<_>>()
        .into()
}
