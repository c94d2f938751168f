//! Bottom status bar.

use eframe::egui::{self, Color32};

use crate::app::CubespexApp;
use crate::util::sexagesimal;

const BUSY: Color32 = Color32::from_rgb(0x4a, 0x9e, 0xff);
const READY: Color32 = Color32::from_rgb(0x10, 0xb9, 0x81);
const ERROR: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);

impl CubespexApp {
    pub(crate) fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                self.render_status_indicator(ui);
                ui.separator();
                self.render_cursor_status(ui);
                if let Some(flash) = self.ui_state.flash() {
                    ui.separator();
                    let color = if flash.is_error { ERROR } else { READY };
                    ui.colored_label(color, &flash.text);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    self.render_cube_summary(ui);
                });
            });
        });
    }

    fn render_status_indicator(&self, ui: &mut egui::Ui) {
        if self.processing.is_busy() {
            ui.spinner();
            ui.colored_label(BUSY, &self.processing.status_text);
        } else {
            ui.colored_label(READY, "●");
            ui.label(&self.processing.status_text);
        }
    }

    fn render_cursor_status(&self, ui: &mut egui::Ui) {
        let Some(cursor) = self.ui_state.cursor else {
            return;
        };
        let (x, y) = cursor.pixel;
        let (ra, dec) = cursor.world;
        let value = cursor
            .value
            .map_or_else(|| "-".to_string(), |v| format!("{v:.4e}"));
        ui.monospace(format!(
            "x {x:7.1}  y {y:7.1}  RA {}  Dec {}  {value}",
            sexagesimal(ra, true),
            sexagesimal(dec, false)
        ));
    }

    fn render_cube_summary(&self, ui: &mut egui::Ui) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let cube = session.cube();
        let name = self
            .cube_path
            .as_deref()
            .and_then(std::path::Path::file_name)
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        let channels = session.channels();
        ui.label(format!(
            "{name}  {}  {}×{}×{}  ch {}-{}  {} apertures",
            cube.instrument(),
            cube.n_channels(),
            cube.ny(),
            cube.nx(),
            channels.start,
            channels.end,
            session.apertures().len()
        ));
    }
}
