//! Top toolbar: file menu, mouse tools and cube operations.

use anyhow::Context as _;
use cubespex_core::viewsync::default_levels;
use cubespex_core::{Combine, ExtractionConfig, LevelEdit, RoiKind};
use eframe::egui;
use log::info;

use crate::app::CubespexApp;
use crate::state::{SpectrumTab, Tool};
use crate::viewer::{Colormap, Stretch};

const FITS_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

/// Toolbar request, applied once the toolbar has been drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    OpenCube,
    AddImage,
    ExportSpectrum,
    ExportApertures,
    Slice,
    Cut,
    Crop,
    Contours,
    ToggleContours,
    ClearContours,
    EditLevel(LevelEdit),
    ToggleBlink,
    Combine(Combine),
}

impl CubespexApp {
    pub(crate) fn render_toolbar(&mut self, ctx: &egui::Context) {
        let mut actions = Vec::new();
        let has_cube = self.session.is_some();
        let colormap = self.ui_state.colormap;
        let stretch = self.ui_state.stretch;

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open cube...").clicked() {
                        actions.push(Action::OpenCube);
                        ui.close_menu();
                    }
                    ui.add_enabled_ui(has_cube, |ui| {
                        if ui.button("Add comparison image...").clicked() {
                            actions.push(Action::AddImage);
                            ui.close_menu();
                        }
                        ui.separator();
                        if ui.button("Export spectrum (CSV)...").clicked() {
                            actions.push(Action::ExportSpectrum);
                            ui.close_menu();
                        }
                        if ui.button("Export apertures (JSON)...").clicked() {
                            actions.push(Action::ExportApertures);
                            ui.close_menu();
                        }
                    });
                });
                ui.separator();

                ui.add_enabled_ui(has_cube, |ui| {
                    self.render_tools(ui);
                    ui.separator();
                    self.render_cube_controls(ui, &mut actions);
                });
                ui.separator();

                egui::ComboBox::from_id_salt("colormap")
                    .selected_text(self.ui_state.colormap.to_string())
                    .show_ui(ui, |ui| {
                        for cmap in Colormap::ALL {
                            ui.selectable_value(&mut self.ui_state.colormap, cmap, cmap.to_string());
                        }
                    });
                egui::ComboBox::from_id_salt("stretch")
                    .selected_text(self.ui_state.stretch.to_string())
                    .show_ui(ui, |ui| {
                        for s in Stretch::ALL {
                            ui.selectable_value(&mut self.ui_state.stretch, s, s.to_string());
                        }
                    });
            });
        });

        if self.ui_state.colormap != colormap || self.ui_state.stretch != stretch {
            self.invalidate_textures();
        }
        for action in actions {
            let result = self.apply(action);
            self.report(result);
        }
    }

    fn render_tools(&mut self, ui: &mut egui::Ui) {
        let before = self.ui_state.tool;
        for tool in [Tool::Pan, Tool::Edit] {
            ui.selectable_value(&mut self.ui_state.tool, tool, tool.to_string());
        }
        ui.label("Draw:");
        for kind in RoiKind::ALL {
            let tool = Tool::Draw(kind);
            ui.selectable_value(&mut self.ui_state.tool, tool, tool.to_string());
        }
        if self.ui_state.tool != before {
            if let Some(session) = self.session.as_mut() {
                session.cancel_draw();
            }
        }
    }

    fn render_cube_controls(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        ui.label("λ");
        ui.add(
            egui::DragValue::new(&mut self.ui_state.wmin)
                .speed(0.01)
                .max_decimals(4),
        );
        ui.label("-");
        ui.add(
            egui::DragValue::new(&mut self.ui_state.wmax)
                .speed(0.01)
                .max_decimals(4),
        );
        if ui.button("Slice").on_hover_text("Collapse the images over the range").clicked() {
            actions.push(Action::Slice);
        }
        if ui.button("Cut").on_hover_text("Keep only the channels in range").clicked() {
            actions.push(Action::Cut);
        }
        if ui.button("Crop").on_hover_text("Crop the cube to the zoomed region").clicked() {
            actions.push(Action::Crop);
        }
        ui.separator();

        let (levels_set, blinking, combine) = self.session.as_ref().map_or(
            (false, false, Combine::Sum),
            |s| {
                (
                    !s.contour_levels().is_empty(),
                    s.is_blinking(),
                    s.apertures().extraction().combine,
                )
            },
        );
        if levels_set {
            if ui.button("Contours").on_hover_text("Show or hide").clicked() {
                actions.push(Action::ToggleContours);
            }
            ui.menu_button("Levels", |ui| self.render_level_editor(ui, actions));
            if ui.button("Clear").clicked() {
                actions.push(Action::ClearContours);
            }
        } else if ui
            .button("Contours")
            .on_hover_text("Trace the active view at default levels")
            .clicked()
        {
            actions.push(Action::Contours);
        }
        if ui.selectable_label(blinking, "Blink").clicked() {
            actions.push(Action::ToggleBlink);
        }
        ui.separator();

        let mut selected = combine;
        egui::ComboBox::from_id_salt("combine")
            .selected_text(combine_label(combine))
            .show_ui(ui, |ui| {
                for c in [Combine::Sum, Combine::Median] {
                    ui.selectable_value(&mut selected, c, combine_label(c));
                }
            });
        if selected != combine {
            actions.push(Action::Combine(selected));
        }
    }

    /// One drag field per contour level, a remove button next to each, and
    /// a field for inserting a new level.
    fn render_level_editor(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        let levels = self
            .session
            .as_ref()
            .map(|s| s.contour_levels().to_vec())
            .unwrap_or_default();
        let speed = match (levels.first(), levels.last()) {
            (Some(lo), Some(hi)) if hi > lo => (hi - lo) * 0.005,
            _ => 0.01,
        };
        egui::Grid::new("contour_levels").show(ui, |ui| {
            for (i, &level) in levels.iter().enumerate() {
                let mut value = level;
                let response = ui.add(egui::DragValue::new(&mut value).speed(speed).max_decimals(4));
                if response.changed() && value.to_bits() != level.to_bits() {
                    actions.push(Action::EditLevel(LevelEdit::Move(i, value)));
                }
                if ui.small_button("✕").on_hover_text("Remove level").clicked() {
                    actions.push(Action::EditLevel(LevelEdit::Remove(i)));
                }
                ui.end_row();
            }
        });
        ui.separator();
        ui.horizontal(|ui| {
            ui.add(
                egui::DragValue::new(&mut self.ui_state.new_level)
                    .speed(speed)
                    .max_decimals(4),
            );
            if ui.button("Add").clicked() {
                actions.push(Action::EditLevel(LevelEdit::Add(self.ui_state.new_level)));
            }
        });
    }

    fn apply(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::OpenCube => {
                if let Some(path) = fits_dialog().pick_file() {
                    self.load_cube(path);
                }
            }
            Action::AddImage => {
                self.session_mut()?;
                if let Some(path) = fits_dialog().pick_file() {
                    self.load_image(path);
                }
            }
            Action::ExportSpectrum => self.export_spectrum()?,
            Action::ExportApertures => {
                let session = self.session.as_ref().context("no cube is open")?;
                let Some(path) = rfd::FileDialog::new()
                    .add_filter("JSON", &["json"])
                    .set_file_name("apertures.json")
                    .save_file()
                else {
                    return Ok(());
                };
                cubespex_io::write_apertures_json(&path, session.apertures().rois())
                    .context("cannot write apertures")?;
                self.ui_state.notify(format!("Saved {}", path.display()));
            }
            Action::Slice => {
                let (wmin, wmax) = (self.ui_state.wmin, self.ui_state.wmax);
                let channels = self.session_mut()?.slice(wmin, wmax).context("slice")?;
                info!("sliced channels {channels:?}");
            }
            Action::Cut => {
                let (wmin, wmax) = (self.ui_state.wmin, self.ui_state.wmax);
                self.session_mut()?.cut(wmin, wmax).context("cut")?;
                self.ui_state.spectrum_tab = SpectrumTab::All;
                self.invalidate_views();
            }
            Action::Crop => {
                self.session_mut()?.crop_to_view().context("crop")?;
                self.invalidate_views();
            }
            Action::Contours => {
                let session = self.session_mut()?;
                let active = session.view(session.active_view())?;
                let levels = default_levels(active.image());
                session.set_contours(&levels).context("contours")?;
                if let Some(&top) = levels.last() {
                    self.ui_state.new_level = top;
                }
            }
            Action::ToggleContours => {
                self.session_mut()?.toggle_contours().context("contours")?;
            }
            Action::ClearContours => self.session_mut()?.clear_contours(),
            Action::EditLevel(edit) => {
                self.session_mut()?
                    .edit_contour_level(edit)
                    .context("contour levels")?;
            }
            Action::ToggleBlink => self.toggle_blink()?,
            Action::Combine(combine) => {
                self.session_mut()?
                    .set_extraction(ExtractionConfig::default().with_combine(combine));
            }
        }
        Ok(())
    }

    fn export_spectrum(&mut self) -> anyhow::Result<()> {
        let tab = self.ui_state.spectrum_tab;
        let session = self.session.as_ref().context("no cube is open")?;
        let (roi, spectrum, name) = match tab {
            SpectrumTab::All => (None, session.all_spectrum(), "spectrum_all.csv".to_string()),
            SpectrumTab::Aperture(id) => (
                Some(session.apertures().rois().get(id)?),
                session.apertures().spectrum(id)?,
                format!("spectrum_ap{id}.csv"),
            ),
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(name)
            .save_file()
        else {
            return Ok(());
        };
        cubespex_io::write_spectrum_csv(&path, session.cube(), roi, spectrum)
            .context("cannot write spectrum")?;
        self.ui_state.notify(format!("Saved {}", path.display()));
        Ok(())
    }
}

fn fits_dialog() -> rfd::FileDialog {
    rfd::FileDialog::new().add_filter("FITS", &FITS_EXTENSIONS)
}

fn combine_label(combine: Combine) -> &'static str {
    match combine {
        Combine::Sum => "Sum",
        Combine::Median => "Median",
    }
}
