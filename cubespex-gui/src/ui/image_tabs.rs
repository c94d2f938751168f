//! Central panel: one linked image plot per view.
//!
//! Plot coordinates are the view's pixel coordinates, so pointer positions
//! go to the session unchanged.

use anyhow::Context as _;
use cubespex_core::{Limits, Point, RoiKind};
use eframe::egui::{self, Key, PointerButton, Response};
use egui_plot::{Plot, PlotBounds, PlotImage, PlotPoint};
use log::info;

use crate::app::CubespexApp;
use crate::state::{CursorInfo, SpectrumTab, Tool};
use crate::util::{usize_to_f32, usize_to_f64};
use crate::viewer::overlay::{self, palette_color};

/// What the plot reported for one frame.
struct PlotFrame {
    pointer: Option<Point>,
    bounds: Limits,
}

impl CubespexApp {
    pub(crate) fn render_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.session.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.label("Open a spectral cube from the File menu");
                });
                return;
            }
            self.render_view_tabs(ui);
            ui.separator();
            self.render_active_view(ui);
        });
    }

    fn render_view_tabs(&mut self, ui: &mut egui::Ui) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let active = session.active_view();
        let mut clicked = None;
        ui.horizontal(|ui| {
            for (i, view) in session.views().iter().enumerate() {
                if ui.selectable_label(i == active, &view.name).clicked() {
                    clicked = Some(i);
                }
            }
        });
        let Some(index) = clicked.filter(|&i| i != active) else {
            return;
        };
        let result = self.session_mut().and_then(|s| {
            s.cancel_draw();
            s.stop_blink();
            s.set_active_view(index).context("cannot switch view")
        });
        if self.report(result) == Some(true) {
            if let Some(slot) = self.textures.get_mut(index) {
                *slot = None;
            }
        }
    }

    fn render_active_view(&mut self, ui: &mut egui::Ui) {
        let Some(index) = self.session.as_ref().map(cubespex_core::Session::active_view) else {
            return;
        };
        self.refresh_texture(ui.ctx(), index);
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Ok(view) = session.view(index) else {
            return;
        };

        let tool = self.ui_state.tool;
        let push = self.plot_limits.get(index).copied().flatten() != Some(view.limits);
        let texture = self.textures.get(index).and_then(Option::as_ref).map(egui::TextureHandle::id);
        let selected = session.apertures().selected();
        let draft = session
            .draft_shape()
            .filter(|(v, _)| *v == index)
            .map(|(_, shape)| shape);
        let draft_color = palette_color(session.apertures().len());
        let (nx, ny) = (view.nx(), view.ny());
        let limits = view.limits;

        let response = Plot::new(format!("view-{index}"))
            .data_aspect(1.0)
            .show_grid(false)
            .allow_drag(tool == Tool::Pan)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .allow_double_click_reset(false)
            .show(ui, |plot_ui| {
                if push {
                    plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                        [limits.x.0, limits.y.0],
                        [limits.x.1, limits.y.1],
                    ));
                }
                if let Some(texture) = texture {
                    let center = PlotPoint::new(
                        (usize_to_f64(nx) - 1.0) * 0.5,
                        (usize_to_f64(ny) - 1.0) * 0.5,
                    );
                    plot_ui.image(PlotImage::new(
                        texture,
                        center,
                        [usize_to_f32(nx), usize_to_f32(ny)],
                    ));
                }
                overlay::draw_contours(plot_ui, view);
                overlay::draw_interactors(plot_ui, view, selected);
                if let Some(shape) = &draft {
                    overlay::draw_draft(plot_ui, shape, draft_color);
                }
                let bounds = plot_ui.plot_bounds();
                PlotFrame {
                    pointer: plot_ui.pointer_coordinate().map(|p| (p.x, p.y)),
                    bounds: Limits {
                        x: (bounds.min()[0], bounds.max()[0]),
                        y: (bounds.min()[1], bounds.max()[1]),
                    },
                }
            });
        let frame = response.inner;

        self.ui_state.cursor = frame.pointer.map(|pixel| CursorInfo {
            pixel,
            world: view.transform().pixel_to_world(pixel.0, pixel.1),
            value: view.value_at(pixel),
        });
        if push {
            if let Some(slot) = self.plot_limits.get_mut(index) {
                *slot = Some(limits);
            }
        }

        let cancel = ui.input(|i| i.key_pressed(Key::Escape));
        let result = self.route_pointer(index, tool, &response.response, &frame, push, cancel);
        self.report(result);
    }

    /// Turn this frame's pointer activity into session input.
    fn route_pointer(
        &mut self,
        index: usize,
        tool: Tool,
        response: &Response,
        frame: &PlotFrame,
        pushed: bool,
        cancel: bool,
    ) -> anyhow::Result<()> {
        let session = self.session.as_mut().context("no cube is open")?;
        if cancel {
            session.cancel_draw();
        }

        let scroll = if response.hovered() {
            response.ctx.input(|i| i.raw_scroll_delta.y)
        } else {
            0.0
        };
        if scroll != 0.0 {
            session.wheel_zoom(index, f64::from(scroll.signum()))?;
            return Ok(());
        }

        let pointer = frame.pointer;
        match tool {
            Tool::Pan => {
                if response.dragged() && !pushed && frame.bounds != session.view(index)?.limits {
                    session.pan_zoom(index, frame.bounds)?;
                    if let Some(slot) = self.plot_limits.get_mut(index) {
                        *slot = Some(frame.bounds);
                    }
                }
            }
            Tool::Edit => {
                if let Some(p) = pointer {
                    if response.drag_started_by(PointerButton::Primary) {
                        session.pointer_pressed(index, p)?;
                    } else if response.dragged_by(PointerButton::Primary) {
                        session.pointer_moved(p).context("cannot move aperture")?;
                    }
                }
                if response.drag_stopped() {
                    if let Some((_, roi)) = session.pointer_released() {
                        self.ui_state.spectrum_tab = SpectrumTab::Aperture(roi);
                    }
                } else if response.secondary_clicked() {
                    if let Some(p) = pointer {
                        if let Some(roi) = session.delete_at(index, p)? {
                            info!("deleted aperture {roi}");
                            self.ui_state.spectrum_tab = SpectrumTab::All;
                            self.ui_state.reconcile = None;
                        }
                    }
                }
            }
            Tool::Draw(RoiKind::Polygon) => {
                if response.double_clicked() {
                    if session.draft().is_some() {
                        let roi = session.commit_draw().context("polygon rejected")?;
                        self.ui_state.spectrum_tab = SpectrumTab::Aperture(roi);
                    }
                } else if let Some(p) = pointer {
                    if response.clicked() {
                        if session.draft().is_some() {
                            session.add_vertex(p);
                        } else {
                            session.begin_draw(index, RoiKind::Polygon, p)?;
                        }
                    } else {
                        session.update_draw(p);
                    }
                }
            }
            Tool::Draw(kind) => {
                if let Some(p) = pointer {
                    if response.drag_started_by(PointerButton::Primary) {
                        session.begin_draw(index, kind, p)?;
                    } else if response.dragged_by(PointerButton::Primary) {
                        session.update_draw(p);
                    }
                }
                if response.drag_stopped() && session.draft().is_some() {
                    let roi = session
                        .commit_draw()
                        .with_context(|| format!("{kind} rejected"))?;
                    self.ui_state.spectrum_tab = SpectrumTab::Aperture(roi);
                }
            }
        }
        Ok(())
    }
}
