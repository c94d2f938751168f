//! Aperture, contour and draft overlays drawn on an image plot.

use cubespex_core::viewsync::visible_contours;
use cubespex_core::{PixelShape, Point, RoiId, View};
use eframe::egui::{Color32, Stroke};
use egui_plot::{Line, LineStyle, MarkerShape, PlotPoints, PlotUi, Points, Polygon};

/// Segments used to outline circles and ellipses.
const OUTLINE_SEGMENTS: usize = 96;

const CONTOUR_COLOR: Color32 = Color32::from_rgb(0x22, 0xc5, 0xe5);

/// Draw every aperture of `view`, highlighting `selected`.
pub fn draw_interactors(plot_ui: &mut PlotUi, view: &View, selected: Option<RoiId>) {
    for (id, interactor) in view.interactors().iter().enumerate() {
        let color = palette_color(id);
        let shape = interactor.shape();
        let width: f32 = if Some(id) == selected { 2.5 } else { 1.5 };
        let outline = closed(shape.outline(OUTLINE_SEGMENTS));
        if matches!(shape, PixelShape::Polygon { .. }) {
            // egui_plot only fills convex polygons
            plot_ui.line(Line::new(PlotPoints::new(outline)).color(color).width(width));
        } else {
            plot_ui.polygon(
                Polygon::new(PlotPoints::new(outline))
                    .stroke(Stroke::new(width, color))
                    .fill_color(fill_color(color)),
            );
        }
        if interactor.show_handles {
            let handles: Vec<[f64; 2]> = shape.handle_points().into_iter().map(to_xy).collect();
            plot_ui.points(
                Points::new(PlotPoints::new(handles))
                    .shape(MarkerShape::Square)
                    .radius(3.0)
                    .color(color),
            );
        }
    }
}

/// Draw the contours shown in `view`.
pub fn draw_contours(plot_ui: &mut PlotUi, view: &View) {
    for contour in visible_contours(view) {
        let points: Vec<[f64; 2]> = contour.points.iter().copied().map(to_xy).collect();
        plot_ui.line(
            Line::new(PlotPoints::new(points))
                .color(CONTOUR_COLOR)
                .width(1.0),
        );
    }
}

/// Draw the shape of a drawing gesture in progress.
pub fn draw_draft(plot_ui: &mut PlotUi, shape: &PixelShape, color: Color32) {
    let outline = match shape {
        // open polyline until committed
        PixelShape::Polygon { vertices } => vertices.iter().copied().map(to_xy).collect(),
        _ => closed(shape.outline(OUTLINE_SEGMENTS)),
    };
    plot_ui.line(
        Line::new(PlotPoints::new(outline))
            .color(color)
            .style(LineStyle::dashed_loose()),
    );
}

/// Close an outline by repeating its first point.
fn closed(outline: Vec<Point>) -> Vec<[f64; 2]> {
    let mut points: Vec<[f64; 2]> = outline.into_iter().map(to_xy).collect();
    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last {
            points.push(first);
        }
    }
    points
}

fn to_xy((x, y): Point) -> [f64; 2] {
    [x, y]
}

pub fn fill_color(color: Color32) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), 40)
}

/// Colour of aperture `index`; the spectrum panel uses the same palette.
pub fn palette_color(index: usize) -> Color32 {
    const PALETTE: [Color32; 8] = [
        Color32::from_rgb(0xef, 0x44, 0x44),
        Color32::from_rgb(0x4a, 0x9e, 0xff),
        Color32::from_rgb(0x10, 0xb9, 0x81),
        Color32::from_rgb(0xf5, 0x9e, 0x0b),
        Color32::from_rgb(0x8b, 0x5c, 0xff),
        Color32::from_rgb(0xf4, 0x72, 0xb6),
        Color32::from_rgb(0x84, 0xcc, 0x16),
        Color32::from_rgb(0xf9, 0x73, 0x16),
    ];
    PALETTE[index % PALETTE.len()]
}
