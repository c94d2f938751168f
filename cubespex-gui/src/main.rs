//! Cubespex GUI application entry point.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod message;
mod pipeline;
mod state;
mod ui;
mod util;
mod viewer;

use std::path::PathBuf;

use app::CubespexApp;
use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::init();
    let opts = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        ..Default::default()
    };
    // optional cube to open at start-up
    let initial = std::env::args_os().nth(1).map(PathBuf::from);
    eframe::run_native(
        "Cubespex",
        opts,
        Box::new(move |_cc| {
            let mut app = CubespexApp::default();
            if let Some(path) = initial {
                app.load_cube(path);
            }
            Ok(Box::new(app))
        }),
    )
}
