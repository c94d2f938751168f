//! Main application state and logic.
//!
//! `CubespexApp` owns the [`Session`] of the open cube, the channel to the
//! loader threads and the per-view render caches.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use cubespex_core::{Limits, Session};
use eframe::egui;
use log::{debug, info, warn};

use crate::message::AppMessage;
use crate::pipeline::{load_cube_worker, load_image_worker, Generation};
use crate::state::{ProcessingState, SpectrumTab, UiState};
use crate::viewer::image_to_color;

/// Main application state.
pub struct CubespexApp {
    /// Open cube with its views and apertures.
    pub(crate) session: Option<Session>,
    /// Path of the open cube.
    pub(crate) cube_path: Option<PathBuf>,

    /// UI display state.
    pub(crate) ui_state: UiState,
    /// Background load state.
    pub(crate) processing: ProcessingState,

    /// Message receiver for loader threads.
    pub(crate) rx: Receiver<AppMessage>,
    /// Message sender handed to loader threads.
    pub(crate) tx: Sender<AppMessage>,
    cube_generation: Generation,
    image_generation: Generation,

    /// Cached texture per view.
    pub(crate) textures: Vec<Option<egui::TextureHandle>>,
    /// Limits last pushed into each view's plot.
    pub(crate) plot_limits: Vec<Option<Limits>>,

    /// Time between blink frames.
    pub(crate) blink_interval: Duration,
    last_blink: Instant,
}

impl Default for CubespexApp {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self {
            session: None,
            cube_path: None,
            ui_state: UiState::default(),
            processing: ProcessingState::default(),
            rx,
            tx,
            cube_generation: Generation::default(),
            image_generation: Generation::default(),
            textures: Vec::new(),
            plot_limits: Vec::new(),
            blink_interval: Duration::from_millis(700),
            last_blink: Instant::now(),
        }
    }
}

impl CubespexApp {
    /// Load a cube asynchronously. Pending cube and image loads are
    /// superseded.
    pub fn load_cube(&mut self, path: PathBuf) {
        let generation = self.cube_generation.next();
        self.image_generation.next();
        self.processing.is_loading = true;
        self.processing.is_loading_image = false;
        self.processing.status_text = format!("Loading {}...", path.display());
        self.cube_path = Some(path.clone());

        let tx = self.tx.clone();
        thread::spawn(move || load_cube_worker(&path, &tx, generation));
    }

    /// Load a comparison image asynchronously; it becomes a new view of the
    /// open cube.
    pub fn load_image(&mut self, path: PathBuf) {
        let generation = self.image_generation.next();
        self.processing.is_loading_image = true;
        self.processing.status_text = format!("Loading {}...", path.display());

        let tx = self.tx.clone();
        thread::spawn(move || load_image_worker(&path, &tx, generation));
    }

    /// The open session, or an error for the status bar.
    pub(crate) fn session_mut(&mut self) -> anyhow::Result<&mut Session> {
        self.session.as_mut().context("no cube is open")
    }

    /// Show a failure in the status bar and continue.
    pub(crate) fn report<T>(&mut self, result: anyhow::Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{e:#}");
                self.ui_state.error(format!("{e:#}"));
                None
            }
        }
    }

    /// Drop every cached texture and plot window, e.g. after a crop.
    pub(crate) fn invalidate_views(&mut self) {
        self.textures.clear();
        self.plot_limits.clear();
        self.sync_caches();
    }

    /// Drop cached textures only, e.g. after a colormap change.
    pub(crate) fn invalidate_textures(&mut self) {
        self.textures.iter_mut().for_each(|t| *t = None);
    }

    fn sync_caches(&mut self) {
        let n = self.session.as_ref().map_or(0, |s| s.views().len());
        self.textures.resize_with(n, || None);
        self.plot_limits.resize(n, None);
    }

    /// Rebuild the texture of `index` if its view needs a redraw.
    pub(crate) fn refresh_texture(&mut self, ctx: &egui::Context, index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let redraw = session.take_redraw(index).unwrap_or(false);
        let missing = self.textures.get(index).map_or(true, Option::is_none);
        if !(redraw || missing) {
            return;
        }
        let Ok(view) = session.view(index) else {
            return;
        };
        let image = image_to_color(
            view.image(),
            view.nx(),
            view.ny(),
            self.ui_state.colormap,
            self.ui_state.stretch,
        );
        let handle = ctx.load_texture(format!("view-{index}"), image, egui::TextureOptions::NEAREST);
        if let Some(slot) = self.textures.get_mut(index) {
            *slot = Some(handle);
        }
    }

    /// Start or stop cycling through every view.
    pub(crate) fn toggle_blink(&mut self) -> anyhow::Result<()> {
        let session = self.session_mut()?;
        if session.is_blinking() {
            session.stop_blink();
            return Ok(());
        }
        let views = (0..session.views().len()).collect();
        session.start_blink(views).context("cannot blink")?;
        self.last_blink = Instant::now();
        Ok(())
    }

    fn tick_blink(&mut self, ctx: &egui::Context) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_blinking() {
            return;
        }
        if self.last_blink.elapsed() >= self.blink_interval {
            self.last_blink = Instant::now();
            let result = session.blink_tick().context("blinking");
            if self.report(result).is_none() {
                if let Some(session) = self.session.as_mut() {
                    session.stop_blink();
                }
            }
        }
        ctx.request_repaint_after(self.blink_interval);
    }

    /// End a drag whose plot was not shown when the button came up.
    fn release_stray_drag(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.pointer.any_released()) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some((view, roi)) = session.pointer_released() {
            debug!("released aperture {roi} dragged in hidden view {view}");
            self.ui_state.spectrum_tab = SpectrumTab::Aperture(roi);
        }
    }

    /// Handle pending messages from loader threads.
    pub fn handle_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                AppMessage::CubeLoaded {
                    generation,
                    cube,
                    elapsed,
                } => {
                    if !self.cube_generation.is_current(generation) {
                        debug!("discarding superseded cube load {generation}");
                        continue;
                    }
                    self.processing.is_loading = false;
                    self.open_session(*cube, elapsed);
                }
                AppMessage::CubeError { generation, error } => {
                    if !self.cube_generation.is_current(generation) {
                        continue;
                    }
                    self.processing.is_loading = false;
                    self.processing.status_text = "Ready".to_string();
                    self.ui_state.error(format!("Cannot open cube: {error}"));
                }
                AppMessage::ImageLoaded {
                    generation,
                    payload,
                } => {
                    if !self.image_generation.is_current(generation) {
                        debug!("discarding superseded image load {generation}");
                        continue;
                    }
                    self.processing.is_loading_image = false;
                    self.processing.status_text = "Ready".to_string();
                    let name = payload.name.clone();
                    let result = self
                        .session_mut()
                        .and_then(|s| s.add_view(payload).context("cannot add image"));
                    if self.report(result).is_some() {
                        self.sync_caches();
                        self.ui_state.notify(format!("Added view {name}"));
                    }
                }
                AppMessage::ImageError { generation, error } => {
                    if !self.image_generation.is_current(generation) {
                        continue;
                    }
                    self.processing.is_loading_image = false;
                    self.processing.status_text = "Ready".to_string();
                    self.ui_state.error(format!("Cannot open image: {error}"));
                }
            }
        }
    }

    fn open_session(&mut self, cube: cubespex_core::Cube, elapsed: Duration) {
        let summary = format!(
            "{} ({}, {} channels) loaded in {:.2}s",
            if cube.object.is_empty() { "cube" } else { &cube.object },
            cube.instrument(),
            cube.n_channels(),
            elapsed.as_secs_f64()
        );
        let result = Session::new(cube).context("cannot build views");
        let Some(session) = self.report(result) else {
            self.processing.status_text = "Ready".to_string();
            return;
        };
        info!("{summary}");
        self.ui_state.reset_for_cube(session.cube().wave());
        self.session = Some(session);
        self.processing.status_text = summary;
        self.invalidate_views();
    }
}

impl eframe::App for CubespexApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_messages();
        self.sync_caches();
        self.tick_blink(ctx);

        self.render_toolbar(ctx);
        self.render_status_bar(ctx);
        self.render_spectrum_panel(ctx);
        self.render_central_panel(ctx);
        self.release_stray_drag(ctx);
        self.render_reconcile_window(ctx);

        if self.processing.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        if self.ui_state.flash.is_some() {
            ctx.request_repaint_after(Duration::from_secs(1));
        }
    }
}
