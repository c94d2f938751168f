//! Input coordination and session state.
//!
//! [`Session`] is the single entry point for front ends: it owns the cube,
//! the views, the aperture and view synchronizers and the [`DragLock`], and
//! routes pointer gestures to them.

use std::ops::Range;

use log::{debug, info, warn};

use crate::aperture::ApertureSync;
use crate::config::{ExtractionConfig, InteractorConfig, ZoomConfig};
use crate::cube::{Band, Cube};
use crate::error::{Error, Result};
use crate::geometry::{PixelShape, Point};
use crate::interactor::InteractorEvent;
use crate::roi::{RoiId, RoiKind, WorldShape};
use crate::spectrum::{extract_region, Spectrum};
use crate::view::{ImagePayload, Limits, View};
use crate::viewsync::{default_levels, zoom_about_center, LevelEdit, ViewSync};

/// Exclusive right to drag one interactor.
///
/// At most one `(view, aperture)` pair holds the lock at a time.
#[derive(Debug, Default)]
pub struct DragLock {
    holder: Option<(usize, RoiId)>,
}

impl DragLock {
    /// Take the lock. Returns `false` if someone else holds it.
    pub fn acquire(&mut self, view: usize, roi: RoiId) -> bool {
        if self.holder.is_some() {
            return false;
        }
        self.holder = Some((view, roi));
        true
    }

    #[must_use]
    pub fn holder(&self) -> Option<(usize, RoiId)> {
        self.holder
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    /// Give the lock up, returning the previous holder.
    pub fn release(&mut self) -> Option<(usize, RoiId)> {
        self.holder.take()
    }
}

/// In-progress drawing gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    /// Press-drag-release shapes.
    Drag {
        view: usize,
        kind: RoiKind,
        start: Point,
        current: Point,
    },
    /// Multi-click polygon.
    Polygon {
        view: usize,
        vertices: Vec<Point>,
        hover: Option<Point>,
    },
}

#[derive(Debug, Clone)]
struct Blink {
    views: Vec<usize>,
    position: usize,
}

/// Cube, views and apertures of one open file.
#[derive(Debug)]
pub struct Session {
    cube: Cube,
    views: Vec<View>,
    apertures: ApertureSync,
    sync: ViewSync,
    lock: DragLock,
    active_view: usize,
    all_spectrum: Spectrum,
    channels: Range<usize>,
    zoom: ZoomConfig,
    draft: Option<Draft>,
    blink: Option<Blink>,
}

impl Session {
    /// Open a session with default tunables.
    ///
    /// # Errors
    /// Propagates view construction failures.
    pub fn new(cube: Cube) -> Result<Self> {
        Self::with_config(
            cube,
            ExtractionConfig::default(),
            InteractorConfig::default(),
            ZoomConfig::default(),
        )
    }

    /// Open a session, building one view per band of the cube's instrument.
    /// View 0 shows the flux on the cube grid and is the reference view.
    ///
    /// # Errors
    /// Propagates view construction failures.
    pub fn with_config(
        cube: Cube,
        extraction: ExtractionConfig,
        interaction: InteractorConfig,
        zoom: ZoomConfig,
    ) -> Result<Self> {
        let channels = 0..cube.n_channels();
        let mut views = Vec::new();
        for &band in cube.instrument().available_bands() {
            match cube.band_image(band, channels.clone()) {
                Ok(image) => views.push(
                    View::new(
                        band.to_string(),
                        image,
                        (cube.nx(), cube.ny()),
                        Box::new(cube.wcs().clone()),
                    )?
                    .with_band(band),
                ),
                Err(e) => warn!("skipping {band} view: {e}"),
            }
        }
        if views.is_empty() {
            return Err(Error::BandUnavailable(Band::Flux.to_string()));
        }
        let all_spectrum = extract_region(&cube, 0..cube.nx(), 0..cube.ny(), &extraction);
        info!(
            "session opened: {} cube {}×{}×{}, {} views",
            cube.instrument(),
            cube.n_channels(),
            cube.ny(),
            cube.nx(),
            views.len()
        );
        Ok(Self {
            cube,
            views,
            apertures: ApertureSync::new(extraction, interaction),
            sync: ViewSync::new(),
            lock: DragLock::default(),
            active_view: 0,
            all_spectrum,
            channels,
            zoom,
            draft: None,
            blink: None,
        })
    }

    #[must_use]
    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    #[must_use]
    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn view(&self, index: usize) -> Result<&View> {
        self.views.get(index).ok_or(Error::UnknownView(index))
    }

    #[must_use]
    pub fn apertures(&self) -> &ApertureSync {
        &self.apertures
    }

    #[must_use]
    pub fn active_view(&self) -> usize {
        self.active_view
    }

    /// Spectrum of every spaxel inside the reference view's window.
    #[must_use]
    pub fn all_spectrum(&self) -> &Spectrum {
        &self.all_spectrum
    }

    /// Channels collapsed into the band images.
    #[must_use]
    pub fn channels(&self) -> Range<usize> {
        self.channels.clone()
    }

    #[must_use]
    pub fn lock(&self) -> &DragLock {
        &self.lock
    }

    #[must_use]
    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    #[must_use]
    pub fn contour_levels(&self) -> &[f64] {
        self.sync.levels()
    }

    fn check_view(&self, view: usize) -> Result<()> {
        if view < self.views.len() {
            Ok(())
        } else {
            Err(Error::UnknownView(view))
        }
    }

    // ---- drawing ----------------------------------------------------------

    /// Start a drawing gesture of `kind` at `point` in `view`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn begin_draw(&mut self, view: usize, kind: RoiKind, point: Point) -> Result<()> {
        self.check_view(view)?;
        self.draft = Some(match kind {
            RoiKind::Polygon => Draft::Polygon {
                view,
                vertices: vec![point],
                hover: None,
            },
            _ => Draft::Drag {
                view,
                kind,
                start: point,
                current: point,
            },
        });
        Ok(())
    }

    /// Follow the pointer while drawing.
    pub fn update_draw(&mut self, point: Point) {
        match &mut self.draft {
            Some(Draft::Drag { current, .. }) => *current = point,
            Some(Draft::Polygon { hover, .. }) => *hover = Some(point),
            None => {}
        }
    }

    /// Add a polygon vertex.
    pub fn add_vertex(&mut self, point: Point) {
        if let Some(Draft::Polygon { vertices, .. }) = &mut self.draft {
            vertices.push(point);
        }
    }

    /// Shape the current draft would create, for previews.
    #[must_use]
    pub fn draft_shape(&self) -> Option<(usize, PixelShape)> {
        match self.draft.as_ref()? {
            Draft::Drag {
                view,
                kind,
                start,
                current,
            } => PixelShape::from_drag(*kind, *start, *current).map(|s| (*view, s)),
            Draft::Polygon {
                view,
                vertices,
                hover,
            } => {
                let mut vertices = vertices.clone();
                vertices.extend(*hover);
                Some((*view, PixelShape::Polygon { vertices }))
            }
        }
    }

    pub fn cancel_draw(&mut self) {
        self.draft = None;
    }

    /// Finish the drawing gesture and create the aperture.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] with no gesture in progress, or the
    /// rejection from [`ApertureSync::create_from_gesture`].
    pub fn commit_draw(&mut self) -> Result<RoiId> {
        let draft = self
            .draft
            .take()
            .ok_or_else(|| Error::EmptySelection("no drawing in progress".into()))?;
        let (view, shape) = match draft {
            Draft::Drag {
                view,
                kind,
                start,
                current,
            } => {
                let shape = PixelShape::from_drag(kind, start, current)
                    .ok_or_else(|| Error::EmptySelection(format!("{kind} is not a drag shape")))?;
                (view, shape)
            }
            Draft::Polygon { view, vertices, .. } => (view, PixelShape::Polygon { vertices }),
        };
        self.apertures
            .create_from_gesture(&mut self.views, &self.cube, view, &shape)
            .inspect_err(|e| warn!("drawing rejected: {e}"))
    }

    /// Create an aperture directly from world geometry.
    pub fn create_aperture(&mut self, world: WorldShape) -> RoiId {
        self.apertures
            .create_from_world(&mut self.views, &self.cube, world)
    }

    // ---- pointer routing --------------------------------------------------

    /// Press in `view`. Claims the drag lock if an interactor is hit.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn pointer_pressed(&mut self, view: usize, point: Point) -> Result<bool> {
        self.check_view(view)?;
        if self.lock.is_held() {
            return Ok(false);
        }
        let Some(roi) = self.views[view].interactor_at(point) else {
            return Ok(false);
        };
        if !self.views[view].interactor_mut(roi)?.press(point) {
            return Ok(false);
        }
        self.lock.acquire(view, roi);
        self.apertures.select(&mut self.views, roi);
        Ok(true)
    }

    /// Motion, routed only to the lock holder. Returns `true` when geometry
    /// changed.
    ///
    /// # Errors
    /// Propagates synchronization failures; the lock stays held until
    /// [`pointer_released`](Self::pointer_released).
    pub fn pointer_moved(&mut self, point: Point) -> Result<bool> {
        let Some((view, roi)) = self.lock.holder() else {
            return Ok(false);
        };
        let event = self
            .views
            .get_mut(view)
            .ok_or(Error::UnknownView(view))?
            .interactor_mut(roi)?
            .motion(point);
        if event != Some(InteractorEvent::Modified) {
            return Ok(false);
        }
        self.apertures.on_interactor_modified(
            &mut self.views,
            &self.cube,
            view,
            roi,
            self.active_view,
        )?;
        Ok(true)
    }

    /// Release. The lock is given up before anything else runs.
    pub fn pointer_released(&mut self) -> Option<(usize, RoiId)> {
        let holder = self.lock.release();
        if let Some((view, roi)) = holder {
            if let Some(it) = self
                .views
                .get_mut(view)
                .and_then(|v| v.interactor_mut(roi).ok())
            {
                it.release();
            }
        }
        holder
    }

    /// Delete gesture at `point`. Ignored while a drag is in progress.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn delete_at(&mut self, view: usize, point: Point) -> Result<Option<RoiId>> {
        self.check_view(view)?;
        if self.lock.is_held() {
            return Ok(None);
        }
        let Some(roi) = self.views[view].interactor_at(point) else {
            return Ok(None);
        };
        if self.views[view].interactor_mut(roi)?.request_delete()
            != Some(InteractorEvent::DeleteRequested)
        {
            return Ok(None);
        }
        self.apertures
            .on_delete_requested(&mut self.views, view, roi)?;
        Ok(Some(roi))
    }

    // ---- views ------------------------------------------------------------

    /// Pan or zoom `view` and follow in every other view.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn pan_zoom(&mut self, view: usize, limits: Limits) -> Result<()> {
        if let Some(reference) = self.sync.on_pan_zoom(&mut self.views, view, limits)? {
            self.refresh_all_spectrum(reference);
        }
        Ok(())
    }

    /// One mouse-wheel step; positive zooms in.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn wheel_zoom(&mut self, view: usize, step: f64) -> Result<()> {
        let limits = self.view(view)?.limits;
        let zoomed = zoom_about_center(limits, self.zoom.factor(step));
        self.pan_zoom(view, zoomed)
    }

    /// Make `view` active. Returns whether it needs a redraw; the flag stays
    /// set until [`take_redraw`](Self::take_redraw).
    ///
    /// Switching to another view ends a drag in progress, since its release
    /// will never reach the hidden view.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn set_active_view(&mut self, view: usize) -> Result<bool> {
        let redraw = self
            .apertures
            .on_active_view_changed(&mut self.views, &self.cube, view)?;
        if view != self.active_view {
            if let Some((from, roi)) = self.pointer_released() {
                debug!("view switch ended the drag of aperture {roi} in view {from}");
            }
        }
        self.active_view = view;
        Ok(redraw)
    }

    /// # Errors
    /// Returns [`Error::UnknownRoi`] for a bad id.
    pub fn select_aperture(&mut self, roi: RoiId) -> Result<()> {
        if roi >= self.apertures.len() {
            return Err(Error::UnknownRoi(roi));
        }
        self.apertures.select(&mut self.views, roi);
        Ok(())
    }

    /// Add a comparison image view; existing apertures and contours are
    /// replayed onto it. Returns the new view index.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] for an inconsistent payload.
    pub fn add_view(&mut self, payload: ImagePayload) -> Result<usize> {
        let mut view = View::from_payload(payload)?;
        self.apertures.replay_onto_view(&mut view);
        self.sync.replay_onto_view(&self.views, &mut view);
        // follow the reference window
        if let Some(reference) = self.views.first() {
            let world = reference.transform().pixels_to_world(&reference.limits.corners());
            view.limits = Limits::enclosing(&view.transform().worlds_to_pixel(&world));
        }
        info!("added view {} ({}×{})", view.name, view.nx(), view.ny());
        self.views.push(view);
        Ok(self.views.len() - 1)
    }

    /// Consume the "needs redraw" flag of `view`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn take_redraw(&mut self, view: usize) -> Result<bool> {
        self.check_view(view)?;
        Ok(self.views[view].take_dirty())
    }

    // ---- cube operations --------------------------------------------------

    /// Collapse the band images over `[wmin, wmax]`.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] when no channel falls in the range.
    pub fn slice(&mut self, wmin: f64, wmax: f64) -> Result<Range<usize>> {
        let channels = self.cube.channel_range(wmin, wmax);
        if channels.is_empty() {
            return Err(Error::EmptySelection(format!("no channels in {wmin}..{wmax}")));
        }
        self.channels = channels.clone();
        self.refresh_band_images()?;
        Ok(channels)
    }

    /// Crop the cube to the reference view's window.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] when the window misses the cube.
    pub fn crop_to_view(&mut self) -> Result<()> {
        let limits = self.view(0)?.limits;
        let (xr, yr) = limits.pixel_ranges(self.cube.nx(), self.cube.ny());
        if xr.is_empty() || yr.is_empty() {
            return Err(Error::EmptySelection("view window misses the cube".into()));
        }
        self.cube.crop(xr, yr)?;
        let (nx, ny) = (self.cube.nx(), self.cube.ny());
        for v in &mut self.views {
            if let Some(band) = v.band {
                let image = self.cube.band_image(band, self.channels.clone())?;
                v.rebind(image, (nx, ny), Box::new(self.cube.wcs().clone()))?;
            }
        }
        self.sync.clear_contours(&mut self.views);
        self.apertures.reproject_all(&mut self.views);
        self.apertures.refresh_all_spectra(&self.views, &self.cube);
        self.pan_zoom(0, Limits::full(nx, ny))
    }

    /// Keep only the channels in `[wmin, wmax]`.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] when no channel falls in the range.
    pub fn cut(&mut self, wmin: f64, wmax: f64) -> Result<()> {
        let channels = self.cube.channel_range(wmin, wmax);
        if channels.is_empty() {
            return Err(Error::EmptySelection(format!("no channels in {wmin}..{wmax}")));
        }
        self.cube.cut(channels)?;
        self.channels = 0..self.cube.n_channels();
        self.refresh_band_images()?;
        self.apertures.refresh_all_spectra(&self.views, &self.cube);
        let reference = self.view(0)?.limits;
        self.refresh_all_spectrum(reference);
        Ok(())
    }

    /// Settle a redshift / reference wavelength mismatch between an
    /// aperture spectrum and the cube.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoi`] for a bad id.
    pub fn reconcile_spectrum(&mut self, roi: RoiId, accept: bool) -> Result<bool> {
        let spectrum = self.apertures.spectrum_mut(roi)?;
        Ok(spectrum.reconcile(&mut self.cube, accept))
    }

    /// Set the redshift and reference wavelength of an aperture spectrum.
    /// Returns `true` when they now differ from the cube's and need
    /// [`reconcile_spectrum`](Self::reconcile_spectrum).
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoi`] for a bad id.
    pub fn set_spectrum_frame(&mut self, roi: RoiId, redshift: f64, l0: f64) -> Result<bool> {
        let spectrum = self.apertures.spectrum_mut(roi)?;
        spectrum.redshift = redshift;
        spectrum.l0 = l0;
        Ok(spectrum.disagrees_with(&self.cube))
    }

    /// Switch between sum and median extraction.
    pub fn set_extraction(&mut self, config: ExtractionConfig) {
        self.apertures
            .set_extraction(&self.views, &self.cube, config);
        if let Some(reference) = self.views.first().map(|v| v.limits) {
            self.refresh_all_spectrum(reference);
        }
    }

    fn refresh_band_images(&mut self) -> Result<()> {
        for v in &mut self.views {
            if let Some(band) = v.band {
                v.set_image(self.cube.band_image(band, self.channels.clone())?)?;
            }
        }
        let levels = self.sync.levels().to_vec();
        if let Some(source) = self.sync.contour_source() {
            if self.views[source].band.is_some() {
                self.sync
                    .on_contour_levels_changed(&mut self.views, source, &levels)?;
            }
        }
        Ok(())
    }

    fn refresh_all_spectrum(&mut self, reference: Limits) {
        let (xr, yr) = reference.pixel_ranges(self.cube.nx(), self.cube.ny());
        let config = self.apertures.extraction().clone();
        self.all_spectrum = extract_region(&self.cube, xr, yr, &config);
    }

    // ---- contours ---------------------------------------------------------

    /// Draw contours of the active view at `levels` on every view.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] if the active view vanished.
    pub fn set_contours(&mut self, levels: &[f64]) -> Result<()> {
        self.sync
            .on_contour_levels_changed(&mut self.views, self.active_view, levels)
    }

    /// Show or hide contours; the first call traces default levels on the
    /// active view. Returns whether contours are now visible.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] if the active view vanished.
    pub fn toggle_contours(&mut self) -> Result<bool> {
        if self.sync.contour_source().is_none() {
            let levels = default_levels(self.view(self.active_view)?.image());
            self.set_contours(&levels)?;
            return Ok(true);
        }
        Ok(self.sync.toggle_contours(&mut self.views))
    }

    pub fn clear_contours(&mut self) {
        self.sync.clear_contours(&mut self.views);
    }

    /// Add, remove or move one contour level, then retrace on the view the
    /// contours came from (the active view if there are none yet) and
    /// project into every other view. Removing the last level clears the
    /// contours.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLevel`] for a bad position.
    pub fn edit_contour_level(&mut self, edit: LevelEdit) -> Result<()> {
        let mut levels = self.sync.levels().to_vec();
        edit.apply(&mut levels)?;
        if levels.is_empty() {
            self.clear_contours();
            return Ok(());
        }
        let source = self.sync.contour_source().unwrap_or(self.active_view);
        debug!("contour levels now {levels:?} on view {source}");
        self.sync
            .on_contour_levels_changed(&mut self.views, source, &levels)
    }

    // ---- blinking ---------------------------------------------------------

    /// Start cycling the active view through `views`.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] for fewer than two views and
    /// [`Error::UnknownView`] for a bad index.
    pub fn start_blink(&mut self, views: Vec<usize>) -> Result<()> {
        if views.len() < 2 {
            return Err(Error::EmptySelection("blinking needs two views".into()));
        }
        if let Some(&bad) = views.iter().find(|&&v| v >= self.views.len()) {
            return Err(Error::UnknownView(bad));
        }
        self.set_active_view(views[0])?;
        self.blink = Some(Blink { views, position: 0 });
        Ok(())
    }

    pub fn stop_blink(&mut self) {
        self.blink = None;
    }

    #[must_use]
    pub fn is_blinking(&self) -> bool {
        self.blink.is_some()
    }

    /// Advance the blink to its next view and activate it.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] if a blinked view vanished.
    pub fn blink_tick(&mut self) -> Result<Option<usize>> {
        let Some(blink) = self.blink.as_mut() else {
            return Ok(None);
        };
        blink.position = (blink.position + 1) % blink.views.len();
        let next = blink.views[blink.position];
        self.set_active_view(next)?;
        Ok(Some(next))
    }
}
