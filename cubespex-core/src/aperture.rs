//! Aperture synchronization across views.
//!
//! [`ApertureSync`] owns the canonical apertures (world coordinates) and
//! their spectra. Views own the interactors; this module only addresses them
//! by `(view index, aperture id)`. View 0 is the reference view: its pixel
//! grid is the cube's, and spectra are extracted from its interactor shapes.

use log::{debug, info};

use crate::config::{ExtractionConfig, InteractorConfig};
use crate::cube::Cube;
use crate::error::{Error, Result};
use crate::geometry::PixelShape;
use crate::interactor::Interactor;
use crate::roi::{RoiId, RoiStore, WorldShape};
use crate::spectrum::{extract, footprint, Spectrum};
use crate::view::View;

/// Minimum polygon vertex count.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Canonical apertures, their spectra and the current selection.
#[derive(Debug, Clone, Default)]
pub struct ApertureSync {
    rois: RoiStore,
    spectra: Vec<Spectrum>,
    /// Spectra whose aperture changed while another view was active.
    stale: Vec<bool>,
    selected: Option<RoiId>,
    extraction: ExtractionConfig,
    interaction: InteractorConfig,
}

impl ApertureSync {
    #[must_use]
    pub fn new(extraction: ExtractionConfig, interaction: InteractorConfig) -> Self {
        Self {
            extraction,
            interaction,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rois(&self) -> &RoiStore {
        &self.rois
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    #[must_use]
    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    /// # Errors
    /// Returns [`Error::UnknownRoi`] for a bad id.
    pub fn spectrum(&self, id: RoiId) -> Result<&Spectrum> {
        self.spectra.get(id).ok_or(Error::UnknownRoi(id))
    }

    /// # Errors
    /// Returns [`Error::UnknownRoi`] for a bad id.
    pub fn spectrum_mut(&mut self, id: RoiId) -> Result<&mut Spectrum> {
        self.spectra.get_mut(id).ok_or(Error::UnknownRoi(id))
    }

    #[must_use]
    pub fn is_stale(&self, id: RoiId) -> bool {
        self.stale.get(id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn selected(&self) -> Option<RoiId> {
        self.selected
    }

    #[must_use]
    pub fn extraction(&self) -> &ExtractionConfig {
        &self.extraction
    }

    /// Change the combine rule and recompute every spectrum.
    pub fn set_extraction(&mut self, views: &[View], cube: &Cube, config: ExtractionConfig) {
        self.extraction = config;
        self.refresh_all_spectra(views, cube);
    }

    /// Check a drawn shape before it becomes an aperture.
    fn validate(&self, shape: &PixelShape) -> Result<()> {
        let min = self.interaction.min_size;
        let extent = match shape {
            PixelShape::Polygon { vertices } => {
                if vertices.len() < MIN_POLYGON_VERTICES {
                    return Err(Error::TooFewVertices {
                        min: MIN_POLYGON_VERTICES,
                        found: vertices.len(),
                    });
                }
                return Ok(());
            }
            PixelShape::Square { size, .. } => *size,
            PixelShape::Circle { radius, .. } => 2.0 * radius,
            PixelShape::Rectangle { width, height, .. }
            | PixelShape::Ellipse { width, height, .. } => width.min(*height),
        };
        if extent.is_finite() && extent >= min {
            Ok(())
        } else {
            Err(Error::ShapeTooSmall(extent))
        }
    }

    /// Create an aperture from a shape drawn in view `view`.
    ///
    /// The pixel shape is lifted to world coordinates through that view and
    /// then projected into every view, the drawing view included.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`], [`Error::TooFewVertices`] or
    /// [`Error::ShapeTooSmall`]; nothing is created in that case.
    pub fn create_from_gesture(
        &mut self,
        views: &mut [View],
        cube: &Cube,
        view: usize,
        shape: &PixelShape,
    ) -> Result<RoiId> {
        let source = views.get(view).ok_or(Error::UnknownView(view))?;
        self.validate(shape)?;
        let world = WorldShape::from_pixel(shape, source.transform());
        debug!("gesture in view {view} lifted to {world:?}");
        Ok(self.create_from_world(views, cube, world))
    }

    /// Create an aperture from world geometry.
    pub fn create_from_world(&mut self, views: &mut [View], cube: &Cube, world: WorldShape) -> RoiId {
        for v in views.iter_mut() {
            let pixel = world.to_pixel(v.transform());
            v.push_interactor(Interactor::with_config(pixel, self.interaction.clone()));
        }
        let shape = reference_shape(views, cube, &world);
        let id = self.rois.create(world);
        let pixels = footprint(&shape, cube.nx(), cube.ny());
        self.spectra.push(extract(cube, &pixels, &self.extraction));
        self.stale.push(false);
        self.select(views, id);
        id
    }

    /// Write an edited interactor back to the canonical aperture and
    /// re-project it into every other view.
    ///
    /// The originating view keeps its interactor as drawn. The spectrum is
    /// recomputed now when `view` is `active`, otherwise it is marked stale.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] or [`Error::UnknownRoi`].
    pub fn on_interactor_modified(
        &mut self,
        views: &mut [View],
        cube: &Cube,
        view: usize,
        roi: RoiId,
        active: usize,
    ) -> Result<()> {
        let source = views.get(view).ok_or(Error::UnknownView(view))?;
        let world = WorldShape::from_pixel(source.interactor(roi)?.shape(), source.transform());
        self.rois.update(roi, world)?;
        let world = self.rois.get(roi)?;

        for (i, v) in views.iter_mut().enumerate() {
            if i == view {
                continue;
            }
            let pixel = world.to_pixel(v.transform());
            v.interactor_mut(roi)?.set_shape(pixel);
            v.mark_dirty();
        }

        if view == active {
            self.recompute(views, cube, roi)?;
        } else if let Some(flag) = self.stale.get_mut(roi) {
            *flag = true;
        }
        Ok(())
    }

    /// Remove an aperture everywhere. Later ids shift down by one.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoi`] if the aperture does not exist.
    pub fn on_delete_requested(&mut self, views: &mut [View], view: usize, roi: RoiId) -> Result<()> {
        self.rois.remove(roi)?;
        for v in views.iter_mut() {
            v.remove_interactor(roi);
        }
        self.spectra.remove(roi);
        self.stale.remove(roi);
        self.selected = match self.selected {
            Some(s) if s == roi => None,
            Some(s) if s > roi => Some(s - 1),
            other => other,
        };
        info!("aperture {roi} deleted from view {view}");
        Ok(())
    }

    /// Apply deferred work for a newly active view.
    ///
    /// Shows handles on the selected aperture only and recomputes stale
    /// spectra. Returns whether the view needs a redraw; the flag itself is
    /// left set for whoever rebuilds the image.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn on_active_view_changed(&mut self, views: &mut [View], cube: &Cube, view: usize) -> Result<bool> {
        if view >= views.len() {
            return Err(Error::UnknownView(view));
        }
        let selected = self.selected;
        for (i, it) in views[view].interactors_mut().iter_mut().enumerate() {
            it.show_handles = Some(i) == selected;
        }
        for roi in 0..self.stale.len() {
            if self.stale[roi] {
                self.recompute(views, cube, roi)?;
            }
        }
        Ok(views[view].is_dirty())
    }

    /// Add interactors for every existing aperture to a new view.
    pub fn replay_onto_view(&self, view: &mut View) {
        view.clear_interactors();
        for (id, world) in self.rois.iter() {
            let mut it = Interactor::with_config(world.to_pixel(view.transform()), self.interaction.clone());
            it.show_handles = Some(id) == self.selected;
            view.push_interactor(it);
        }
        debug!("replayed {} apertures onto {}", self.rois.len(), view.name);
    }

    /// Select an aperture (or none) and update handle visibility everywhere.
    pub fn select(&mut self, views: &mut [View], roi: impl Into<Option<RoiId>>) {
        let roi = roi.into().filter(|&id| id < self.rois.len());
        self.selected = roi;
        for v in views.iter_mut() {
            for (i, it) in v.interactors_mut().iter_mut().enumerate() {
                it.show_handles = Some(i) == roi;
            }
            v.mark_dirty();
        }
    }

    /// Recompute every spectrum, e.g. after the cube was cropped or cut.
    pub fn refresh_all_spectra(&mut self, views: &[View], cube: &Cube) {
        for (id, world) in self.rois.iter() {
            let shape = views
                .first()
                .and_then(|v| v.interactor(id).ok())
                .map_or_else(|| world.to_pixel(cube.wcs()), |it| it.shape().clone());
            let pixels = footprint(&shape, cube.nx(), cube.ny());
            if let Some(spectrum) = self.spectra.get_mut(id) {
                spectrum.recompute(cube, &pixels, &self.extraction);
            }
        }
        self.stale.iter_mut().for_each(|s| *s = false);
    }

    /// Re-project every aperture into every view, e.g. after a transform changed.
    pub fn reproject_all(&self, views: &mut [View]) {
        for v in views.iter_mut() {
            if v.interactors().len() != self.rois.len() {
                self.replay_onto_view(v);
                continue;
            }
            for (id, world) in self.rois.iter() {
                let pixel = world.to_pixel(v.transform());
                if let Ok(it) = v.interactor_mut(id) {
                    it.set_shape(pixel);
                }
            }
            v.mark_dirty();
        }
    }

    /// Drop every aperture.
    pub fn clear(&mut self, views: &mut [View]) {
        self.rois.clear();
        self.spectra.clear();
        self.stale.clear();
        self.selected = None;
        for v in views.iter_mut() {
            v.clear_interactors();
        }
    }

    fn recompute(&mut self, views: &[View], cube: &Cube, roi: RoiId) -> Result<()> {
        let world = self.rois.get(roi)?;
        let shape = match views.first() {
            Some(v) => v.interactor(roi)?.shape().clone(),
            None => world.to_pixel(cube.wcs()),
        };
        let pixels = footprint(&shape, cube.nx(), cube.ny());
        let spectrum = self.spectra.get_mut(roi).ok_or(Error::UnknownRoi(roi))?;
        spectrum.recompute(cube, &pixels, &self.extraction);
        if let Some(flag) = self.stale.get_mut(roi) {
            *flag = false;
        }
        debug!("aperture {roi} spectrum over {} pixels", pixels.len());
        Ok(())
    }
}

/// Shape of a new aperture in the cube's pixel grid.
fn reference_shape(views: &[View], cube: &Cube, world: &WorldShape) -> PixelShape {
    views
        .first()
        .and_then(|v| v.interactors().last())
        .map_or_else(|| world.to_pixel(cube.wcs()), |it| it.shape().clone())
}
