//! Pan/zoom and contour propagation between views.

use log::debug;

use crate::contour::{self, ContourLine};
use crate::error::{Error, Result};
use crate::stats::{finite_max, finite_mean_std, nanmedian};
use crate::view::{Limits, View};

/// Multipliers of σ above the median used for default contour levels.
const DEFAULT_SIGMAS: [f64; 5] = [1.0, 2.0, 3.0, 5.0, 10.0];

/// One user change to the contour levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelEdit {
    /// Insert a new level.
    Add(f64),
    /// Drop the level at this position.
    Remove(usize),
    /// Replace the level at this position.
    Move(usize, f64),
}

impl LevelEdit {
    /// Apply the edit to ascending `levels`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLevel`] for a bad position.
    pub fn apply(self, levels: &mut Vec<f64>) -> Result<()> {
        match self {
            Self::Add(level) => levels.push(level),
            Self::Remove(i) if i < levels.len() => {
                levels.remove(i);
            }
            Self::Move(i, level) if i < levels.len() => levels[i] = level,
            Self::Remove(i) | Self::Move(i, _) => return Err(Error::UnknownLevel(i)),
        }
        levels.sort_by(f64::total_cmp);
        Ok(())
    }
}

/// Keeps view windows and contour overlays consistent.
#[derive(Debug, Clone, Default)]
pub struct ViewSync {
    /// Limits the last propagation wrote into each follower view.
    pushed: Vec<Option<Limits>>,
    levels: Vec<f64>,
    source: Option<usize>,
}

impl ViewSync {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contour levels, ascending.
    #[must_use]
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// View the contours were computed on.
    #[must_use]
    pub fn contour_source(&self) -> Option<usize> {
        self.source
    }

    /// Apply new limits to `source` and carry them through world
    /// coordinates to every other view.
    ///
    /// A follower reporting back the exact window it was given is an echo
    /// of this propagation, not a pan: it is ignored so the views cannot
    /// bounce limits between each other.
    ///
    /// Returns the reference-view limits, or `None` for an echo.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn on_pan_zoom(&mut self, views: &mut [View], source: usize, limits: Limits) -> Result<Option<Limits>> {
        let src = views.get_mut(source).ok_or(Error::UnknownView(source))?;
        let echo = self
            .pushed
            .get(source)
            .copied()
            .flatten()
            .is_some_and(|p| same_window(&p, &limits));
        if echo {
            debug!("ignoring pan/zoom echoed back by view {source}");
            return Ok(None);
        }
        src.limits = limits;
        let world = src.transform().pixels_to_world(&limits.corners());

        self.pushed.clear();
        self.pushed.resize(views.len(), None);
        for (i, v) in views.iter_mut().enumerate() {
            if i == source {
                continue;
            }
            let corners = v.transform().worlds_to_pixel(&world);
            v.limits = Limits::enclosing(&corners);
            v.mark_dirty();
            self.pushed[i] = Some(v.limits);
        }
        Ok(views.first().map(|v| v.limits))
    }

    /// Trace contours on the source view's image and project the same paths
    /// into every other view.
    ///
    /// # Errors
    /// Returns [`Error::UnknownView`] for a bad index.
    pub fn on_contour_levels_changed(&mut self, views: &mut [View], source: usize, levels: &[f64]) -> Result<()> {
        let src = views.get_mut(source).ok_or(Error::UnknownView(source))?;
        let mut levels: Vec<f64> = levels.iter().copied().filter(|l| l.is_finite()).collect();
        levels.sort_by(f64::total_cmp);
        levels.dedup();

        let lines = contour::trace(src.image(), src.nx(), src.ny(), &levels);
        let world = contour::to_world(&lines, src.transform());
        debug!(
            "{} contour paths at {} levels on {}",
            lines.len(),
            levels.len(),
            src.name
        );
        src.contours = lines;
        src.contours_visible = true;
        src.mark_dirty();

        for (i, v) in views.iter_mut().enumerate() {
            if i == source {
                continue;
            }
            v.contours = contour::to_pixel(&world, v.transform());
            v.contours_visible = true;
            v.mark_dirty();
        }
        self.levels = levels;
        self.source = Some(source);
        Ok(())
    }

    /// Project the current contours into a view added later.
    pub fn replay_onto_view(&self, views: &[View], target: &mut View) {
        let Some(src) = self.source.and_then(|s| views.get(s)) else {
            return;
        };
        let world = contour::to_world(&src.contours, src.transform());
        target.contours = contour::to_pixel(&world, target.transform());
        target.contours_visible = src.contours_visible;
    }

    /// Remove contours from every view.
    pub fn clear_contours(&mut self, views: &mut [View]) {
        for v in views.iter_mut() {
            if !v.contours.is_empty() {
                v.contours.clear();
                v.mark_dirty();
            }
        }
        self.levels.clear();
        self.source = None;
    }

    /// Flip contour visibility in every view. Returns the new state.
    pub fn toggle_contours(&self, views: &mut [View]) -> bool {
        let visible = !views.iter().any(|v| v.contours_visible && !v.contours.is_empty());
        for v in views.iter_mut() {
            v.contours_visible = visible;
            v.mark_dirty();
        }
        visible
    }
}

fn same_window(a: &Limits, b: &Limits) -> bool {
    const EPS: f64 = 1e-9;
    (a.x.0 - b.x.0).abs() <= EPS
        && (a.x.1 - b.x.1).abs() <= EPS
        && (a.y.0 - b.y.0).abs() <= EPS
        && (a.y.1 - b.y.1).abs() <= EPS
}

/// Scale a window about its centre; `factor < 1` zooms in.
#[must_use]
pub fn zoom_about_center(limits: Limits, factor: f64) -> Limits {
    let (cx, cy) = limits.center();
    let hx = (limits.x.1 - limits.x.0) * 0.5 * factor;
    let hy = (limits.y.1 - limits.y.0) * 0.5 * factor;
    Limits {
        x: (cx - hx, cx + hx),
        y: (cy - hy, cy + hy),
    }
}

/// Contour levels at the median plus 1, 2, 3, 5 and 10 σ, kept below the
/// image maximum.
#[must_use]
pub fn default_levels(image: &[f64]) -> Vec<f64> {
    let Some((_, sigma)) = finite_mean_std(image) else {
        return Vec::new();
    };
    let Some(max) = finite_max(image) else {
        return Vec::new();
    };
    let median = nanmedian(image.iter().copied().filter(|v| v.is_finite()));
    DEFAULT_SIGMAS
        .iter()
        .map(|k| median + k * sigma)
        .filter(|&level| level < max)
        .collect()
}

/// Contours for one view, if any are shown.
#[must_use]
pub fn visible_contours(view: &View) -> &[ContourLine] {
    if view.contours_visible {
        &view.contours
    } else {
        &[]
    }
}
