//! Image views: one transform, one image plane, one interactor per aperture.

use std::fmt;

use crate::contour::ContourLine;
use crate::cube::Band;
use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::interactor::Interactor;
use crate::roi::RoiId;
use crate::wcs::{CoordinateTransform, Wcs};

/// Visible pixel window of a view.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl Limits {
    /// Window showing a whole `nx × ny` image (pixel centres at integers).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn full(nx: usize, ny: usize) -> Self {
        Self {
            x: (-0.5, nx as f64 - 0.5),
            y: (-0.5, ny as f64 - 0.5),
        }
    }

    /// The four corners, counter-clockwise from `(x0, y0)`.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            (self.x.0, self.y.0),
            (self.x.1, self.y.0),
            (self.x.1, self.y.1),
            (self.x.0, self.y.1),
        ]
    }

    /// Smallest window enclosing `points`.
    #[must_use]
    pub fn enclosing(points: &[Point]) -> Self {
        let mut x = (f64::INFINITY, f64::NEG_INFINITY);
        let mut y = (f64::INFINITY, f64::NEG_INFINITY);
        for &(px, py) in points {
            x = (x.0.min(px), x.1.max(px));
            y = (y.0.min(py), y.1.max(py));
        }
        Self { x, y }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        ((self.x.0 + self.x.1) * 0.5, (self.y.0 + self.y.1) * 0.5)
    }

    /// Pixel index ranges whose centres fall inside the window, clipped to
    /// an `nx × ny` grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_ranges(&self, nx: usize, ny: usize) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let clip = |(lo, hi): (f64, f64), n: usize| {
            let start = lo.min(hi).ceil().max(0.0) as usize;
            let end = ((lo.max(hi).floor() + 1.0).max(0.0) as usize).min(n);
            start.min(end)..end
        };
        (clip(self.x, nx), clip(self.y, ny))
    }
}

/// A comparison image handed over by a loader: pixels plus their WCS.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub name: String,
    /// Row-major `ny × nx` pixels.
    pub image: Vec<f64>,
    pub nx: usize,
    pub ny: usize,
    pub wcs: Wcs,
}

/// One image display.
pub struct View {
    pub name: String,
    /// Cube band this view shows; `None` for external comparison images.
    pub band: Option<Band>,
    transform: Box<dyn CoordinateTransform>,
    image: Vec<f64>,
    nx: usize,
    ny: usize,
    pub limits: Limits,
    interactors: Vec<Interactor>,
    pub contours: Vec<ContourLine>,
    pub contours_visible: bool,
    dirty: bool,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("band", &self.band)
            .field("nx", &self.nx)
            .field("ny", &self.ny)
            .field("limits", &self.limits)
            .field("interactors", &self.interactors.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl View {
    /// Create a view over a row-major `ny × nx` image.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `image` does not hold `nx * ny` pixels.
    pub fn new(
        name: impl Into<String>,
        image: Vec<f64>,
        (nx, ny): (usize, usize),
        transform: Box<dyn CoordinateTransform>,
    ) -> Result<Self> {
        if image.len() != nx * ny {
            return Err(Error::ShapeMismatch {
                name: "image",
                expected: nx * ny,
                found: image.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            band: None,
            transform,
            image,
            nx,
            ny,
            limits: Limits::full(nx, ny),
            interactors: Vec::new(),
            contours: Vec::new(),
            contours_visible: true,
            dirty: true,
        })
    }

    /// View of a loaded comparison image.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the payload's pixel count is wrong.
    pub fn from_payload(payload: ImagePayload) -> Result<Self> {
        let ImagePayload {
            name,
            image,
            nx,
            ny,
            wcs,
        } = payload;
        Self::new(name, image, (nx, ny), Box::new(wcs))
    }

    #[must_use]
    pub fn with_band(mut self, band: Band) -> Self {
        self.band = Some(band);
        self
    }

    #[must_use]
    pub fn transform(&self) -> &dyn CoordinateTransform {
        self.transform.as_ref()
    }

    /// Swap the transform and image, e.g. after the cube was cropped.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `image` does not hold `nx * ny` pixels.
    pub fn rebind(
        &mut self,
        image: Vec<f64>,
        (nx, ny): (usize, usize),
        transform: Box<dyn CoordinateTransform>,
    ) -> Result<()> {
        if image.len() != nx * ny {
            return Err(Error::ShapeMismatch {
                name: "image",
                expected: nx * ny,
                found: image.len(),
            });
        }
        self.image = image;
        self.nx = nx;
        self.ny = ny;
        self.transform = transform;
        self.limits = Limits::full(nx, ny);
        self.dirty = true;
        Ok(())
    }

    /// Replace the pixels, keeping the shape.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] on a size change.
    pub fn set_image(&mut self, image: Vec<f64>) -> Result<()> {
        if image.len() != self.image.len() {
            return Err(Error::ShapeMismatch {
                name: "image",
                expected: self.image.len(),
                found: image.len(),
            });
        }
        self.image = image;
        self.dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn image(&self) -> &[f64] {
        &self.image
    }

    #[must_use]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[must_use]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[must_use]
    pub fn interactors(&self) -> &[Interactor] {
        &self.interactors
    }

    /// # Errors
    /// Returns [`Error::UnknownRoi`] if the view has no interactor for `id`.
    pub fn interactor(&self, id: RoiId) -> Result<&Interactor> {
        self.interactors.get(id).ok_or(Error::UnknownRoi(id))
    }

    /// # Errors
    /// Returns [`Error::UnknownRoi`] if the view has no interactor for `id`.
    pub fn interactor_mut(&mut self, id: RoiId) -> Result<&mut Interactor> {
        self.interactors.get_mut(id).ok_or(Error::UnknownRoi(id))
    }

    pub(crate) fn interactors_mut(&mut self) -> &mut [Interactor] {
        &mut self.interactors
    }

    pub(crate) fn push_interactor(&mut self, interactor: Interactor) {
        self.interactors.push(interactor);
        self.dirty = true;
    }

    pub(crate) fn remove_interactor(&mut self, id: RoiId) -> Option<Interactor> {
        if id < self.interactors.len() {
            self.dirty = true;
            Some(self.interactors.remove(id))
        } else {
            None
        }
    }

    pub(crate) fn clear_interactors(&mut self) {
        self.interactors.clear();
        self.dirty = true;
    }

    /// Topmost interactor under `point`.
    #[must_use]
    pub fn interactor_at(&self, point: Point) -> Option<RoiId> {
        self.interactors.iter().rposition(|i| i.hits(point))
    }

    /// Pixel value at a position, if inside the image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn value_at(&self, point: Point) -> Option<f64> {
        let x = point.0.round();
        let y = point.1.round();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        (x < self.nx && y < self.ny).then(|| self.image[y * self.nx + x])
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the redraw flag, returning its previous value.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelShape;

    fn view() -> View {
        View::new(
            "Flux",
            (0..12).map(f64::from).collect(),
            (4, 3),
            Box::new(Wcs::north_up((0.0, 0.0), (10.0, 20.0), 1.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_new_checks_shape() {
        let err = View::new(
            "x",
            vec![0.0; 5],
            (2, 2),
            Box::new(Wcs::north_up((0.0, 0.0), (0.0, 0.0), 1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { found: 5, .. }));
    }

    #[test]
    fn test_dirty_flag() {
        let mut v = view();
        assert!(v.take_dirty());
        assert!(!v.is_dirty());
        v.set_image(vec![1.0; 12]).unwrap();
        assert!(v.take_dirty());
    }

    #[test]
    fn test_value_at() {
        let v = view();
        assert_eq!(v.value_at((1.2, 2.4)), Some(9.0));
        assert_eq!(v.value_at((4.0, 0.0)), None);
        assert_eq!(v.value_at((-1.0, 0.0)), None);
    }

    #[test]
    fn test_topmost_interactor_wins() {
        let mut v = view();
        let shape = PixelShape::Circle {
            center: (1.0, 1.0),
            radius: 2.0,
        };
        v.push_interactor(Interactor::new(shape.clone()));
        v.push_interactor(Interactor::new(shape));
        assert_eq!(v.interactor_at((1.0, 1.0)), Some(1));
        assert_eq!(v.interactor_at((9.0, 9.0)), None);
    }

    #[test]
    fn test_limits() {
        let full = Limits::full(4, 3);
        assert_eq!(full.pixel_ranges(4, 3), (0..4, 0..3));
        let zoomed = Limits {
            x: (0.6, 2.4),
            y: (-3.0, 0.2),
        };
        assert_eq!(zoomed.pixel_ranges(4, 3), (1..3, 0..1));
        let enclosing = Limits::enclosing(&[(1.0, 5.0), (-2.0, 3.0)]);
        assert_eq!(enclosing.x, (-2.0, 1.0));
        assert_eq!(enclosing.y, (3.0, 5.0));
    }
}
