//! World-space aperture model.
//!
//! A [`WorldShape`] is the canonical description of one aperture. Pixel
//! geometry in any view is derived from it with [`WorldShape::to_pixel`] and
//! written back with [`WorldShape::from_pixel`] through the view that was
//! edited.

use std::fmt;

use crate::error::{Error, Result};
use crate::geometry::{Point, PixelShape};
use crate::wcs::{CoordinateTransform, ARCSEC_PER_DEG};

/// Dense aperture index. Ids shift down when a lower id is removed.
pub type RoiId = usize;

/// Aperture shape kind. Immutable for the lifetime of an aperture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoiKind {
    Square,
    #[default]
    Rectangle,
    Circle,
    Ellipse,
    Polygon,
}

impl RoiKind {
    /// All kinds in toolbar order.
    pub const ALL: [RoiKind; 5] = [
        RoiKind::Square,
        RoiKind::Rectangle,
        RoiKind::Circle,
        RoiKind::Ellipse,
        RoiKind::Polygon,
    ];
}

impl fmt::Display for RoiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoiKind::Square => "Square",
            RoiKind::Rectangle => "Rectangle",
            RoiKind::Circle => "Circle",
            RoiKind::Ellipse => "Ellipse",
            RoiKind::Polygon => "Polygon",
        };
        f.write_str(name)
    }
}

/// Aperture geometry in world coordinates.
///
/// Centres and vertices are `(lon, lat)` in degrees, sizes are in arcsec
/// (full side/width/height, radius for circles) and angles are the sky
/// direction of the shape's local x-axis in degrees, measured from east
/// towards north.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorldShape {
    Square {
        center: Point,
        size: f64,
        angle: f64,
    },
    Rectangle {
        center: Point,
        width: f64,
        height: f64,
        angle: f64,
    },
    Circle {
        center: Point,
        radius: f64,
    },
    Ellipse {
        center: Point,
        width: f64,
        height: f64,
        angle: f64,
    },
    Polygon {
        vertices: Vec<Point>,
    },
}

/// One exporter-facing header entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeaderCard {
    pub key: &'static str,
    pub value: CardValue,
    pub comment: &'static str,
}

/// Header card value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CardValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for CardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardValue::Text(s) => write!(f, "'{s}'"),
            CardValue::Number(v) => write!(f, "{v}"),
        }
    }
}

impl WorldShape {
    /// Shape kind.
    #[must_use]
    pub fn kind(&self) -> RoiKind {
        match self {
            WorldShape::Square { .. } => RoiKind::Square,
            WorldShape::Rectangle { .. } => RoiKind::Rectangle,
            WorldShape::Circle { .. } => RoiKind::Circle,
            WorldShape::Ellipse { .. } => RoiKind::Ellipse,
            WorldShape::Polygon { .. } => RoiKind::Polygon,
        }
    }

    /// World centre; vertex mean for polygons.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn center(&self) -> Point {
        match self {
            WorldShape::Square { center, .. }
            | WorldShape::Rectangle { center, .. }
            | WorldShape::Circle { center, .. }
            | WorldShape::Ellipse { center, .. } => *center,
            WorldShape::Polygon { vertices } => {
                let Some(&(lon0, _)) = vertices.first() else {
                    return (0.0, 0.0);
                };
                let n = vertices.len() as f64;
                let (dlon, lat) = vertices.iter().fold((0.0, 0.0), |(a, b), &(lon, lat)| {
                    (a + wrap_lon_delta(lon - lon0), b + lat)
                });
                ((lon0 + dlon / n).rem_euclid(360.0), lat / n)
            }
        }
    }

    /// Project into a view's pixel space.
    ///
    /// Sizes are divided by the view's pixel scale so the aperture keeps the
    /// same sky extent in every view.
    #[must_use]
    pub fn to_pixel(&self, transform: &dyn CoordinateTransform) -> PixelShape {
        let scale = transform.pixel_scale();
        match self {
            WorldShape::Square {
                center,
                size,
                angle,
            } => PixelShape::Square {
                center: transform.world_to_pixel(center.0, center.1),
                size: size / scale,
                angle: world_angle_to_pixel(transform, *center, *angle),
            },
            WorldShape::Rectangle {
                center,
                width,
                height,
                angle,
            } => PixelShape::Rectangle {
                center: transform.world_to_pixel(center.0, center.1),
                width: width / scale,
                height: height / scale,
                angle: world_angle_to_pixel(transform, *center, *angle),
            },
            WorldShape::Circle { center, radius } => PixelShape::Circle {
                center: transform.world_to_pixel(center.0, center.1),
                radius: radius / scale,
            },
            WorldShape::Ellipse {
                center,
                width,
                height,
                angle,
            } => PixelShape::Ellipse {
                center: transform.world_to_pixel(center.0, center.1),
                width: width / scale,
                height: height / scale,
                angle: world_angle_to_pixel(transform, *center, *angle),
            },
            WorldShape::Polygon { vertices } => PixelShape::Polygon {
                vertices: transform.worlds_to_pixel(vertices),
            },
        }
    }

    /// Lift pixel geometry from one view into world coordinates.
    #[must_use]
    pub fn from_pixel(shape: &PixelShape, transform: &dyn CoordinateTransform) -> Self {
        let scale = transform.pixel_scale();
        match shape {
            PixelShape::Square {
                center,
                size,
                angle,
            } => WorldShape::Square {
                center: transform.pixel_to_world(center.0, center.1),
                size: size * scale,
                angle: pixel_angle_to_world(transform, *center, *angle),
            },
            PixelShape::Rectangle {
                center,
                width,
                height,
                angle,
            } => WorldShape::Rectangle {
                center: transform.pixel_to_world(center.0, center.1),
                width: width * scale,
                height: height * scale,
                angle: pixel_angle_to_world(transform, *center, *angle),
            },
            PixelShape::Circle { center, radius } => WorldShape::Circle {
                center: transform.pixel_to_world(center.0, center.1),
                radius: radius * scale,
            },
            PixelShape::Ellipse {
                center,
                width,
                height,
                angle,
            } => WorldShape::Ellipse {
                center: transform.pixel_to_world(center.0, center.1),
                width: width * scale,
                height: height * scale,
                angle: pixel_angle_to_world(transform, *center, *angle),
            },
            PixelShape::Polygon { vertices } => WorldShape::Polygon {
                vertices: transform.pixels_to_world(vertices),
            },
        }
    }

    /// Sky area in square arcsec.
    ///
    /// Polygons are measured on the local tangent plane at their centre.
    #[must_use]
    pub fn area_arcsec2(&self) -> f64 {
        use std::f64::consts::PI;
        match self {
            WorldShape::Square { size, .. } => size * size,
            WorldShape::Rectangle { width, height, .. } => width * height,
            WorldShape::Circle { radius, .. } => PI * radius * radius,
            WorldShape::Ellipse { width, height, .. } => PI * width * height * 0.25,
            WorldShape::Polygon { vertices } => {
                let (lon0, lat0) = self.center();
                let cos_lat = lat0.to_radians().cos();
                let plane: Vec<Point> = vertices
                    .iter()
                    .map(|&(lon, lat)| {
                        (
                            wrap_lon_delta(lon - lon0) * cos_lat * ARCSEC_PER_DEG,
                            (lat - lat0) * ARCSEC_PER_DEG,
                        )
                    })
                    .collect();
                crate::geometry::polygon_area2(&plane).abs() * 0.5
            }
        }
    }

    /// Header entries describing the aperture: type, centre, dimensions,
    /// rotation and area.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_header_cards(&self) -> Vec<HeaderCard> {
        let (lon, lat) = self.center();
        let mut cards = vec![
            HeaderCard {
                key: "APERTURE",
                value: CardValue::Text(self.kind().to_string()),
                comment: "aperture type",
            },
            HeaderCard {
                key: "APCENTX",
                value: CardValue::Number(lon),
                comment: "aperture centre longitude [deg]",
            },
            HeaderCard {
                key: "APCENTY",
                value: CardValue::Number(lat),
                comment: "aperture centre latitude [deg]",
            },
        ];
        let number = |key, value, comment| HeaderCard {
            key,
            value: CardValue::Number(value),
            comment,
        };
        match self {
            WorldShape::Square { size, angle, .. } => {
                cards.push(number("APSIZE", *size, "aperture side [arcsec]"));
                cards.push(number("APANGLE", *angle, "aperture angle [deg]"));
            }
            WorldShape::Rectangle {
                width,
                height,
                angle,
                ..
            }
            | WorldShape::Ellipse {
                width,
                height,
                angle,
                ..
            } => {
                cards.push(number("APWIDTH", *width, "aperture width [arcsec]"));
                cards.push(number("APHEIGHT", *height, "aperture height [arcsec]"));
                cards.push(number("APANGLE", *angle, "aperture angle [deg]"));
            }
            WorldShape::Circle { radius, .. } => {
                cards.push(number("APRADIUS", *radius, "aperture radius [arcsec]"));
            }
            WorldShape::Polygon { vertices } => {
                cards.push(number(
                    "APNVERT",
                    vertices.len() as f64,
                    "number of polygon vertices",
                ));
            }
        }
        cards.push(number(
            "APAREA",
            self.area_arcsec2(),
            "aperture area [arcsec2]",
        ));
        cards
    }
}

/// Wrap a longitude difference into `[-180, 180)`.
fn wrap_lon_delta(d: f64) -> f64 {
    (d + 180.0).rem_euclid(360.0) - 180.0
}

fn normalize_angle(a: f64) -> f64 {
    let a = a.rem_euclid(360.0);
    if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// Sky direction of a pixel-frame angle, sampled one pixel from `center`.
fn pixel_angle_to_world(transform: &dyn CoordinateTransform, center: Point, angle: f64) -> f64 {
    let (s, c) = angle.to_radians().sin_cos();
    let (lon0, lat0) = transform.pixel_to_world(center.0, center.1);
    let (lon1, lat1) = transform.pixel_to_world(center.0 + c, center.1 + s);
    let east = wrap_lon_delta(lon1 - lon0) * lat0.to_radians().cos();
    let north = lat1 - lat0;
    normalize_angle(north.atan2(east).to_degrees())
}

/// Pixel-frame direction of a sky angle, sampled one pixel from `center`.
fn world_angle_to_pixel(transform: &dyn CoordinateTransform, center: Point, angle: f64) -> f64 {
    let step = transform.pixel_scale() / ARCSEC_PER_DEG;
    let (s, c) = angle.to_radians().sin_cos();
    let (lon0, lat0) = center;
    let lon1 = lon0 + step * c / lat0.to_radians().cos();
    let lat1 = lat0 + step * s;
    let p0 = transform.world_to_pixel(lon0, lat0);
    let p1 = transform.world_to_pixel(lon1, lat1);
    normalize_angle((p1.1 - p0.1).atan2(p1.0 - p0.0).to_degrees())
}

/// Ordered collection of canonical apertures keyed by dense id.
#[derive(Debug, Clone, Default)]
pub struct RoiStore {
    shapes: Vec<WorldShape>,
}

impl RoiStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an aperture; its id is the next free index.
    pub fn create(&mut self, shape: WorldShape) -> RoiId {
        self.shapes.push(shape);
        let id = self.shapes.len() - 1;
        log::info!("created aperture {id} ({})", self.shapes[id].kind());
        id
    }

    /// Canonical geometry of an aperture.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoi`] if `id` is out of range.
    pub fn get(&self, id: RoiId) -> Result<&WorldShape> {
        self.shapes.get(id).ok_or(Error::UnknownRoi(id))
    }

    /// Replace the full parameter set of an aperture.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoi`] for a bad id and [`Error::KindMismatch`]
    /// when `shape` has a different kind; the stored shape is untouched.
    pub fn update(&mut self, id: RoiId, shape: WorldShape) -> Result<()> {
        let slot = self.shapes.get_mut(id).ok_or(Error::UnknownRoi(id))?;
        if slot.kind() != shape.kind() {
            return Err(Error::KindMismatch {
                id,
                expected: slot.kind(),
                found: shape.kind(),
            });
        }
        *slot = shape;
        Ok(())
    }

    /// Remove an aperture. Later ids shift down by one.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoi`] if `id` is out of range.
    pub fn remove(&mut self, id: RoiId) -> Result<WorldShape> {
        if id >= self.shapes.len() {
            return Err(Error::UnknownRoi(id));
        }
        let shape = self.shapes.remove(id);
        log::info!("removed aperture {id}, {} remaining", self.shapes.len());
        Ok(shape)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterate `(id, shape)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (RoiId, &WorldShape)> {
        self.shapes.iter().enumerate()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wcs::Wcs;
    use approx::assert_abs_diff_eq;

    fn circle(radius: f64) -> WorldShape {
        WorldShape::Circle {
            center: (10.0, 20.0),
            radius,
        }
    }

    #[test]
    fn test_create_get_update() {
        let mut store = RoiStore::new();
        let id = store.create(circle(5.0));
        assert_eq!(id, 0);
        store.update(id, circle(8.0)).unwrap();
        assert_eq!(store.get(id).unwrap(), &circle(8.0));
    }

    #[test]
    fn test_update_rejects_kind_change() {
        let mut store = RoiStore::new();
        let id = store.create(circle(5.0));
        let square = WorldShape::Square {
            center: (10.0, 20.0),
            size: 3.0,
            angle: 0.0,
        };
        let err = store.update(id, square).unwrap_err();
        assert_eq!(
            err,
            Error::KindMismatch {
                id: 0,
                expected: RoiKind::Circle,
                found: RoiKind::Square
            }
        );
        assert_eq!(store.get(id).unwrap(), &circle(5.0));
    }

    #[test]
    fn test_remove_compacts_ids() {
        let mut store = RoiStore::new();
        store.create(circle(1.0));
        store.create(circle(2.0));
        store.create(circle(3.0));
        store.remove(1).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap(), &circle(3.0));
        assert_eq!(store.get(2), Err(Error::UnknownRoi(2)));
        assert!(store.remove(5).is_err());
    }

    #[test]
    fn test_projection_scales_sizes() {
        let wcs = Wcs::north_up((50.0, 50.0), (10.0, 20.0), 0.5);
        let shape = WorldShape::Rectangle {
            center: (10.0, 20.0),
            width: 6.0,
            height: 2.0,
            angle: 0.0,
        };
        match shape.to_pixel(&wcs) {
            PixelShape::Rectangle {
                center,
                width,
                height,
                ..
            } => {
                assert_abs_diff_eq!(center.0, 50.0, epsilon = 1e-9);
                assert_abs_diff_eq!(width, 12.0, epsilon = 1e-9);
                assert_abs_diff_eq!(height, 4.0, epsilon = 1e-9);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_angle_round_trip() {
        let wcs = Wcs::from_cdelt((40.0, 40.0), (150.0, 2.0), (-2.0e-4, 2.0e-4), 25.0);
        let pixel = PixelShape::Ellipse {
            center: (35.0, 42.0),
            width: 10.0,
            height: 4.0,
            angle: 30.0,
        };
        let world = WorldShape::from_pixel(&pixel, &wcs);
        let back = world.to_pixel(&wcs);
        assert!(pixel.max_deviation(&back) < 1e-3);
    }

    #[test]
    fn test_east_left_flips_angle() {
        let wcs = Wcs::north_up((0.0, 0.0), (30.0, 0.0), 1.0);
        let pixel = PixelShape::Square {
            center: (0.0, 0.0),
            size: 4.0,
            angle: 0.0,
        };
        match WorldShape::from_pixel(&pixel, &wcs) {
            WorldShape::Square { angle, .. } => assert_abs_diff_eq!(angle.abs(), 180.0, epsilon = 1e-6),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_polygon_area() {
        let d = 10.0 / ARCSEC_PER_DEG;
        let poly = WorldShape::Polygon {
            vertices: vec![(0.0, 0.0), (d, 0.0), (d, d), (0.0, d)],
        };
        assert_abs_diff_eq!(poly.area_arcsec2(), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_polygon_center_wraps_zero() {
        let poly = WorldShape::Polygon {
            vertices: vec![(359.9, 0.0), (0.1, 0.0)],
        };
        let (lon, _) = poly.center();
        assert!(lon < 1e-9 || lon > 360.0 - 1e-9);
    }

    #[test]
    fn test_header_cards() {
        let cards = circle(5.0).to_header_cards();
        assert_eq!(cards[0].value, CardValue::Text("Circle".into()));
        let radius = cards.iter().find(|c| c.key == "APRADIUS").unwrap();
        assert_eq!(radius.value, CardValue::Number(5.0));
        assert!(cards.iter().any(|c| c.key == "APAREA"));
    }
}
