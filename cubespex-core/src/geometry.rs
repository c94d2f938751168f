//! Pixel-space aperture shapes and geometric helpers.

use std::f64::consts::PI;

use crate::roi::RoiKind;

/// A point in pixel coordinates.
pub type Point = (f64, f64);

/// An aperture outline in one view's pixel space.
///
/// Sizes are full extents (side, width, height) except for circles, which
/// carry their radius. Angles are in degrees, counter-clockwise from +x.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelShape {
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

impl PixelShape {
    /// Shape kind.
    #[must_use]
    pub fn kind(&self) -> RoiKind {
        match self {
            PixelShape::Square { .. } => RoiKind::Square,
            PixelShape::Rectangle { .. } => RoiKind::Rectangle,
            PixelShape::Circle { .. } => RoiKind::Circle,
            PixelShape::Ellipse { .. } => RoiKind::Ellipse,
            PixelShape::Polygon { .. } => RoiKind::Polygon,
        }
    }

    /// Build a shape from a press-drag-release box, as the drawing selectors do.
    ///
    /// Squares and circles use the smaller box side. The shape is centred on
    /// the box in every case.
    #[must_use]
    pub fn from_drag(kind: RoiKind, start: Point, end: Point) -> Option<Self> {
        let center = ((start.0 + end.0) * 0.5, (start.1 + end.1) * 0.5);
        let width = (end.0 - start.0).abs();
        let height = (end.1 - start.1).abs();
        let side = width.min(height);
        match kind {
            RoiKind::Square => Some(PixelShape::Square {
                center,
                size: side,
                angle: 0.0,
            }),
            RoiKind::Rectangle => Some(PixelShape::Rectangle {
                center,
                width,
                height,
                angle: 0.0,
            }),
            RoiKind::Circle => Some(PixelShape::Circle {
                center,
                radius: side * 0.5,
            }),
            RoiKind::Ellipse => Some(PixelShape::Ellipse {
                center,
                width,
                height,
                angle: 0.0,
            }),
            RoiKind::Polygon => None,
        }
    }

    /// Centre of the shape (vertex mean for polygons).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn center(&self) -> Point {
        match self {
            PixelShape::Square { center, .. }
            | PixelShape::Rectangle { center, .. }
            | PixelShape::Circle { center, .. }
            | PixelShape::Ellipse { center, .. } => *center,
            PixelShape::Polygon { vertices } => {
                if vertices.is_empty() {
                    return (0.0, 0.0);
                }
                let n = vertices.len() as f64;
                let (sx, sy) = vertices
                    .iter()
                    .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
                (sx / n, sy / n)
            }
        }
    }

    /// Half extents along the local axes and rotation, for box-like shapes.
    #[must_use]
    pub fn local_frame(&self) -> Option<(Point, f64, f64, f64)> {
        match *self {
            PixelShape::Square {
                center,
                size,
                angle,
            } => Some((center, size * 0.5, size * 0.5, angle)),
            PixelShape::Rectangle {
                center,
                width,
                height,
                angle,
            }
            | PixelShape::Ellipse {
                center,
                width,
                height,
                angle,
            } => Some((center, width * 0.5, height * 0.5, angle)),
            PixelShape::Circle { center, radius } => Some((center, radius, radius, 0.0)),
            PixelShape::Polygon { .. } => None,
        }
    }

    /// Whether a pixel position lies inside the shape.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        match self {
            PixelShape::Square { .. } | PixelShape::Rectangle { .. } => {
                let Some((center, hw, hh, angle)) = self.local_frame() else {
                    return false;
                };
                let (lx, ly) = to_local(point, center, angle);
                lx.abs() <= hw && ly.abs() <= hh
            }
            PixelShape::Circle { center, radius } => {
                let dx = point.0 - center.0;
                let dy = point.1 - center.1;
                dx * dx + dy * dy <= radius * radius
            }
            PixelShape::Ellipse { .. } => {
                let Some((center, hw, hh, angle)) = self.local_frame() else {
                    return false;
                };
                if hw <= 0.0 || hh <= 0.0 {
                    return false;
                }
                let (lx, ly) = to_local(point, center, angle);
                (lx / hw).powi(2) + (ly / hh).powi(2) <= 1.0
            }
            PixelShape::Polygon { vertices } => point_in_polygon(point, vertices),
        }
    }

    /// Move the shape by `(dx, dy)` pixels.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            PixelShape::Square { center, .. }
            | PixelShape::Rectangle { center, .. }
            | PixelShape::Circle { center, .. }
            | PixelShape::Ellipse { center, .. } => {
                center.0 += dx;
                center.1 += dy;
            }
            PixelShape::Polygon { vertices } => {
                for (x, y) in vertices {
                    *x += dx;
                    *y += dy;
                }
            }
        }
    }

    /// Closed outline for rendering and containment of curved shapes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn outline(&self, segments: usize) -> Vec<Point> {
        match self {
            PixelShape::Square { .. } | PixelShape::Rectangle { .. } => {
                let Some((center, hw, hh, angle)) = self.local_frame() else {
                    return Vec::new();
                };
                [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
                    .iter()
                    .map(|&p| from_local(p, center, angle))
                    .collect()
            }
            PixelShape::Circle { .. } | PixelShape::Ellipse { .. } => {
                let Some((center, hw, hh, angle)) = self.local_frame() else {
                    return Vec::new();
                };
                let n = segments.max(8);
                (0..n)
                    .map(|i| {
                        let t = 2.0 * PI * i as f64 / n as f64;
                        from_local((hw * t.cos(), hh * t.sin()), center, angle)
                    })
                    .collect()
            }
            PixelShape::Polygon { vertices } => vertices.clone(),
        }
    }

    /// Axis-aligned bounding box `(min_x, max_x, min_y, max_y)`.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let points = self.outline(64);
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in &points {
            min_x = min_x.min(*x);
            max_x = max_x.max(*x);
            min_y = min_y.min(*y);
            max_y = max_y.max(*y);
        }
        if !min_x.is_finite() || !min_y.is_finite() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            (min_x, max_x, min_y, max_y)
        }
    }

    /// Area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            PixelShape::Square { size, .. } => size * size,
            PixelShape::Rectangle { width, height, .. } => width * height,
            PixelShape::Circle { radius, .. } => PI * radius * radius,
            PixelShape::Ellipse { width, height, .. } => PI * width * height * 0.25,
            PixelShape::Polygon { vertices } => polygon_area2(vertices).abs() * 0.5,
        }
    }

    /// Edit handle positions: corners and edge midpoints for boxes,
    /// axis ends for ellipses, vertices for polygons.
    #[must_use]
    pub fn handle_points(&self) -> Vec<Point> {
        match self {
            PixelShape::Polygon { vertices } => vertices.clone(),
            PixelShape::Square { .. } | PixelShape::Rectangle { .. } => {
                let Some((center, hw, hh, angle)) = self.local_frame() else {
                    return Vec::new();
                };
                [
                    (-hw, -hh),
                    (0.0, -hh),
                    (hw, -hh),
                    (hw, 0.0),
                    (hw, hh),
                    (0.0, hh),
                    (-hw, hh),
                    (-hw, 0.0),
                ]
                .iter()
                .map(|&p| from_local(p, center, angle))
                .collect()
            }
            PixelShape::Circle { .. } | PixelShape::Ellipse { .. } => {
                let Some((center, hw, hh, angle)) = self.local_frame() else {
                    return Vec::new();
                };
                [(hw, 0.0), (0.0, hh), (-hw, 0.0), (0.0, -hh)]
                    .iter()
                    .map(|&p| from_local(p, center, angle))
                    .collect()
            }
        }
    }

    /// Largest pixel distance between this shape and `other`, comparing
    /// centres, extents and vertices. Infinite if the kinds differ.
    #[must_use]
    pub fn max_deviation(&self, other: &PixelShape) -> f64 {
        if self.kind() != other.kind() {
            return f64::INFINITY;
        }
        if let (PixelShape::Polygon { vertices: a }, PixelShape::Polygon { vertices: b }) =
            (self, other)
        {
            if a.len() != b.len() {
                return f64::INFINITY;
            }
            return a
                .iter()
                .zip(b)
                .map(|(p, q)| (p.0 - q.0).hypot(p.1 - q.1))
                .fold(0.0, f64::max);
        }
        match (self.local_frame(), other.local_frame()) {
            (Some((ca, wa, ha, aa)), Some((cb, wb, hb, ab))) => {
                let angle_diff = ((aa - ab + 180.0).rem_euclid(360.0) - 180.0).abs();
                let angle_px = angle_diff.to_radians() * wa.max(ha);
                (ca.0 - cb.0)
                    .hypot(ca.1 - cb.1)
                    .max((wa - wb).abs())
                    .max((ha - hb).abs())
                    .max(angle_px)
            }
            _ => f64::INFINITY,
        }
    }
}

/// Rotate `point` into a frame centred at `center` and rotated by `angle` degrees.
#[must_use]
pub fn to_local(point: Point, center: Point, angle: f64) -> Point {
    let (s, c) = angle.to_radians().sin_cos();
    let dx = point.0 - center.0;
    let dy = point.1 - center.1;
    (c * dx + s * dy, -s * dx + c * dy)
}

/// Inverse of [`to_local`].
#[must_use]
pub fn from_local(local: Point, center: Point, angle: f64) -> Point {
    let (s, c) = angle.to_radians().sin_cos();
    (
        center.0 + c * local.0 - s * local.1,
        center.1 + s * local.0 + c * local.1,
    )
}

/// Rotate a displacement vector into a frame rotated by `angle` degrees.
#[must_use]
pub fn rotate_vector(dx: f64, dy: f64, angle: f64) -> Point {
    to_local((dx, dy), (0.0, 0.0), angle)
}

/// Even-odd point in polygon test.
#[must_use]
pub fn point_in_polygon(point: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        let intersects = ((yi > point.1) != (yj > point.1))
            && (point.0 < (xj - xi) * (point.1 - yi) / (yj - yi) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from `point` to the segment `a`–`b`.
#[must_use]
pub fn distance_point_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let abx = b.0 - a.0;
    let aby = b.1 - a.1;
    let ab_len_sq = abx * abx + aby * aby;
    if ab_len_sq <= f64::EPSILON {
        return (point.0 - a.0).hypot(point.1 - a.1);
    }
    let t = (((point.0 - a.0) * abx + (point.1 - a.1) * aby) / ab_len_sq).clamp(0.0, 1.0);
    (point.0 - (a.0 + abx * t)).hypot(point.1 - (a.1 + aby * t))
}

/// Twice the signed polygon area (positive for counter-clockwise vertices).
#[must_use]
pub fn polygon_area2(vertices: &[Point]) -> f64 {
    let mut area = 0.0;
    for i in 0..vertices.len() {
        let (x1, y1) = vertices[i];
        let (x2, y2) = vertices[(i + 1) % vertices.len()];
        area += x1 * y2 - x2 * y1;
    }
    area
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rotated_rectangle_contains() {
        let rect = PixelShape::Rectangle {
            center: (10.0, 10.0),
            width: 10.0,
            height: 2.0,
            angle: 90.0,
        };
        assert!(rect.contains((10.0, 14.0)));
        assert!(!rect.contains((14.0, 10.0)));
    }

    #[test]
    fn test_ellipse_contains() {
        let ellipse = PixelShape::Ellipse {
            center: (0.0, 0.0),
            width: 8.0,
            height: 4.0,
            angle: 0.0,
        };
        assert!(ellipse.contains((3.9, 0.0)));
        assert!(!ellipse.contains((0.0, 2.5)));
        assert!(ellipse.contains((0.0, 1.9)));
    }

    #[test]
    fn test_polygon_contains_and_area() {
        let square = PixelShape::Polygon {
            vertices: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)],
        };
        assert!(square.contains((2.0, 2.0)));
        assert!(!square.contains((5.0, 2.0)));
        assert_eq!(square.area(), 16.0);
        assert_eq!(square.center(), (2.0, 2.0));
    }

    #[test]
    fn test_from_drag() {
        let circle = PixelShape::from_drag(RoiKind::Circle, (0.0, 0.0), (10.0, 6.0)).unwrap();
        assert_eq!(
            circle,
            PixelShape::Circle {
                center: (5.0, 3.0),
                radius: 3.0
            }
        );
        assert!(PixelShape::from_drag(RoiKind::Polygon, (0.0, 0.0), (1.0, 1.0)).is_none());
    }

    #[test]
    fn test_local_round_trip() {
        let p = from_local((3.0, -1.0), (5.0, 5.0), 37.0);
        let back = to_local(p, (5.0, 5.0), 37.0);
        assert_abs_diff_eq!(back.0, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(back.1, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_translate() {
        let mut poly = PixelShape::Polygon {
            vertices: vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)],
        };
        poly.translate(2.0, 3.0);
        assert_eq!(poly.handle_points()[1], (3.0, 3.0));
    }

    #[test]
    fn test_distance_to_segment() {
        assert_abs_diff_eq!(
            distance_point_to_segment((5.0, 3.0), (0.0, 0.0), (10.0, 0.0)),
            3.0
        );
        assert_abs_diff_eq!(
            distance_point_to_segment((-4.0, 3.0), (0.0, 0.0), (10.0, 0.0)),
            5.0
        );
    }

    #[test]
    fn test_max_deviation() {
        let a = PixelShape::Circle {
            center: (0.0, 0.0),
            radius: 5.0,
        };
        let b = PixelShape::Circle {
            center: (0.0, 0.5),
            radius: 5.2,
        };
        assert_abs_diff_eq!(a.max_deviation(&b), 0.5, epsilon = 1e-12);
        let c = PixelShape::Square {
            center: (0.0, 0.0),
            size: 1.0,
            angle: 0.0,
        };
        assert!(a.max_deviation(&c).is_infinite());
    }
}
