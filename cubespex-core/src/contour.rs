//! Marching-squares contour tracing.

use std::collections::HashMap;

use crate::geometry::Point;
use crate::wcs::CoordinateTransform;

/// One traced iso-line in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLine {
    pub level: f64,
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Cell edge crossed by an iso-line: key and interpolated position.
type Crossing = (usize, Point);

/// Trace the iso-lines of a row-major `ny × nx` image at each level.
///
/// Cells with a NaN corner are skipped; saddles are resolved with the cell
/// mean.
#[must_use]
pub fn trace(image: &[f64], nx: usize, ny: usize, levels: &[f64]) -> Vec<ContourLine> {
    if nx < 2 || ny < 2 || image.len() < nx * ny {
        return Vec::new();
    }
    levels
        .iter()
        .flat_map(|&level| join(level, &segments(image, nx, ny, level)))
        .collect()
}

#[allow(clippy::cast_precision_loss, clippy::many_single_char_names)]
fn segments(image: &[f64], nx: usize, ny: usize, level: f64) -> Vec<(Crossing, Crossing)> {
    let stride = nx + 1;
    let h_key = |x: usize, y: usize| (y * stride + x) * 2;
    let v_key = |x: usize, y: usize| (y * stride + x) * 2 + 1;
    let lerp = |a: f64, b: f64| {
        let d = b - a;
        if d == 0.0 {
            0.5
        } else {
            ((level - a) / d).clamp(0.0, 1.0)
        }
    };

    let mut out = Vec::new();
    for y in 0..ny - 1 {
        for x in 0..nx - 1 {
            let v0 = image[y * nx + x];
            let v1 = image[y * nx + x + 1];
            let v2 = image[(y + 1) * nx + x + 1];
            let v3 = image[(y + 1) * nx + x];
            if v0.is_nan() || v1.is_nan() || v2.is_nan() || v3.is_nan() {
                continue;
            }
            let case = usize::from(v0 >= level)
                | usize::from(v1 >= level) << 1
                | usize::from(v2 >= level) << 2
                | usize::from(v3 >= level) << 3;
            if case == 0 || case == 15 {
                continue;
            }
            let (fx, fy) = (x as f64, y as f64);
            let e0 = (h_key(x, y), (fx + lerp(v0, v1), fy));
            let e1 = (v_key(x + 1, y), (fx + 1.0, fy + lerp(v1, v2)));
            let e2 = (h_key(x, y + 1), (fx + lerp(v3, v2), fy + 1.0));
            let e3 = (v_key(x, y), (fx, fy + lerp(v0, v3)));
            let center_high = (v0 + v1 + v2 + v3) * 0.25 >= level;
            match case {
                1 | 14 => out.push((e3, e0)),
                2 | 13 => out.push((e0, e1)),
                3 | 12 => out.push((e3, e1)),
                4 | 11 => out.push((e1, e2)),
                6 | 9 => out.push((e0, e2)),
                7 | 8 => out.push((e3, e2)),
                5 => {
                    if center_high {
                        out.push((e0, e1));
                        out.push((e2, e3));
                    } else {
                        out.push((e3, e0));
                        out.push((e1, e2));
                    }
                }
                10 => {
                    if center_high {
                        out.push((e3, e0));
                        out.push((e1, e2));
                    } else {
                        out.push((e0, e1));
                        out.push((e2, e3));
                    }
                }
                _ => {}
            }
        }
    }
    out
}

/// Chain cell segments sharing an edge into polylines.
fn join(level: f64, segments: &[(Crossing, Crossing)]) -> Vec<ContourLine> {
    let mut by_edge: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, ((ka, _), (kb, _))) in segments.iter().enumerate() {
        by_edge.entry(*ka).or_default().push(i);
        by_edge.entry(*kb).or_default().push(i);
    }
    let mut used = vec![false; segments.len()];

    // Follow unused segments from `key`, appending their far ends.
    let walk = |start: usize, mut key: usize, used: &mut [bool]| {
        let mut points = Vec::new();
        let mut last = start;
        loop {
            let next = by_edge
                .get(&key)
                .and_then(|ids| ids.iter().copied().find(|&j| j != last && !used[j]));
            let Some(j) = next else { break };
            used[j] = true;
            let ((ka, pa), (kb, pb)) = segments[j];
            let (far_key, far_point) = if ka == key { (kb, pb) } else { (ka, pa) };
            points.push(far_point);
            key = far_key;
            last = j;
        }
        (points, key)
    };

    let mut lines = Vec::new();
    for i in 0..segments.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let ((ka, pa), (kb, pb)) = segments[i];
        let (forward, end_key) = walk(i, kb, &mut used);
        let closed = end_key == ka && !forward.is_empty();
        let mut points = Vec::new();
        if !closed {
            let (mut backward, _) = walk(i, ka, &mut used);
            backward.reverse();
            points.extend(backward);
        }
        points.push(pa);
        points.push(pb);
        points.extend(forward);
        if closed {
            // last point repeats the start
            points.pop();
        }
        lines.push(ContourLine {
            level,
            points,
            closed,
        });
    }
    lines
}

/// Lift pixel contour paths into world coordinates.
#[must_use]
pub fn to_world(lines: &[ContourLine], from: &dyn CoordinateTransform) -> Vec<ContourLine> {
    lines
        .iter()
        .map(|line| ContourLine {
            level: line.level,
            points: from.pixels_to_world(&line.points),
            closed: line.closed,
        })
        .collect()
}

/// Project world contour paths into a view's pixel space.
#[must_use]
pub fn to_pixel(lines: &[ContourLine], to: &dyn CoordinateTransform) -> Vec<ContourLine> {
    lines
        .iter()
        .map(|line| ContourLine {
            level: line.level,
            points: to.worlds_to_pixel(&line.points),
            closed: line.closed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wcs::Wcs;
    use approx::assert_abs_diff_eq;

    fn bump(n: usize) -> Vec<f64> {
        let c = (n as f64 - 1.0) / 2.0;
        let mut img = Vec::with_capacity(n * n);
        for y in 0..n {
            for x in 0..n {
                let r2 = (x as f64 - c).powi(2) + (y as f64 - c).powi(2);
                img.push((-r2 / 8.0).exp());
            }
        }
        img
    }

    #[test]
    fn test_single_peak_gives_closed_ring() {
        let img = bump(11);
        let lines = trace(&img, 11, 11, &[0.5]);
        assert_eq!(lines.len(), 1);
        let ring = &lines[0];
        assert!(ring.closed);
        assert!(ring.points.len() >= 8);
        // radius where exp(-r²/8) = 0.5
        let expected = (8.0 * 2.0_f64.ln()).sqrt();
        for &(x, y) in &ring.points {
            let r = (x - 5.0).hypot(y - 5.0);
            assert!((r - expected).abs() < 0.3, "r = {r}");
        }
    }

    #[test]
    fn test_open_line_across_ramp() {
        let nx = 5;
        let img: Vec<f64> = (0..nx * 4).map(|i| (i % nx) as f64).collect();
        let lines = trace(&img, nx, 4, &[1.5]);
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].closed);
        assert_eq!(lines[0].points.len(), 4);
        for &(x, _) in &lines[0].points {
            assert_abs_diff_eq!(x, 1.5);
        }
    }

    #[test]
    fn test_nan_cells_and_flat_images() {
        let img = vec![f64::NAN; 16];
        assert!(trace(&img, 4, 4, &[0.0]).is_empty());
        let flat = vec![1.0; 16];
        assert!(trace(&flat, 4, 4, &[2.0]).is_empty());
    }

    #[test]
    fn test_project_between_scales() {
        let a = Wcs::north_up((10.0, 10.0), (10.0, 20.0), 1.0);
        let b = Wcs::north_up((20.0, 20.0), (10.0, 20.0), 0.5);
        let line = ContourLine {
            level: 1.0,
            points: vec![(10.0, 10.0), (12.0, 10.0)],
            closed: false,
        };
        let out = to_pixel(&to_world(&[line], &a), &b);
        assert_abs_diff_eq!(out[0].points[0].0, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[0].points[1].0, 24.0, epsilon = 1e-6);
    }
}
