// THEORY:
// Shape measurements computed directly from a contour polygon.
//
// - `Moments`: zeroth and first order spatial moments via Green's theorem over the
//   polygon edges. `m00` is the signed area; its sign depends on traversal direction
//   and cancels out in the centroid ratio.
// - `convex_hull`: Andrew's monotone chain.
// - `min_area_rect`: rotating calipers over the hull edges. The rectangle's angle is
//   normalized into `[0, 90)` degrees and `width` is always the extent along that
//   angle, so an axis-aligned box reports its x-extent as width and y-extent as height.
//
// Degenerate shapes (single points, straight lines) are valid inputs: they produce a
// zero area and a zero-height rectangle. Callers decide what to do with them.

use crate::core_modules::contour::Point;
use std::f64::consts::FRAC_PI_2;

/// Spatial moments up to first order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// Computes the moments of the closed polygon through `points`.
    pub fn of_polygon(points: &[Point]) -> Self {
        let n = points.len();
        if n < 3 {
            return Self::default();
        }
        let (mut a00, mut a10, mut a01) = (0.0f64, 0.0f64, 0.0f64);
        for i in 0..n {
            let p = points[(i + n - 1) % n];
            let q = points[i];
            let (x0, y0, x1, y1) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
            let cross = x0 * y1 - x1 * y0;
            a00 += cross;
            a10 += cross * (x0 + x1);
            a01 += cross * (y0 + y1);
        }
        Self {
            m00: a00 / 2.0,
            m10: a10 / 6.0,
            m01: a01 / 6.0,
        }
    }

    /// Unsigned enclosed area.
    pub fn area(&self) -> f64 {
        self.m00.abs()
    }

    /// First moments divided by the zeroth moment.
    ///
    /// Only meaningful for a non-degenerate shape. The blob extractor guarantees this
    /// by applying its strictly-positive area filter before asking for a centroid.
    pub fn centroid(&self) -> (f64, f64) {
        debug_assert!(self.m00 != 0.0, "centroid of a zero-area shape");
        (self.m10 / self.m00, self.m01 / self.m00)
    }
}

/// Signed polygon area (positive for counter-clockwise in a y-up frame).
pub fn signed_area(points: &[Point]) -> f64 {
    Moments::of_polygon(points).m00
}

/// A rectangle of arbitrary orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f64, f64),
    /// Extent along `angle`.
    pub width: f64,
    /// Extent perpendicular to `angle`.
    pub height: f64,
    /// Orientation in degrees, within `[0, 90)`.
    pub angle: f64,
}

impl RotatedRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// `width / height`, or `None` when the rectangle has no height.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height > f64::EPSILON).then(|| self.width / self.height)
    }
}

fn cross(o: Point, a: Point, b: Point) -> i64 {
    (a.x as i64 - o.x as i64) * (b.y as i64 - o.y as i64) - (a.y as i64 - o.y as i64) * (b.x as i64 - o.x as i64)
}

/// Convex hull without collinear points, in monotone-chain order.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted: Vec<Point> = points.to_vec();
    sorted.sort_by_key(|p| (p.x, p.y));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// The minimum-area rectangle enclosing `points`.
pub fn min_area_rect(points: &[Point]) -> RotatedRect {
    let hull = convex_hull(points);
    match hull.len() {
        0 => RotatedRect {
            center: (0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        },
        1 => RotatedRect {
            center: (hull[0].x as f64, hull[0].y as f64),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        },
        n => {
            let mut best: Option<RotatedRect> = None;
            for i in 0..n {
                let a = hull[i];
                let b = hull[(i + 1) % n];
                let raw_angle = ((b.y - a.y) as f64).atan2((b.x - a.x) as f64);
                let candidate = bounding_box_at(&hull, normalize_angle(raw_angle));
                if best.is_none_or(|current| candidate.area() < current.area() - 1e-9) {
                    best = Some(candidate);
                }
            }
            best.unwrap_or(RotatedRect {
                center: (hull[0].x as f64, hull[0].y as f64),
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            })
        }
    }
}

/// Folds an edge angle into `[0, pi/2)`.
fn normalize_angle(theta: f64) -> f64 {
    let folded = theta.rem_euclid(FRAC_PI_2);
    if FRAC_PI_2 - folded < 1e-9 { 0.0 } else { folded }
}

/// The box around `hull` whose sides run along `theta` and its perpendicular.
fn bounding_box_at(hull: &[Point], theta: f64) -> RotatedRect {
    let (sin, cos) = theta.sin_cos();
    let (mut u_min, mut u_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut v_min, mut v_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in hull {
        let (x, y) = (p.x as f64, p.y as f64);
        let u = x * cos + y * sin;
        let v = -x * sin + y * cos;
        u_min = u_min.min(u);
        u_max = u_max.max(u);
        v_min = v_min.min(v);
        v_max = v_max.max(v);
    }
    let (uc, vc) = ((u_min + u_max) / 2.0, (v_min + v_max) / 2.0);
    RotatedRect {
        center: (uc * cos - vc * sin, uc * sin + vc * cos),
        width: u_max - u_min,
        height: v_max - v_min,
        angle: theta.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(i32, i32)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn rectangle_moments() {
        let rect = pts(&[(10, 20), (10, 39), (29, 39), (29, 20)]);
        let m = Moments::of_polygon(&rect);
        assert_eq!(m.area(), 19.0 * 19.0);
        let (cx, cy) = m.centroid();
        assert!((cx - 19.5).abs() < 1e-9);
        assert!((cy - 29.5).abs() < 1e-9);
    }

    #[test]
    fn orientation_flips_sign_but_not_centroid() {
        let ccw = pts(&[(0, 0), (4, 0), (4, 2), (0, 2)]);
        let cw: Vec<Point> = ccw.iter().rev().copied().collect();
        assert_eq!(signed_area(&ccw), -signed_area(&cw));
        assert_eq!(Moments::of_polygon(&ccw).centroid(), Moments::of_polygon(&cw).centroid());
    }

    #[test]
    fn degenerate_polygons_have_zero_area() {
        assert_eq!(Moments::of_polygon(&pts(&[(3, 3)])).m00, 0.0);
        assert_eq!(Moments::of_polygon(&pts(&[(0, 0), (5, 0)])).m00, 0.0);
        assert_eq!(Moments::of_polygon(&pts(&[(0, 0), (5, 0), (10, 0), (5, 0)])).m00, 0.0);
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let hull = convex_hull(&pts(&[(0, 0), (2, 0), (4, 0), (4, 4), (0, 4), (2, 2), (1, 3)]));
        assert_eq!(hull.len(), 4);
    }

    #[test]
    fn axis_aligned_rect_reports_x_extent_as_width() {
        let wide = min_area_rect(&pts(&[(10, 20), (50, 20), (50, 30), (10, 30)]));
        assert!((wide.width - 40.0).abs() < 1e-9);
        assert!((wide.height - 10.0).abs() < 1e-9);
        assert!((wide.center.0 - 30.0).abs() < 1e-9 && (wide.center.1 - 25.0).abs() < 1e-9);
        assert_eq!(wide.aspect_ratio(), Some(4.0));

        let tall = min_area_rect(&pts(&[(10, 20), (20, 20), (20, 60), (10, 60)]));
        assert!((tall.aspect_ratio().unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn rotated_square_is_found_at_forty_five_degrees() {
        let diamond = pts(&[(10, 0), (20, 10), (10, 20), (0, 10)]);
        let rect = min_area_rect(&diamond);
        assert!((rect.area() - 200.0).abs() < 1e-6);
        assert!((rect.angle - 45.0).abs() < 1e-6);
        assert!((rect.aspect_ratio().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn horizontal_line_has_no_aspect_ratio() {
        let line = min_area_rect(&pts(&[(0, 5), (12, 5)]));
        assert_eq!(line.height, 0.0);
        assert_eq!(line.aspect_ratio(), None);
        assert_eq!(min_area_rect(&pts(&[(4, 4)])).aspect_ratio(), None);
        assert_eq!(min_area_rect(&[]).aspect_ratio(), None);
    }
}
