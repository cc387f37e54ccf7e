//! Exact 2D orientation and segment-intersection predicates over [`coord`].
//!
//! Every multiplication of two `coord` values is widened to `i128` before
//! it happens, so no predicate can overflow for inputs within the `coord`
//! range. No floating-point value ever participates in a decision that
//! affects topology.

use crate::coords::coord;
use crate::geometry::point::Point2;
use crate::geometry::polygon::Polygon;

/// Sign of the cross product `(b - a) x (c - a)`.
///
/// Positive: `a, b, c` turn counter-clockwise. Negative: clockwise. Zero:
/// exactly collinear.
pub fn orient2d(a: Point2, b: Point2, c: Point2) -> i32 {
    let abx = (b.x - a.x) as i128;
    let aby = (b.y - a.y) as i128;
    let acx = (c.x - a.x) as i128;
    let acy = (c.y - a.y) as i128;
    let cross = abx * acy - aby * acx;
    cross.signum() as i32
}

/// The classification of a segment/segment intersection query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// The segments do not intersect and are not collinear.
    None,
    /// A single intersection point, whether from a proper crossing or a
    /// touching endpoint.
    Point(Point2),
    /// The segments are collinear and overlap along an interval; the two
    /// endpoints of that interval are given in no particular order.
    Segment(Point2, Point2),
    /// The segments lie on the same line but do not overlap.
    Collinear,
}

/// Classify the intersection of finite segments `a1a2` and `b1b2`.
///
/// Symmetric under swapping the two segments, and under reversing either
/// segment's endpoints, up to which endpoint of a `Segment` result is
/// reported first.
pub fn segment_intersect(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Intersection {
    let d1 = orient2d(b1, b2, a1);
    let d2 = orient2d(b1, b2, a2);
    let d3 = orient2d(a1, a2, b1);
    let d4 = orient2d(a1, a2, b2);

    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
        return Intersection::Point(proper_intersection_point(a1, a2, b1, b2));
    }

    // Degenerate cases: one or more endpoints are collinear with the other
    // segment. Collect every "touching" configuration and resolve below.
    if d1 == 0 && on_segment(b1, b2, a1) {
        return endpoint_or_collinear(a1, a2, b1, b2);
    }
    if d2 == 0 && on_segment(b1, b2, a2) {
        return endpoint_or_collinear(a1, a2, b1, b2);
    }
    if d3 == 0 && on_segment(a1, a2, b1) {
        return endpoint_or_collinear(a1, a2, b1, b2);
    }
    if d4 == 0 && on_segment(a1, a2, b2) {
        return endpoint_or_collinear(a1, a2, b1, b2);
    }

    Intersection::None
}

/// Shared resolution for any configuration where at least one endpoint
/// touches the other segment. Distinguishes a clean point touch from a
/// collinear overlap interval.
fn endpoint_or_collinear(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Intersection {
    let collinear = orient2d(a1, a2, b1) == 0 && orient2d(a1, a2, b2) == 0;

    if !collinear {
        // Exactly one endpoint lies on the other segment: report it.
        for p in [a1, a2] {
            if on_segment(b1, b2, p) {
                return Intersection::Point(p);
            }
        }
        for p in [b1, b2] {
            if on_segment(a1, a2, p) {
                return Intersection::Point(p);
            }
        }
        return Intersection::None;
    }

    // Collinear: project onto the dominant axis and intersect the two
    // 1D intervals.
    let use_x = (a2.x - a1.x).abs() >= (a2.y - a1.y).abs();
    let coord_of = |p: Point2| if use_x { p.x } else { p.y };

    let (lo_a, hi_a) = order(coord_of(a1), coord_of(a2));
    let (lo_b, hi_b) = order(coord_of(b1), coord_of(b2));
    let lo = lo_a.max(lo_b);
    let hi = hi_a.min(hi_b);

    if lo > hi {
        return Intersection::Collinear;
    }

    let point_at = |target: coord| -> Point2 {
        // Pick whichever endpoint of segment a matches target if exact,
        // else interpolate along a's line.
        if coord_of(a1) == target {
            return a1;
        }
        if coord_of(a2) == target {
            return a2;
        }
        let t_num = (target - coord_of(a1)) as i128;
        let t_den = (coord_of(a2) - coord_of(a1)) as i128;
        let x = a1.x as i128 + (a2.x - a1.x) as i128 * t_num / t_den;
        let y = a1.y as i128 + (a2.y - a1.y) as i128 * t_num / t_den;
        Point2::new(x as coord, y as coord)
    };

    let p_lo = point_at(lo);
    let p_hi = point_at(hi);

    if lo == hi {
        Intersection::Point(p_lo)
    } else {
        Intersection::Segment(p_lo, p_hi)
    }
}

fn order(a: coord, b: coord) -> (coord, coord) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Assumes `p` is collinear with `ab`; checks it lies within the segment's
/// bounding box (equivalent to "on the finite segment" for collinear points).
fn on_segment(a: Point2, b: Point2, p: Point2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Exact intersection point of two properly crossing segments, computed
/// with widened integer arithmetic and rounded back to `coord` on output.
fn proper_intersection_point(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Point2 {
    let (x1, y1) = (a1.x as i128, a1.y as i128);
    let (x2, y2) = (a2.x as i128, a2.y as i128);
    let (x3, y3) = (b1.x as i128, b1.y as i128);
    let (x4, y4) = (b2.x as i128, b2.y as i128);

    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    debug_assert!(denom != 0, "proper_intersection_point called on parallel segments");

    let a = x1 * y2 - y1 * x2;
    let b = x3 * y4 - y3 * x4;

    let px_num = a * (x3 - x4) - (x1 - x2) * b;
    let py_num = a * (y3 - y4) - (y1 - y2) * b;

    let px = round_div(px_num, denom);
    let py = round_div(py_num, denom);

    Point2::new(px as coord, py as coord)
}

fn round_div(num: i128, den: i128) -> i128 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    }
}

/// Winding-number point-in-polygon test using [`orient2d`] on every edge.
///
/// A point exactly on an edge returns a deterministic (implementation
/// defined) side — tests may assert consistency only, never a specific
/// answer for the on-edge case.
pub fn point_in_polygon_robust(p: Point2, poly: &Polygon) -> bool {
    let pts = poly.points();
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let mut winding: i32 = 0;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        if a.y <= p.y {
            if b.y > p.y && orient2d(a, b, p) > 0 {
                winding += 1;
            }
        } else if b.y <= p.y && orient2d(a, b, p) < 0 {
            winding -= 1;
        }
    }
    winding != 0
}

/// Exact perpendicular distance from `p` to the finite segment `ab`,
/// clamped to the nearer endpoint when the projection falls outside `ab`.
pub fn point_line_distance(p: Point2, a: Point2, b: Point2) -> coord {
    let abx = (b.x - a.x) as i128;
    let aby = (b.y - a.y) as i128;
    let len_sq = abx * abx + aby * aby;

    if len_sq == 0 {
        return (p.distance_squared_to(&a) as f64).sqrt().round() as coord;
    }

    let apx = (p.x - a.x) as i128;
    let apy = (p.y - a.y) as i128;
    let t_num = apx * abx + apy * aby;

    let (closest_x, closest_y) = if t_num <= 0 {
        (a.x as i128, a.y as i128)
    } else if t_num >= len_sq {
        (b.x as i128, b.y as i128)
    } else {
        let t = t_num as f64 / len_sq as f64;
        (
            a.x as i128 + (abx as f64 * t).round() as i128,
            a.y as i128 + (aby as f64 * t).round() as i128,
        )
    };

    let dx = p.x as i128 - closest_x;
    let dy = p.y as i128 - closest_y;
    let dist_sq = (dx * dx + dy * dy) as f64;
    dist_sq.sqrt().round() as coord
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient2d_symmetry() {
        let a = Point2::new(0, 0);
        let b = Point2::new(10, 0);
        let c = Point2::new(5, 5);
        assert_eq!(orient2d(a, b, c), -orient2d(a, c, b));
        assert_eq!(orient2d(a, b, c), -orient2d(b, a, c));
    }

    #[test]
    fn orient2d_collinear_is_zero() {
        let a = Point2::new(0, 0);
        let b = Point2::new(10, 0);
        let c = Point2::new(20, 0);
        assert_eq!(orient2d(a, b, c), 0);
    }

    #[test]
    fn proper_crossing_segments() {
        let a1 = Point2::new(0, 0);
        let a2 = Point2::new(10, 10);
        let b1 = Point2::new(0, 10);
        let b2 = Point2::new(10, 0);
        match segment_intersect(a1, a2, b1, b2) {
            Intersection::Point(p) => assert_eq!(p, Point2::new(5, 5)),
            other => panic!("expected Point, got {other:?}"),
        }
    }

    #[test]
    fn shared_endpoint_returns_that_point() {
        let a1 = Point2::new(0, 0);
        let a2 = Point2::new(10, 0);
        let b1 = Point2::new(10, 0);
        let b2 = Point2::new(10, 10);
        match segment_intersect(a1, a2, b1, b2) {
            Intersection::Point(p) => assert_eq!(p, Point2::new(10, 0)),
            other => panic!("expected Point, got {other:?}"),
        }
    }

    #[test]
    fn collinear_overlap_returns_interval() {
        let a1 = Point2::new(0, 0);
        let a2 = Point2::new(10, 0);
        let b1 = Point2::new(5, 0);
        let b2 = Point2::new(15, 0);
        match segment_intersect(a1, a2, b1, b2) {
            Intersection::Segment(p, q) => {
                assert_eq!(p, Point2::new(5, 0));
                assert_eq!(q, Point2::new(10, 0));
            }
            other => panic!("expected Collinear, got {other:?}"),
        }
    }

    #[test]
    fn disjoint_segments_none() {
        let a1 = Point2::new(0, 0);
        let a2 = Point2::new(1, 0);
        let b1 = Point2::new(5, 5);
        let b2 = Point2::new(6, 6);
        assert_eq!(segment_intersect(a1, a2, b1, b2), Intersection::None);
    }

    #[test]
    fn disjoint_collinear_segments_report_collinear() {
        let a1 = Point2::new(0, 0);
        let a2 = Point2::new(10, 0);
        let b1 = Point2::new(20, 0);
        let b2 = Point2::new(30, 0);
        assert_eq!(segment_intersect(a1, a2, b1, b2), Intersection::Collinear);
    }

    #[test]
    fn intersection_symmetric_under_swap() {
        let a1 = Point2::new(0, 0);
        let a2 = Point2::new(10, 10);
        let b1 = Point2::new(0, 10);
        let b2 = Point2::new(10, 0);
        assert_eq!(segment_intersect(a1, a2, b1, b2), segment_intersect(b1, b2, a1, a2));
    }

    #[test]
    fn point_line_distance_perpendicular() {
        let a = Point2::new(0, 0);
        let b = Point2::new(10_000_000, 0);
        let p = Point2::new(5_000_000, 3_000_000);
        assert_eq!(point_line_distance(p, a, b), 3_000_000);
    }

    #[test]
    fn point_line_distance_clamps_to_endpoint() {
        let a = Point2::new(0, 0);
        let b = Point2::new(10, 0);
        let p = Point2::new(-5, 0);
        assert_eq!(point_line_distance(p, a, b), 5);
    }

    #[test]
    fn point_in_square_is_inside() {
        let poly = Polygon::new(vec![
            Point2::new(0, 0),
            Point2::new(10_000_000, 0),
            Point2::new(10_000_000, 10_000_000),
            Point2::new(0, 10_000_000),
        ])
        .unwrap();
        assert!(point_in_polygon_robust(Point2::new(5_000_000, 5_000_000), &poly));
        assert!(!point_in_polygon_robust(Point2::new(-1, 5_000_000), &poly));
    }
}
