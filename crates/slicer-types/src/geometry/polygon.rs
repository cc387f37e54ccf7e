use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::predicates::point_in_polygon_robust;
use crate::geometry::bbox::BBox2;
use crate::geometry::point::Point2;

/// An ordered sequence of points with implicit closure (last -> first).
/// CCW winding (positive signed area) denotes an outer contour; CW denotes
/// a hole. Consecutive duplicate points are dropped at construction and at
/// least 3 distinct points must remain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point2>,
}

impl Polygon {
    /// Build a polygon, normalizing away consecutive duplicate points
    /// (including the implicit closing edge). Returns `None` if fewer than
    /// 3 distinct points remain.
    pub fn new(points: Vec<Point2>) -> Option<Self> {
        let mut normalized: Vec<Point2> = Vec::with_capacity(points.len());
        for p in points {
            if normalized.last() != Some(&p) {
                normalized.push(p);
            }
        }
        if normalized.len() > 1 && normalized.first() == normalized.last() {
            normalized.pop();
        }
        if normalized.len() < 3 {
            return None;
        }
        Some(Self { points: normalized })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed area via the shoelace formula (exact in `i128`, returned as
    /// `f64` millimeters-squared via the caller's scale conversion).
    pub fn signed_area_scaled(&self) -> i128 {
        let n = self.points.len();
        let mut acc: i128 = 0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            acc += a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128;
        }
        acc
    }

    /// Signed area in squared millimeters.
    pub fn signed_area(&self) -> f64 {
        (self.signed_area_scaled() as f64) / 2.0 / (crate::coords::SCALE * crate::coords::SCALE)
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area_scaled() > 0
    }

    /// Reverse point order if necessary so the polygon winds CCW.
    pub fn make_ccw(&mut self) {
        if !self.is_ccw() {
            self.points.reverse();
        }
    }

    /// Reverse point order if necessary so the polygon winds CW.
    pub fn make_cw(&mut self) {
        if self.is_ccw() {
            self.points.reverse();
        }
    }

    pub fn bbox(&self) -> BBox2 {
        BBox2::from_points(&self.points).expect("polygon always has >= 3 points")
    }

    pub fn contains_point(&self, p: Point2) -> bool {
        point_in_polygon_robust(p, self)
    }

    /// Vertex centroid, used as a containment-tree seed point.
    pub fn representative_point(&self) -> Point2 {
        let n = self.points.len() as i128;
        let (sx, sy) = self.points.iter().fold((0i128, 0i128), |(sx, sy), p| {
            (sx + p.x as i128, sy + p.y as i128)
        });
        Point2::new((sx / n) as crate::coords::coord, (sy / n) as crate::coords::coord)
    }
}

/// A polygon with holes: one CCW contour and zero or more CW holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExPolygon {
    pub contour: Polygon,
    pub holes: Vec<Polygon>,
}

/// The first invariant violation found by [`ExPolygon::validate`] /
/// [`Polygon::validate`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("polygon has fewer than 3 distinct points")]
    TooFewPoints,
    #[error("contour is not wound counter-clockwise")]
    ContourNotCcw,
    #[error("hole is not wound clockwise")]
    HoleNotCw,
    #[error("hole does not lie strictly inside the contour")]
    HoleNotContained,
    #[error("two holes overlap")]
    HolesOverlap,
    #[error("contour area does not exceed the sum of hole areas")]
    AreaMismatch,
}

impl ExPolygon {
    pub fn new(contour: Polygon, holes: Vec<Polygon>) -> Self {
        Self { contour, holes }
    }

    /// Contour area minus the area of all holes, in square millimeters.
    pub fn area(&self) -> f64 {
        let hole_area: f64 = self.holes.iter().map(|h| h.signed_area().abs()).sum();
        self.contour.signed_area().abs() - hole_area
    }

    pub fn bbox(&self) -> BBox2 {
        self.contour.bbox()
    }

    /// Check every `ExPolygon` invariant, returning the first violation.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.contour.is_ccw() {
            return Err(GeometryError::ContourNotCcw);
        }
        for hole in &self.holes {
            if hole.is_ccw() {
                return Err(GeometryError::HoleNotCw);
            }
            let seed = hole.representative_point();
            if !self.contour.contains_point(seed) {
                return Err(GeometryError::HoleNotContained);
            }
        }
        for i in 0..self.holes.len() {
            for j in (i + 1)..self.holes.len() {
                if holes_overlap(&self.holes[i], &self.holes[j]) {
                    return Err(GeometryError::HolesOverlap);
                }
            }
        }
        let hole_area: f64 = self.holes.iter().map(|h| h.signed_area().abs()).sum();
        if self.contour.signed_area().abs() <= hole_area {
            return Err(GeometryError::AreaMismatch);
        }
        Ok(())
    }
}

fn holes_overlap(a: &Polygon, b: &Polygon) -> bool {
    if !a.bbox().overlaps(&b.bbox()) {
        return false;
    }
    a.contains_point(b.representative_point()) || b.contains_point(a.representative_point())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: i64, max: i64) -> Polygon {
        Polygon::new(vec![
            Point2::new(min, min),
            Point2::new(max, min),
            Point2::new(max, max),
            Point2::new(min, max),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_points_are_normalized() {
        let pts = vec![
            Point2::new(0, 0),
            Point2::new(0, 0),
            Point2::new(10, 0),
            Point2::new(10, 10),
            Point2::new(0, 10),
            Point2::new(0, 0),
        ];
        let poly = Polygon::new(pts).unwrap();
        assert_eq!(poly.len(), 4);
    }

    #[test]
    fn too_few_points_rejected() {
        assert!(Polygon::new(vec![Point2::new(0, 0), Point2::new(1, 1)]).is_none());
    }

    #[test]
    fn square_area_and_orientation() {
        let poly = square(0, 10_000_000);
        assert!(poly.is_ccw());
        assert!((poly.signed_area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn make_ccw_reverses_cw_polygon() {
        let mut poly = square(0, 10_000_000);
        poly.make_cw();
        assert!(!poly.is_ccw());
        poly.make_ccw();
        assert!(poly.is_ccw());
    }

    #[test]
    fn valid_expolygon_with_hole() {
        let mut contour = square(0, 10_000_000);
        contour.make_ccw();
        let mut hole = square(2_000_000, 8_000_000);
        hole.make_cw();
        let ex = ExPolygon::new(contour, vec![hole]);
        assert!(ex.validate().is_ok());
        assert!((ex.area() - (100.0 - 36.0)).abs() < 1e-9);
    }

    #[test]
    fn hole_outside_contour_is_rejected() {
        let mut contour = square(0, 10_000_000);
        contour.make_ccw();
        let mut hole = square(20_000_000, 28_000_000);
        hole.make_cw();
        let ex = ExPolygon::new(contour, vec![hole]);
        assert_eq!(ex.validate(), Err(GeometryError::HoleNotContained));
    }

    #[test]
    fn cw_hole_required() {
        let mut contour = square(0, 10_000_000);
        contour.make_ccw();
        let mut hole = square(2_000_000, 8_000_000);
        hole.make_ccw();
        let ex = ExPolygon::new(contour, vec![hole]);
        assert_eq!(ex.validate(), Err(GeometryError::HoleNotCw));
    }
}
