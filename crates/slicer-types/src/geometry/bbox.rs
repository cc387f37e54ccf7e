use serde::{Deserialize, Serialize};

use crate::coords::coord;
use crate::geometry::point::{Point2, Vec3f};

/// An axis-aligned box in 2D scaled-coordinate space. `min == max` (a
/// degenerate point box) is legal; `min > max` in any axis is never legal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BBox2 {
    pub fn new(min: Point2, max: Point2) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y, "BBox2::new requires min <= max");
        Self { min, max }
    }

    pub fn from_points(points: &[Point2]) -> Option<Self> {
        let first = *points.first()?;
        let mut bbox = Self { min: first, max: first };
        for p in &points[1..] {
            bbox.expand(p);
        }
        Some(bbox)
    }

    pub fn expand(&mut self, p: &Point2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = Point2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Point2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if min.x <= max.x && min.y <= max.y {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn contains_point(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

/// An axis-aligned box in 3D float space (millimeters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox3 {
    pub min: Vec3f,
    pub max: Vec3f,
}

impl BBox3 {
    pub fn new(min: Vec3f, max: Vec3f) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "BBox3::new requires min <= max"
        );
        Self { min, max }
    }

    pub fn from_points(points: &[Vec3f]) -> Option<Self> {
        let first = *points.first()?;
        let mut bbox = Self { min: first, max: first };
        for p in &points[1..] {
            bbox.expand(p);
        }
        Some(bbox)
    }

    pub fn expand(&mut self, p: &Vec3f) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec3f::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3f::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = Vec3f::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.min.z.max(other.min.z),
        );
        let max = Vec3f::new(
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
            self.max.z.min(other.max.z),
        );
        if min.x <= max.x && min.y <= max.y && min.z <= max.z {
            Some(Self { min, max })
        } else {
            None
        }
    }

    /// Does this box straddle or touch the horizontal plane `Z = z`?
    pub fn straddles_z(&self, z: f32) -> bool {
        self.min.z <= z && z <= self.max.z
    }

    pub fn centroid(&self) -> Vec3f {
        self.min.lerp(&self.max, 0.5)
    }

    pub fn surface_area(&self) -> f32 {
        let d = self.max.sub(&self.min);
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }
}

/// Convenience: centroid of a scaled 2D polygon's bounding box, used by
/// containment tests that need an interior-ish seed point.
pub fn bbox2_center(bbox: &BBox2) -> Point2 {
    let x: coord = bbox.min.x + (bbox.max.x - bbox.min.x) / 2;
    let y: coord = bbox.min.y + (bbox.max.y - bbox.min.y) / 2;
    Point2::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_point_box_is_valid() {
        let p = Point2::new(5, 5);
        let bbox = BBox2::new(p, p);
        assert!(bbox.is_valid());
    }

    #[test]
    fn union_and_intersection() {
        let a = BBox2::new(Point2::new(0, 0), Point2::new(10, 10));
        let b = BBox2::new(Point2::new(5, 5), Point2::new(15, 15));
        let u = a.union(&b);
        assert_eq!(u.min, Point2::new(0, 0));
        assert_eq!(u.max, Point2::new(15, 15));

        let i = a.intersection(&b).unwrap();
        assert_eq!(i.min, Point2::new(5, 5));
        assert_eq!(i.max, Point2::new(10, 10));
    }

    #[test]
    fn disjoint_boxes_have_no_intersection() {
        let a = BBox2::new(Point2::new(0, 0), Point2::new(1, 1));
        let b = BBox2::new(Point2::new(5, 5), Point2::new(6, 6));
        assert!(a.intersection(&b).is_none());
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn straddles_z_inclusive() {
        let bbox = BBox3::new(Vec3f::new(0.0, 0.0, -1.0), Vec3f::new(1.0, 1.0, 1.0));
        assert!(bbox.straddles_z(-1.0));
        assert!(bbox.straddles_z(0.0));
        assert!(bbox.straddles_z(1.0));
        assert!(!bbox.straddles_z(1.5));
    }
}
