use serde::{Deserialize, Serialize};

use crate::coords::coord;

/// A point in the XY plane at one layer's elevation, in scaled `coord` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2 {
    pub x: coord,
    pub y: coord,
}

impl Point2 {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub fn new(x: coord, y: coord) -> Self {
        Self { x, y }
    }

    pub fn distance_squared_to(&self, other: &Self) -> i128 {
        let dx = (self.x - other.x) as i128;
        let dy = (self.y - other.y) as i128;
        dx * dx + dy * dy
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.distance_squared_to(other) as f64).sqrt()
    }
}

/// A vertex or direction in 3D, float precision, unscaled (millimeters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3f {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Linear interpolation between `self` and `other` at parameter `t`.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self::new(
            self.x + t * (other.x - self.x),
            self.y + t * (other.y - self.y),
            self.z + t * (other.z - self.z),
        )
    }

    /// Project onto the XY plane as a `Point2` scaled by `SCALE`.
    pub fn to_point2(&self) -> Point2 {
        Point2::new(
            crate::coords::mm_to_coord(self.x as f64),
            crate::coords::mm_to_coord(self.y as f64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point2_distance() {
        let a = Point2::new(0, 0);
        let b = Point2::new(3_000_000, 4_000_000);
        assert!((a.distance_to(&b) - 5_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn vec3f_cross_and_lerp() {
        let x = Vec3f::new(1.0, 0.0, 0.0);
        let y = Vec3f::new(0.0, 1.0, 0.0);
        let z = x.cross(&y);
        assert!((z.z - 1.0).abs() < 1e-6);

        let a = Vec3f::new(0.0, 0.0, 0.0);
        let b = Vec3f::new(10.0, 0.0, 0.0);
        let mid = a.lerp(&b, 0.5);
        assert!((mid.x - 5.0).abs() < 1e-6);
    }
}
