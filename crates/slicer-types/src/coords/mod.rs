//! Fixed-point scaled coordinates and the robust 2D predicates built on them.
//!
//! All internal 2D geometry uses [`coord`]; floating-point millimeters only
//! appear at the boundary via [`mm_to_coord`] / [`coord_to_mm`].

pub mod predicates;
pub mod plane;

/// A signed, scaled integer coordinate. One unit is `1 / SCALE` millimeters.
pub type coord = i64;

/// Process-wide millimeter-to-`coord` scale factor. Not a runtime parameter.
pub const SCALE: f64 = 1_000_000.0;

/// Convert a millimeter quantity to a scaled `coord`, rounding to nearest.
pub fn mm_to_coord(mm: f64) -> coord {
    (mm * SCALE).round() as coord
}

/// Convert a scaled `coord` back to millimeters.
pub fn coord_to_mm(c: coord) -> f64 {
    c as f64 / SCALE
}
