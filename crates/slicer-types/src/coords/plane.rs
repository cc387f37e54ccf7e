//! Triangle/horizontal-plane intersection, classified into the degenerate
//! cases a slicer must handle explicitly.

use serde::{Deserialize, Serialize};

use crate::geometry::point::{Point2, Vec3f};

/// `1e-6 * SCALE`, applied to the scaled vertex-height difference rather
/// than to the unscaled millimeter value (see the Open Question in
/// DESIGN.md about which domain the epsilon belongs in).
const PLANE_EPSILON_SCALED: f64 = 1e-6 * crate::coords::SCALE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriPlaneKind {
    None,
    Standard,
    VertexOnPlane,
    EdgeOnPlane,
    FaceOnPlane,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneIntersection {
    pub kind: TriPlaneKind,
    pub segments: Vec<(Point2, Point2)>,
}

fn classify_sign(v: &Vec3f, z: f32) -> i32 {
    let d_scaled = (v.z as f64 - z as f64) * crate::coords::SCALE;
    if d_scaled.abs() < PLANE_EPSILON_SCALED {
        0
    } else if d_scaled > 0.0 {
        1
    } else {
        -1
    }
}

fn crossing_point(a: &Vec3f, b: &Vec3f, z: f32) -> Point2 {
    let t = (z - a.z) / (b.z - a.z);
    a.lerp(b, t).to_point2()
}

/// Classify `tri` against the horizontal plane `Z = z` and extract its
/// cross-section segments.
pub fn triangle_plane_intersection(tri: &[Vec3f; 3], z: f32) -> PlaneIntersection {
    let signs = [classify_sign(&tri[0], z), classify_sign(&tri[1], z), classify_sign(&tri[2], z)];
    let zero_count = signs.iter().filter(|&&s| s == 0).count();

    match zero_count {
        3 => {
            let segments = vec![
                (tri[0].to_point2(), tri[1].to_point2()),
                (tri[1].to_point2(), tri[2].to_point2()),
                (tri[2].to_point2(), tri[0].to_point2()),
            ];
            PlaneIntersection { kind: TriPlaneKind::FaceOnPlane, segments }
        }
        2 => {
            let nonzero_idx = signs.iter().position(|&s| s != 0).unwrap();
            let (i, j) = match nonzero_idx {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            PlaneIntersection {
                kind: TriPlaneKind::EdgeOnPlane,
                segments: vec![(tri[i].to_point2(), tri[j].to_point2())],
            }
        }
        1 => {
            let on_idx = signs.iter().position(|&s| s == 0).unwrap();
            let (i, j) = match on_idx {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            if signs[i] != signs[j] {
                let cross = crossing_point(&tri[i], &tri[j], z);
                PlaneIntersection {
                    kind: TriPlaneKind::VertexOnPlane,
                    segments: vec![(tri[on_idx].to_point2(), cross)],
                }
            } else {
                PlaneIntersection { kind: TriPlaneKind::VertexOnPlane, segments: vec![] }
            }
        }
        _ => {
            if signs[0] == signs[1] && signs[1] == signs[2] {
                PlaneIntersection { kind: TriPlaneKind::None, segments: vec![] }
            } else {
                // Exactly one vertex is on the minority side of the split.
                let lone = if signs[0] != signs[1] && signs[0] != signs[2] {
                    0
                } else if signs[1] != signs[0] && signs[1] != signs[2] {
                    1
                } else {
                    2
                };
                let others: Vec<usize> = (0..3).filter(|&k| k != lone).collect();
                let p0 = crossing_point(&tri[lone], &tri[others[0]], z);
                let p1 = crossing_point(&tri[lone], &tri[others[1]], z);
                PlaneIntersection { kind: TriPlaneKind::Standard, segments: vec![(p0, p1)] }
            }
        }
    }
}

/// A triangle's bounding box along Z only, used by the AABB plane query.
pub fn triangle_z_range(tri: &[Vec3f; 3]) -> (f32, f32) {
    let lo = tri[0].z.min(tri[1].z).min(tri[2].z);
    let hi = tri[0].z.max(tri[1].z).max(tri[2].z);
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32, z: f32) -> Vec3f {
        Vec3f::new(x, y, z)
    }

    #[test]
    fn standard_crossing() {
        let tri = [v(0.0, 0.0, -1.0), v(10.0, 0.0, 1.0), v(0.0, 10.0, 1.0)];
        let result = triangle_plane_intersection(&tri, 0.0);
        assert_eq!(result.kind, TriPlaneKind::Standard);
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn above_plane_is_none() {
        let tri = [v(0.0, 0.0, 1.0), v(1.0, 0.0, 2.0), v(0.0, 1.0, 3.0)];
        let result = triangle_plane_intersection(&tri, 0.0);
        assert_eq!(result.kind, TriPlaneKind::None);
        assert!(result.segments.is_empty());
    }

    #[test]
    fn edge_on_plane() {
        let tri = [v(0.0, 0.0, 0.0), v(10.0, 0.0, 0.0), v(5.0, 10.0, 5.0)];
        let result = triangle_plane_intersection(&tri, 0.0);
        assert_eq!(result.kind, TriPlaneKind::EdgeOnPlane);
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn face_on_plane() {
        let tri = [v(0.0, 0.0, 0.0), v(10.0, 0.0, 0.0), v(5.0, 10.0, 0.0)];
        let result = triangle_plane_intersection(&tri, 0.0);
        assert_eq!(result.kind, TriPlaneKind::FaceOnPlane);
        assert_eq!(result.segments.len(), 3);
    }

    #[test]
    fn vertex_on_plane_with_crossing_opposite_edge() {
        let tri = [v(0.0, 0.0, 0.0), v(10.0, 0.0, 1.0), v(10.0, 10.0, -1.0)];
        let result = triangle_plane_intersection(&tri, 0.0);
        assert_eq!(result.kind, TriPlaneKind::VertexOnPlane);
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn vertex_grazing_produces_no_segment() {
        let tri = [v(0.0, 0.0, 0.0), v(10.0, 0.0, 1.0), v(10.0, 10.0, 2.0)];
        let result = triangle_plane_intersection(&tri, 0.0);
        assert_eq!(result.kind, TriPlaneKind::VertexOnPlane);
        assert!(result.segments.is_empty());
    }
}
