pub mod coords;
pub mod geometry;

pub use coords::predicates;
pub use coords::plane::{triangle_plane_intersection, triangle_z_range, PlaneIntersection, TriPlaneKind};
pub use coords::{coord, coord_to_mm, mm_to_coord, SCALE};
pub use geometry::bbox::{BBox2, BBox3};
pub use geometry::point::{Point2, Vec3f};
pub use geometry::polygon::{ExPolygon, GeometryError, Polygon};
