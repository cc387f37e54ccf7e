//! Bounding-volume hierarchy over mesh triangles: SAH top-down build plus
//! plane, ray, and box queries.

use tracing::{debug, instrument};

use slicer_types::{BBox3, Vec3f};

use crate::cancel::CancellationToken;
use crate::error::SliceError;
use crate::mesh::IndexedMesh;

const COST_TRAVERSAL: f32 = 1.0;
const COST_INTERSECTION: f32 = 1.0;
const SPLIT_CANDIDATES: usize = 12;
const LEAF_TARGET: usize = 6;

/// A contiguous BVH node. `primitive_count > 0` marks a leaf; an internal
/// node's two children are laid out contiguously starting at `left_child`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub min: Vec3f,
    pub max: Vec3f,
    pub left_child: u32,
    pub primitive_count: u32,
    pub primitive_offset: u32,
}

impl Node {
    fn bbox(&self) -> BBox3 {
        BBox3::new(self.min, self.max)
    }

    fn is_leaf(&self) -> bool {
        self.primitive_count > 0
    }
}

/// Diagnostic summary of a built tree's shape, for tuning `L_max`/`K`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: usize,
    pub mean_leaf_size: f64,
}

/// Bounding-volume hierarchy over a mesh's triangles, built once and
/// queried many times during slicing. Logically read-only after `build`;
/// if the underlying mesh changes, the tree must be rebuilt.
#[derive(Debug, Clone)]
pub struct AABBTree {
    nodes: Vec<Node>,
    primitive_indices: Vec<u32>,
    root: u32,
}

struct Primitive {
    index: u32,
    bbox: BBox3,
    centroid: Vec3f,
}

impl AABBTree {
    /// Build a tree over every triangle in `mesh` using a top-down,
    /// SAH-scored recursive split.
    #[instrument(skip(mesh, cancel))]
    pub fn build(mesh: &IndexedMesh, cancel: Option<&CancellationToken>) -> Result<Self, SliceError> {
        let primitives: Vec<Primitive> = mesh
            .triangles()
            .iter()
            .enumerate()
            .map(|(i, &tri)| {
                let verts = mesh.triangle_vertices(tri);
                let bbox = BBox3::from_points(&verts).unwrap_or_else(|| BBox3::new(Vec3f::ZERO, Vec3f::ZERO));
                Primitive { index: i as u32, bbox, centroid: bbox.centroid() }
            })
            .collect();

        let mut builder = Builder { primitives, nodes: Vec::new(), indices: Vec::new(), cancel };

        if builder.primitives.is_empty() {
            return Err(SliceError::InvalidInput { reason: "mesh has zero triangles".into() });
        }

        let order: Vec<usize> = (0..builder.primitives.len()).collect();
        let root = builder.build_range(order)?;

        debug!(
            triangle_count = mesh.triangle_count(),
            node_count = builder.nodes.len(),
            "AABB tree built"
        );

        Ok(Self { nodes: builder.nodes, primitive_indices: builder.indices, root: root as u32 })
    }

    pub fn stats(&self) -> TreeStats {
        let leaf_count = self.nodes.iter().filter(|n| n.is_leaf()).count();
        let mean_leaf_size = if leaf_count == 0 {
            0.0
        } else {
            self.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.primitive_count as f64).sum::<f64>()
                / leaf_count as f64
        };
        TreeStats {
            node_count: self.nodes.len(),
            leaf_count,
            max_depth: self.max_depth(self.root as usize, 0),
            mean_leaf_size,
        }
    }

    fn max_depth(&self, node_index: usize, depth: usize) -> usize {
        let node = &self.nodes[node_index];
        if node.is_leaf() {
            return depth;
        }
        let left = self.max_depth(node.left_child as usize, depth + 1);
        let right = self.max_depth(node.left_child as usize + 1, depth + 1);
        left.max(right)
    }

    /// Triangle indices whose per-triangle box straddles `Z = z`. Not
    /// deduplicated or ordered.
    pub fn plane_intersect(&self, z: f32) -> Vec<u32> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        self.plane_visit(self.root as usize, z, &mut out);
        out
    }

    fn plane_visit(&self, node_index: usize, z: f32, out: &mut Vec<u32>) {
        let node = &self.nodes[node_index];
        if node.min.z > z || node.max.z < z {
            return;
        }
        if node.is_leaf() {
            let start = node.primitive_offset as usize;
            let end = start + node.primitive_count as usize;
            out.extend_from_slice(&self.primitive_indices[start..end]);
        } else {
            self.plane_visit(node.left_child as usize, z, out);
            self.plane_visit(node.left_child as usize + 1, z, out);
        }
    }

    /// Triangle indices whose box overlaps `query`.
    pub fn box_query(&self, query: &BBox3) -> Vec<u32> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        self.box_visit(self.root as usize, query, &mut out);
        out
    }

    fn box_visit(&self, node_index: usize, query: &BBox3, out: &mut Vec<u32>) {
        let node = &self.nodes[node_index];
        if node.bbox().intersection(query).is_none() {
            return;
        }
        if node.is_leaf() {
            let start = node.primitive_offset as usize;
            let end = start + node.primitive_count as usize;
            out.extend_from_slice(&self.primitive_indices[start..end]);
        } else {
            self.box_visit(node.left_child as usize, query, out);
            self.box_visit(node.left_child as usize + 1, query, out);
        }
    }

    /// Nearest ray/triangle hit: triangle index, barycentric `(u, v)`, and
    /// ray parameter `t > 0`. `mesh` is required to evaluate the narrow
    /// phase against the original triangle vertices.
    pub fn ray_intersect(&self, mesh: &IndexedMesh, origin: Vec3f, dir: Vec3f) -> Option<RayHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<RayHit> = None;
        self.ray_visit(self.root as usize, mesh, origin, dir, &mut best);
        best
    }

    fn ray_visit(
        &self,
        node_index: usize,
        mesh: &IndexedMesh,
        origin: Vec3f,
        dir: Vec3f,
        best: &mut Option<RayHit>,
    ) {
        let node = &self.nodes[node_index];
        let t_limit = best.as_ref().map(|h| h.t).unwrap_or(f32::INFINITY);
        if !slab_intersect(node.bbox(), origin, dir, t_limit) {
            return;
        }
        if node.is_leaf() {
            let start = node.primitive_offset as usize;
            let end = start + node.primitive_count as usize;
            for &tri_idx in &self.primitive_indices[start..end] {
                let tri = mesh.triangles()[tri_idx as usize];
                let verts = mesh.triangle_vertices(tri);
                if let Some((t, u, v)) = moller_trumbore(origin, dir, verts) {
                    if best.as_ref().map(|h| t < h.t).unwrap_or(true) {
                        *best = Some(RayHit { triangle_index: tri_idx, t, u, v });
                    }
                }
            }
        } else {
            self.ray_visit(node.left_child as usize, mesh, origin, dir, best);
            self.ray_visit(node.left_child as usize + 1, mesh, origin, dir, best);
        }
    }

    /// Check every structural invariant: child boxes within parent boxes,
    /// leaf boxes bounding their primitives, in-range indices, and a
    /// bijection between `primitive_indices` and `[0, triangle_count)`.
    pub fn validate(&self, mesh: &IndexedMesh) -> Result<(), SliceError> {
        if self.nodes.is_empty() {
            return Err(SliceError::Inconsistency { reason: "empty tree".into() });
        }

        let mut seen = vec![false; mesh.triangle_count()];
        self.validate_node(self.root as usize, mesh, &mut seen)?;

        if seen.iter().any(|&s| !s) {
            return Err(SliceError::Inconsistency {
                reason: "primitive_indices is not a bijection onto triangle range".into(),
            });
        }
        Ok(())
    }

    fn validate_node(&self, node_index: usize, mesh: &IndexedMesh, seen: &mut [bool]) -> Result<(), SliceError> {
        let node = &self.nodes[node_index];
        if !node.bbox().is_valid() {
            return Err(SliceError::Inconsistency { reason: format!("node {node_index} has invalid bbox") });
        }

        if node.is_leaf() {
            let start = node.primitive_offset as usize;
            let end = start + node.primitive_count as usize;
            for &tri_idx in &self.primitive_indices[start..end] {
                if tri_idx as usize >= mesh.triangle_count() {
                    return Err(SliceError::Inconsistency {
                        reason: format!("primitive index {tri_idx} out of range"),
                    });
                }
                if seen[tri_idx as usize] {
                    return Err(SliceError::Inconsistency {
                        reason: format!("primitive index {tri_idx} referenced twice"),
                    });
                }
                seen[tri_idx as usize] = true;

                let verts = mesh.triangle_vertices(mesh.triangles()[tri_idx as usize]);
                let tri_box = BBox3::from_points(&verts).unwrap();
                if node.bbox().intersection(&tri_box) != Some(tri_box) {
                    return Err(SliceError::Inconsistency {
                        reason: format!("leaf {node_index} does not bound primitive {tri_idx}"),
                    });
                }
            }
        } else {
            let left = &self.nodes[node.left_child as usize];
            let right = &self.nodes[node.left_child as usize + 1];
            if node.bbox().union(&left.bbox()) != node.bbox() || node.bbox().union(&right.bbox()) != node.bbox() {
                return Err(SliceError::Inconsistency {
                    reason: format!("node {node_index} does not bound its children"),
                });
            }
            self.validate_node(node.left_child as usize, mesh, seen)?;
            self.validate_node(node.left_child as usize + 1, mesh, seen)?;
        }
        Ok(())
    }
}

/// A ray/triangle hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub triangle_index: u32,
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

fn slab_intersect(bbox: BBox3, origin: Vec3f, dir: Vec3f, t_max: f32) -> bool {
    let mut t_min = 0.0f32;
    let mut t_max = t_max;
    for axis in 0..3 {
        let (o, d, lo, hi) = match axis {
            0 => (origin.x, dir.x, bbox.min.x, bbox.max.x),
            1 => (origin.y, dir.y, bbox.min.y, bbox.max.y),
            _ => (origin.z, dir.z, bbox.min.z, bbox.max.z),
        };
        if d.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return false;
            }
            continue;
        }
        let inv_d = 1.0 / d;
        let mut t0 = (lo - o) * inv_d;
        let mut t1 = (hi - o) * inv_d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return false;
        }
    }
    true
}

fn moller_trumbore(origin: Vec3f, dir: Vec3f, tri: [Vec3f; 3]) -> Option<(f32, f32, f32)> {
    let e1 = tri[1].sub(&tri[0]);
    let e2 = tri[2].sub(&tri[0]);
    let h = dir.cross(&e2);
    let det = e1.dot(&h);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin.sub(&tri[0]);
    let u = inv_det * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = inv_det * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = inv_det * e2.dot(&q);
    if t > 0.0 {
        Some((t, u, v))
    } else {
        None
    }
}

/// A not-yet-built node slot, overwritten once its subtree is known.
fn placeholder_node() -> Node {
    Node { min: Vec3f::ZERO, max: Vec3f::ZERO, left_child: 0, primitive_count: 0, primitive_offset: 0 }
}

struct Builder<'a> {
    primitives: Vec<Primitive>,
    nodes: Vec<Node>,
    indices: Vec<u32>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> Builder<'a> {
    /// Build a subtree over `order` (indices into `self.primitives`),
    /// appending nodes and returning the new root's index.
    fn build_range(&mut self, order: Vec<usize>) -> Result<usize, SliceError> {
        let node_index = self.nodes.len();
        self.nodes.push(placeholder_node());
        self.build_into(node_index, order)?;
        Ok(node_index)
    }

    /// Fill the already-reserved slot at `node_index` with the subtree
    /// over `order`. Both of an internal node's children are reserved
    /// (pushed as placeholders) *before* either is recursively built, so
    /// `right_child` always lands at `left_child + 1` regardless of how
    /// many nodes the left subtree itself contains — building the left
    /// subtree first and only then allocating the right child (as a
    /// naive depth-first recursion would) lets the left subtree's nodes
    /// land between them.
    fn build_into(&mut self, node_index: usize, order: Vec<usize>) -> Result<(), SliceError> {
        if let Some(cancel) = self.cancel {
            if cancel.is_cancelled() {
                return Err(SliceError::Cancelled);
            }
        }

        let bbox = order
            .iter()
            .map(|&i| self.primitives[i].bbox)
            .reduce(|a, b| a.union(&b))
            .expect("build_into called with no primitives");

        if order.len() <= LEAF_TARGET {
            self.fill_leaf(node_index, bbox, order);
            return Ok(());
        }

        match self.best_split(&order, &bbox) {
            Some((left_order, right_order)) => {
                let left_index = self.nodes.len();
                self.nodes.push(placeholder_node());
                let right_index = self.nodes.len();
                self.nodes.push(placeholder_node());

                self.nodes[node_index] = Node {
                    min: bbox.min,
                    max: bbox.max,
                    left_child: left_index as u32,
                    primitive_count: 0,
                    primitive_offset: 0,
                };

                self.build_into(left_index, left_order)?;
                self.build_into(right_index, right_order)?;
                Ok(())
            }
            None => {
                self.fill_leaf(node_index, bbox, order);
                Ok(())
            }
        }
    }

    fn fill_leaf(&mut self, node_index: usize, bbox: BBox3, order: Vec<usize>) {
        let offset = self.indices.len() as u32;
        for i in &order {
            self.indices.push(self.primitives[*i].index);
        }
        self.nodes[node_index] = Node {
            min: bbox.min,
            max: bbox.max,
            left_child: 0,
            primitive_count: order.len() as u32,
            primitive_offset: offset,
        };
    }

    /// Evaluate up to `SPLIT_CANDIDATES` evenly spaced centroid-quantile
    /// splits on each of the 3 axes; return the partition of `order`
    /// achieving the lowest SAH cost, or `None` if no split beats the
    /// cost of leaving `order` as one leaf.
    fn best_split(&self, order: &[usize], parent_bbox: &BBox3) -> Option<(Vec<usize>, Vec<usize>)> {
        let n = order.len() as f32;
        let parent_sa = parent_bbox.surface_area().max(f32::EPSILON);
        let no_split_cost = n * COST_INTERSECTION;

        let mut best_cost = no_split_cost;
        let mut best: Option<(Vec<usize>, Vec<usize>)> = None;

        for axis in 0..3 {
            let centroid_of = |i: usize| match axis {
                0 => self.primitives[i].centroid.x,
                1 => self.primitives[i].centroid.y,
                _ => self.primitives[i].centroid.z,
            };

            let mut sorted = order.to_vec();
            sorted.sort_by(|&a, &b| centroid_of(a).partial_cmp(&centroid_of(b)).unwrap());

            let lo = centroid_of(sorted[0]);
            let hi = centroid_of(*sorted.last().unwrap());
            if hi - lo < f32::EPSILON {
                continue;
            }

            for k in 1..SPLIT_CANDIDATES {
                let t = k as f32 / SPLIT_CANDIDATES as f32;
                let split_value = lo + (hi - lo) * t;

                let (left, right): (Vec<usize>, Vec<usize>) =
                    sorted.iter().partition(|&&i| centroid_of(i) < split_value);
                if left.is_empty() || right.is_empty() {
                    continue;
                }

                let left_bbox = left.iter().map(|&i| self.primitives[i].bbox).reduce(|a, b| a.union(&b)).unwrap();
                let right_bbox = right.iter().map(|&i| self.primitives[i].bbox).reduce(|a, b| a.union(&b)).unwrap();

                let cost = COST_TRAVERSAL
                    + (left_bbox.surface_area() / parent_sa) * left.len() as f32 * COST_INTERSECTION
                    + (right_bbox.surface_area() / parent_sa) * right.len() as f32 * COST_INTERSECTION;

                if cost < best_cost {
                    best_cost = cost;
                    best = Some((left, right));
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::IndexedMesh;

    fn cube_mesh(half_extent: f32) -> IndexedMesh {
        let h = half_extent;
        let corners = [
            Vec3f::new(-h, -h, -h), Vec3f::new(h, -h, -h),
            Vec3f::new(h, h, -h), Vec3f::new(-h, h, -h),
            Vec3f::new(-h, -h, h), Vec3f::new(h, -h, h),
            Vec3f::new(h, h, h), Vec3f::new(-h, h, h),
        ];
        let faces: [[usize; 3]; 12] = [
            [0, 1, 2], [0, 2, 3],
            [4, 6, 5], [4, 7, 6],
            [0, 4, 5], [0, 5, 1],
            [1, 5, 6], [1, 6, 2],
            [2, 6, 7], [2, 7, 3],
            [3, 7, 4], [3, 4, 0],
        ];
        let triangles: Vec<[Vec3f; 3]> =
            faces.iter().map(|&[a, b, c]| [corners[a], corners[b], corners[c]]).collect();
        IndexedMesh::from_triangles(&triangles).unwrap()
    }

    #[test]
    fn build_produces_valid_tree() {
        let mesh = cube_mesh(5.0);
        let tree = AABBTree::build(&mesh, None).unwrap();
        tree.validate(&mesh).unwrap();
    }

    #[test]
    fn plane_intersect_finds_straddling_triangles() {
        let mesh = cube_mesh(5.0);
        let tree = AABBTree::build(&mesh, None).unwrap();
        let hits = tree.plane_intersect(0.0);
        assert!(!hits.is_empty(), "mid-plane should hit the four side faces' triangles");
        for &idx in &hits {
            let tri = mesh.triangles()[idx as usize];
            let verts = mesh.triangle_vertices(tri);
            let (lo, hi) = (
                verts.iter().map(|v| v.z).fold(f32::INFINITY, f32::min),
                verts.iter().map(|v| v.z).fold(f32::NEG_INFINITY, f32::max),
            );
            assert!(lo <= 0.0 && hi >= 0.0);
        }
    }

    #[test]
    fn plane_above_bbox_returns_empty() {
        let mesh = cube_mesh(5.0);
        let tree = AABBTree::build(&mesh, None).unwrap();
        assert!(tree.plane_intersect(100.0).is_empty());
    }

    #[test]
    fn ray_through_center_hits_two_faces() {
        let mesh = cube_mesh(5.0);
        let tree = AABBTree::build(&mesh, None).unwrap();
        let hit = tree.ray_intersect(&mesh, Vec3f::new(0.0, 0.0, -100.0), Vec3f::new(0.0, 0.0, 1.0));
        assert!(hit.is_some());
        assert!((hit.unwrap().t - 95.0).abs() < 1e-3);
    }

    #[test]
    fn empty_mesh_build_fails() {
        let mesh = IndexedMesh::new();
        assert!(AABBTree::build(&mesh, None).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::mesh::IndexedMesh;
    use proptest::prelude::*;

    fn tri_soup() -> impl Strategy<Value = Vec<[Vec3f; 3]>> {
        let coord = -50.0f32..50.0f32;
        let vertex = (coord.clone(), coord.clone(), coord).prop_map(|(x, y, z)| Vec3f::new(x, y, z));
        let triangle = (vertex.clone(), vertex.clone(), vertex).prop_map(|(a, b, c)| [a, b, c]);
        prop::collection::vec(triangle, 1..40)
    }

    proptest! {
        // A tree built over any non-degenerate triangle soup satisfies
        // every structural invariant `validate` checks, and every
        // straddling triangle `plane_intersect` finds is a superset of the
        // brute-force answer.
        #[test]
        fn build_is_always_valid_and_plane_query_is_complete(triangles in tri_soup(), z in -50.0f32..50.0f32) {
            let triangles: Vec<[Vec3f; 3]> = triangles
                .into_iter()
                .filter(|tri| {
                    let e1 = tri[1].sub(&tri[0]);
                    let e2 = tri[2].sub(&tri[0]);
                    e1.cross(&e2).length() > 1e-6
                })
                .collect();
            prop_assume!(!triangles.is_empty());

            let mesh = IndexedMesh::from_triangles(&triangles).unwrap();
            prop_assume!(mesh.triangle_count() > 0);
            let tree = AABBTree::build(&mesh, None).unwrap();
            prop_assert!(tree.validate(&mesh).is_ok());

            let found: std::collections::HashSet<u32> = tree.plane_intersect(z).into_iter().collect();
            for (i, &tri) in mesh.triangles().iter().enumerate() {
                let verts = mesh.triangle_vertices(tri);
                let bbox = BBox3::from_points(&verts).unwrap();
                if bbox.straddles_z(z) {
                    prop_assert!(found.contains(&(i as u32)), "brute-force straddling triangle {i} missing from plane query");
                }
            }
        }
    }
}
