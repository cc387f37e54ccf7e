//! Indexed triangle mesh: vertex/triangle arrays plus cached statistics
//! and repair counters.

use serde::{Deserialize, Serialize};
use tracing::debug;

use slicer_types::{BBox3, Vec3f};

use crate::error::MeshError;

/// Repair counters accumulated while a mesh is built or inspected.
///
/// These are monotonically increasing per-mesh counters, not per-call
/// results: they record how many degeneracies have ever been observed on
/// this mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairCounters {
    pub degenerate_facets: u32,
    pub facets_removed: u32,
    pub backwards_edges: u32,
    pub open_edges: u32,
}

/// Aggregate statistics over a mesh, recomputed lazily after `mark_dirty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub bbox: BBox3,
    pub surface_area: f32,
    pub num_parts: u32,
    pub repaired: RepairCounters,
}

impl Stats {
    pub fn open_edges(&self) -> u32 {
        self.repaired.open_edges
    }

    pub fn is_manifold(&self) -> bool {
        self.repaired.open_edges == 0
    }
}

/// Structure-of-arrays triangle mesh. Vertices retain float precision;
/// triangles are index triples into `vertices`. No shared-edge topology is
/// stored — adjacency is recomputed on demand by whoever needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedMesh {
    vertices: Vec<Vec3f>,
    triangles: Vec<[u32; 3]>,
    repair: RepairCounters,
    #[serde(skip)]
    cached_stats: Option<Stats>,
    /// Position-keyed set of faces already admitted, used to catch a
    /// literal duplicate triangle (same geometry, different vertex indices,
    /// since `from_triangles` never welds). Not part of the mesh's logical
    /// state, so it's excluded from serialization.
    #[serde(skip)]
    seen_faces: std::collections::HashSet<[(u32, u32, u32); 3]>,
}

impl IndexedMesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            repair: RepairCounters::default(),
            cached_stats: None,
            seen_faces: std::collections::HashSet::new(),
        }
    }

    /// Build a mesh from an unwelded triangle soup: every three input
    /// vertices form one triangle, with no shared-vertex deduplication.
    /// This is the shape an STL/3MF/OBJ decoder naturally produces; callers
    /// that need welding perform it before calling this constructor.
    ///
    /// A degenerate triangle (two equal vertex indices, or zero area) is
    /// dropped rather than stored: it contributes nothing to plane queries
    /// or statistics, so keeping it around would only complicate every
    /// downstream consumer. `stats().repaired` records how many were found
    /// and removed.
    pub fn from_triangles(triangles: &[[Vec3f; 3]]) -> Result<Self, MeshError> {
        if triangles.is_empty() {
            return Err(MeshError::EmptyMesh);
        }
        let mut mesh = Self::new();
        for tri in triangles {
            let i0 = mesh.add_vertex(tri[0]);
            let i1 = mesh.add_vertex(tri[1]);
            let i2 = mesh.add_vertex(tri[2]);
            mesh.add_triangle(i0, i1, i2)?;
        }
        Ok(mesh)
    }

    pub fn add_vertex(&mut self, v: Vec3f) -> u32 {
        let idx = self.vertices.len() as u32;
        self.vertices.push(v);
        self.mark_dirty();
        idx
    }

    /// Register a triangle by vertex index. A degenerate triangle (a
    /// repeated index, or zero computed area) is counted in the mesh's
    /// repair counters and discarded rather than stored.
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) -> Result<(), MeshError> {
        let vertex_count = self.vertices.len();
        for idx in [a, b, c] {
            if idx as usize >= vertex_count {
                return Err(MeshError::OutOfRange { index: idx, vertex_count });
            }
        }

        let repeated_index = a == b || b == c || a == c;
        let tv = self.triangle_vertices([a, b, c]);
        let zero_area = !repeated_index && triangle_area(tv) <= f32::EPSILON;
        let key = face_key(tv);
        let duplicate = !repeated_index && !zero_area && self.seen_faces.contains(&key);

        if repeated_index || zero_area || duplicate {
            self.repair.degenerate_facets += 1;
            self.repair.facets_removed += 1;
            self.mark_dirty();
            return Ok(());
        }

        self.seen_faces.insert(key);
        self.triangles.push([a, b, c]);
        self.mark_dirty();
        Ok(())
    }

    pub fn vertices(&self) -> &[Vec3f] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle_vertices(&self, tri: [u32; 3]) -> [Vec3f; 3] {
        [
            self.vertices[tri[0] as usize],
            self.vertices[tri[1] as usize],
            self.vertices[tri[2] as usize],
        ]
    }

    /// Invalidate cached statistics. Called automatically by the mutating
    /// methods above; exposed so callers that mutate through other means
    /// (e.g. welding post-processing) can keep the cache honest.
    pub fn mark_dirty(&mut self) {
        self.cached_stats = None;
    }

    pub fn bounding_box(&self) -> Option<BBox3> {
        BBox3::from_points(&self.vertices)
    }

    pub fn surface_area(&self) -> f32 {
        self.triangles
            .iter()
            .map(|&tri| triangle_area(self.triangle_vertices(tri)))
            .sum()
    }

    /// Compute (or return the cached) mesh statistics. `degenerate_facets`
    /// and `facets_removed` are carried forward from import-time repair,
    /// not recomputed here, since the degenerate triangles they count are
    /// no longer present in `triangles` to inspect. `open_edges` and
    /// `num_parts` are structural properties of the current (already
    /// repaired) triangle set and are recomputed every time the cache is
    /// invalidated.
    pub fn stats(&mut self) -> Stats {
        if let Some(stats) = self.cached_stats {
            return stats;
        }
        let bbox = self.bounding_box().unwrap_or_else(|| BBox3::new(Vec3f::ZERO, Vec3f::ZERO));
        let open_edges = count_open_edges(&self.vertices, &self.triangles);
        let stats = Stats {
            bbox,
            surface_area: self.surface_area(),
            num_parts: count_connected_components(&self.vertices, &self.triangles),
            repaired: RepairCounters { open_edges, ..self.repair },
        };
        debug!(
            triangles = self.triangles.len(),
            degenerate_facets = stats.repaired.degenerate_facets,
            open_edges,
            "mesh stats recomputed"
        );
        self.cached_stats = Some(stats);
        stats
    }
}

impl Default for IndexedMesh {
    fn default() -> Self {
        Self::new()
    }
}

fn triangle_area(tri: [Vec3f; 3]) -> f32 {
    let e1 = tri[1].sub(&tri[0]);
    let e2 = tri[2].sub(&tri[0]);
    e1.cross(&e2).length() * 0.5
}

/// Order-independent position key for a triangle, used to spot a literal
/// duplicate face introduced by an unwelded triangle soup (two triangles
/// with distinct vertex indices but identical vertex positions).
fn face_key(tri: [Vec3f; 3]) -> [(u32, u32, u32); 3] {
    let mut keys = [vertex_key(&tri[0]), vertex_key(&tri[1]), vertex_key(&tri[2])];
    keys.sort_unstable();
    keys
}

fn vertex_key(v: &Vec3f) -> (u32, u32, u32) {
    (v.x.to_bits(), v.y.to_bits(), v.z.to_bits())
}

/// Count half-edges that appear exactly once across the triangle set —
/// the boundary of an open mesh. An edge key is undirected so a matched
/// forward/backward pair of half-edges cancels out.
///
/// Keyed on vertex *positions* rather than indices: `from_triangles`
/// never welds, so two triangles sharing an edge in space still hold
/// distinct vertex indices for its endpoints. Indices would never
/// collide and every edge would look open.
fn count_open_edges(vertices: &[Vec3f], triangles: &[[u32; 3]]) -> u32 {
    use std::collections::HashMap;
    let mut counts: HashMap<((u32, u32, u32), (u32, u32, u32)), i32> = HashMap::new();
    for tri in triangles {
        for &(a, b) in &[(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let ka = vertex_key(&vertices[a as usize]);
            let kb = vertex_key(&vertices[b as usize]);
            let key = if ka <= kb { (ka, kb) } else { (kb, ka) };
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts.values().filter(|&&count| count == 1).count() as u32
}

/// Connected-component count over the vertex-adjacency graph implied by
/// the triangle set, via union-find.
///
/// Unions by vertex *position* group, not raw index: `from_triangles`
/// never welds, so two triangles sharing an edge in space hold distinct
/// indices for its endpoints, and unioning on indices would report every
/// triangle as its own component.
fn count_connected_components(vertices: &[Vec3f], triangles: &[[u32; 3]]) -> u32 {
    use std::collections::HashMap;

    if triangles.is_empty() {
        return 0;
    }

    let mut group_ids: HashMap<(u32, u32, u32), usize> = HashMap::new();
    let mut group_of_index = vec![0usize; vertices.len()];
    for (idx, v) in vertices.iter().enumerate() {
        let key = vertex_key(v);
        let next_id = group_ids.len();
        group_of_index[idx] = *group_ids.entry(key).or_insert(next_id);
    }
    let group_count = group_ids.len();
    let mut parent: Vec<usize> = (0..group_count).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    fn union(parent: &mut [usize], a: usize, b: usize) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent[ra] = rb;
        }
    }

    let mut touched = vec![false; group_count];
    for tri in triangles {
        let g = [
            group_of_index[tri[0] as usize],
            group_of_index[tri[1] as usize],
            group_of_index[tri[2] as usize],
        ];
        for &gi in &g {
            touched[gi] = true;
        }
        union(&mut parent, g[0], g[1]);
        union(&mut parent, g[1], g[2]);
    }

    let mut roots = std::collections::HashSet::new();
    for (idx, &is_touched) in touched.iter().enumerate() {
        if is_touched {
            roots.insert(find(&mut parent, idx));
        }
    }
    roots.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_triangles(half_extent: f32) -> Vec<[Vec3f; 3]> {
        let h = half_extent;
        let corners = [
            Vec3f::new(-h, -h, -h),
            Vec3f::new(h, -h, -h),
            Vec3f::new(h, h, -h),
            Vec3f::new(-h, h, -h),
            Vec3f::new(-h, -h, h),
            Vec3f::new(h, -h, h),
            Vec3f::new(h, h, h),
            Vec3f::new(-h, h, h),
        ];
        let faces = [
            [0, 1, 2], [0, 2, 3],
            [4, 6, 5], [4, 7, 6],
            [0, 4, 5], [0, 5, 1],
            [1, 5, 6], [1, 6, 2],
            [2, 6, 7], [2, 7, 3],
            [3, 7, 4], [3, 4, 0],
        ];
        faces.iter().map(|&[a, b, c]| [corners[a], corners[b], corners[c]]).collect()
    }

    #[test]
    fn cube_is_manifold_with_no_degenerate_facets() {
        let mut mesh = IndexedMesh::from_triangles(&cube_triangles(5.0)).unwrap();
        let stats = mesh.stats();
        assert_eq!(stats.repaired.degenerate_facets, 0);
        assert!(stats.is_manifold(), "closed cube should have zero open edges");
        assert_eq!(stats.num_parts, 1);
    }

    #[test]
    fn cube_bounding_box_matches_extent() {
        let mut mesh = IndexedMesh::from_triangles(&cube_triangles(5.0)).unwrap();
        let bbox = mesh.bounding_box().unwrap();
        assert!((bbox.min.x - (-5.0)).abs() < 1e-5);
        assert!((bbox.max.x - 5.0).abs() < 1e-5);
        let _ = mesh.stats();
    }

    #[test]
    fn out_of_range_vertex_index_rejected() {
        let mut mesh = IndexedMesh::new();
        mesh.add_vertex(Vec3f::ZERO);
        let err = mesh.add_triangle(0, 1, 2).unwrap_err();
        assert!(matches!(err, MeshError::OutOfRange { .. }));
    }

    #[test]
    fn empty_triangle_soup_rejected() {
        let err = IndexedMesh::from_triangles(&[]).unwrap_err();
        assert_eq!(err, MeshError::EmptyMesh);
    }

    #[test]
    fn duplicated_and_zero_area_triangles_are_flagged_degenerate() {
        let mut triangles = cube_triangles(5.0);
        let dup = triangles[0];
        triangles.push(dup);
        triangles.push([Vec3f::ZERO, Vec3f::ZERO, Vec3f::new(1.0, 0.0, 0.0)]);

        let mut mesh = IndexedMesh::from_triangles(&triangles).unwrap();
        let stats = mesh.stats();
        assert!(stats.repaired.degenerate_facets >= 1);
        assert!(stats.repaired.facets_removed >= 1);
        assert_eq!(mesh.triangle_count(), 12, "degenerate facets are dropped, not stored");
    }

    #[test]
    fn mark_dirty_forces_recompute() {
        let mut mesh = IndexedMesh::from_triangles(&cube_triangles(5.0)).unwrap();
        let first = mesh.stats();
        mesh.mark_dirty();
        let second = mesh.stats();
        assert_eq!(first, second);
    }
}
