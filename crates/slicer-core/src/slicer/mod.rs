//! Layer slicing: for each plane, collect candidate triangles from the
//! AABB hierarchy, extract cross-section segments, stitch them into
//! closed rings, detect holes, and assemble ordered `ExPolygon` layers.

pub mod orient;
pub mod stitch;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use slicer_types::{triangle_plane_intersection, ExPolygon, Point2};

use crate::aabb::AABBTree;
use crate::cancel::CancellationToken;
use crate::error::SliceError;
use crate::mesh::IndexedMesh;

pub use stitch::GapClosingConfig;

/// One slice plane's result: its elevation, the `ExPolygon`s found there,
/// and how many of them are top-level islands (as opposed to nested
/// inner islands produced by even-depth nesting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub z_height: f32,
    pub polygons: Vec<ExPolygon>,
    pub island_count: u32,
}

/// Per-run counters describing how the slice went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceStatistics {
    pub triangles_processed: u64,
    pub intersections_found: u64,
    pub processing_time_ms: f64,
    pub polygon_completion_rate: f64,
    pub gaps_found: u32,
    pub gaps_closed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceResult {
    pub layers: Vec<Layer>,
    pub statistics: SliceStatistics,
}

/// Produces ordered closed contours at each requested z. Holds immutable
/// borrows of the mesh and its spatial index plus the gap-closing
/// configuration; `slice` is the single entry point running the whole
/// per-plane pipeline to completion.
pub struct Slicer<'a> {
    mesh: &'a IndexedMesh,
    tree: &'a AABBTree,
    gap_config: GapClosingConfig,
}

impl<'a> Slicer<'a> {
    pub fn new(mesh: &'a IndexedMesh, tree: &'a AABBTree, gap_config: GapClosingConfig) -> Self {
        Self { mesh, tree, gap_config }
    }

    #[instrument(skip(self, cancel))]
    pub fn slice(&self, layer_height: f32, cancel: Option<&CancellationToken>) -> Result<SliceResult, SliceError> {
        if layer_height <= 0.0 {
            return Err(SliceError::InvalidInput { reason: "layer height must be > 0".into() });
        }

        let start = ProcessTimer::start();
        let bbox = self
            .mesh
            .bounding_box()
            .ok_or_else(|| SliceError::InvalidInput { reason: "mesh has no vertices".into() })?;

        let plane_count = ((bbox.max.z - bbox.min.z) / layer_height).ceil().max(0.0) as usize;
        let schedule: Vec<f32> = (0..plane_count).map(|k| bbox.min.z + (k as f32 + 0.5) * layer_height).collect();

        let outcomes = self.slice_schedule(&schedule, cancel)?;

        let mut layers = Vec::with_capacity(outcomes.len());
        let mut totals = PlaneCounters::default();
        for (z, layer, counters) in outcomes {
            trace!(z, polygon_count = layer.polygons.len(), "layer sliced");
            layers.push(layer);
            totals.accumulate(&counters);
        }

        let polygon_completion_rate = if totals.chains_attempted == 0 {
            1.0
        } else {
            totals.rings_closed as f64 / totals.chains_attempted as f64
        };

        let statistics = SliceStatistics {
            triangles_processed: totals.triangles_processed,
            intersections_found: totals.intersections_found,
            processing_time_ms: start.elapsed_ms(),
            polygon_completion_rate,
            gaps_found: totals.gaps_found,
            gaps_closed: totals.gaps_closed,
        };

        info!(
            layer_count = layers.len(),
            triangles_processed = statistics.triangles_processed,
            intersections_found = statistics.intersections_found,
            polygon_completion_rate,
            "slicing complete"
        );

        Ok(SliceResult { layers, statistics })
    }

    /// Run the per-plane pipeline over every z in `schedule`. Sequential
    /// by default; with the `parallel` feature enabled, planes are
    /// partitioned across a rayon thread pool and reassembled by the
    /// caller in ascending z — each plane reads only the immutable mesh
    /// and tree, so no shared mutable state crosses threads.
    #[cfg(not(feature = "parallel"))]
    fn slice_schedule(
        &self,
        schedule: &[f32],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<(f32, Layer, PlaneCounters)>, SliceError> {
        schedule
            .iter()
            .map(|&z| {
                if let Some(cancel) = cancel {
                    if cancel.is_cancelled() {
                        return Err(SliceError::Cancelled);
                    }
                }
                let (layer, counters) = self.slice_plane(z);
                Ok((z, layer, counters))
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn slice_schedule(
        &self,
        schedule: &[f32],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<(f32, Layer, PlaneCounters)>, SliceError> {
        use rayon::prelude::*;

        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return Err(SliceError::Cancelled);
            }
        }

        schedule
            .par_iter()
            .map(|&z| {
                if let Some(cancel) = cancel {
                    if cancel.is_cancelled() {
                        return Err(SliceError::Cancelled);
                    }
                }
                let (layer, counters) = self.slice_plane(z);
                Ok((z, layer, counters))
            })
            .collect()
    }

    fn slice_plane(&self, z: f32) -> (Layer, PlaneCounters) {
        let candidates = self.tree.plane_intersect(z);
        let mut counters = PlaneCounters { triangles_processed: candidates.len() as u64, ..Default::default() };

        let mut segments: Vec<(Point2, Point2)> = Vec::new();
        for tri_idx in candidates {
            let tri = self.mesh.triangles()[tri_idx as usize];
            let verts = self.mesh.triangle_vertices(tri);
            let result = triangle_plane_intersection(&verts, z);
            if result.segments.is_empty() {
                continue;
            }
            debug!(kind = ?result.kind, count = result.segments.len(), "triangle contributed segments");
            segments.extend(result.segments);
        }
        counters.intersections_found = segments.len() as u64;

        let segments = stitch::dedup_segments(segments);
        let stitch_result = stitch::stitch_rings(&segments, &self.gap_config);

        counters.chains_attempted = stitch_result.chains_attempted as u64;
        counters.rings_closed = stitch_result.rings.len() as u64;
        counters.gaps_found = stitch_result.gaps_found;
        counters.gaps_closed = stitch_result.gaps_closed;

        let polygons = orient::assemble_expolygons(stitch_result.rings);
        let island_count = polygons.len() as u32;

        (Layer { z_height: z, polygons, island_count }, counters)
    }
}

/// Per-plane counters, accumulated into [`SliceStatistics`] after every
/// plane in the schedule has been processed (sequentially or in
/// parallel).
#[derive(Debug, Default, Clone, Copy)]
struct PlaneCounters {
    triangles_processed: u64,
    intersections_found: u64,
    chains_attempted: u64,
    rings_closed: u64,
    gaps_found: u32,
    gaps_closed: u32,
}

impl PlaneCounters {
    fn accumulate(&mut self, other: &Self) {
        self.triangles_processed += other.triangles_processed;
        self.intersections_found += other.intersections_found;
        self.chains_attempted += other.chains_attempted;
        self.rings_closed += other.rings_closed;
        self.gaps_found += other.gaps_found;
        self.gaps_closed += other.gaps_closed;
    }
}

/// Minimal elapsed-time helper, avoiding a dependency on a timing crate
/// for one counter.
struct ProcessTimer {
    start: std::time::Instant,
}

impl ProcessTimer {
    fn start() -> Self {
        Self { start: std::time::Instant::now() }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
