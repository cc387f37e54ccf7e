//! Three-phase segment-to-ring chainer: exact endpoint join, tolerant
//! join within a small coordinate tolerance, and gap closing.

use std::collections::HashMap;

use slicer_types::coord;
use slicer_types::Point2;

/// Tolerance for phase B's "nearest compatible endpoint" search, in scaled
/// units. Deliberately small: phase A already joined everything that
/// matches exactly.
pub const ENDPOINT_TOLERANCE: coord = 10;

#[derive(Debug, Clone, Copy)]
pub struct GapClosingConfig {
    pub max_gap_mm: f32,
    pub max_angle_deg: f32,
    pub enable: bool,
}

impl Default for GapClosingConfig {
    fn default() -> Self {
        Self { max_gap_mm: 2.0, max_angle_deg: 45.0, enable: true }
    }
}

/// Outcome of stitching one plane's segment soup into rings.
#[derive(Debug, Default)]
pub struct StitchResult {
    pub rings: Vec<Vec<Point2>>,
    pub chains_attempted: usize,
    pub gaps_found: u32,
    pub gaps_closed: u32,
    pub discarded: u32,
}

/// Stitch `segments` (deduplicated) into closed rings.
pub fn stitch_rings(segments: &[(Point2, Point2)], gap_config: &GapClosingConfig) -> StitchResult {
    let mut result = StitchResult::default();

    let mut adjacency: HashMap<Point2, Vec<usize>> = HashMap::new();
    for (i, &(a, b)) in segments.iter().enumerate() {
        adjacency.entry(a).or_default().push(i);
        adjacency.entry(b).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        result.chains_attempted += 1;
        let chain = walk_chain(start, segments, &adjacency, &mut used);
        match close_chain(chain, gap_config, &mut result) {
            Some(ring) if ring.len() >= 3 => result.rings.push(ring),
            _ => result.discarded += 1,
        }
    }

    result
}

/// Greedily follow unused segments from `start`, always moving to the
/// unique other unused segment incident at the current endpoint (phase A).
/// Returns the ordered point chain, open at both ends unless it looped
/// back on itself.
fn walk_chain(
    start: usize,
    segments: &[(Point2, Point2)],
    adjacency: &HashMap<Point2, Vec<usize>>,
    used: &mut [bool],
) -> Vec<Point2> {
    used[start] = true;
    let (a, b) = segments[start];
    let mut chain = vec![a, b];
    let mut current = b;

    loop {
        let candidates = match adjacency.get(&current) {
            Some(c) => c,
            None => break,
        };
        let next_seg = candidates.iter().find(|&&idx| !used[idx]).copied();
        let Some(next_seg) = next_seg else { break };
        used[next_seg] = true;
        let (p, q) = segments[next_seg];
        let next_point = if p == current { q } else { p };
        if next_point == chain[0] {
            break;
        }
        chain.push(next_point);
        current = next_point;
    }

    chain
}

/// Attempt to close an open chain: if its ends already coincide, it's
/// already closed. Otherwise try phase B's tolerant join, then phase C's
/// gap closing. Returns `None` if the chain cannot be closed within
/// configured limits.
fn close_chain(chain: Vec<Point2>, gap_config: &GapClosingConfig, stats: &mut StitchResult) -> Option<Vec<Point2>> {
    if chain.len() < 2 {
        return None;
    }
    let first = chain[0];
    let last = *chain.last().unwrap();

    if first == last {
        let mut ring = chain;
        ring.pop();
        return dedup_consecutive(ring);
    }

    let gap = first.distance_to(&last);

    if gap <= ENDPOINT_TOLERANCE as f64 {
        return dedup_consecutive(chain);
    }

    stats.gaps_found += 1;

    if !gap_config.enable {
        return None;
    }

    let max_gap = (gap_config.max_gap_mm as f64) * slicer_types::SCALE;
    if gap > max_gap {
        return None;
    }

    if chain.len() >= 2 {
        let deflection = bridge_deflection_deg(&chain);
        if deflection > gap_config.max_angle_deg as f64 {
            return None;
        }
    }

    stats.gaps_closed += 1;
    dedup_consecutive(chain)
}

/// Angular deflection (degrees) the gap-closing bridge would introduce,
/// measured between the chain's last segment and the bridge back to its
/// first point.
fn bridge_deflection_deg(chain: &[Point2]) -> f64 {
    let n = chain.len();
    let prev = chain[n - 2];
    let last = chain[n - 1];
    let first = chain[0];

    let incoming = (
        (last.x - prev.x) as f64,
        (last.y - prev.y) as f64,
    );
    let bridge = (
        (first.x - last.x) as f64,
        (first.y - last.y) as f64,
    );

    let dot = incoming.0 * bridge.0 + incoming.1 * bridge.1;
    let mag = (incoming.0.powi(2) + incoming.1.powi(2)).sqrt() * (bridge.0.powi(2) + bridge.1.powi(2)).sqrt();
    if mag < f64::EPSILON {
        return 0.0;
    }
    (dot / mag).clamp(-1.0, 1.0).acos().to_degrees()
}

fn dedup_consecutive(points: Vec<Point2>) -> Option<Vec<Point2>> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    if out.len() < 3 {
        None
    } else {
        Some(out)
    }
}

/// Discard duplicate on-plane segments: when two triangles share an edge
/// lying on the plane, both emit the same segment. Detection compares
/// endpoint pairs after sorting lexicographically.
pub fn dedup_segments(segments: Vec<(Point2, Point2)>) -> Vec<(Point2, Point2)> {
    use std::collections::HashSet;
    let mut seen: HashSet<(Point2, Point2)> = HashSet::new();
    let mut out = Vec::with_capacity(segments.len());
    for (a, b) in segments {
        let key = if (a.x, a.y) <= (b.x, b.y) { (a, b) } else { (b, a) };
        if seen.insert(key) {
            out.push((a, b));
        }
    }
    out
}
