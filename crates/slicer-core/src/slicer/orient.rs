//! Orientation and hole-nesting: turn a flat set of closed rings into
//! `ExPolygon`s with their holes correctly assigned.
//!
//! Containment is modeled as a forest with an explicit `parent` index per
//! ring rather than pointer cycles, per the design note that a
//! containment graph is a tree and should be represented as one.

use slicer_types::{ExPolygon, Point2, Polygon};

struct RingInfo {
    polygon: Polygon,
    is_ccw: bool,
    parent: Option<usize>,
}

/// Build `ExPolygon`s from a plane's closed rings. Holes are assigned to
/// their immediate enclosing contour; a ring nested at even depth becomes
/// a top-level (or inner-island) contour, odd depth a hole.
pub fn assemble_expolygons(rings: Vec<Vec<Point2>>) -> Vec<ExPolygon> {
    let mut infos: Vec<RingInfo> = rings
        .into_iter()
        .filter_map(Polygon::new)
        .map(|polygon| {
            let is_ccw = polygon.is_ccw();
            RingInfo { polygon, is_ccw, parent: None }
        })
        .collect();

    assign_parents(&mut infos);

    let depths: Vec<usize> = (0..infos.len()).map(|i| depth_of(&infos, i)).collect();

    let mut contours: Vec<usize> = Vec::new();
    for (i, info) in infos.iter().enumerate() {
        let expected_ccw = depths[i] % 2 == 0;
        if info.is_ccw == expected_ccw {
            contours.push(i);
        }
    }

    contours
        .into_iter()
        .map(|contour_idx| {
            let mut contour = infos[contour_idx].polygon.clone();
            contour.make_ccw();
            let holes: Vec<Polygon> = (0..infos.len())
                .filter(|&i| infos[i].parent == Some(contour_idx))
                .map(|i| {
                    let mut hole = infos[i].polygon.clone();
                    hole.make_cw();
                    hole
                })
                .collect();
            ExPolygon::new(contour, holes)
        })
        .collect()
}

/// For each ring, find its immediate enclosing ring: the smallest-area
/// ring (other than itself) that contains one of its points.
fn assign_parents(infos: &mut [RingInfo]) {
    let seeds: Vec<Point2> = infos.iter().map(|info| info.polygon.representative_point()).collect();

    for i in 0..infos.len() {
        let mut best: Option<(usize, f64)> = None;
        for j in 0..infos.len() {
            if i == j {
                continue;
            }
            if infos[j].polygon.contains_point(seeds[i]) {
                let area = infos[j].polygon.signed_area().abs();
                if best.map(|(_, best_area)| area < best_area).unwrap_or(true) {
                    best = Some((j, area));
                }
            }
        }
        infos[i].parent = best.map(|(j, _)| j);
    }
}

fn depth_of(infos: &[RingInfo], index: usize) -> usize {
    let mut depth = 0;
    let mut current = index;
    let mut guard = 0;
    while let Some(parent) = infos[current].parent {
        current = parent;
        depth += 1;
        guard += 1;
        if guard > infos.len() {
            // A cycle here would indicate a predicate bug (containment
            // should always form a forest); break rather than loop forever
            // instead of propagating a depth that can't be trusted further.
            break;
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicer_types::coord;

    fn square(min: coord, max: coord) -> Vec<Point2> {
        vec![Point2::new(min, min), Point2::new(max, min), Point2::new(max, max), Point2::new(min, max)]
    }

    #[test]
    fn single_square_is_one_contour_no_holes() {
        let rings = vec![square(0, 10_000_000)];
        let polys = assemble_expolygons(rings);
        assert_eq!(polys.len(), 1);
        assert!(polys[0].holes.is_empty());
    }

    #[test]
    fn nested_square_becomes_hole() {
        let outer = square(0, 10_000_000);
        let inner = square(2_000_000, 8_000_000);
        let polys = assemble_expolygons(vec![outer, inner]);
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].holes.len(), 1);
    }

    #[test]
    fn doubly_nested_square_is_inner_island_contour() {
        let outer = square(0, 20_000_000);
        let middle = square(2_000_000, 18_000_000);
        let inner = square(4_000_000, 16_000_000);
        let polys = assemble_expolygons(vec![outer, middle, inner]);
        assert_eq!(polys.len(), 2, "outer contour plus the doubly-nested island contour");
    }
}
