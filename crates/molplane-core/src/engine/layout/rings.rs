use super::graph::LayoutGraph;
use crate::core::graph::{BiconnectedComponent, EdgeId, GraphError, VertexId};
use crate::core::utils::geometry::{
    EPSILON, angle_of, bounding_box, centroid, circumradius, direction, largest_gap_direction,
    regular_polygon, try_normalize,
};
use nalgebra::{Point2, Vector2};
use slotmap::SecondaryMap;
use std::collections::HashSet;
use std::f64::consts::TAU;
use tracing::trace;

const BISECTION_STEPS: usize = 100;

/// Local coordinates of a ring block.
pub(super) struct RingSystem {
    pub coords: SecondaryMap<VertexId, Point2<f64>>,
    pub membership: SecondaryMap<VertexId, usize>,
    pub largest_ring: usize,
}

/// Root of `f` between `lo` and `hi`, which must bracket a sign change.
fn bisect(f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> f64 {
    let lo_negative = f(lo) < 0.0;
    for _ in 0..BISECTION_STEPS {
        let mid = (lo + hi) / 2.0;
        if (f(mid) < 0.0) == lo_negative {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

/// Upper bound where `f` has the opposite sign of `f(lo)`.
fn bracket(f: &impl Fn(f64) -> f64, lo: f64) -> Option<f64> {
    let lo_negative = f(lo) < 0.0;
    let mut hi = (lo * 2.0).max(1.0);
    for _ in 0..64 {
        if (f(hi) < 0.0) != lo_negative {
            return Some(hi);
        }
        hi *= 2.0;
    }
    None
}

/// Places `k` unit-spaced points on an arc from `p` to `q`, bulging away
/// from `inside`.
///
/// The radius is chosen so that all `k + 1` chords have unit length. When
/// the gap is too wide for any arc the points fall on the straight segment.
pub(super) fn place_chain(
    p: &Point2<f64>,
    q: &Point2<f64>,
    k: usize,
    inside: &Point2<f64>,
) -> Vec<Point2<f64>> {
    let chords = (k + 1) as f64;
    let chord = q - p;
    let length = chord.norm();
    let straight = || (1..=k).map(|i| p + chord * (i as f64 / chords)).collect();
    if length < EPSILON || length >= chords - EPSILON {
        return straight();
    }

    let mid = p + chord / 2.0;
    let mut normal = Vector2::new(-chord.y, chord.x) / length;
    if (mid - inside).dot(&normal) < 0.0 {
        normal = -normal;
    }

    let unit_angle = |r: f64| 2.0 * (1.0 / (2.0 * r)).min(1.0).asin();
    let gap_angle = |r: f64| 2.0 * (length / (2.0 * r)).min(1.0).asin();
    let r_min = (length / 2.0).max(0.5);

    // Major arc: the centre lies on the outer side and the chain plus the
    // gap close a full turn. Otherwise the chain spans the same angle as
    // the gap with the centre on the inner side.
    let major = |r: f64| chords * unit_angle(r) + gap_angle(r) - TAU;
    let minor = |r: f64| chords * unit_angle(r) - gap_angle(r);
    let (radius, outward) = if major(r_min) >= 0.0 {
        match bracket(&major, r_min) {
            Some(hi) => (bisect(major, r_min, hi), true),
            None => return straight(),
        }
    } else {
        match bracket(&minor, r_min) {
            Some(hi) => (bisect(minor, r_min, hi), false),
            None => return straight(),
        }
    };

    let offset = (radius * radius - length * length / 4.0).max(0.0).sqrt();
    let center = if outward {
        mid + normal * offset
    } else {
        mid - normal * offset
    };
    let radial = p - center;
    let tangent = Vector2::new(-radial.y, radial.x);
    let sign = if tangent.dot(&normal) >= 0.0 { 1.0 } else { -1.0 };
    let start = angle_of(&radial);
    let step = unit_angle(radius);
    (1..=k)
        .map(|i| center + direction(start + sign * step * i as f64) * radius)
        .collect()
}

impl LayoutGraph {
    /// SSSR rings lying entirely inside `block`, as cyclic vertex lists.
    fn block_rings(&self, block: &BiconnectedComponent) -> Result<Vec<Vec<VertexId>>, GraphError> {
        let edges: HashSet<EdgeId> = block.edges.iter().copied().collect();
        let mut rings = Vec::new();
        for idx in 0..self.graph.sssr_count() {
            if self.graph.sssr_edges(idx)?.iter().all(|e| edges.contains(e)) {
                rings.push(self.graph.sssr_vertices(idx)?.to_vec());
            }
        }
        Ok(rings)
    }

    /// Draws the rings of a block in its own frame.
    ///
    /// The most connected ring becomes a regular polygon; every other ring
    /// is added once some of its vertices are drawn, its undrawn chains laid
    /// on arcs outside the drawn part. Vertices outside all rings are grown
    /// from drawn neighbors.
    pub(super) fn draw_ring_system(&self, block: &BiconnectedComponent) -> Result<RingSystem, GraphError> {
        let rings = self.block_rings(block)?;
        let mut coords: SecondaryMap<VertexId, Point2<f64>> = SecondaryMap::new();
        let mut membership: SecondaryMap<VertexId, usize> = SecondaryMap::new();
        for ring in &rings {
            for &v in ring {
                let count = membership.get(v).copied().unwrap_or(0);
                membership.insert(v, count + 1);
            }
        }
        let largest_ring = rings.iter().map(Vec::len).max().unwrap_or(0);

        let morgan = |v: VertexId| self.vertices.get(v).map_or(0, |lv| lv.morgan_code);
        let shared = |ring: &[VertexId]| ring.iter().filter(|&&v| membership[v] > 1).count();
        let mut done = vec![false; rings.len()];

        if let Some(first) = (0..rings.len()).max_by_key(|&i| {
            let ring = &rings[i];
            (
                shared(ring),
                ring.len(),
                ring.iter().map(|&v| morgan(v)).max().unwrap_or(0),
                std::cmp::Reverse(i),
            )
        }) {
            let polygon = regular_polygon(rings[first].len(), 1.0);
            for (&v, p) in rings[first].iter().zip(polygon) {
                coords.insert(v, p);
            }
            done[first] = true;
        }

        loop {
            let next = (0..rings.len())
                .filter(|&i| !done[i])
                .max_by_key(|&i| {
                    let drawn = rings[i].iter().filter(|&&v| coords.contains_key(v)).count();
                    (drawn, std::cmp::Reverse(rings[i].len()), std::cmp::Reverse(i))
                });
            let Some(idx) = next else {
                break;
            };
            done[idx] = true;
            let ring = &rings[idx];
            if ring.iter().any(|&v| coords.contains_key(v)) {
                self.attach_ring(ring, &mut coords);
            } else {
                // Not touching the drawing: start a new polygon beside it.
                let shift = bounding_box(coords.values())
                    .map(|(_, max)| Vector2::new(max.x + 1.0, 0.0))
                    .unwrap_or_else(Vector2::zeros);
                for (&v, p) in ring.iter().zip(regular_polygon(ring.len(), 1.0)) {
                    coords.insert(v, p + shift);
                }
            }
        }

        self.grow_remaining(block, &mut coords);
        trace!(rings = rings.len(), largest_ring, "Ring system drawn.");
        Ok(RingSystem {
            coords,
            membership,
            largest_ring,
        })
    }

    /// Places the undrawn chains of a ring that touches the drawing.
    fn attach_ring(&self, ring: &[VertexId], coords: &mut SecondaryMap<VertexId, Point2<f64>>) {
        let n = ring.len();
        let Some(start) = ring.iter().position(|&v| coords.contains_key(v)) else {
            return;
        };

        let mut chains: Vec<(VertexId, Vec<VertexId>, VertexId)> = Vec::new();
        let mut i = 0;
        while i < n {
            let from = ring[(start + i) % n];
            let mut interior = Vec::new();
            let mut j = i + 1;
            while j < n && !coords.contains_key(ring[(start + j) % n]) {
                interior.push(ring[(start + j) % n]);
                j += 1;
            }
            if !interior.is_empty() {
                chains.push((from, interior, ring[(start + j) % n]));
            }
            i = j;
        }

        for (from, interior, to) in chains {
            let inside = centroid(coords.values()).unwrap_or_else(Point2::origin);
            let p = coords[from];
            let points = if from == to {
                self.spiro_ring(from, &interior, coords)
            } else {
                place_chain(&p, &coords[to], interior.len(), &inside)
            };
            for (v, point) in interior.into_iter().zip(points) {
                coords.insert(v, point);
            }
        }
    }

    /// A ring sharing a single drawn vertex, hung into the widest free gap.
    fn spiro_ring(
        &self,
        pivot: VertexId,
        others: &[VertexId],
        coords: &SecondaryMap<VertexId, Point2<f64>>,
    ) -> Vec<Point2<f64>> {
        let n = others.len() + 1;
        let p = coords[pivot];
        let occupied: Vec<Point2<f64>> = self
            .graph
            .neighbors(pivot)
            .iter()
            .filter_map(|nb| coords.get(nb.v).copied())
            .collect();
        let outward = largest_gap_direction(&p, &occupied);
        let radius = circumradius(n, 1.0);
        let center = p + outward * radius;
        let start = angle_of(&(p - center));
        (1..n)
            .map(|i| center + direction(start + TAU * i as f64 / n as f64) * radius)
            .collect()
    }

    /// Grows block vertices that no ring placed from their drawn neighbors.
    fn grow_remaining(&self, block: &BiconnectedComponent, coords: &mut SecondaryMap<VertexId, Point2<f64>>) {
        let members: HashSet<VertexId> = block.vertices.iter().copied().collect();
        let mut pending: Vec<VertexId> = block
            .vertices
            .iter()
            .copied()
            .filter(|&v| !coords.contains_key(v))
            .collect();

        while !pending.is_empty() {
            let attachable = pending.iter().position(|&v| {
                self.graph
                    .neighbors(v)
                    .iter()
                    .any(|nb| members.contains(&nb.v) && coords.contains_key(nb.v))
            });
            let v = match attachable {
                Some(idx) => pending.remove(idx),
                None => {
                    let v = pending.remove(0);
                    let x = bounding_box(coords.values()).map_or(0.0, |(_, max)| max.x + 1.0);
                    coords.insert(v, Point2::new(x, 0.0));
                    continue;
                }
            };
            let Some(parent) = self
                .graph
                .neighbors(v)
                .iter()
                .map(|nb| nb.v)
                .find(|&u| members.contains(&u) && coords.contains_key(u))
            else {
                continue;
            };
            let origin = coords[parent];
            let occupied: Vec<Point2<f64>> = self
                .graph
                .neighbors(parent)
                .iter()
                .filter_map(|nb| coords.get(nb.v).copied())
                .collect();
            let dir = try_normalize(&largest_gap_direction(&origin, &occupied))
                .unwrap_or_else(|| Vector2::new(1.0, 0.0));
            coords.insert(v, origin + dir);
        }
    }
}
