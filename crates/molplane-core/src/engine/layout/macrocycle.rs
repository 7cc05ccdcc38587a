use super::context::LayoutContext;
use super::graph::LayoutGraph;
use crate::core::graph::VertexId;
use crate::core::utils::spatial::SpatialIndex;
use crate::engine::error::LayoutError;
use nalgebra::{Point2, Vector2};
use slotmap::SecondaryMap;
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use tracing::trace;

const BOND_WEIGHT: f64 = 1.0;
const ANGLE_WEIGHT: f64 = 0.5;
const REPULSION_WEIGHT: f64 = 1.0;
const INITIAL_STEP: f64 = 0.1;
const MAX_STEP: f64 = 0.5;
const MIN_STEP: f64 = 1e-6;
const CONVERGENCE: f64 = 1e-9;
const CANCELLATION_POLL: usize = 16;
const REPULSION_CUTOFF: f64 = 3.0;

#[derive(Debug, Clone, Copy)]
enum Term {
    Bond(usize, usize),
    Angle {
        center: usize,
        a: usize,
        b: usize,
        ideal: f64,
    },
    Repulsion(usize, usize),
}

impl Term {
    fn energy(&self, pos: &[Point2<f64>]) -> f64 {
        match *self {
            Term::Bond(i, j) => BOND_WEIGHT * ((pos[i] - pos[j]).norm() - 1.0).powi(2),
            Term::Angle { center, a, b, ideal } => {
                let u = pos[a] - pos[center];
                let v = pos[b] - pos[center];
                let denom = u.norm() * v.norm();
                if denom < 1e-12 {
                    return ANGLE_WEIGHT * PI * PI;
                }
                let angle = (u.dot(&v) / denom).clamp(-1.0, 1.0).acos();
                ANGLE_WEIGHT * (angle - ideal).powi(2)
            }
            Term::Repulsion(i, j) => {
                let d = (pos[i] - pos[j]).norm();
                if d < 1.0 {
                    REPULSION_WEIGHT * (1.0 - d).powi(2)
                } else {
                    0.0
                }
            }
        }
    }

    /// Records `self` as term number `terms.len()` for each vertex it involves.
    fn push_into(self, terms: &mut Vec<Term>, touching: &mut [Vec<usize>]) {
        let t = terms.len();
        match self {
            Term::Bond(i, j) | Term::Repulsion(i, j) => {
                touching[i].push(t);
                touching[j].push(t);
            }
            Term::Angle { center, a, b, .. } => {
                touching[center].push(t);
                touching[a].push(t);
                touching[b].push(t);
            }
        }
        terms.push(self);
    }
}

/// Dense copy of a set of vertices with the energy terms between them.
struct Region {
    ids: Vec<VertexId>,
    pos: Vec<Point2<f64>>,
    movable: Vec<bool>,
    terms: Vec<Term>,
    /// Terms involving each vertex, by index into `terms`.
    touching: Vec<Vec<usize>>,
}

impl Region {
    fn energy_of(&self, pos: &[Point2<f64>]) -> f64 {
        self.terms.iter().map(|t| t.energy(pos)).sum()
    }

    fn local_energy(&self, k: usize) -> f64 {
        self.touching[k]
            .iter()
            .map(|&t| self.terms[t].energy(&self.pos))
            .sum()
    }

    /// Central finite-difference gradient with step `h`.
    fn gradient(&mut self, h: f64) -> Vec<Vector2<f64>> {
        let mut gradient = vec![Vector2::zeros(); self.pos.len()];
        for k in 0..self.pos.len() {
            if !self.movable[k] {
                continue;
            }
            let original = self.pos[k];
            for axis in 0..2 {
                self.pos[k][axis] = original[axis] + h;
                let plus = self.local_energy(k);
                self.pos[k][axis] = original[axis] - h;
                let minus = self.local_energy(k);
                self.pos[k][axis] = original[axis];
                gradient[k][axis] = (plus - minus) / (2.0 * h);
            }
        }
        gradient
    }
}

impl LayoutGraph {
    fn build_region(
        &self,
        coords: &SecondaryMap<VertexId, Point2<f64>>,
        pinned: &HashSet<VertexId>,
    ) -> Region {
        let ids: Vec<VertexId> = coords.keys().collect();
        let index: HashMap<VertexId, usize> = ids.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let pos: Vec<Point2<f64>> = ids.iter().map(|&v| coords[v]).collect();
        let movable: Vec<bool> = ids.iter().map(|v| !pinned.contains(v)).collect();

        let neighbors: Vec<Vec<usize>> = ids
            .iter()
            .map(|&v| {
                self.graph
                    .neighbors(v)
                    .iter()
                    .filter_map(|nb| index.get(&nb.v).copied())
                    .collect()
            })
            .collect();

        let mut terms = Vec::new();
        let mut touching: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        for (i, list) in neighbors.iter().enumerate() {
            for &j in list.iter().filter(|&&j| j > i) {
                Term::Bond(i, j).push_into(&mut terms, &mut touching);
            }
            if let [a, b] = list.as_slice() {
                let ideal = match self.graph.vertex_smallest_ring_size(ids[i]) {
                    Some(n) if n >= 3 => PI * (n as f64 - 2.0) / n as f64,
                    _ => 2.0 * PI / 3.0,
                };
                Term::Angle {
                    center: i,
                    a: *a,
                    b: *b,
                    ideal,
                }
                .push_into(&mut terms, &mut touching);
            }
        }

        // Pairs further apart than the cutoff at the start never repel.
        let nearby = SpatialIndex::from_points(pos.iter().copied().enumerate());
        for i in 0..ids.len() {
            let mut close: Vec<usize> = nearby
                .within(&pos[i], REPULSION_CUTOFF)
                .map(|(j, _)| j)
                .filter(|&j| j > i)
                .collect();
            close.sort_unstable();
            for j in close {
                let bonded = neighbors[i].contains(&j);
                let geminal = neighbors[i].iter().any(|k| neighbors[j].contains(k));
                if !bonded && !geminal {
                    Term::Repulsion(i, j).push_into(&mut terms, &mut touching);
                }
            }
        }

        Region {
            ids,
            pos,
            movable,
            terms,
            touching,
        }
    }

    /// Gradient descent on bond length, bond angle and contact energy for
    /// the vertices in `coords`, keeping `pinned` vertices in place.
    ///
    /// Returns the number of iterations performed. Polls the cancellation
    /// handler while iterating.
    pub(super) fn smooth_region(
        &self,
        coords: &mut SecondaryMap<VertexId, Point2<f64>>,
        pinned: &HashSet<VertexId>,
        ctx: &LayoutContext,
    ) -> Result<usize, LayoutError> {
        let mut region = self.build_region(coords, pinned);
        if !region.movable.iter().any(|&m| m) {
            return Ok(0);
        }
        let h = ctx.config.refinement.approx_step;
        let mut energy = region.energy_of(&region.pos);
        let initial = energy;
        let mut step = INITIAL_STEP;
        let mut iterations = 0;

        for iteration in 0..ctx.config.smoothing.max_iterations {
            if iteration % CANCELLATION_POLL == 0 {
                ctx.check_cancelled()?;
            }
            iterations = iteration + 1;
            let gradient = region.gradient(h);
            let norm = gradient.iter().map(Vector2::norm_squared).sum::<f64>().sqrt();
            if norm < CONVERGENCE {
                break;
            }

            let mut improved = None;
            while step > MIN_STEP {
                let trial: Vec<Point2<f64>> = region
                    .pos
                    .iter()
                    .zip(&gradient)
                    .map(|(p, g)| p - g * (step / norm))
                    .collect();
                let trial_energy = region.energy_of(&trial);
                if trial_energy < energy {
                    improved = Some((trial, trial_energy));
                    break;
                }
                step /= 2.0;
            }
            let Some((trial, trial_energy)) = improved else {
                break;
            };
            region.pos = trial;
            let delta = energy - trial_energy;
            energy = trial_energy;
            step = (step * 1.5).min(MAX_STEP);
            if delta < CONVERGENCE {
                break;
            }
        }

        for (k, &v) in region.ids.iter().enumerate() {
            if region.movable[k] {
                coords.insert(v, region.pos[k]);
            }
        }
        trace!(iterations, initial, energy, "Region smoothed.");
        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::regular_polygon;
    use crate::engine::config::LayoutConfig;
    use crate::engine::layout::graph::tests::layout_graph;

    fn ring(n: usize) -> (LayoutGraph, Vec<VertexId>) {
        let bonds: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        layout_graph(n, &bonds)
    }

    fn max_bond_error(graph: &LayoutGraph, coords: &SecondaryMap<VertexId, Point2<f64>>) -> f64 {
        graph
            .graph()
            .edges_iter()
            .map(|(_, e)| ((coords[e.beg] - coords[e.end]).norm() - 1.0).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn distorted_ring_relaxes_toward_unit_bonds() {
        let (graph, ids) = ring(6);
        let mut coords: SecondaryMap<VertexId, Point2<f64>> = ids
            .iter()
            .zip(regular_polygon(6, 1.0))
            .map(|(&v, p)| (v, Point2::new(p.x * 1.4, p.y * 0.8)))
            .collect();
        let before = max_bond_error(&graph, &coords);

        let config = LayoutConfig::default();
        let ctx = LayoutContext::new(&config, None);
        let iterations = graph.smooth_region(&mut coords, &HashSet::new(), &ctx).unwrap();

        assert!(iterations > 0);
        assert!(max_bond_error(&graph, &coords) < before / 2.0);
    }

    #[test]
    fn pinned_vertices_do_not_move() {
        let (graph, ids) = ring(5);
        let mut coords: SecondaryMap<VertexId, Point2<f64>> = ids
            .iter()
            .zip(regular_polygon(5, 1.3))
            .map(|(&v, p)| (v, p))
            .collect();
        let pinned: HashSet<VertexId> = ids[..2].iter().copied().collect();
        let before: Vec<Point2<f64>> = ids[..2].iter().map(|&v| coords[v]).collect();

        let config = LayoutConfig::default();
        graph
            .smooth_region(&mut coords, &pinned, &LayoutContext::new(&config, None))
            .unwrap();
        assert_eq!(coords[ids[0]], before[0]);
        assert_eq!(coords[ids[1]], before[1]);
    }

    #[test]
    fn regular_macrocycle_is_already_relaxed() {
        let (graph, ids) = ring(12);
        let mut coords: SecondaryMap<VertexId, Point2<f64>> =
            ids.iter().zip(regular_polygon(12, 1.0)).map(|(&v, p)| (v, p)).collect();
        let config = LayoutConfig::default();
        graph
            .smooth_region(&mut coords, &HashSet::new(), &LayoutContext::new(&config, None))
            .unwrap();
        assert!(max_bond_error(&graph, &coords) < 1e-6);
    }

    #[test]
    fn repulsion_terms_are_limited_to_nearby_pairs() {
        let n = 300;
        let (graph, ids) = ring(n);
        let coords: SecondaryMap<VertexId, Point2<f64>> =
            ids.iter().zip(regular_polygon(n, 1.0)).map(|(&v, p)| (v, p)).collect();
        let region = graph.build_region(&coords, &HashSet::new());

        let repulsions = region.terms.iter().filter(|t| matches!(t, Term::Repulsion(..))).count();
        assert_eq!(region.terms.len() - repulsions, 2 * n);
        assert!(repulsions <= 2 * n);
        for (k, list) in region.touching.iter().enumerate() {
            assert!(list.len() >= 5, "vertex {k} has {} terms", list.len());
        }
    }

    #[test]
    fn smoothing_stops_when_cancelled() {
        let (graph, ids) = ring(6);
        let mut coords: SecondaryMap<VertexId, Point2<f64>> =
            ids.iter().map(|&v| (v, Point2::origin())).collect();
        let config = LayoutConfig::default();
        let handler = crate::engine::cancellation::TimeoutCancellationHandler::new(0);
        let result = graph.smooth_region(&mut coords, &HashSet::new(), &LayoutContext::new(&config, Some(&handler)));
        assert!(matches!(result, Err(LayoutError::Cancelled { .. })));
    }
}
