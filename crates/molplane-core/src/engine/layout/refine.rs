use super::context::LayoutContext;
use super::graph::LayoutGraph;
use crate::core::graph::{Topology, VertexId};
use crate::core::utils::geometry::{
    angle_of, bounding_box, centroid, normalize_angle, reflect_across_line, rotate_about,
    try_normalize,
};
use crate::core::utils::spatial::SpatialIndex;
use crate::engine::error::LayoutError;
use nalgebra::Point2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::f64::consts::{PI, TAU};
use tracing::{debug, trace};

const CONTACT_DISTANCE: f64 = 1.0;
const MIN_DISTANCE: f64 = 0.1;
const MAX_ROTATION: f64 = PI / 6.0;
const MAX_STRETCH: f64 = 0.1;
const LINE_SEARCH_STEPS: usize = 8;
const IMPROVEMENT_EPS: f64 = 1e-9;
const CANONICAL_STEPS: usize = 180;

/// The lighter side of a chain bond, free to move rigidly about `pivot`.
#[derive(Debug, Clone)]
struct Branch {
    pivot: VertexId,
    root: VertexId,
    members: Vec<VertexId>,
    member_set: HashSet<VertexId>,
}

impl Branch {
    fn new(pivot: VertexId, root: VertexId, members: Vec<VertexId>) -> Self {
        let member_set = members.iter().copied().collect();
        Self {
            pivot,
            root,
            members,
            member_set,
        }
    }
}

/// Continuous branch moves, driven by a numeric derivative.
#[derive(Debug, Clone, Copy)]
enum Motion {
    /// About the pivot, in radians.
    Rotate,
    /// Along the bridge bond.
    Stretch,
}

/// Positions of a component plus what the branch energy needs to know.
struct RefinementState<'g> {
    layout: &'g LayoutGraph,
    positions: HashMap<VertexId, Point2<f64>>,
    index: SpatialIndex<VertexId>,
    /// Largest bridge-bond deviation a stretch may leave behind.
    bond_tolerance: f64,
}

impl<'g> RefinementState<'g> {
    fn new(layout: &'g LayoutGraph, vertices: &[VertexId], bond_tolerance: f64) -> Self {
        let positions: HashMap<VertexId, Point2<f64>> =
            vertices.iter().map(|&v| (v, layout.vertices[v].pos)).collect();
        let index = SpatialIndex::from_points(positions.iter().map(|(&v, &p)| (v, p)));
        Self {
            layout,
            positions,
            index,
            bond_tolerance,
        }
    }

    fn position(&self, v: VertexId, trial: &HashMap<VertexId, Point2<f64>>) -> Point2<f64> {
        trial.get(&v).or_else(|| self.positions.get(&v)).copied().unwrap_or_else(Point2::origin)
    }

    /// Deviation of the angular spread around `v` from the ideal one: evenly
    /// spaced neighbors, or 120 degrees for two.
    fn angle_energy(&self, v: VertexId, trial: &HashMap<VertexId, Point2<f64>>) -> f64 {
        let center = self.position(v, trial);
        let mut angles: Vec<f64> = self
            .layout
            .graph
            .neighbors(v)
            .iter()
            .filter_map(|nb| try_normalize(&(self.position(nb.v, trial) - center)))
            .map(|d| normalize_angle(angle_of(&d)))
            .collect();
        if angles.len() < 2 {
            return 0.0;
        }
        angles.sort_by(f64::total_cmp);
        let gaps: Vec<f64> = angles
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                let next = angles.get(i + 1).copied().unwrap_or(angles[0] + TAU);
                next - a
            })
            .collect();
        if gaps.len() == 2 {
            let smaller = gaps[0].min(gaps[1]);
            return (smaller - 2.0 * PI / 3.0).powi(2);
        }
        let ideal = TAU / gaps.len() as f64;
        gaps.iter().map(|g| (g - ideal).powi(2)).sum()
    }

    fn contact_energy(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
        let d = (a - b).norm().max(MIN_DISTANCE);
        if d < CONTACT_DISTANCE {
            1.0 / (d * d) - 1.0 / (CONTACT_DISTANCE * CONTACT_DISTANCE)
        } else {
            0.0
        }
    }

    fn bond_deviation(&self, branch: &Branch, trial: &HashMap<VertexId, Point2<f64>>) -> f64 {
        let root = self.position(branch.root, trial);
        let pivot = self.position(branch.pivot, trial);
        ((root - pivot).norm() - 1.0).abs()
    }

    /// Energy terms that change when `branch` moves rigidly: the bridge bond,
    /// the angles at the pivot and contacts between the branch and the rest.
    ///
    /// Only vertices outside the branch are indexed at their settled
    /// positions, so contacts come from a radius query per member.
    fn branch_energy(&self, branch: &Branch, trial: &HashMap<VertexId, Point2<f64>>) -> f64 {
        let bond = self.bond_deviation(branch, trial).powi(2);
        let angle = self.angle_energy(branch.pivot, trial);

        let mut contact = 0.0;
        for &m in &branch.members {
            let pm = self.position(m, trial);
            for (s, ps) in self.index.within(&pm, CONTACT_DISTANCE) {
                if branch.member_set.contains(&s) || (m == branch.root && s == branch.pivot) {
                    continue;
                }
                contact += Self::contact_energy(&pm, &ps);
            }
        }
        bond + angle + contact
    }

    fn moved(&self, branch: &Branch, f: impl Fn(&Point2<f64>) -> Point2<f64>) -> HashMap<VertexId, Point2<f64>> {
        branch
            .members
            .iter()
            .map(|&m| (m, f(&self.position(m, &HashMap::new()))))
            .collect()
    }

    fn rotated(&self, branch: &Branch, angle: f64) -> HashMap<VertexId, Point2<f64>> {
        let pivot = self.position(branch.pivot, &HashMap::new());
        self.moved(branch, |p| rotate_about(p, &pivot, angle))
    }

    fn stretched(&self, branch: &Branch, delta: f64) -> HashMap<VertexId, Point2<f64>> {
        let none = HashMap::new();
        let axis = try_normalize(&(self.position(branch.root, &none) - self.position(branch.pivot, &none)))
            .unwrap_or_default();
        self.moved(branch, |p| p + axis * delta)
    }

    fn flipped(&self, branch: &Branch) -> HashMap<VertexId, Point2<f64>> {
        let none = HashMap::new();
        let pivot = self.position(branch.pivot, &none);
        let root = self.position(branch.root, &none);
        self.moved(branch, |p| reflect_across_line(p, &pivot, &root))
    }

    fn apply(&self, motion: Motion, branch: &Branch, amount: f64) -> HashMap<VertexId, Point2<f64>> {
        match motion {
            Motion::Rotate => self.rotated(branch, amount),
            Motion::Stretch => self.stretched(branch, amount),
        }
    }

    /// A stretch may not push the bridge bond out of tolerance, nor further
    /// out when it already is.
    fn stretch_allowed(&self, branch: &Branch, trial: &HashMap<VertexId, Point2<f64>>) -> bool {
        let after = self.bond_deviation(branch, trial);
        after <= self.bond_tolerance || after < self.bond_deviation(branch, &HashMap::new())
    }

    fn accept(&mut self, trial: HashMap<VertexId, Point2<f64>>) {
        for (v, p) in trial {
            if let Some(old) = self.positions.insert(v, p) {
                self.index.relocate(v, &old, &p);
            }
        }
    }

    /// Tries the flip, rotate and stretch moves in turn and keeps those that
    /// lower the branch energy. Returns the total improvement.
    fn improve_branch(&mut self, branch: &Branch, h: f64) -> f64 {
        let mut gained = 0.0;
        let mut current = self.branch_energy(branch, &HashMap::new());

        let flipped = self.flipped(branch);
        let flipped_energy = self.branch_energy(branch, &flipped);
        if flipped_energy < current - IMPROVEMENT_EPS {
            gained += current - flipped_energy;
            current = flipped_energy;
            self.accept(flipped);
        }

        for (motion, limit) in [(Motion::Rotate, MAX_ROTATION), (Motion::Stretch, MAX_STRETCH)] {
            let plus = self.branch_energy(branch, &self.apply(motion, branch, h));
            let minus = self.branch_energy(branch, &self.apply(motion, branch, -h));
            let derivative = (plus - minus) / (2.0 * h);
            if derivative.abs() < IMPROVEMENT_EPS {
                continue;
            }
            let mut amount = (-derivative).clamp(-limit, limit);
            for _ in 0..LINE_SEARCH_STEPS {
                let trial = self.apply(motion, branch, amount);
                amount /= 2.0;
                if matches!(motion, Motion::Stretch) && !self.stretch_allowed(branch, &trial) {
                    continue;
                }
                let energy = self.branch_energy(branch, &trial);
                if energy < current - IMPROVEMENT_EPS {
                    gained += current - energy;
                    current = energy;
                    self.accept(trial);
                    break;
                }
            }
        }
        gained
    }
}

impl LayoutGraph {
    /// Chain bonds whose lighter side holds no fixed vertex.
    ///
    /// Chain bonds are bridges, so they are tree edges of any depth-first
    /// tree of the component and one side is a contiguous preorder range.
    /// A single traversal with subtree sizes gives every side.
    fn find_branches(&self, vertices: &[VertexId]) -> Result<Vec<Branch>, LayoutError> {
        let Some(&start) = vertices.first() else {
            return Ok(Vec::new());
        };
        let inside: HashSet<VertexId> = vertices.iter().copied().collect();

        let mut order: Vec<VertexId> = Vec::with_capacity(vertices.len());
        let mut preorder: HashMap<VertexId, usize> = HashMap::with_capacity(vertices.len());
        let mut parent: Vec<Option<usize>> = Vec::with_capacity(vertices.len());
        let mut stack: Vec<(VertexId, Option<usize>)> = vec![(start, None)];
        while let Some((v, from)) = stack.pop() {
            if preorder.contains_key(&v) {
                continue;
            }
            let i = order.len();
            preorder.insert(v, i);
            order.push(v);
            parent.push(from);
            for nb in self.graph.neighbors(v) {
                if inside.contains(&nb.v) && !preorder.contains_key(&nb.v) {
                    stack.push((nb.v, Some(i)));
                }
            }
        }

        let n = order.len();
        let mut size = vec![1usize; n];
        let mut fixed_below: Vec<usize> = order.iter().map(|&v| usize::from(self.is_fixed(v))).collect();
        let total_fixed: usize = fixed_below.iter().sum();
        for i in (1..n).rev() {
            if let Some(p) = parent[i] {
                size[p] += size[i];
                fixed_below[p] += fixed_below[i];
            }
        }

        let mut branches = Vec::new();
        for (e, edge) in self.graph.edges_iter() {
            if !inside.contains(&edge.beg) || self.graph.edge_topology(e)? != Topology::Chain {
                continue;
            }
            let (Some(&b), Some(&d)) = (preorder.get(&edge.beg), preorder.get(&edge.end)) else {
                continue;
            };
            let (child, end_is_child) = if parent[d] == Some(b) {
                (d, true)
            } else if parent[b] == Some(d) {
                (b, false)
            } else {
                continue;
            };
            let below = child..child + size[child];
            let (end_size, beg_size) = if end_is_child {
                (size[child], n - size[child])
            } else {
                (n - size[child], size[child])
            };
            let (root, pivot) = if end_size <= beg_size {
                (edge.end, edge.beg)
            } else {
                (edge.beg, edge.end)
            };
            let root_is_child = (root == edge.end) == end_is_child;
            let (members, fixed) = if root_is_child {
                (order[below].to_vec(), fixed_below[child])
            } else {
                let mut rest = order[..below.start].to_vec();
                rest.extend_from_slice(&order[below.end..]);
                (rest, total_fixed - fixed_below[child])
            };
            if fixed > 0 {
                continue;
            }
            branches.push(Branch::new(pivot, root, members));
        }
        Ok(branches)
    }

    /// Improves a component by moving its branches rigidly.
    ///
    /// Each round visits the branches in an order drawn from the seeded
    /// generator and stops once a round gains less than the configured
    /// threshold. Returns the total energy gained.
    pub(super) fn refine(&mut self, vertices: &[VertexId], ctx: &LayoutContext) -> Result<f64, LayoutError> {
        let config = &ctx.config.refinement;
        let mut branches = self.find_branches(vertices)?;
        if branches.is_empty() {
            return Ok(0.0);
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut state = RefinementState::new(self, vertices, ctx.config.smoothing.bond_tolerance);
        let mut total = 0.0;

        for round in 0..config.max_iterations {
            ctx.check_cancelled()?;
            branches.shuffle(&mut rng);
            let gained: f64 = branches
                .iter()
                .map(|branch| state.improve_branch(branch, config.approx_step))
                .sum();
            total += gained;
            trace!(round, gained, "Refinement round finished.");
            if gained < config.energy_threshold {
                break;
            }
        }

        let positions = state.positions;
        for (v, p) in positions {
            self.set_position(v, p);
        }
        debug!(branches = branches.len(), total, "Refinement finished.");
        Ok(total)
    }

    /// Rotates a free component about its centroid to the orientation with
    /// the smallest bounding-box height, trying whole degrees.
    pub(super) fn rotate_to_canonical(&mut self, vertices: &[VertexId]) {
        let points: Vec<Point2<f64>> = vertices.iter().map(|&v| self.vertices[v].pos).collect();
        let Some(center) = centroid(&points) else {
            return;
        };
        let height = |angle: f64| {
            let rotated: Vec<Point2<f64>> = points.iter().map(|p| rotate_about(p, &center, angle)).collect();
            bounding_box(&rotated).map_or(0.0, |(min, max)| max.y - min.y)
        };

        let mut best = (height(0.0), 0.0);
        for step in 1..CANONICAL_STEPS {
            let angle = (step as f64).to_radians();
            let h = height(angle);
            if h < best.0 - 1e-9 {
                best = (h, angle);
            }
        }
        if best.1 == 0.0 {
            return;
        }
        for &v in vertices {
            let p = rotate_about(&self.vertices[v].pos, &center, best.1);
            self.set_position(v, p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::LayoutConfig;
    use crate::engine::layout::graph::tests::{bond_lengths, layout_graph};

    #[test]
    fn branches_are_the_lighter_side_of_chain_bonds() {
        // Hexagon with one methyl: only the methyl bond is a chain bond.
        let mut bonds: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        bonds.push((0, 6));
        let (graph, ids) = layout_graph(7, &bonds);
        let branches = graph.find_branches(&ids).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].root, ids[6]);
        assert_eq!(branches[0].pivot, ids[0]);
        assert_eq!(branches[0].members, vec![ids[6]]);
    }

    #[test]
    fn refinement_opens_a_squeezed_angle() {
        // Propane bent to 60 degrees.
        let (mut graph, ids) = layout_graph(3, &[(0, 1), (1, 2)]);
        graph.set_position(ids[0], Point2::new(1.0, 0.0));
        graph.set_position(ids[1], Point2::new(0.0, 0.0));
        graph.set_position(ids[2], Point2::new(0.5, 3f64.sqrt() / 2.0));

        let config = LayoutConfig::default();
        let gained = graph.refine(&ids, &LayoutContext::new(&config, None)).unwrap();
        assert!(gained > 0.0);

        let a = graph.position(ids[0]).unwrap() - graph.position(ids[1]).unwrap();
        let b = graph.position(ids[2]).unwrap() - graph.position(ids[1]).unwrap();
        let angle = (a.dot(&b) / (a.norm() * b.norm())).acos();
        assert!(angle > 100f64.to_radians());
        for length in bond_lengths(&graph) {
            assert!((length - 1.0).abs() < 0.05);
        }
    }

    #[test]
    fn stretching_keeps_bonds_within_tolerance() {
        // Four substituents crammed into a 30 degree fan.
        let (mut graph, ids) = layout_graph(5, &[(0, 1), (0, 2), (0, 3), (0, 4)]);
        for (i, &v) in ids[1..].iter().enumerate() {
            let angle = (10.0 * i as f64).to_radians();
            graph.set_position(v, Point2::new(angle.cos(), angle.sin()));
        }
        let config = LayoutConfig::default();
        graph.refine(&ids, &LayoutContext::new(&config, None)).unwrap();

        let tolerance = config.smoothing.bond_tolerance;
        for length in bond_lengths(&graph) {
            assert!((length - 1.0).abs() <= tolerance + 1e-9, "bond length {length}");
        }
    }

    #[test]
    fn backbone_branch_holds_the_smaller_side() {
        // 0-1-2-3-4 with a methyl on 1: bond 2-3 splits {0,1,2,5} from {3,4}.
        let (graph, ids) = layout_graph(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (1, 5)]);
        let branches = graph.find_branches(&ids).unwrap();
        assert_eq!(branches.len(), 5);
        let middle = branches
            .iter()
            .find(|b| (b.pivot == ids[2] && b.root == ids[3]) || (b.pivot == ids[3] && b.root == ids[2]))
            .unwrap();
        assert_eq!(middle.root, ids[3]);
        let mut members = middle.members.clone();
        members.sort();
        let mut expected = vec![ids[3], ids[4]];
        expected.sort();
        assert_eq!(members, expected);
    }

    #[test]
    fn refinement_is_deterministic_for_a_seed() {
        let bonds = [(0, 1), (1, 2), (1, 3), (3, 4)];
        let run = || {
            let (mut graph, ids) = layout_graph(5, &bonds);
            for (i, &v) in ids.iter().enumerate() {
                graph.set_position(v, Point2::new(i as f64 * 0.5, (i % 2) as f64 * 0.3));
            }
            let config = LayoutConfig::default();
            graph.refine(&ids, &LayoutContext::new(&config, None)).unwrap();
            ids.iter().map(|&v| graph.position(v).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn canonical_rotation_lays_a_bond_flat() {
        let (mut graph, ids) = layout_graph(2, &[(0, 1)]);
        graph.set_position(ids[0], Point2::new(0.0, 0.0));
        graph.set_position(ids[1], Point2::new(0.6, 0.8));
        graph.rotate_to_canonical(&ids);
        let d = graph.position(ids[1]).unwrap() - graph.position(ids[0]).unwrap();
        assert!(d.y.abs() < 0.01);
        assert!((d.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cancelled_refinement_fails() {
        let (mut graph, ids) = layout_graph(3, &[(0, 1), (1, 2)]);
        let config = LayoutConfig::default();
        let handler = crate::engine::cancellation::FlagCancellationHandler::new();
        handler.cancel();
        let result = graph.refine(&ids, &LayoutContext::new(&config, Some(&handler)));
        assert!(matches!(result, Err(LayoutError::Cancelled { .. })));
    }
}
