use super::context::LayoutContext;
use super::graph::{DrawState, LayoutGraph};
use crate::core::graph::{BiconnectedComponent, BiconnectedDecomposer, GraphError, VertexId};
use crate::core::utils::geometry::{
    RigidTransform2, angle_of, best_fit_transform, calculate_rmsd, centroid, largest_gap_direction, regular_polygon,
    try_normalize,
};
use crate::engine::error::LayoutError;
use nalgebra::{Point2, Rotation2, Vector2};
use slotmap::SecondaryMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::f64::consts::PI;
use tracing::{debug, trace};

/// Relative tolerance for treating fixed ring coordinates as a regular polygon.
const REGULARITY_TOLERANCE: f64 = 1e-2;

/// Coordinates of one block in its own frame, before it is moved into place.
pub(super) struct LocalBlock {
    pub coords: SecondaryMap<VertexId, Point2<f64>>,
    /// Number of drawn rings each vertex belongs to.
    pub ring_membership: SecondaryMap<VertexId, usize>,
}

fn ordered_pair(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b { (a, b) } else { (b, a) }
}

fn is_regular_polygon(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    let Some(center) = centroid(points) else {
        return false;
    };
    let sides: Vec<f64> = (0..n).map(|i| (points[(i + 1) % n] - points[i]).norm()).collect();
    let radii: Vec<f64> = points.iter().map(|p| (p - center).norm()).collect();
    let uniform = |values: &[f64]| {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        mean > 0.0 && values.iter().all(|v| (v - mean).abs() <= REGULARITY_TOLERANCE * mean)
    };
    uniform(&sides) && uniform(&radii)
}

impl LayoutGraph {
    /// Ring edges whose fixed coordinates already form a regular polygon.
    fn regular_fixed_ring_edges(&self) -> Result<HashSet<(VertexId, VertexId)>, GraphError> {
        let mut edges = HashSet::new();
        for idx in 0..self.graph.sssr_count() {
            let ring = self.graph.sssr_vertices(idx)?;
            if !ring.iter().all(|&v| self.is_fixed(v)) {
                continue;
            }
            let points: Vec<Point2<f64>> = ring.iter().map(|&v| self.vertices[v].pos).collect();
            if is_regular_polygon(&points) {
                for i in 0..ring.len() {
                    edges.insert(ordered_pair(ring[i], ring[(i + 1) % ring.len()]));
                }
            }
        }
        Ok(edges)
    }

    /// Fits a regular unit polygon onto the fixed vertices of `ring`, trying
    /// both windings. Ties go to the winding that keeps the new vertices
    /// furthest from fixed vertices outside the ring.
    fn fit_ring_polygon(&self, ring: &[VertexId]) -> Option<Vec<Point2<f64>>> {
        let polygon = regular_polygon(ring.len(), 1.0);
        let mirrored: Vec<Point2<f64>> = polygon.iter().map(|p| Point2::new(-p.x, p.y)).collect();
        let anchors: Vec<usize> = (0..ring.len()).filter(|&i| self.is_fixed(ring[i])).collect();
        let dst: Vec<Point2<f64>> = anchors.iter().map(|&i| self.vertices[ring[i]].pos).collect();
        let outside: Vec<Point2<f64>> = self
            .vertices
            .iter()
            .filter(|&(v, _)| self.is_fixed(v) && !ring.contains(&v))
            .map(|(_, lv)| lv.pos)
            .collect();

        let candidate = |shape: &[Point2<f64>]| -> Option<(f64, f64, Vec<Point2<f64>>)> {
            let src: Vec<Point2<f64>> = anchors.iter().map(|&i| shape[i]).collect();
            let fit = best_fit_transform(&src, &dst, false)?;
            let placed: Vec<Point2<f64>> = shape.iter().map(|p| fit.apply(p)).collect();
            let fitted: Vec<Point2<f64>> = anchors.iter().map(|&i| placed[i]).collect();
            let rmsd = calculate_rmsd(&fitted, &dst)?;
            let placed_ref = &placed;
            let clearance = (0..ring.len())
                .filter(|i| !anchors.contains(i))
                .flat_map(|i| outside.iter().map(move |q| (placed_ref[i] - q).norm()))
                .fold(f64::INFINITY, f64::min);
            Some((rmsd, clearance, placed))
        };

        match (candidate(&polygon), candidate(&mirrored)) {
            (Some(a), Some(b)) => {
                let pick_b = b.0 < a.0 - REGULARITY_TOLERANCE
                    || ((b.0 - a.0).abs() <= REGULARITY_TOLERANCE && b.1 > a.1 + 1e-9);
                Some(if pick_b { b.2 } else { a.2 })
            }
            (a, b) => a.or(b).map(|(_, _, placed)| placed),
        }
    }

    /// Completes every ring holding at least two fixed vertices and some free
    /// ones as a regular polygon through the fixed ones.
    ///
    /// The completed vertices are pinned, so fused rings sharing them are
    /// completed in turn. Returns the number of rings completed.
    pub(super) fn complete_partially_fixed_rings(&mut self) -> Result<usize, GraphError> {
        let mut completed = 0;
        loop {
            let mut progress = false;
            for idx in 0..self.graph.sssr_count() {
                let ring = self.graph.sssr_vertices(idx)?.to_vec();
                let fixed = ring.iter().filter(|&&v| self.is_fixed(v)).count();
                if fixed < 2 || fixed == ring.len() {
                    continue;
                }
                let Some(placed) = self.fit_ring_polygon(&ring) else {
                    continue;
                };
                for (&v, p) in ring.iter().zip(placed) {
                    if self.is_fixed(v) {
                        continue;
                    }
                    if let Some(lv) = self.vertices.get_mut(v) {
                        lv.pos = p;
                        lv.pinned = true;
                    }
                }
                trace!(ring = idx, size = ring.len(), fixed, "Ring completed around fixed vertices.");
                completed += 1;
                progress = true;
            }
            if !progress {
                return Ok(completed);
            }
        }
    }

    /// Biconnected blocks, split between fixed and free vertices when any
    /// vertex is fixed.
    pub(super) fn decompose_blocks(&self) -> Result<Vec<BiconnectedComponent>, GraphError> {
        let fixed: SecondaryMap<VertexId, bool> =
            self.vertices.keys().map(|v| (v, self.is_fixed(v))).collect();
        let split_fixed = fixed.values().any(|&f| f);
        let regular = self.regular_fixed_ring_edges()?;

        let mut decomposer = BiconnectedDecomposer::new(&self.graph, split_fixed)
            .with_regular_polygon_test(Box::new(
                move |v: VertexId, w: VertexId, _: Option<&SecondaryMap<VertexId, bool>>| {
                    regular.contains(&ordered_pair(v, w))
                },
            ));
        decomposer.decompose_with_fixed(Some(&fixed));
        Ok(decomposer.into_components())
    }

    fn max_morgan(&self, block: &BiconnectedComponent) -> u64 {
        block
            .vertices
            .iter()
            .filter_map(|&v| self.vertices.get(v).map(|lv| lv.morgan_code))
            .max()
            .unwrap_or(0)
    }

    fn fixed_count(&self, block: &BiconnectedComponent) -> usize {
        block.vertices.iter().filter(|&&v| self.is_fixed(v)).count()
    }

    /// The block the component grows from: most fixed vertices, then cyclic
    /// over bridges, then size, then the highest Morgan code.
    fn choose_first_block(&self, blocks: &[BiconnectedComponent], candidates: &[usize]) -> Option<usize> {
        candidates.iter().copied().max_by(|&a, &b| {
            let key = |idx: usize| {
                let block = &blocks[idx];
                (
                    self.fixed_count(block),
                    !block.is_bridge(),
                    block.vertices.len(),
                    self.max_morgan(block),
                )
            };
            key(a).cmp(&key(b)).then_with(|| b.cmp(&a))
        })
    }

    fn place_block_locally(
        &self,
        block: &BiconnectedComponent,
        ctx: &LayoutContext,
    ) -> Result<LocalBlock, LayoutError> {
        if block.is_bridge() {
            let edge = self.graph.edge(block.edges[0])?;
            let mut coords = SecondaryMap::new();
            coords.insert(edge.beg, Point2::new(0.0, 0.0));
            coords.insert(edge.end, Point2::new(1.0, 0.0));
            return Ok(LocalBlock {
                coords,
                ring_membership: SecondaryMap::new(),
            });
        }

        let system = self.draw_ring_system(block)?;
        let mut local = LocalBlock {
            coords: system.coords,
            ring_membership: system.membership,
        };
        if self.fixed_count(block) == 0
            && self.needs_smoothing(block, &local.coords, system.largest_ring, ctx)?
        {
            let iterations = self.smooth_region(&mut local.coords, &HashSet::new(), ctx)?;
            trace!(iterations, largest_ring = system.largest_ring, "Smoothed ring block.");
        }
        Ok(local)
    }

    fn needs_smoothing(
        &self,
        block: &BiconnectedComponent,
        coords: &SecondaryMap<VertexId, Point2<f64>>,
        largest_ring: usize,
        ctx: &LayoutContext,
    ) -> Result<bool, GraphError> {
        let smoothing = &ctx.config.smoothing;
        if largest_ring >= smoothing.macrocycle_min_size {
            return Ok(true);
        }
        for &e in &block.edges {
            let edge = self.graph.edge(e)?;
            if let (Some(a), Some(b)) = (coords.get(edge.beg), coords.get(edge.end)) {
                if ((a - b).norm() - 1.0).abs() > smoothing.bond_tolerance {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Lays out one connected component block by block.
    ///
    /// Blocks are visited breadth first through articulation points, so every
    /// block after the first is attached to exactly one drawn vertex.
    pub(super) fn layout_component(
        &mut self,
        vertices: &[VertexId],
        blocks: &[BiconnectedComponent],
        block_ids: &[usize],
        ctx: &LayoutContext,
    ) -> Result<(), LayoutError> {
        let Some(first) = self.choose_first_block(blocks, block_ids) else {
            for &v in vertices {
                if !self.is_fixed(v) {
                    self.set_position(v, Point2::origin());
                }
                self.advance_vertex(v, DrawState::Boundary);
            }
            return Ok(());
        };

        let mut vertex_blocks: HashMap<VertexId, Vec<usize>> = HashMap::new();
        for &idx in block_ids {
            for &v in &blocks[idx].vertices {
                vertex_blocks.entry(v).or_default().push(idx);
            }
        }
        for list in vertex_blocks.values_mut() {
            list.sort_by(|&a, &b| {
                blocks[b]
                    .vertices
                    .len()
                    .cmp(&blocks[a].vertices.len())
                    .then(a.cmp(&b))
            });
        }

        let local = self.place_block_locally(&blocks[first], ctx)?;
        self.place_first_block(&blocks[first], &local)?;

        let mut placed: HashSet<usize> = HashSet::from([first]);
        let mut queue: VecDeque<usize> = VecDeque::from([first]);
        while let Some(current) = queue.pop_front() {
            ctx.check_cancelled()?;
            for &anchor in &blocks[current].vertices {
                let Some(neighbors) = vertex_blocks.get(&anchor) else {
                    continue;
                };
                for &next in neighbors {
                    if placed.insert(next) {
                        self.attach_block(&blocks[next], anchor, ctx)?;
                        queue.push_back(next);
                    }
                }
            }
        }
        debug!(blocks = placed.len(), "Component assembled.");
        self.relax_around_fixed(vertices, ctx)
    }

    /// Transform taking local block coordinates onto the fixed vertices, if
    /// the block holds at least two of them.
    fn fit_to_fixed(
        &self,
        block: &BiconnectedComponent,
        local: &LocalBlock,
    ) -> Option<RigidTransform2> {
        let (src, dst): (Vec<Point2<f64>>, Vec<Point2<f64>>) = block
            .vertices
            .iter()
            .filter(|&&v| self.is_fixed(v))
            .filter_map(|&v| Some((*local.coords.get(v)?, self.vertices[v].pos)))
            .unzip();
        if src.len() < 2 {
            return None;
        }
        let fit = best_fit_transform(&src, &dst, true)?;
        let fitted: Vec<Point2<f64>> = src.iter().map(|p| fit.apply(p)).collect();
        if let Some(rmsd) = calculate_rmsd(&fitted, &dst) {
            trace!(fixed = src.len(), rmsd, "Block fitted onto fixed vertices.");
        }
        Some(fit)
    }

    fn place_first_block(
        &mut self,
        block: &BiconnectedComponent,
        local: &LocalBlock,
    ) -> Result<(), LayoutError> {
        if let Some(fit) = self.fit_to_fixed(block, local) {
            return self.commit_block(block, local, |p| fit.apply(p));
        }
        let shift = block
            .vertices
            .iter()
            .find(|&&v| self.is_fixed(v))
            .and_then(|&v| Some(self.vertices[v].pos - local.coords.get(v)?))
            .unwrap_or_else(Vector2::zeros);
        self.commit_block(block, local, move |p| p + shift)
    }

    fn attach_block(
        &mut self,
        block: &BiconnectedComponent,
        anchor: VertexId,
        ctx: &LayoutContext,
    ) -> Result<(), LayoutError> {
        let local = self.place_block_locally(block, ctx)?;
        if let Some(fit) = self.fit_to_fixed(block, &local) {
            return self.commit_block(block, &local, |p| fit.apply(p));
        }

        let Some(&local_anchor) = local.coords.get(anchor) else {
            return Err(LayoutError::Internal(format!(
                "articulation vertex {anchor:?} missing from block coordinates"
            )));
        };
        let others: Vec<Point2<f64>> = block
            .vertices
            .iter()
            .filter(|&&v| v != anchor)
            .filter_map(|&v| local.coords.get(v).copied())
            .collect();
        let local_dir = centroid(&others)
            .and_then(|c| try_normalize(&(c - local_anchor)))
            .unwrap_or_else(|| Vector2::new(1.0, 0.0));

        let target = self.attachment_direction(anchor, block);
        let rotation = Rotation2::new(angle_of(&target) - angle_of(&local_dir));
        let anchor_pos = self.vertices[anchor].pos;
        trace!(?anchor, edges = block.edges.len(), "Attaching block.");
        self.commit_block(
            block,
            &local,
            move |p| anchor_pos + rotation * (p - local_anchor),
        )
    }

    /// Direction in which a new block grows away from `anchor`.
    fn attachment_direction(&self, anchor: VertexId, block: &BiconnectedComponent) -> Vector2<f64> {
        let anchor_pos = self.vertices[anchor].pos;
        let drawn: Vec<VertexId> = self
            .graph
            .neighbors(anchor)
            .iter()
            .map(|n| n.v)
            .filter(|&v| self.is_placed(v))
            .collect();

        match drawn.as_slice() {
            [] => Vector2::new(1.0, 0.0),
            [previous] => {
                let incoming = try_normalize(&(anchor_pos - self.vertices[*previous].pos))
                    .unwrap_or_else(|| Vector2::new(1.0, 0.0));
                if !block.is_bridge() {
                    return incoming;
                }
                // Zig-zag: turn 60 degrees to the side away from the atom
                // two bonds back.
                let candidates = [
                    Rotation2::new(PI / 3.0) * incoming,
                    Rotation2::new(-PI / 3.0) * incoming,
                ];
                let reference = self
                    .graph
                    .neighbors(*previous)
                    .iter()
                    .map(|n| n.v)
                    .find(|&v| v != anchor && self.is_placed(v));
                match reference {
                    Some(r) => {
                        let r_pos = self.vertices[r].pos;
                        let distance = |d: &Vector2<f64>| (anchor_pos + d - r_pos).norm();
                        if distance(&candidates[1]) > distance(&candidates[0]) + 1e-9 {
                            candidates[1]
                        } else {
                            candidates[0]
                        }
                    }
                    None => candidates[0],
                }
            }
            _ => {
                let occupied: Vec<Point2<f64>> =
                    drawn.iter().map(|&v| self.vertices[v].pos).collect();
                largest_gap_direction(&anchor_pos, &occupied)
            }
        }
    }

    /// Writes block coordinates through `transform`; vertices already drawn
    /// keep their position, fixed vertices keep their stored one.
    fn commit_block(
        &mut self,
        block: &BiconnectedComponent,
        local: &LocalBlock,
        transform: impl Fn(&Point2<f64>) -> Point2<f64>,
    ) -> Result<(), LayoutError> {
        for &v in &block.vertices {
            if self.is_placed(v) {
                continue;
            }
            if !self.is_fixed(v) {
                let Some(p) = local.coords.get(v) else {
                    return Err(LayoutError::Internal(format!(
                        "vertex {v:?} missing from block coordinates"
                    )));
                };
                self.set_position(v, transform(p));
            }
            let rings = local.ring_membership.get(v).copied().unwrap_or(0);
            let state = if rings >= 2 {
                DrawState::Internal
            } else {
                DrawState::Boundary
            };
            self.advance_vertex(v, state);
        }
        for &e in &block.edges {
            let edge = self.graph.edge(e)?;
            let shared = |v: VertexId| local.ring_membership.get(v).copied().unwrap_or(0) >= 2;
            let state = if self.edges[e].is_cyclic && shared(edge.beg) && shared(edge.end) {
                DrawState::Internal
            } else {
                DrawState::Boundary
            };
            self.advance_edge(e, state);
        }
        Ok(())
    }

    /// Largest relative bond-length error among edges inside `vertices`.
    pub(super) fn max_bond_deviation(&self, vertices: &[VertexId]) -> f64 {
        let inside: HashSet<VertexId> = vertices.iter().copied().collect();
        self.graph
            .edges_iter()
            .filter(|(_, e)| inside.contains(&e.beg) && inside.contains(&e.end))
            .map(|(_, e)| ((self.vertices[e.beg].pos - self.vertices[e.end].pos).norm() - 1.0).abs())
            .fold(0.0, f64::max)
    }

    /// Relaxes the free vertices of a component drawn around fixed ones.
    fn relax_around_fixed(&mut self, vertices: &[VertexId], ctx: &LayoutContext) -> Result<(), LayoutError> {
        let pinned: HashSet<VertexId> = vertices.iter().copied().filter(|&v| self.is_fixed(v)).collect();
        if pinned.is_empty()
            || pinned.len() == vertices.len()
            || self.max_bond_deviation(vertices) <= ctx.config.smoothing.bond_tolerance
        {
            return Ok(());
        }
        let mut coords: SecondaryMap<VertexId, Point2<f64>> =
            vertices.iter().map(|&v| (v, self.vertices[v].pos)).collect();
        let iterations = self.smooth_region(&mut coords, &pinned, ctx)?;
        debug!(iterations, "Relaxed component around fixed vertices.");
        for (v, p) in coords {
            if !pinned.contains(&v) {
                self.set_position(v, p);
            }
        }
        Ok(())
    }
}
