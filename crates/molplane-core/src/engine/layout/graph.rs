use super::context::LayoutContext;
use crate::core::graph::{EdgeId, Graph, GraphError, Topology, VertexId};
use crate::core::utils::geometry::bounding_box;
use crate::engine::error::LayoutError;
use crate::engine::metalayout::{LayoutItem, Metalayout};
use itertools::Itertools;
use nalgebra::{Point2, Vector2};
use slotmap::SecondaryMap;
use tracing::{debug, instrument, trace};

/// Placement progress of a vertex or edge.
///
/// States only move forward: from `NotDrawn` to one of the classified
/// states, and from there to `Drawn` when the layout pass commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawState {
    #[default]
    NotDrawn,
    /// Shared by two or more rings.
    Internal,
    /// On the outline of the drawing.
    Boundary,
    /// Crosses another edge of the drawing.
    NotPlanar,
    Ignore,
    Drawn,
}

impl DrawState {
    fn rank(self) -> u8 {
        match self {
            DrawState::NotDrawn => 0,
            DrawState::Internal
            | DrawState::Boundary
            | DrawState::NotPlanar
            | DrawState::Ignore => 1,
            DrawState::Drawn => 2,
        }
    }

    /// Whether a coordinate has been assigned.
    pub fn is_placed(self) -> bool {
        self != DrawState::NotDrawn
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutVertex {
    /// Atom handle in the molecule this graph mirrors.
    pub ext_idx: VertexId,
    /// Insertion position, used as a stable tie-breaker.
    pub orig_idx: usize,
    pub pos: Point2<f64>,
    pub morgan_code: u64,
    pub is_cyclic: bool,
    /// Keeps `pos` untouched for the whole layout pass.
    pub fixed: bool,
    /// Placed from fixed ring neighbours before assembly; treated as fixed
    /// from then on, but its coordinate is a layout result.
    pub pinned: bool,
    state: DrawState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEdge {
    pub ext_idx: Option<EdgeId>,
    pub orig_idx: usize,
    pub is_cyclic: bool,
    state: DrawState,
}

macro_rules! impl_state_access {
    ($ty:ty) => {
        impl $ty {
            pub fn state(&self) -> DrawState {
                self.state
            }

            /// Moves to `next` unless that would go backwards; returns
            /// whether the state changed.
            pub fn advance(&mut self, next: DrawState) -> bool {
                if next.rank() < self.state.rank() || next == self.state {
                    return false;
                }
                self.state = next;
                true
            }
        }
    };
}

impl_state_access!(LayoutVertex);
impl_state_access!(LayoutEdge);

/// The graph the layout engine works on, in units of one bond length.
///
/// Each vertex and edge carries a [`LayoutVertex`] / [`LayoutEdge`] record
/// pointing back at the molecule it was built from.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    pub(super) graph: Graph,
    pub(super) vertices: SecondaryMap<VertexId, LayoutVertex>,
    pub(super) edges: SecondaryMap<EdgeId, LayoutEdge>,
}

impl LayoutGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors every vertex and edge of `source`, nothing fixed.
    pub fn from_graph(source: &Graph) -> Result<Self, GraphError> {
        let mut layout = Self::new();
        let mut mapping: SecondaryMap<VertexId, VertexId> = SecondaryMap::new();
        for v in source.vertex_ids() {
            mapping.insert(v, layout.add_vertex(v, None));
        }
        for (e, edge) in source.edges_iter() {
            layout.add_edge(mapping[edge.beg], mapping[edge.end], Some(e))?;
        }
        Ok(layout)
    }

    /// Adds a vertex mirroring atom `ext_idx`; a `fixed` position pins it.
    pub fn add_vertex(&mut self, ext_idx: VertexId, fixed: Option<Point2<f64>>) -> VertexId {
        let v = self.graph.add_vertex();
        self.vertices.insert(
            v,
            LayoutVertex {
                ext_idx,
                orig_idx: self.vertices.len(),
                pos: fixed.unwrap_or_else(Point2::origin),
                morgan_code: 0,
                is_cyclic: false,
                fixed: fixed.is_some(),
                pinned: false,
                state: DrawState::NotDrawn,
            },
        );
        v
    }

    /// Connects two vertices. An existing edge between them is returned as is.
    pub fn add_edge(
        &mut self,
        beg: VertexId,
        end: VertexId,
        ext_idx: Option<EdgeId>,
    ) -> Result<EdgeId, GraphError> {
        if let Some(existing) = self.graph.find_edge(beg, end) {
            return Ok(existing);
        }
        let e = self.graph.add_edge(beg, end)?;
        self.edges.insert(
            e,
            LayoutEdge {
                ext_idx,
                orig_idx: self.edges.len(),
                is_cyclic: false,
                state: DrawState::NotDrawn,
            },
        );
        Ok(e)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn vertex(&self, v: VertexId) -> Result<&LayoutVertex, GraphError> {
        self.vertices.get(v).ok_or(GraphError::VertexNotFound(v))
    }

    pub fn edge(&self, e: EdgeId) -> Result<&LayoutEdge, GraphError> {
        self.edges.get(e).ok_or(GraphError::EdgeNotFound(e))
    }

    pub fn position(&self, v: VertexId) -> Result<Point2<f64>, GraphError> {
        self.vertex(v).map(|lv| lv.pos)
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.vertex_ids()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn has_fixed(&self) -> bool {
        self.vertices.values().any(|lv| lv.fixed)
    }

    /// Bounding box of the current coordinates.
    pub fn bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        bounding_box(self.vertices.values().map(|lv| &lv.pos))
    }

    pub(super) fn set_position(&mut self, v: VertexId, pos: Point2<f64>) {
        if let Some(lv) = self.vertices.get_mut(v) {
            lv.pos = pos;
        }
    }

    pub(super) fn is_placed(&self, v: VertexId) -> bool {
        self.vertices.get(v).is_some_and(|lv| lv.state.is_placed())
    }

    pub(super) fn is_fixed(&self, v: VertexId) -> bool {
        self.vertices.get(v).is_some_and(|lv| lv.fixed || lv.pinned)
    }

    pub(super) fn advance_vertex(&mut self, v: VertexId, state: DrawState) {
        if let Some(lv) = self.vertices.get_mut(v) {
            lv.advance(state);
        }
    }

    pub(super) fn advance_edge(&mut self, e: EdgeId, state: DrawState) {
        if let Some(le) = self.edges.get_mut(e) {
            le.advance(state);
        }
    }

    /// Extended-connectivity codes: starting from the degree, each round sums
    /// the neighbors' codes until the number of distinct codes stops growing.
    pub(super) fn compute_morgan_codes(&mut self) {
        let graph = &self.graph;
        let mut codes: SecondaryMap<VertexId, u64> = graph
            .vertex_ids()
            .map(|v| (v, graph.degree(v) as u64))
            .collect();
        let mut distinct = codes.values().unique().count();

        loop {
            let next: SecondaryMap<VertexId, u64> = graph
                .vertex_ids()
                .map(|v| {
                    let code = graph
                        .neighbors(v)
                        .iter()
                        .fold(codes[v], |acc, n| acc.wrapping_add(codes[n.v]));
                    (v, code)
                })
                .collect();
            let next_distinct = next.values().unique().count();
            if next_distinct <= distinct {
                break;
            }
            codes = next;
            distinct = next_distinct;
        }

        for (v, code) in codes {
            if let Some(lv) = self.vertices.get_mut(v) {
                lv.morgan_code = code;
            }
        }
        trace!(distinct, "Morgan codes computed.");
    }

    fn mark_cyclic(&mut self) -> Result<(), GraphError> {
        for e in self.graph.edge_ids().collect::<Vec<_>>() {
            let cyclic = self.graph.edge_topology(e)? == Topology::Ring;
            if let Some(le) = self.edges.get_mut(e) {
                le.is_cyclic = cyclic;
            }
        }
        for v in self.graph.vertex_ids().collect::<Vec<_>>() {
            let cyclic = self.graph.vertex_in_ring(v)?;
            if let Some(lv) = self.vertices.get_mut(v) {
                lv.is_cyclic = cyclic;
            }
        }
        Ok(())
    }

    /// Assigns 2D coordinates to every vertex.
    ///
    /// Connected components are laid out independently and then composed in
    /// one row; components holding fixed vertices stay where they are.
    #[instrument(skip_all, name = "layout_graph", fields(vertices = self.graph.vertex_count()))]
    pub fn layout(&mut self, ctx: &LayoutContext) -> Result<(), LayoutError> {
        ctx.check_cancelled()?;
        if self.graph.vertex_count() == 0 {
            return Ok(());
        }

        self.compute_morgan_codes();
        self.mark_cyclic()?;
        let completed = self.complete_partially_fixed_rings()?;
        if completed > 0 {
            debug!(rings = completed, "Partially fixed rings completed.");
        }

        let blocks = self.decompose_blocks()?;
        let components = self.graph.components_count();
        let mut component_vertices: Vec<Vec<VertexId>> = vec![Vec::new(); components];
        for v in self.graph.vertex_ids() {
            component_vertices[self.graph.vertex_component(v)?].push(v);
        }
        let mut component_blocks: Vec<Vec<usize>> = vec![Vec::new(); components];
        for (idx, block) in blocks.iter().enumerate() {
            let Some(&first) = block.vertices.first() else {
                continue;
            };
            component_blocks[self.graph.vertex_component(first)?].push(idx);
        }
        debug!(components, blocks = blocks.len(), "Graph decomposed.");

        for (vertices, block_ids) in component_vertices.iter().zip(&component_blocks) {
            ctx.check_cancelled()?;
            self.layout_component(vertices, &blocks, block_ids, ctx)?;
            self.exclude_dangling_intersections(vertices)?;
            if ctx.config.refinement.enabled {
                self.refine(vertices, ctx)?;
            }
            if !vertices.iter().any(|&v| self.is_fixed(v)) {
                self.rotate_to_canonical(vertices);
            }
            self.mark_crossing_edges(vertices)?;
        }

        self.compose_components(&component_vertices, ctx.config.horizontal_interval);

        for lv in self.vertices.values_mut() {
            lv.advance(DrawState::Drawn);
        }
        for le in self.edges.values_mut() {
            le.advance(DrawState::Drawn);
        }
        Ok(())
    }

    /// Lines connected components up left to right.
    fn compose_components(&mut self, components: &[Vec<VertexId>], interval: f64) {
        if components.len() < 2 {
            return;
        }
        let (anchored, free): (Vec<&Vec<VertexId>>, Vec<&Vec<VertexId>>) = components
            .iter()
            .partition(|vertices| vertices.iter().any(|&v| self.is_fixed(v)));

        let bbox_of = |vertices: &[VertexId]| {
            bounding_box(vertices.iter().filter_map(|&v| self.vertices.get(v).map(|lv| &lv.pos)))
        };

        let mut metalayout = Metalayout::new(interval, interval);
        let anchor_box = bounding_box(
            anchored
                .iter()
                .flat_map(|vertices| vertices.iter())
                .filter_map(|&v| self.vertices.get(v).map(|lv| &lv.pos)),
        );
        if let Some((min, max)) = anchor_box {
            metalayout.push_item(LayoutItem::new(min, max));
        }
        let mut moved: Vec<(&Vec<VertexId>, usize)> = Vec::new();
        for vertices in free {
            if let Some((min, max)) = bbox_of(vertices) {
                let (_, position) = metalayout.push_item(LayoutItem::new(min, max));
                moved.push((vertices, position));
            }
        }
        metalayout.process();

        for (vertices, position) in moved {
            let offset = metalayout.offset(0, position).unwrap_or_else(Vector2::zeros);
            for &v in vertices {
                if let Some(lv) = self.vertices.get_mut(v) {
                    lv.pos += offset;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::molecule::Molecule;
    use crate::engine::config::LayoutConfig;

    pub(crate) fn layout_graph(atoms: usize, bonds: &[(usize, usize)]) -> (LayoutGraph, Vec<VertexId>) {
        let (molecule, _) = Molecule::from_bonds(atoms, bonds).unwrap();
        let graph = LayoutGraph::from_graph(molecule.graph()).unwrap();
        let ids = graph.vertex_ids().collect();
        (graph, ids)
    }

    pub(crate) fn bond_lengths(graph: &LayoutGraph) -> Vec<f64> {
        graph
            .graph()
            .edges_iter()
            .map(|(_, e)| (graph.position(e.beg).unwrap() - graph.position(e.end).unwrap()).norm())
            .collect()
    }

    fn run_layout(graph: &mut LayoutGraph) {
        let config = LayoutConfig::default();
        graph.layout(&LayoutContext::new(&config, None)).unwrap();
    }

    #[test]
    fn states_only_move_forward() {
        let (mut graph, ids) = layout_graph(1, &[]);
        let lv = graph.vertices.get_mut(ids[0]).unwrap();
        assert!(lv.advance(DrawState::Boundary));
        assert!(lv.advance(DrawState::NotPlanar));
        assert!(!lv.advance(DrawState::NotDrawn));
        assert!(lv.advance(DrawState::Drawn));
        assert!(!lv.advance(DrawState::Internal));
        assert_eq!(lv.state(), DrawState::Drawn);
    }

    #[test]
    fn morgan_codes_separate_chain_ends_from_middle() {
        let (mut graph, ids) = layout_graph(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        graph.compute_morgan_codes();
        let code = |i: usize| graph.vertex(ids[i]).unwrap().morgan_code;
        assert_eq!(code(0), code(4));
        assert_eq!(code(1), code(3));
        assert_ne!(code(0), code(2));
        assert_ne!(code(1), code(2));
    }

    #[test]
    fn duplicate_edge_is_returned_not_added() {
        let (mut graph, ids) = layout_graph(2, &[(0, 1)]);
        let existing = graph.graph().find_edge(ids[0], ids[1]).unwrap();
        assert_eq!(graph.add_edge(ids[1], ids[0], None).unwrap(), existing);
        assert_eq!(graph.graph().edge_count(), 1);
    }

    #[test]
    fn hexagon_is_drawn_as_regular_polygon() {
        let bonds: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let (mut graph, ids) = layout_graph(6, &bonds);
        run_layout(&mut graph);

        let points: Vec<Point2<f64>> = ids.iter().map(|&v| graph.position(v).unwrap()).collect();
        let center = crate::core::utils::geometry::centroid(&points).unwrap();
        for (i, p) in points.iter().enumerate() {
            assert!(((p - center).norm() - 1.0).abs() < 1e-4);
            let side = (points[(i + 1) % 6] - p).norm();
            assert!((side - 1.0).abs() < 1e-4);
        }
        assert!(ids.iter().all(|&v| graph.vertex(v).unwrap().state() == DrawState::Drawn));
        assert!(graph.vertex(ids[0]).unwrap().is_cyclic);
    }

    #[test]
    fn chain_bonds_keep_unit_length() {
        let bonds: Vec<(usize, usize)> = (0..7).map(|i| (i, i + 1)).collect();
        let (mut graph, _) = layout_graph(8, &bonds);
        run_layout(&mut graph);
        for length in bond_lengths(&graph) {
            assert!((length - 1.0).abs() <= 0.05 + 1e-9, "bond length {length}");
        }
    }

    #[test]
    fn disconnected_fragments_do_not_overlap() {
        let (mut graph, ids) = layout_graph(4, &[(0, 1), (2, 3)]);
        run_layout(&mut graph);
        let first_max = graph.position(ids[0]).unwrap().x.max(graph.position(ids[1]).unwrap().x);
        let second_min = graph.position(ids[2]).unwrap().x.min(graph.position(ids[3]).unwrap().x);
        assert!(second_min - first_max >= 1.0 - 1e-9);
    }

    #[test]
    fn fixed_vertices_keep_their_coordinates() {
        let (molecule, _) = Molecule::from_bonds(3, &[(0, 1), (1, 2)]).unwrap();
        let mut graph = LayoutGraph::new();
        let atoms: Vec<VertexId> = molecule.atoms().collect();
        let a = graph.add_vertex(atoms[0], Some(Point2::new(5.0, 5.0)));
        let b = graph.add_vertex(atoms[1], Some(Point2::new(6.0, 5.0)));
        let c = graph.add_vertex(atoms[2], None);
        graph.add_edge(a, b, None).unwrap();
        graph.add_edge(b, c, None).unwrap();

        run_layout(&mut graph);
        assert_eq!(graph.position(a).unwrap(), Point2::new(5.0, 5.0));
        assert_eq!(graph.position(b).unwrap(), Point2::new(6.0, 5.0));
        let bc = (graph.position(c).unwrap() - graph.position(b).unwrap()).norm();
        assert!((bc - 1.0).abs() <= 0.05 + 1e-9);
    }

    /// Benzene with `fixed` ring atoms pinned on a unit hexagon, plus an
    /// ethyl group on atom 3.
    fn ethylbenzene_with_fixed(fixed: usize) -> (LayoutGraph, Vec<VertexId>, Vec<Point2<f64>>) {
        let (molecule, _) = Molecule::from_bonds(8, &[]).unwrap();
        let atoms: Vec<VertexId> = molecule.atoms().collect();
        let hexagon: Vec<Point2<f64>> = crate::core::utils::geometry::regular_polygon(6, 1.0)
            .into_iter()
            .map(|p| p + Vector2::new(4.0, 2.0))
            .collect();
        let mut graph = LayoutGraph::new();
        let ids: Vec<VertexId> = atoms
            .iter()
            .enumerate()
            .map(|(i, &atom)| graph.add_vertex(atom, (i < fixed).then(|| hexagon[i])))
            .collect();
        for i in 0..6 {
            graph.add_edge(ids[i], ids[(i + 1) % 6], None).unwrap();
        }
        graph.add_edge(ids[3], ids[6], None).unwrap();
        graph.add_edge(ids[6], ids[7], None).unwrap();
        (graph, ids, hexagon)
    }

    #[test]
    fn partially_fixed_ring_is_completed_as_regular_hexagon() {
        let (mut graph, ids, hexagon) = ethylbenzene_with_fixed(3);
        run_layout(&mut graph);

        for i in 0..3 {
            assert_eq!(graph.position(ids[i]).unwrap(), hexagon[i]);
        }
        for i in 3..6 {
            assert!((graph.position(ids[i]).unwrap() - hexagon[i]).norm() < 1e-9);
            assert!(graph.vertex(ids[i]).unwrap().pinned);
        }
        for length in bond_lengths(&graph) {
            assert!((length - 1.0).abs() <= 0.05 + 1e-9, "bond length {length}");
        }
    }

    #[test]
    fn two_fixed_atoms_are_enough_to_complete_a_ring() {
        let (mut graph, ids, hexagon) = ethylbenzene_with_fixed(2);
        run_layout(&mut graph);

        let ring: Vec<Point2<f64>> = ids[..6].iter().map(|&v| graph.position(v).unwrap()).collect();
        let center = crate::core::utils::geometry::centroid(&ring).unwrap();
        for (i, p) in ring.iter().enumerate() {
            assert!(((p - center).norm() - 1.0).abs() < 1e-6);
            assert!(((ring[(i + 1) % 6] - p).norm() - 1.0).abs() < 1e-6);
        }
        assert_eq!(ring[0], hexagon[0]);
        assert_eq!(ring[1], hexagon[1]);
    }

    #[test]
    fn cancelled_layout_reports_error() {
        let (mut graph, _) = layout_graph(2, &[(0, 1)]);
        let config = LayoutConfig::default();
        let handler = crate::engine::cancellation::TimeoutCancellationHandler::new(0);
        let result = graph.layout(&LayoutContext::new(&config, Some(&handler)));
        assert!(matches!(result, Err(LayoutError::Cancelled { .. })));
    }
}
