use super::cycle_basis::{self, Sssr};
use super::decomposer::GraphDecomposer;
use super::error::GraphError;
use super::filter::{Filter, accepts};
use super::ids::{EdgeId, VertexId};
use super::spanning_tree::SpanningTree;
use slotmap::{SecondaryMap, SlotMap};
use std::cell::OnceCell;
use std::collections::VecDeque;

/// One neighbor record of a vertex: the adjacent vertex and the connecting edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexEdge {
    pub v: VertexId,
    pub e: EdgeId,
}

#[derive(Debug, Clone, Default)]
pub struct Vertex {
    neighbors: Vec<VertexEdge>,
}

impl Vertex {
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbor records in insertion order.
    pub fn neighbors(&self) -> &[VertexEdge] {
        &self.neighbors
    }

    pub fn find_neighbor(&self, v: VertexId) -> Option<VertexEdge> {
        self.neighbors.iter().copied().find(|n| n.v == v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub beg: VertexId,
    pub end: VertexId,
}

impl Edge {
    pub fn contains(&self, v: VertexId) -> bool {
        self.beg == v || self.end == v
    }

    /// Returns the endpoint opposite to `v`, or `None` if `v` is not an endpoint.
    pub fn other_end(&self, v: VertexId) -> Option<VertexId> {
        if self.beg == v {
            Some(self.end)
        } else if self.end == v {
            Some(self.beg)
        } else {
            None
        }
    }
}

/// Whether an edge lies on at least one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Ring,
    Chain,
}

/// Index correspondence between a source graph and a graph built from it.
///
/// `vertices`/`edges` map source handles to new handles, `inv_vertices` and
/// `inv_edges` map back.
#[derive(Debug, Clone, Default)]
pub struct GraphMapping {
    pub vertices: SecondaryMap<VertexId, VertexId>,
    pub inv_vertices: SecondaryMap<VertexId, VertexId>,
    pub edges: SecondaryMap<EdgeId, EdgeId>,
    pub inv_edges: SecondaryMap<EdgeId, EdgeId>,
}

#[derive(Debug, Clone)]
struct ComponentCache {
    vertex_component: SecondaryMap<VertexId, usize>,
    vertices_count: Vec<usize>,
    edges_count: Vec<usize>,
}

/// An undirected simple graph stored in two slot arenas.
///
/// Handles stay valid until the element is removed; removed slots are reused
/// with a new version, so stale handles never alias new elements. Derived
/// properties (smallest set of smallest rings, edge topology, connected
/// components) are computed lazily on first query and dropped by [`Graph::changed`],
/// which every structural mutator calls.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: SlotMap<VertexId, Vertex>,
    edges: SlotMap<EdgeId, Edge>,
    sssr: OnceCell<Sssr>,
    topology: OnceCell<Result<SecondaryMap<EdgeId, Topology>, GraphError>>,
    components: OnceCell<ComponentCache>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self) -> VertexId {
        let v = self.vertices.insert(Vertex::default());
        self.changed();
        v
    }

    /// Connects two existing vertices.
    ///
    /// # Errors
    ///
    /// Fails if either vertex is missing, if `beg == end`, or if the vertices
    /// are already adjacent.
    pub fn add_edge(&mut self, beg: VertexId, end: VertexId) -> Result<EdgeId, GraphError> {
        if !self.has_vertex(beg) {
            return Err(GraphError::VertexNotFound(beg));
        }
        if !self.has_vertex(end) {
            return Err(GraphError::VertexNotFound(end));
        }
        if beg == end {
            return Err(GraphError::LoopEdge(beg));
        }
        if self.have_edge(beg, end) {
            return Err(GraphError::DuplicateEdge { beg, end });
        }

        let e = self.edges.insert(Edge { beg, end });
        self.vertices[beg].neighbors.push(VertexEdge { v: end, e });
        self.vertices[end].neighbors.push(VertexEdge { v: beg, e });
        self.changed();
        Ok(e)
    }

    pub fn remove_edge(&mut self, e: EdgeId) -> Result<(), GraphError> {
        let edge = self.edges.remove(e).ok_or(GraphError::EdgeNotFound(e))?;
        for v in [edge.beg, edge.end] {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.neighbors.retain(|n| n.e != e);
            }
        }
        self.changed();
        Ok(())
    }

    /// Removes a vertex together with all incident edges.
    pub fn remove_vertex(&mut self, v: VertexId) -> Result<(), GraphError> {
        let incident: Vec<EdgeId> = self.vertex(v)?.neighbors.iter().map(|n| n.e).collect();
        for e in incident {
            self.remove_edge(e)?;
        }
        self.vertices.remove(v);
        self.changed();
        Ok(())
    }

    pub fn remove_all_edges(&mut self) {
        self.edges.clear();
        for (_, vertex) in self.vertices.iter_mut() {
            vertex.neighbors.clear();
        }
        self.changed();
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.changed();
    }

    /// Drops every cached derived property. They are recomputed on next query.
    pub fn changed(&mut self) {
        self.sssr = OnceCell::new();
        self.topology = OnceCell::new();
        self.components = OnceCell::new();
    }

    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.vertices.contains_key(v)
    }

    pub fn has_edge(&self, e: EdgeId) -> bool {
        self.edges.contains_key(e)
    }

    pub fn vertex(&self, v: VertexId) -> Result<&Vertex, GraphError> {
        self.vertices.get(v).ok_or(GraphError::VertexNotFound(v))
    }

    pub fn edge(&self, e: EdgeId) -> Result<&Edge, GraphError> {
        self.edges.get(e).ok_or(GraphError::EdgeNotFound(e))
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    pub fn edges_iter(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Neighbor records of `v`; empty for a missing vertex.
    pub fn neighbors(&self, v: VertexId) -> &[VertexEdge] {
        self.vertices
            .get(v)
            .map(|vertex| vertex.neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Degree of `v`; zero for a missing vertex.
    pub fn degree(&self, v: VertexId) -> usize {
        self.neighbors(v).len()
    }

    /// Finds the edge joining `beg` and `end` by scanning the smaller neighbor list.
    pub fn find_edge(&self, beg: VertexId, end: VertexId) -> Option<EdgeId> {
        let (scan, target) = if self.degree(beg) <= self.degree(end) {
            (beg, end)
        } else {
            (end, beg)
        };
        self.vertices
            .get(scan)?
            .find_neighbor(target)
            .map(|n| n.e)
    }

    pub fn have_edge(&self, beg: VertexId, end: VertexId) -> bool {
        self.find_edge(beg, end).is_some()
    }

    /// Breadth-first search for a shortest path from `from` to `to`.
    ///
    /// Returns the path as a list of edges ordered from `from`, an empty list
    /// when `from == to`, or `None` when `to` is unreachable under the filters.
    pub fn find_path(
        &self,
        from: VertexId,
        to: VertexId,
        vertex_filter: Option<&Filter<'_, VertexId>>,
        edge_filter: Option<&Filter<'_, EdgeId>>,
    ) -> Option<Vec<EdgeId>> {
        if !self.has_vertex(from) || !self.has_vertex(to) {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        let mut parent: SecondaryMap<VertexId, Option<VertexEdge>> = SecondaryMap::new();
        let mut queue = VecDeque::new();
        parent.insert(from, None);
        queue.push_back(from);

        while let Some(v) = queue.pop_front() {
            for &VertexEdge { v: w, e } in self.neighbors(v) {
                if parent.contains_key(w)
                    || !accepts(vertex_filter, w)
                    || !accepts(edge_filter, e)
                {
                    continue;
                }
                parent.insert(w, Some(VertexEdge { v, e }));
                if w == to {
                    let mut path = Vec::new();
                    let mut cur = to;
                    while let Some(Some(step)) = parent.get(cur) {
                        path.push(step.e);
                        cur = step.v;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(w);
            }
        }
        None
    }

    /// Copies the given vertices of `source` (and either the listed edges or,
    /// when `edges` is `None`, every source edge with both ends selected) into
    /// this graph.
    pub fn merge_with(
        &mut self,
        source: &Graph,
        vertices: &[VertexId],
        edges: Option<&[EdgeId]>,
    ) -> Result<GraphMapping, GraphError> {
        let mut mapping = GraphMapping::default();

        for &v in vertices {
            source.vertex(v)?;
            if mapping.vertices.contains_key(v) {
                continue;
            }
            let new_v = self.add_vertex();
            mapping.vertices.insert(v, new_v);
            mapping.inv_vertices.insert(new_v, v);
        }

        let selected: Vec<EdgeId> = match edges {
            Some(list) => list.to_vec(),
            None => source
                .edges_iter()
                .filter(|(_, edge)| {
                    mapping.vertices.contains_key(edge.beg) && mapping.vertices.contains_key(edge.end)
                })
                .map(|(e, _)| e)
                .collect(),
        };

        for e in selected {
            let edge = *source.edge(e)?;
            let beg = *mapping
                .vertices
                .get(edge.beg)
                .ok_or(GraphError::VertexNotFound(edge.beg))?;
            let end = *mapping
                .vertices
                .get(edge.end)
                .ok_or(GraphError::VertexNotFound(edge.end))?;
            let new_e = self.add_edge(beg, end)?;
            mapping.edges.insert(e, new_e);
            mapping.inv_edges.insert(new_e, e);
        }

        Ok(mapping)
    }

    /// Builds the subgraph induced by `vertices`.
    pub fn make_subgraph(
        source: &Graph,
        vertices: &[VertexId],
    ) -> Result<(Graph, GraphMapping), GraphError> {
        let mut graph = Graph::new();
        let mapping = graph.merge_with(source, vertices, None)?;
        Ok((graph, mapping))
    }

    /// Builds a subgraph from an explicit vertex and edge selection.
    pub fn make_edge_subgraph(
        source: &Graph,
        vertices: &[VertexId],
        edges: &[EdgeId],
    ) -> Result<(Graph, GraphMapping), GraphError> {
        let mut graph = Graph::new();
        let mapping = graph.merge_with(source, vertices, Some(edges))?;
        Ok((graph, mapping))
    }

    /// Deep copy of `source` with a fresh handle space.
    pub fn clone_graph(source: &Graph) -> Result<(Graph, GraphMapping), GraphError> {
        let vertices: Vec<VertexId> = source.vertex_ids().collect();
        Self::make_subgraph(source, &vertices)
    }

    fn sssr(&self) -> &Sssr {
        self.sssr.get_or_init(|| cycle_basis::compute_sssr(self))
    }

    /// Number of rings in the smallest set of smallest rings.
    pub fn sssr_count(&self) -> usize {
        self.sssr().rings().len()
    }

    /// Vertices of ring `idx` in cycle order.
    pub fn sssr_vertices(&self, idx: usize) -> Result<&[VertexId], GraphError> {
        self.sssr().ring(idx).map(|ring| ring.vertices.as_slice())
    }

    /// Edges of ring `idx`; edge `i` joins vertex `i` and vertex `i + 1`.
    pub fn sssr_edges(&self, idx: usize) -> Result<&[EdgeId], GraphError> {
        self.sssr().ring(idx).map(|ring| ring.edges.as_slice())
    }

    pub fn vertex_sssr_count(&self, v: VertexId) -> usize {
        self.sssr().vertex_ring_count(v)
    }

    pub fn vertex_smallest_ring_size(&self, v: VertexId) -> Option<usize> {
        self.sssr().vertex_smallest_ring(v)
    }

    pub fn edge_smallest_ring_size(&self, e: EdgeId) -> Option<usize> {
        self.sssr().edge_smallest_ring(e)
    }

    fn topology(&self) -> Result<&SecondaryMap<EdgeId, Topology>, GraphError> {
        self.topology
            .get_or_init(|| {
                let mut marks: SecondaryMap<EdgeId, i32> =
                    self.edge_ids().map(|e| (e, 0)).collect();
                SpanningTree::new(self, None, None)?.mark_all_edges_in_cycles(&mut marks, 1)?;
                Ok(marks
                    .iter()
                    .map(|(e, &mark)| {
                        let topology = if mark == 1 {
                            Topology::Ring
                        } else {
                            Topology::Chain
                        };
                        (e, topology)
                    })
                    .collect())
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn edge_topology(&self, e: EdgeId) -> Result<Topology, GraphError> {
        self.topology()?
            .get(e)
            .copied()
            .ok_or(GraphError::EdgeNotFound(e))
    }

    /// Whether `v` has at least one incident ring edge.
    pub fn vertex_in_ring(&self, v: VertexId) -> Result<bool, GraphError> {
        let topology = self.topology()?;
        Ok(self
            .vertex(v)?
            .neighbors
            .iter()
            .any(|n| topology.get(n.e) == Some(&Topology::Ring)))
    }

    fn component_cache(&self) -> &ComponentCache {
        self.components.get_or_init(|| {
            let mut decomposer = GraphDecomposer::new(self);
            let count = decomposer.decompose(None, None, None);
            ComponentCache {
                vertex_component: self
                    .vertex_ids()
                    .filter_map(|v| decomposer.component(v).map(|c| (v, c)))
                    .collect(),
                vertices_count: (0..count)
                    .map(|c| decomposer.component_vertices_count(c))
                    .collect(),
                edges_count: (0..count)
                    .map(|c| decomposer.component_edges_count(c))
                    .collect(),
            }
        })
    }

    pub fn components_count(&self) -> usize {
        self.component_cache().vertices_count.len()
    }

    pub fn vertex_component(&self, v: VertexId) -> Result<usize, GraphError> {
        self.component_cache()
            .vertex_component
            .get(v)
            .copied()
            .ok_or(GraphError::VertexNotFound(v))
    }

    pub fn component_vertices_count(&self, component: usize) -> Result<usize, GraphError> {
        let cache = self.component_cache();
        cache
            .vertices_count
            .get(component)
            .copied()
            .ok_or(GraphError::ComponentOutOfRange {
                index: component,
                count: cache.vertices_count.len(),
            })
    }

    pub fn component_edges_count(&self, component: usize) -> Result<usize, GraphError> {
        let cache = self.component_cache();
        cache
            .edges_count
            .get(component)
            .copied()
            .ok_or(GraphError::ComponentOutOfRange {
                index: component,
                count: cache.edges_count.len(),
            })
    }

    pub fn is_connected(&self) -> bool {
        self.components_count() <= 1
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn cycle_graph(n: usize) -> (Graph, Vec<VertexId>) {
        let mut graph = Graph::new();
        let ids: Vec<VertexId> = (0..n).map(|_| graph.add_vertex()).collect();
        for i in 0..n {
            graph.add_edge(ids[i], ids[(i + 1) % n]).unwrap();
        }
        (graph, ids)
    }

    pub(crate) fn path_graph(n: usize) -> (Graph, Vec<VertexId>) {
        let mut graph = Graph::new();
        let ids: Vec<VertexId> = (0..n).map(|_| graph.add_vertex()).collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        (graph, ids)
    }

    pub(crate) fn naphthalene_skeleton() -> (Graph, Vec<VertexId>) {
        let (mut graph, mut ids) = cycle_graph(6);
        let extra: Vec<VertexId> = (0..4).map(|_| graph.add_vertex()).collect();
        graph.add_edge(ids[0], extra[0]).unwrap();
        graph.add_edge(extra[0], extra[1]).unwrap();
        graph.add_edge(extra[1], extra[2]).unwrap();
        graph.add_edge(extra[2], extra[3]).unwrap();
        graph.add_edge(extra[3], ids[1]).unwrap();
        ids.extend(extra);
        (graph, ids)
    }

    mod mutation {
        use super::*;

        #[test]
        fn add_edge_links_both_neighbor_lists() {
            let mut graph = Graph::new();
            let a = graph.add_vertex();
            let b = graph.add_vertex();
            let e = graph.add_edge(a, b).unwrap();

            assert_eq!(graph.vertex(a).unwrap().find_neighbor(b).unwrap().e, e);
            assert_eq!(graph.vertex(b).unwrap().find_neighbor(a).unwrap().e, e);
            assert_eq!(graph.edge(e).unwrap().other_end(a), Some(b));
        }

        #[test]
        fn add_edge_rejects_loops_and_duplicates() {
            let mut graph = Graph::new();
            let a = graph.add_vertex();
            let b = graph.add_vertex();
            graph.add_edge(a, b).unwrap();

            assert_eq!(graph.add_edge(a, a), Err(GraphError::LoopEdge(a)));
            assert_eq!(
                graph.add_edge(b, a),
                Err(GraphError::DuplicateEdge { beg: b, end: a })
            );
        }

        #[test]
        fn remove_vertex_drops_incident_edges_and_invalidates_handle() {
            let (mut graph, ids) = cycle_graph(4);
            graph.remove_vertex(ids[0]).unwrap();

            assert_eq!(graph.vertex_count(), 3);
            assert_eq!(graph.edge_count(), 2);
            assert_eq!(graph.degree(ids[1]), 1);
            assert_eq!(graph.degree(ids[3]), 1);
            assert_eq!(
                graph.vertex(ids[0]).unwrap_err(),
                GraphError::VertexNotFound(ids[0])
            );
        }

        #[test]
        fn removed_slot_is_reused_without_aliasing_old_handle() {
            let mut graph = Graph::new();
            let a = graph.add_vertex();
            graph.remove_vertex(a).unwrap();
            let b = graph.add_vertex();

            assert_ne!(a, b);
            assert!(!graph.has_vertex(a));
            assert!(graph.has_vertex(b));
        }

        #[test]
        fn remove_missing_edge_fails() {
            let (mut graph, ids) = cycle_graph(3);
            let e = graph.find_edge(ids[0], ids[1]).unwrap();
            graph.remove_edge(e).unwrap();
            assert_eq!(graph.remove_edge(e), Err(GraphError::EdgeNotFound(e)));
        }
    }

    mod queries {
        use super::*;

        #[test]
        fn find_path_returns_shortest_edge_sequence() {
            let (graph, ids) = cycle_graph(6);
            let path = graph.find_path(ids[0], ids[2], None, None).unwrap();
            assert_eq!(path.len(), 2);
            assert_eq!(graph.edge(path[0]).unwrap().other_end(ids[0]), Some(ids[1]));
        }

        #[test]
        fn find_path_respects_vertex_filter() {
            let (graph, ids) = cycle_graph(6);
            let mut filter = Filter::init_all(graph.vertex_ids());
            filter.hide(ids[1]);
            let path = graph.find_path(ids[0], ids[2], Some(&filter), None).unwrap();
            assert_eq!(path.len(), 4);
        }

        #[test]
        fn find_path_returns_none_for_disconnected_vertices() {
            let mut graph = Graph::new();
            let a = graph.add_vertex();
            let b = graph.add_vertex();
            assert!(graph.find_path(a, b, None, None).is_none());
            assert_eq!(graph.find_path(a, a, None, None), Some(vec![]));
        }

        #[test]
        fn make_subgraph_maps_in_both_directions() {
            let (graph, ids) = cycle_graph(5);
            let (sub, mapping) = Graph::make_subgraph(&graph, &ids[0..3]).unwrap();

            assert_eq!(sub.vertex_count(), 3);
            assert_eq!(sub.edge_count(), 2);
            for &v in &ids[0..3] {
                let mapped = mapping.vertices[v];
                assert_eq!(mapping.inv_vertices[mapped], v);
            }
            for (e, _) in sub.edges_iter() {
                let orig = mapping.inv_edges[e];
                assert_eq!(mapping.edges[orig], e);
            }
        }

        #[test]
        fn make_edge_subgraph_keeps_only_listed_edges() {
            let (graph, ids) = cycle_graph(4);
            let e = graph.find_edge(ids[0], ids[1]).unwrap();
            let (sub, _) = Graph::make_edge_subgraph(&graph, &ids, &[e]).unwrap();
            assert_eq!(sub.vertex_count(), 4);
            assert_eq!(sub.edge_count(), 1);
        }

        #[test]
        fn clone_graph_preserves_shape() {
            let (graph, _) = naphthalene_skeleton();
            let (copy, _) = Graph::clone_graph(&graph).unwrap();
            assert_eq!(copy.vertex_count(), 10);
            assert_eq!(copy.edge_count(), 11);
            assert_eq!(copy.sssr_count(), 2);
        }
    }

    mod derived {
        use super::*;

        #[test]
        fn sssr_of_naphthalene_has_two_six_rings() {
            let (graph, ids) = naphthalene_skeleton();
            assert_eq!(graph.sssr_count(), 2);
            for i in 0..2 {
                assert_eq!(graph.sssr_vertices(i).unwrap().len(), 6);
                assert_eq!(graph.sssr_edges(i).unwrap().len(), 6);
            }
            assert_eq!(graph.vertex_sssr_count(ids[0]), 2);
            assert_eq!(graph.vertex_sssr_count(ids[3]), 1);
            assert_eq!(graph.vertex_smallest_ring_size(ids[3]), Some(6));
        }

        #[test]
        fn edge_topology_separates_ring_and_chain_edges() {
            let (mut graph, ids) = cycle_graph(5);
            let tail = graph.add_vertex();
            let chain = graph.add_edge(ids[0], tail).unwrap();
            let ring = graph.find_edge(ids[1], ids[2]).unwrap();

            assert_eq!(graph.edge_topology(ring), Ok(Topology::Ring));
            assert_eq!(graph.edge_topology(chain), Ok(Topology::Chain));
            assert_eq!(graph.vertex_in_ring(ids[0]), Ok(true));
            assert_eq!(graph.vertex_in_ring(tail), Ok(false));
            assert_eq!(graph.edge_smallest_ring_size(chain), None);
        }

        #[test]
        fn caches_are_refreshed_after_mutation() {
            let (mut graph, ids) = cycle_graph(6);
            assert_eq!(graph.sssr_count(), 1);

            let e = graph.find_edge(ids[0], ids[1]).unwrap();
            graph.remove_edge(e).unwrap();
            assert_eq!(graph.sssr_count(), 0);
            assert_eq!(graph.edge_topology(graph.find_edge(ids[2], ids[3]).unwrap()), Ok(Topology::Chain));
        }

        #[test]
        fn changed_without_mutation_yields_identical_results() {
            let (mut graph, ids) = naphthalene_skeleton();
            let isolated = graph.add_vertex();
            let rings_before = graph.sssr_count();
            let component_before = graph.vertex_component(ids[4]).unwrap();
            let isolated_before = graph.vertex_component(isolated).unwrap();

            graph.changed();

            assert_eq!(graph.sssr_count(), rings_before);
            assert_eq!(graph.vertex_component(ids[4]).unwrap(), component_before);
            assert_eq!(graph.vertex_component(isolated).unwrap(), isolated_before);
        }

        #[test]
        fn component_counts_sum_to_graph_totals() {
            let (mut graph, _) = cycle_graph(3);
            let a = graph.add_vertex();
            let b = graph.add_vertex();
            graph.add_edge(a, b).unwrap();
            graph.add_vertex();

            assert_eq!(graph.components_count(), 3);
            assert!(!graph.is_connected());
            let vertices: usize = (0..3).map(|c| graph.component_vertices_count(c).unwrap()).sum();
            let edges: usize = (0..3).map(|c| graph.component_edges_count(c).unwrap()).sum();
            assert_eq!(vertices, graph.vertex_count());
            assert_eq!(edges, graph.edge_count());
            assert!(graph.component_vertices_count(3).is_err());
        }
    }
}
