use super::error::GraphError;
use super::filter::{Filter, FilterKind};
use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use slotmap::SecondaryMap;
use tracing::trace;

/// Predicate deciding whether the edge `(v, w)` belongs to a geometrically
/// regular ring and may be merged across class boundaries.
pub type RegularPolygonTest<'a> =
    Box<dyn Fn(VertexId, VertexId, Option<&SecondaryMap<VertexId, bool>>) -> bool + 'a>;

/// A biconnected component as lists of member vertices and edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiconnectedComponent {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
}

impl BiconnectedComponent {
    pub fn contains(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    /// A component made of a single bridge edge.
    pub fn is_bridge(&self) -> bool {
        self.edges.len() == 1
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    vertex: VertexId,
    parent_edge: Option<EdgeId>,
    cursor: usize,
}

#[derive(Debug, Clone, Copy)]
struct StackedEdge {
    e: EdgeId,
    beg: VertexId,
    end: VertexId,
}

/// Tarjan low-link decomposition into biconnected components.
///
/// Two heuristics refine the textbook algorithm. With `split_fixed`, an edge
/// whose endpoints differ in fixed status never joins a larger component;
/// it is reported as a singleton component. The optional regular-polygon test
/// overrides that split for edges of rings that are already drawn regularly.
///
/// The depth-first search uses explicit frame and edge stacks, so deep graphs
/// do not grow the call stack.
pub struct BiconnectedDecomposer<'a> {
    graph: &'a Graph,
    split_fixed: bool,
    regular_polygon: Option<RegularPolygonTest<'a>>,
    components: Vec<BiconnectedComponent>,
    incoming: SecondaryMap<VertexId, Vec<usize>>,
    vertex_components: SecondaryMap<VertexId, Vec<usize>>,
}

impl<'a> BiconnectedDecomposer<'a> {
    pub fn new(graph: &'a Graph, split_fixed: bool) -> Self {
        Self {
            graph,
            split_fixed,
            regular_polygon: None,
            components: Vec::new(),
            incoming: SecondaryMap::new(),
            vertex_components: SecondaryMap::new(),
        }
    }

    pub fn with_regular_polygon_test(mut self, test: RegularPolygonTest<'a>) -> Self {
        self.regular_polygon = Some(test);
        self
    }

    pub fn decompose(&mut self) -> usize {
        self.decompose_with_fixed(None)
    }

    /// Runs the decomposition and returns the number of components.
    ///
    /// `fixed` marks vertices whose class differs from free vertices when the
    /// decomposer was built with `split_fixed`. Isolated vertices belong to no
    /// component.
    pub fn decompose_with_fixed(&mut self, fixed: Option<&SecondaryMap<VertexId, bool>>) -> usize {
        let graph = self.graph;
        self.components.clear();
        self.incoming.clear();
        self.vertex_components.clear();

        let mut order: SecondaryMap<VertexId, usize> = SecondaryMap::new();
        let mut low: SecondaryMap<VertexId, usize> = SecondaryMap::new();
        let mut stack_pos: SecondaryMap<VertexId, usize> = SecondaryMap::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut edge_stack: Vec<StackedEdge> = Vec::new();
        let mut counter = 0usize;

        for root in graph.vertex_ids() {
            if order.contains_key(root) {
                continue;
            }
            order.insert(root, counter);
            low.insert(root, counter);
            counter += 1;
            stack_pos.insert(root, 0);
            frames.push(Frame {
                vertex: root,
                parent_edge: None,
                cursor: 0,
            });

            while let Some(top) = frames.last_mut() {
                let v = top.vertex;
                if let Some(&nb) = graph.neighbors(v).get(top.cursor) {
                    top.cursor += 1;
                    if Some(nb.e) == top.parent_edge {
                        continue;
                    }
                    let w = nb.v;
                    match order.get(w).copied() {
                        None => {
                            order.insert(w, counter);
                            low.insert(w, counter);
                            counter += 1;
                            edge_stack.push(StackedEdge { e: nb.e, beg: v, end: w });
                            stack_pos.insert(w, frames.len());
                            frames.push(Frame {
                                vertex: w,
                                parent_edge: Some(nb.e),
                                cursor: 0,
                            });
                        }
                        Some(order_w) if order_w < order[v] => {
                            let merge = self.is_regular_polygon_edge(v, w, fixed)
                                || (self.same_class(v, w, fixed)
                                    && self.path_same_class(&frames[stack_pos[w]..], v, fixed));
                            if merge {
                                edge_stack.push(StackedEdge { e: nb.e, beg: v, end: w });
                                low[v] = low[v].min(order_w);
                            } else {
                                let idx = self.push_component(vec![w, v], vec![nb.e]);
                                if let Some(entry) = self.incoming.entry(w) {
                                    entry.or_default().push(idx);
                                }
                            }
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                let Some(finished) = frames.pop() else {
                    break;
                };
                stack_pos.remove(v);
                let Some(parent) = frames.last() else {
                    continue;
                };
                let p = parent.vertex;
                low[p] = low[p].min(low[v]);
                if low[v] < order[p] {
                    continue;
                }

                let mut merged = BiconnectedComponent::default();
                let mut singles = Vec::new();
                while let Some(se) = edge_stack.pop() {
                    if self.same_class(se.beg, se.end, fixed)
                        || self.is_regular_polygon_edge(se.beg, se.end, fixed)
                    {
                        merged.vertices.extend([se.beg, se.end]);
                        merged.edges.push(se.e);
                    } else {
                        singles.push(se);
                    }
                    if Some(se.e) == finished.parent_edge {
                        break;
                    }
                }

                let mut created = Vec::new();
                if !merged.edges.is_empty() {
                    merged.vertices.sort();
                    merged.vertices.dedup();
                    merged.edges.reverse();
                    created.push(self.push_component(merged.vertices, merged.edges));
                }
                for se in singles.into_iter().rev() {
                    created.push(self.push_component(vec![se.beg, se.end], vec![se.e]));
                }
                if let Some(list) = self.incoming.entry(p).map(|e| e.or_default()) {
                    list.extend(created);
                }
            }
        }

        trace!(components = self.components.len(), "Biconnected decomposition finished");
        self.components.len()
    }

    fn same_class(&self, v: VertexId, w: VertexId, fixed: Option<&SecondaryMap<VertexId, bool>>) -> bool {
        match (self.split_fixed, fixed) {
            (true, Some(fixed)) => {
                let is_fixed = |x: VertexId| fixed.get(x).copied().unwrap_or(false);
                is_fixed(v) == is_fixed(w)
            }
            _ => true,
        }
    }

    fn path_same_class(
        &self,
        path: &[Frame],
        v: VertexId,
        fixed: Option<&SecondaryMap<VertexId, bool>>,
    ) -> bool {
        path.iter().all(|frame| self.same_class(frame.vertex, v, fixed))
    }

    fn is_regular_polygon_edge(
        &self,
        v: VertexId,
        w: VertexId,
        fixed: Option<&SecondaryMap<VertexId, bool>>,
    ) -> bool {
        self.regular_polygon
            .as_ref()
            .is_some_and(|test| test(v, w, fixed))
    }

    fn push_component(&mut self, vertices: Vec<VertexId>, edges: Vec<EdgeId>) -> usize {
        let idx = self.components.len();
        for &v in &vertices {
            if let Some(list) = self.vertex_components.entry(v).map(|e| e.or_default()) {
                list.push(idx);
            }
        }
        self.components.push(BiconnectedComponent { vertices, edges });
        idx
    }

    pub fn components_count(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[BiconnectedComponent] {
        &self.components
    }

    pub fn component(&self, idx: usize) -> Result<&BiconnectedComponent, GraphError> {
        self.components
            .get(idx)
            .ok_or(GraphError::ComponentOutOfRange {
                index: idx,
                count: self.components.len(),
            })
    }

    /// Owned vertex filter accepting exactly the vertices of component `idx`.
    pub fn component_filter(&self, idx: usize) -> Result<Filter<'static, VertexId>, GraphError> {
        let component = self.component(idx)?;
        let mut values: SecondaryMap<VertexId, i32> =
            self.graph.vertex_ids().map(|v| (v, 0)).collect();
        for &v in &component.vertices {
            values.insert(v, 1);
        }
        Ok(Filter::from_owned(values, FilterKind::Eq, 1))
    }

    /// A vertex shared by two or more components.
    pub fn is_articulation_point(&self, v: VertexId) -> bool {
        self.vertex_components
            .get(v)
            .is_some_and(|list| list.len() >= 2)
    }

    /// Components discovered below `v` in the search tree, `v` being their
    /// attachment point.
    pub fn incoming_components(&self, v: VertexId) -> Result<&[usize], GraphError> {
        if !self.is_articulation_point(v) {
            return Err(GraphError::NotArticulationPoint(v));
        }
        Ok(self.incoming.get(v).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Every component containing `v`.
    pub fn vertex_components(&self, v: VertexId) -> &[usize] {
        self.vertex_components
            .get(v)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn into_components(self) -> Vec<BiconnectedComponent> {
        self.components
    }
}

impl std::fmt::Debug for BiconnectedDecomposer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiconnectedDecomposer")
            .field("split_fixed", &self.split_fixed)
            .field("regular_polygon", &self.regular_polygon.is_some())
            .field("components", &self.components)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::graph::tests::{cycle_graph, naphthalene_skeleton, path_graph};

    fn assert_edges_partitioned(graph: &Graph, decomposer: &BiconnectedDecomposer<'_>) {
        let mut seen: Vec<EdgeId> = decomposer
            .components()
            .iter()
            .flat_map(|c| c.edges.iter().copied())
            .collect();
        assert_eq!(seen.len(), graph.edge_count());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), graph.edge_count());

        for (i, a) in decomposer.components().iter().enumerate() {
            for b in &decomposer.components()[i + 1..] {
                for v in a.vertices.iter().filter(|v| b.contains(**v)) {
                    assert!(decomposer.is_articulation_point(*v));
                }
            }
        }
    }

    /// Two rings of the given sizes joined by a single bridge.
    fn dumbbell(left: usize, right: usize) -> (Graph, VertexId, VertexId) {
        let (mut graph, l) = cycle_graph(left);
        let r: Vec<VertexId> = (0..right).map(|_| graph.add_vertex()).collect();
        for i in 0..right {
            graph.add_edge(r[i], r[(i + 1) % right]).unwrap();
        }
        graph.add_edge(l[0], r[0]).unwrap();
        (graph, l[0], r[0])
    }

    #[test]
    fn deep_graphs_do_not_exhaust_the_stack() {
        let (chain, ids) = path_graph(20_000);
        let mut decomposer = BiconnectedDecomposer::new(&chain, false);
        assert_eq!(decomposer.decompose(), 19_999);
        assert!(decomposer.components().iter().all(BiconnectedComponent::is_bridge));
        assert!(decomposer.is_articulation_point(ids[10_000]));
        assert!(!decomposer.is_articulation_point(ids[0]));

        let (ring, _) = cycle_graph(20_000);
        let mut decomposer = BiconnectedDecomposer::new(&ring, false);
        assert_eq!(decomposer.decompose(), 1);
        assert_eq!(decomposer.component(0).unwrap().edges.len(), 20_000);
    }

    #[test]
    fn fused_rings_form_one_component() {
        let (graph, ids) = naphthalene_skeleton();
        let mut decomposer = BiconnectedDecomposer::new(&graph, false);

        assert_eq!(decomposer.decompose(), 1);
        let component = decomposer.component(0).unwrap();
        assert_eq!(component.vertices.len(), 10);
        assert_eq!(component.edges.len(), 11);
        assert!(!decomposer.is_articulation_point(ids[0]));
        assert_edges_partitioned(&graph, &decomposer);
    }

    #[test]
    fn bridge_separates_ring_components() {
        let (graph, a, b) = dumbbell(5, 6);
        let mut decomposer = BiconnectedDecomposer::new(&graph, false);

        assert_eq!(decomposer.decompose(), 3);
        assert!(decomposer.is_articulation_point(a));
        assert!(decomposer.is_articulation_point(b));
        assert_eq!(decomposer.vertex_components(a).len(), 2);
        assert_eq!(decomposer.components().iter().filter(|c| c.is_bridge()).count(), 1);
        assert!(!decomposer.incoming_components(b).unwrap().is_empty());
        assert_edges_partitioned(&graph, &decomposer);
    }

    #[test]
    fn non_articulation_vertex_query_fails() {
        let (graph, ids) = cycle_graph(4);
        let mut decomposer = BiconnectedDecomposer::new(&graph, false);
        decomposer.decompose();

        assert_eq!(
            decomposer.incoming_components(ids[1]),
            Err(GraphError::NotArticulationPoint(ids[1]))
        );
    }

    #[test]
    fn isolated_vertices_have_no_component() {
        let mut graph = Graph::new();
        let lonely = graph.add_vertex();
        let mut decomposer = BiconnectedDecomposer::new(&graph, false);

        assert_eq!(decomposer.decompose(), 0);
        assert!(decomposer.vertex_components(lonely).is_empty());
    }

    #[test]
    fn split_fixed_walls_off_mixed_class_edges() {
        let (graph, ids) = cycle_graph(6);
        let fixed: SecondaryMap<VertexId, bool> =
            ids.iter().enumerate().map(|(i, &v)| (v, i < 3)).collect();

        let mut unsplit = BiconnectedDecomposer::new(&graph, false);
        assert_eq!(unsplit.decompose_with_fixed(Some(&fixed)), 1);

        let mut split = BiconnectedDecomposer::new(&graph, true);
        assert_eq!(split.decompose_with_fixed(Some(&fixed)), 6);
        assert!(split.components().iter().all(BiconnectedComponent::is_bridge));
        assert_edges_partitioned(&graph, &split);
    }

    #[test]
    fn regular_polygon_test_overrides_split() {
        let (graph, ids) = cycle_graph(6);
        let fixed: SecondaryMap<VertexId, bool> =
            ids.iter().enumerate().map(|(i, &v)| (v, i < 3)).collect();

        let mut decomposer = BiconnectedDecomposer::new(&graph, true)
            .with_regular_polygon_test(Box::new(
                |_: VertexId, _: VertexId, _: Option<&SecondaryMap<VertexId, bool>>| true,
            ));
        assert_eq!(decomposer.decompose_with_fixed(Some(&fixed)), 1);

        let filter = decomposer.component_filter(0).unwrap();
        assert_eq!(filter.count(&graph), 6);
        assert!(decomposer.component_filter(1).is_err());
    }
}
