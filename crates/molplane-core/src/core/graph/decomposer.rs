use super::filter::{Filter, accepts};
use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use slotmap::SecondaryMap;
use std::collections::VecDeque;

/// Breadth-first connected-component labelling.
///
/// Vertices rejected by the vertex filter get component `-1` in
/// [`GraphDecomposer::decomposition`] and are not counted. Optional external
/// neighbor lists add virtual adjacency, so vertices joined only through
/// them end up in the same component.
#[derive(Debug)]
pub struct GraphDecomposer<'g> {
    graph: &'g Graph,
    decomposition: SecondaryMap<VertexId, i32>,
    vertices_count: Vec<usize>,
    edges_count: Vec<usize>,
}

impl<'g> GraphDecomposer<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            decomposition: SecondaryMap::new(),
            vertices_count: Vec::new(),
            edges_count: Vec::new(),
        }
    }

    /// Labels components and returns their number.
    ///
    /// Edge counts only include real edges that pass `edge_filter` and whose
    /// endpoints both pass `vertex_filter`; virtual neighbors contribute to
    /// connectivity but not to edge counts.
    pub fn decompose(
        &mut self,
        vertex_filter: Option<&Filter<'_, VertexId>>,
        edge_filter: Option<&Filter<'_, EdgeId>>,
        ext_neighbors: Option<&SecondaryMap<VertexId, Vec<VertexId>>>,
    ) -> usize {
        let graph = self.graph;
        self.decomposition = graph.vertex_ids().map(|v| (v, -1)).collect();
        self.vertices_count.clear();
        self.edges_count.clear();

        let mut queue = VecDeque::new();
        for start in graph.vertex_ids() {
            if self.decomposition[start] != -1 || !accepts(vertex_filter, start) {
                continue;
            }
            let component = self.vertices_count.len();
            self.vertices_count.push(0);
            self.edges_count.push(0);
            self.decomposition[start] = component as i32;
            queue.push_back(start);

            while let Some(v) = queue.pop_front() {
                self.vertices_count[component] += 1;

                let real = graph
                    .neighbors(v)
                    .iter()
                    .filter(|n| accepts(edge_filter, n.e))
                    .map(|n| n.v);
                let virtual_nbs = ext_neighbors
                    .and_then(|ext| ext.get(v))
                    .into_iter()
                    .flatten()
                    .copied();

                for w in real.chain(virtual_nbs) {
                    if !graph.has_vertex(w) || !accepts(vertex_filter, w) {
                        continue;
                    }
                    if self.decomposition[w] == -1 {
                        self.decomposition[w] = component as i32;
                        queue.push_back(w);
                    }
                }
            }
        }

        for (e, edge) in graph.edges_iter() {
            if !accepts(edge_filter, e) {
                continue;
            }
            let (cb, ce) = (self.decomposition[edge.beg], self.decomposition[edge.end]);
            if cb >= 0 && cb == ce {
                self.edges_count[cb as usize] += 1;
            }
        }

        self.vertices_count.len()
    }

    pub fn components_count(&self) -> usize {
        self.vertices_count.len()
    }

    /// Component of `v`, or `None` when `v` was filtered out or is unknown.
    pub fn component(&self, v: VertexId) -> Option<usize> {
        self.decomposition
            .get(v)
            .and_then(|&c| usize::try_from(c).ok())
    }

    pub fn component_vertices_count(&self, component: usize) -> usize {
        self.vertices_count.get(component).copied().unwrap_or(0)
    }

    pub fn component_edges_count(&self, component: usize) -> usize {
        self.edges_count.get(component).copied().unwrap_or(0)
    }

    /// Vertices of `component` in graph iteration order.
    pub fn component_vertices(&self, component: usize) -> Vec<VertexId> {
        self.decomposition
            .iter()
            .filter(|&(_, &c)| c == component as i32)
            .map(|(v, _)| v)
            .collect()
    }

    /// Per-vertex component labels (`-1` for filtered vertices), usable as a
    /// filter source array.
    pub fn decomposition(&self) -> &SecondaryMap<VertexId, i32> {
        &self.decomposition
    }
}
