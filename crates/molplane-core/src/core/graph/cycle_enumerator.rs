use super::error::GraphError;
use super::filter::Filter;
use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use super::spanning_tree::{ExtEdge, SpanningTree};
use slotmap::SecondaryMap;
use tracing::debug;

/// Decides whether a vertex may appear on an enumerated cycle.
pub type CheckVertex<'a> = Box<dyn FnMut(&Graph, VertexId) -> bool + 'a>;

/// Receives each cycle as vertex and edge lists; returning `false` stops the
/// enumeration.
pub type HandleCycle<'a> = Box<dyn FnMut(&Graph, &[VertexId], &[EdgeId]) -> bool + 'a>;

#[derive(Debug, Clone, Copy)]
struct PathFrame {
    vertex: VertexId,
    cursor: usize,
}

/// Enumerates every simple cycle of a graph within a length range.
///
/// Cycles are found relative to a growing spanning tree: for each extra edge
/// in discovery order, every tree path between its endpoints closes one
/// cycle, after which the edge joins the tree. Each cycle is therefore
/// reported once, through the last of its extra edges.
pub struct CycleEnumerator<'a> {
    graph: &'a Graph,
    min_length: usize,
    max_length: usize,
    vertex_filter: Option<&'a Filter<'a, VertexId>>,
    check_vertex: Option<CheckVertex<'a>>,
    handle_cycle: Option<HandleCycle<'a>>,
}

impl<'a> CycleEnumerator<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            min_length: 0,
            max_length: usize::MAX,
            vertex_filter: None,
            check_vertex: None,
            handle_cycle: None,
        }
    }

    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn vertex_filter(mut self, filter: &'a Filter<'a, VertexId>) -> Self {
        self.vertex_filter = Some(filter);
        self
    }

    pub fn check_vertex(mut self, check: impl FnMut(&Graph, VertexId) -> bool + 'a) -> Self {
        self.check_vertex = Some(Box::new(check));
        self
    }

    pub fn handle_cycle(
        mut self,
        handle: impl FnMut(&Graph, &[VertexId], &[EdgeId]) -> bool + 'a,
    ) -> Self {
        self.handle_cycle = Some(Box::new(handle));
        self
    }

    /// Runs the enumeration. Returns `true` when the cycle handler stopped it
    /// early.
    pub fn process(&mut self) -> Result<bool, GraphError> {
        let mut spt = SpanningTree::new(self.graph, self.vertex_filter, None)?;
        let extra: Vec<ExtEdge> = spt.extra_edges().to_vec();
        debug!(extra_edges = extra.len(), "Enumerating cycles");

        for ext in extra {
            if self.cycles_through(&spt, &ext)? {
                return Ok(true);
            }
            spt.add_edge(ext.beg, ext.end, ext.ext_index)?;
        }
        Ok(false)
    }

    fn accepts_vertex(&mut self, v: VertexId) -> bool {
        let graph = self.graph;
        self.check_vertex.as_mut().is_none_or(|check| check(graph, v))
    }

    /// Walks every simple tree path from `ext.end` to `ext.beg`. Returns
    /// `true` if the handler asked to stop.
    fn cycles_through(&mut self, spt: &SpanningTree<'_>, ext: &ExtEdge) -> Result<bool, GraphError> {
        if !self.accepts_vertex(ext.ext_end) || !self.accepts_vertex(ext.ext_beg) {
            return Ok(false);
        }

        let tree = spt.tree();
        let (start, target) = (ext.end, ext.beg);
        let mut on_path: SecondaryMap<VertexId, bool> = SecondaryMap::new();
        let mut path_vertices = vec![start];
        let mut path_edges: Vec<EdgeId> = Vec::new();
        let mut frames = vec![PathFrame { vertex: start, cursor: 0 }];
        on_path.insert(start, true);

        while let Some(top) = frames.last_mut() {
            let v = top.vertex;
            let Some(&nb) = tree.neighbors(v).get(top.cursor) else {
                frames.pop();
                on_path.remove(v);
                path_vertices.pop();
                path_edges.pop();
                continue;
            };
            top.cursor += 1;

            if on_path.contains_key(nb.v) {
                continue;
            }

            if nb.v == target {
                let length = path_edges.len() + 2;
                if length >= self.min_length && length <= self.max_length {
                    let vertices = path_vertices
                        .iter()
                        .chain(std::iter::once(&target))
                        .map(|&t| spt.original_vertex(t).ok_or(GraphError::VertexNotFound(t)))
                        .collect::<Result<Vec<_>, _>>()?;
                    let mut edges = path_edges
                        .iter()
                        .chain(std::iter::once(&nb.e))
                        .map(|&t| spt.original_edge(t).ok_or(GraphError::EdgeNotFound(t)))
                        .collect::<Result<Vec<_>, _>>()?;
                    edges.push(ext.ext_index);

                    let graph = self.graph;
                    let keep_going = self
                        .handle_cycle
                        .as_mut()
                        .is_none_or(|handle| handle(graph, &vertices, &edges));
                    if !keep_going {
                        return Ok(true);
                    }
                }
                continue;
            }

            if path_edges.len() + 3 > self.max_length {
                continue;
            }
            let original = spt
                .original_vertex(nb.v)
                .ok_or(GraphError::VertexNotFound(nb.v))?;
            if !self.accepts_vertex(original) {
                continue;
            }

            on_path.insert(nb.v, true);
            path_vertices.push(nb.v);
            path_edges.push(nb.e);
            frames.push(PathFrame {
                vertex: nb.v,
                cursor: 0,
            });
        }
        Ok(false)
    }
}
