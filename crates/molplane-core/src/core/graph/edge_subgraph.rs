use super::error::GraphError;
use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use slotmap::SecondaryMap;
use tracing::debug;

/// Receives each subgraph together with maps from source handles to
/// subgraph-local handles.
pub type HandleSubgraph<'a> =
    Box<dyn FnMut(&Graph, &SecondaryMap<VertexId, VertexId>, &SecondaryMap<EdgeId, EdgeId>) + 'a>;

#[derive(Debug)]
struct Frame {
    extension: Vec<EdgeId>,
    added: Option<EdgeId>,
}

/// Enumerates connected edge-induced subgraphs with `min_edges..=max_edges`
/// edges.
///
/// Each subgraph is grown from its smallest edge handle, and only larger
/// edges may extend it. Candidate edges are taken from the exclusive
/// neighborhood of the newest edge, so no edge set is produced twice.
pub struct EdgeSubgraphEnumerator<'a> {
    graph: &'a Graph,
    min_edges: usize,
    max_edges: usize,
    handle: Option<HandleSubgraph<'a>>,

    subgraph: Graph,
    mapping: SecondaryMap<VertexId, VertexId>,
    inv_mapping: SecondaryMap<VertexId, VertexId>,
    edge_mapping: SecondaryMap<EdgeId, EdgeId>,
    inv_edge_mapping: SecondaryMap<EdgeId, EdgeId>,
    vertex_uses: SecondaryMap<VertexId, usize>,
    closed_nb: SecondaryMap<EdgeId, usize>,
}

impl<'a> EdgeSubgraphEnumerator<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            min_edges: 1,
            max_edges: graph.edge_count(),
            handle: None,
            subgraph: Graph::new(),
            mapping: SecondaryMap::new(),
            inv_mapping: SecondaryMap::new(),
            edge_mapping: SecondaryMap::new(),
            inv_edge_mapping: SecondaryMap::new(),
            vertex_uses: SecondaryMap::new(),
            closed_nb: SecondaryMap::new(),
        }
    }

    pub fn min_edges(mut self, min_edges: usize) -> Self {
        self.min_edges = min_edges;
        self
    }

    pub fn max_edges(mut self, max_edges: usize) -> Self {
        self.max_edges = max_edges;
        self
    }

    pub fn on_subgraph(
        mut self,
        handle: impl FnMut(&Graph, &SecondaryMap<VertexId, VertexId>, &SecondaryMap<EdgeId, EdgeId>)
        + 'a,
    ) -> Self {
        self.handle = Some(Box::new(handle));
        self
    }

    pub fn process(&mut self) -> Result<(), GraphError> {
        self.reset();
        if self.max_edges == 0 {
            return Ok(());
        }

        let mut starts: Vec<EdgeId> = self.graph.edge_ids().collect();
        starts.sort();
        debug!(edges = starts.len(), min = self.min_edges, max = self.max_edges, "Enumerating edge subgraphs");

        let mut stack: Vec<Frame> = Vec::new();
        for &start in &starts {
            let extension = self.exclusive_neighbors(start, start)?;
            self.push_edge(start)?;
            self.report();
            stack.push(Frame {
                extension: if self.max_edges > 1 { extension } else { Vec::new() },
                added: None,
            });

            while let Some(top) = stack.last_mut() {
                let Some(next) = top.extension.pop() else {
                    if let Some(Frame { added: Some(added), .. }) = stack.pop() {
                        self.pop_edge(added)?;
                    }
                    continue;
                };

                let mut extension = top.extension.clone();
                extension.extend(self.exclusive_neighbors(next, start)?);
                self.push_edge(next)?;
                self.report();

                if self.subgraph.edge_count() < self.max_edges {
                    stack.push(Frame {
                        extension,
                        added: Some(next),
                    });
                } else {
                    self.pop_edge(next)?;
                }
            }

            self.pop_edge(start)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.subgraph.clear();
        self.mapping.clear();
        self.inv_mapping.clear();
        self.edge_mapping.clear();
        self.inv_edge_mapping.clear();
        self.vertex_uses.clear();
        self.closed_nb.clear();
    }

    fn incident_edges(&self, e: EdgeId) -> Result<impl Iterator<Item = EdgeId> + '_, GraphError> {
        let edge = self.graph.edge(e)?;
        Ok(self
            .graph
            .neighbors(edge.beg)
            .iter()
            .chain(self.graph.neighbors(edge.end))
            .map(|n| n.e)
            .filter(move |&other| other != e))
    }

    /// Edges adjacent to `e`, larger than `start`, outside the current
    /// subgraph and its neighborhood.
    fn exclusive_neighbors(&self, e: EdgeId, start: EdgeId) -> Result<Vec<EdgeId>, GraphError> {
        Ok(self
            .incident_edges(e)?
            .filter(|&u| u > start && self.closed_nb.get(u).copied().unwrap_or(0) == 0)
            .collect())
    }

    fn push_edge(&mut self, e: EdgeId) -> Result<(), GraphError> {
        let edge = *self.graph.edge(e)?;
        let beg = self.use_vertex(edge.beg);
        let end = self.use_vertex(edge.end);
        let local = self.subgraph.add_edge(beg, end)?;
        self.edge_mapping.insert(e, local);
        self.inv_edge_mapping.insert(local, e);

        if self.subgraph.edge_count() > self.max_edges {
            return Err(GraphError::SubgraphTooLarge {
                edges: self.subgraph.edge_count(),
                max_edges: self.max_edges,
            });
        }

        let closed: Vec<EdgeId> = std::iter::once(e).chain(self.incident_edges(e)?).collect();
        for u in closed {
            let count = self.closed_nb.get(u).copied().unwrap_or(0);
            self.closed_nb.insert(u, count + 1);
        }
        Ok(())
    }

    fn pop_edge(&mut self, e: EdgeId) -> Result<(), GraphError> {
        let edge = *self.graph.edge(e)?;
        if let Some(local) = self.edge_mapping.remove(e) {
            self.inv_edge_mapping.remove(local);
            self.subgraph.remove_edge(local)?;
        }
        self.release_vertex(edge.beg)?;
        self.release_vertex(edge.end)?;

        let closed: Vec<EdgeId> = std::iter::once(e).chain(self.incident_edges(e)?).collect();
        for u in closed {
            if let Some(count) = self.closed_nb.get_mut(u) {
                *count = count.saturating_sub(1);
            }
        }
        Ok(())
    }

    fn use_vertex(&mut self, v: VertexId) -> VertexId {
        let uses = self.vertex_uses.get(v).copied().unwrap_or(0);
        self.vertex_uses.insert(v, uses + 1);
        match self.mapping.get(v) {
            Some(&local) => local,
            None => {
                let local = self.subgraph.add_vertex();
                self.mapping.insert(v, local);
                self.inv_mapping.insert(local, v);
                local
            }
        }
    }

    fn release_vertex(&mut self, v: VertexId) -> Result<(), GraphError> {
        let Some(uses) = self.vertex_uses.get_mut(v) else {
            return Ok(());
        };
        *uses -= 1;
        if *uses == 0 {
            self.vertex_uses.remove(v);
            if let Some(local) = self.mapping.remove(v) {
                self.inv_mapping.remove(local);
                self.subgraph.remove_vertex(local)?;
            }
        }
        Ok(())
    }

    fn report(&mut self) {
        if self.subgraph.edge_count() < self.min_edges {
            return;
        }
        if let Some(handle) = self.handle.as_mut() {
            handle(&self.subgraph, &self.mapping, &self.edge_mapping);
        }
    }
}
