use super::error::GraphError;
use super::filter::{Filter, accepts};
use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use slotmap::SecondaryMap;

/// A non-tree edge found during the depth-first search.
///
/// `beg`/`end` are tree-local vertex handles, `ext_*` refer to the source
/// graph. `beg` is the ancestor endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtEdge {
    pub beg: VertexId,
    pub end: VertexId,
    pub ext_index: EdgeId,
    pub ext_beg: VertexId,
    pub ext_end: VertexId,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    vertex: VertexId,
    parent_edge: Option<EdgeId>,
    cursor: usize,
}

/// Depth-first spanning forest of a (filtered) graph.
///
/// The tree holds one vertex per accepted source vertex and only the tree
/// edges; every other accepted edge is recorded as an [`ExtEdge`] and closes
/// exactly one cycle relative to the tree.
#[derive(Debug)]
pub struct SpanningTree<'g> {
    graph: &'g Graph,
    tree: Graph,
    mapping: SecondaryMap<VertexId, VertexId>,
    inv_mapping: SecondaryMap<VertexId, VertexId>,
    edge_mapping: SecondaryMap<EdgeId, EdgeId>,
    edges_list: Vec<ExtEdge>,
}

impl<'g> SpanningTree<'g> {
    pub fn new(
        graph: &'g Graph,
        vertex_filter: Option<&Filter<'_, VertexId>>,
        edge_filter: Option<&Filter<'_, EdgeId>>,
    ) -> Result<Self, GraphError> {
        let mut spt = Self {
            graph,
            tree: Graph::new(),
            mapping: SecondaryMap::new(),
            inv_mapping: SecondaryMap::new(),
            edge_mapping: SecondaryMap::new(),
            edges_list: Vec::new(),
        };

        for v in graph.vertex_ids().filter(|&v| accepts(vertex_filter, v)) {
            let t = spt.tree.add_vertex();
            spt.mapping.insert(v, t);
            spt.inv_mapping.insert(t, v);
        }

        let mut depth: SecondaryMap<VertexId, usize> = SecondaryMap::new();
        let mut counter = 0usize;
        let mut stack: Vec<Frame> = Vec::new();

        for root in graph.vertex_ids() {
            if depth.contains_key(root) || !accepts(vertex_filter, root) {
                continue;
            }
            depth.insert(root, counter);
            counter += 1;
            stack.push(Frame {
                vertex: root,
                parent_edge: None,
                cursor: 0,
            });

            while let Some(top) = stack.last_mut() {
                let v = top.vertex;
                let Some(&nb) = graph.neighbors(v).get(top.cursor) else {
                    stack.pop();
                    continue;
                };
                top.cursor += 1;
                let parent_edge = top.parent_edge;

                if Some(nb.e) == parent_edge
                    || !accepts(edge_filter, nb.e)
                    || !accepts(vertex_filter, nb.v)
                {
                    continue;
                }

                match depth.get(nb.v).copied() {
                    None => {
                        depth.insert(nb.v, counter);
                        counter += 1;
                        let tree_edge = spt
                            .tree
                            .add_edge(spt.mapping[v], spt.mapping[nb.v])?;
                        spt.edge_mapping.insert(tree_edge, nb.e);
                        stack.push(Frame {
                            vertex: nb.v,
                            parent_edge: Some(nb.e),
                            cursor: 0,
                        });
                    }
                    Some(d) if d < depth[v] => {
                        spt.edges_list.push(ExtEdge {
                            beg: spt.mapping[nb.v],
                            end: spt.mapping[v],
                            ext_index: nb.e,
                            ext_beg: nb.v,
                            ext_end: v,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(spt)
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn tree(&self) -> &Graph {
        &self.tree
    }

    /// Non-tree edges in discovery order.
    pub fn extra_edges(&self) -> &[ExtEdge] {
        &self.edges_list
    }

    pub fn tree_vertex(&self, original: VertexId) -> Option<VertexId> {
        self.mapping.get(original).copied()
    }

    pub fn original_vertex(&self, tree_vertex: VertexId) -> Option<VertexId> {
        self.inv_mapping.get(tree_vertex).copied()
    }

    pub fn original_edge(&self, tree_edge: EdgeId) -> Option<EdgeId> {
        self.edge_mapping.get(tree_edge).copied()
    }

    /// Inserts an edge between two tree vertices, remembering which source
    /// edge it stands for.
    pub fn add_edge(
        &mut self,
        beg: VertexId,
        end: VertexId,
        ext_index: EdgeId,
    ) -> Result<EdgeId, GraphError> {
        let e = self.tree.add_edge(beg, end)?;
        self.edge_mapping.insert(e, ext_index);
        Ok(e)
    }

    fn cycle_path(&self, ext: &ExtEdge) -> Result<Vec<EdgeId>, GraphError> {
        self.tree
            .find_path(ext.beg, ext.end, None, None)
            .ok_or(GraphError::NoTreePath {
                beg: ext.ext_beg,
                end: ext.ext_end,
            })
    }

    /// Stamps `value` on every source edge that lies on a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoTreePath`] if an extra edge has no tree path
    /// between its endpoints.
    pub fn mark_all_edges_in_cycles(
        &self,
        marks: &mut SecondaryMap<EdgeId, i32>,
        value: i32,
    ) -> Result<(), GraphError> {
        for ext in &self.edges_list {
            for tree_edge in self.cycle_path(ext)? {
                let original = self
                    .original_edge(tree_edge)
                    .ok_or(GraphError::EdgeNotFound(tree_edge))?;
                marks.insert(original, value);
            }
            marks.insert(ext.ext_index, value);
        }
        Ok(())
    }

    /// Stamps `value` on every source vertex that lies on a cycle.
    pub fn mark_all_vertices_in_cycles(
        &self,
        marks: &mut SecondaryMap<VertexId, i32>,
        value: i32,
    ) -> Result<(), GraphError> {
        for ext in &self.edges_list {
            marks.insert(ext.ext_beg, value);
            let mut cur = ext.beg;
            for tree_edge in self.cycle_path(ext)? {
                let edge = self.tree.edge(tree_edge)?;
                cur = edge.other_end(cur).ok_or(GraphError::EdgeNotFound(tree_edge))?;
                let original = self
                    .original_vertex(cur)
                    .ok_or(GraphError::VertexNotFound(cur))?;
                marks.insert(original, value);
            }
        }
        Ok(())
    }
}
