use super::graph::{DrawState, LayoutGraph};
use crate::core::graph::{EdgeId, GraphError, VertexId};
use crate::core::utils::geometry::{rotate_about, segments_intersect};
use nalgebra::Point2;
use std::collections::HashSet;
use std::f64::consts::TAU;
use tracing::trace;

const DANGLING_ROTATION_STEPS: usize = 12;

impl LayoutGraph {
    fn component_edges(&self, vertices: &[VertexId]) -> Vec<(EdgeId, VertexId, VertexId)> {
        let inside: HashSet<VertexId> = vertices.iter().copied().collect();
        self.graph
            .edges_iter()
            .filter(|(_, e)| inside.contains(&e.beg))
            .map(|(id, e)| (id, e.beg, e.end))
            .collect()
    }

    /// Number of edges the segment `a`-`b` properly crosses, ignoring edges
    /// incident to `u` or `w`.
    fn crossings(
        &self,
        edges: &[(EdgeId, VertexId, VertexId)],
        u: VertexId,
        w: VertexId,
        a: &Point2<f64>,
        b: &Point2<f64>,
    ) -> usize {
        edges
            .iter()
            .filter(|&&(_, x, y)| x != u && x != w && y != u && y != w)
            .filter(|&&(_, x, y)| segments_intersect(a, b, &self.vertices[x].pos, &self.vertices[y].pos))
            .count()
    }

    /// Marks every edge that crosses a non-adjacent edge as not planar and
    /// returns how many were marked.
    pub(super) fn mark_crossing_edges(&mut self, vertices: &[VertexId]) -> Result<usize, GraphError> {
        let edges = self.component_edges(vertices);
        let mut crossing: HashSet<EdgeId> = HashSet::new();
        for (i, &(e1, a1, b1)) in edges.iter().enumerate() {
            for &(e2, a2, b2) in &edges[i + 1..] {
                if a1 == a2 || a1 == b2 || b1 == a2 || b1 == b2 {
                    continue;
                }
                let p = |v: VertexId| self.vertices[v].pos;
                if segments_intersect(&p(a1), &p(b1), &p(a2), &p(b2)) {
                    crossing.insert(e1);
                    crossing.insert(e2);
                }
            }
        }
        for &e in &crossing {
            if !self.graph.has_edge(e) {
                return Err(GraphError::EdgeNotFound(e));
            }
            self.advance_edge(e, DrawState::NotPlanar);
        }
        if !crossing.is_empty() {
            trace!(edges = crossing.len(), "Crossing edges marked.");
        }
        Ok(crossing.len())
    }

    /// Swings terminal atoms whose bond crosses the drawing around their
    /// neighbor until the crossing disappears, or to the position with the
    /// fewest crossings. Returns the number of atoms moved.
    pub(super) fn exclude_dangling_intersections(&mut self, vertices: &[VertexId]) -> Result<usize, GraphError> {
        let edges = self.component_edges(vertices);
        let mut moved = 0;
        for &v in vertices {
            if self.is_fixed(v) || self.graph.degree(v) != 1 {
                continue;
            }
            let Some(anchor) = self.graph.vertex(v)?.neighbors().first().map(|nb| nb.v) else {
                continue;
            };
            let center = self.vertices[anchor].pos;
            let start = self.vertices[v].pos;
            let mut best = (self.crossings(&edges, v, anchor, &center, &start), start);
            if best.0 == 0 {
                continue;
            }
            for step in 1..DANGLING_ROTATION_STEPS {
                let candidate = rotate_about(&start, &center, TAU * step as f64 / DANGLING_ROTATION_STEPS as f64);
                let count = self.crossings(&edges, v, anchor, &center, &candidate);
                if count < best.0 {
                    best = (count, candidate);
                    if count == 0 {
                        break;
                    }
                }
            }
            if best.1 != start {
                self.set_position(v, best.1);
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::layout::graph::tests::layout_graph;

    /// A square with a tail from vertex 0 poking across the opposite side.
    fn square_with_tail() -> (LayoutGraph, Vec<VertexId>) {
        let (mut graph, ids) = layout_graph(5, &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 4)]);
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for (&v, (x, y)) in ids.iter().zip(square) {
            graph.set_position(v, Point2::new(x, y));
        }
        graph.set_position(ids[4], Point2::new(1.5, 0.5));
        (graph, ids)
    }

    #[test]
    fn crossing_edges_are_marked_not_planar() {
        let (mut graph, ids) = square_with_tail();
        let marked = graph.mark_crossing_edges(&ids).unwrap();
        assert_eq!(marked, 2);
        let tail = graph.graph().find_edge(ids[0], ids[4]).unwrap();
        assert_eq!(graph.edge(tail).unwrap().state(), DrawState::NotPlanar);
    }

    #[test]
    fn dangling_atom_swings_clear_of_crossing() {
        let (mut graph, ids) = square_with_tail();
        let moved = graph.exclude_dangling_intersections(&ids).unwrap();
        assert_eq!(moved, 1);
        assert_eq!(graph.mark_crossing_edges(&ids).unwrap(), 0);
        let tail = graph.position(ids[4]).unwrap() - graph.position(ids[0]).unwrap();
        assert!((tail.norm() - (1.5f64.powi(2) + 0.25).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn planar_drawing_is_left_alone() {
        let (mut graph, ids) = layout_graph(3, &[(0, 1), (1, 2)]);
        graph.set_position(ids[1], Point2::new(1.0, 0.0));
        graph.set_position(ids[2], Point2::new(1.5, 0.8));
        assert_eq!(graph.exclude_dangling_intersections(&ids).unwrap(), 0);
        assert_eq!(graph.mark_crossing_edges(&ids).unwrap(), 0);
    }
}
