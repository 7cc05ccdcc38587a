use super::error::GraphError;
use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use slotmap::SecondaryMap;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// One ring of the smallest set of smallest rings.
///
/// `edges[i]` joins `vertices[i]` and `vertices[(i + 1) % len]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
}

impl Ring {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Smallest set of smallest rings together with per-element lookups.
#[derive(Debug, Clone, Default)]
pub struct Sssr {
    rings: Vec<Ring>,
    vertex_rings: SecondaryMap<VertexId, usize>,
    vertex_smallest: SecondaryMap<VertexId, usize>,
    edge_smallest: SecondaryMap<EdgeId, usize>,
}

impl Sssr {
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn ring(&self, idx: usize) -> Result<&Ring, GraphError> {
        self.rings.get(idx).ok_or(GraphError::RingOutOfRange {
            index: idx,
            count: self.rings.len(),
        })
    }

    pub fn vertex_ring_count(&self, v: VertexId) -> usize {
        self.vertex_rings.get(v).copied().unwrap_or(0)
    }

    pub fn vertex_smallest_ring(&self, v: VertexId) -> Option<usize> {
        self.vertex_smallest.get(v).copied()
    }

    pub fn edge_smallest_ring(&self, e: EdgeId) -> Option<usize> {
        self.edge_smallest.get(e).copied()
    }

    fn from_rings(rings: Vec<Ring>) -> Self {
        let mut sssr = Sssr {
            rings,
            ..Default::default()
        };
        for ring in &sssr.rings {
            let size = ring.len();
            for &v in &ring.vertices {
                let count = sssr.vertex_rings.get(v).copied().unwrap_or(0);
                sssr.vertex_rings.insert(v, count + 1);
                keep_min(&mut sssr.vertex_smallest, v, size);
            }
            for &e in &ring.edges {
                keep_min(&mut sssr.edge_smallest, e, size);
            }
        }
        sssr
    }
}

fn keep_min<K: slotmap::Key>(map: &mut SecondaryMap<K, usize>, key: K, size: usize) {
    match map.get_mut(key) {
        Some(current) => *current = (*current).min(size),
        None => {
            map.insert(key, size);
        }
    }
}

/// Dense re-indexing of the live vertices and edges of a graph.
struct DenseView {
    vertices: Vec<VertexId>,
    adjacency: Vec<Vec<(usize, usize)>>,
    edges: Vec<EdgeId>,
    endpoints: Vec<(usize, usize)>,
}

impl DenseView {
    fn new(graph: &Graph) -> Self {
        let vertices: Vec<VertexId> = graph.vertex_ids().collect();
        let index: SecondaryMap<VertexId, usize> =
            vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let edges: Vec<EdgeId> = graph.edge_ids().collect();
        let mut adjacency = vec![Vec::new(); vertices.len()];
        let mut endpoints = Vec::with_capacity(edges.len());
        for (ei, edge) in graph.edges_iter().map(|(_, edge)| edge).enumerate() {
            let (b, d) = (index[edge.beg], index[edge.end]);
            adjacency[b].push((d, ei));
            adjacency[d].push((b, ei));
            endpoints.push((b, d));
        }
        Self {
            vertices,
            adjacency,
            edges,
            endpoints,
        }
    }

    fn edge_between(&self, a: usize, b: usize) -> Option<usize> {
        self.adjacency[a]
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, e)| e)
    }
}

/// Computes the smallest set of smallest rings from Horton candidates.
///
/// Candidates are the cycles `P(w, u) + (u, v) + P(v, w)` built from shortest
/// paths; they are sorted by size and accepted greedily while linearly
/// independent over GF(2) until `E - V + C` rings are found.
pub(crate) fn compute_sssr(graph: &Graph) -> Sssr {
    let expected = (graph.edge_count() + graph.components_count()).saturating_sub(graph.vertex_count());
    if expected == 0 {
        return Sssr::default();
    }

    let view = DenseView::new(graph);
    let candidates = horton_candidates(&view);
    let words = view.edges.len().div_ceil(64);

    let mut basis: Vec<(usize, Vec<u64>)> = Vec::with_capacity(expected);
    let mut rings = Vec::with_capacity(expected);
    for cycle in &candidates {
        if rings.len() >= expected {
            break;
        }
        let Some(edges) = cycle_edges(&view, cycle) else {
            continue;
        };
        let mut bits = vec![0u64; words];
        for &e in &edges {
            bits[e / 64] |= 1u64 << (e % 64);
        }
        if try_add_to_basis(&mut basis, bits) {
            rings.push(Ring {
                vertices: cycle.iter().map(|&i| view.vertices[i]).collect(),
                edges: edges.iter().map(|&e| view.edges[e]).collect(),
            });
        }
    }

    trace!(expected, found = rings.len(), candidates = candidates.len(), "SSSR computed");
    Sssr::from_rings(rings)
}

/// Shortest-path tree of one root: BFS predecessors plus, for each reached
/// vertex, the root's neighbour its path leaves through.
struct RootTree {
    pred: Vec<Option<usize>>,
    branch: Vec<Option<usize>>,
}

impl RootTree {
    fn new(view: &DenseView, root: usize) -> Self {
        let n = view.vertices.len();
        let mut pred = vec![None; n];
        let mut branch = vec![None; n];
        let mut seen = vec![false; n];
        seen[root] = true;
        branch[root] = Some(root);
        let mut queue = VecDeque::from([root]);
        while let Some(cur) = queue.pop_front() {
            for &(nb, _) in &view.adjacency[cur] {
                if !seen[nb] {
                    seen[nb] = true;
                    pred[nb] = Some(cur);
                    branch[nb] = if cur == root { Some(nb) } else { branch[cur] };
                    queue.push_back(nb);
                }
            }
        }
        Self { pred, branch }
    }

    fn path_to(&self, root: usize, dst: usize) -> Vec<usize> {
        let mut path = vec![dst];
        let mut cur = dst;
        while cur != root {
            match self.pred[cur] {
                Some(p) => {
                    path.push(p);
                    cur = p;
                }
                None => return Vec::new(),
            }
        }
        path.reverse();
        path
    }
}

/// Horton candidates `P(w, u) + (u, v) + P(v, w)`, one shortest-path tree at
/// a time.
///
/// Two tree paths from `w` meet only at `w` exactly when they leave it
/// through different neighbours, so the disjointness test needs no path.
fn horton_candidates(view: &DenseView) -> Vec<Vec<usize>> {
    let mut unique: HashSet<Vec<usize>> = HashSet::new();
    for w in 0..view.vertices.len() {
        let tree = RootTree::new(view, w);
        for &(u, v) in &view.endpoints {
            let (Some(bu), Some(bv)) = (tree.branch[u], tree.branch[v]) else {
                continue;
            };
            if u == w || v == w || bu == bv {
                continue;
            }
            let path_u = tree.path_to(w, u);
            let path_v = tree.path_to(w, v);
            if path_u.is_empty() || path_v.is_empty() {
                continue;
            }
            let mut cycle = path_u;
            cycle.extend(path_v[1..].iter().rev());
            unique.insert(normalize_cycle(cycle));
        }
    }

    let mut candidates: Vec<Vec<usize>> = unique.into_iter().collect();
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates
}

/// Rotates the cycle to start at its smallest index and picks the direction
/// with the smaller second element.
fn normalize_cycle(cycle: Vec<usize>) -> Vec<usize> {
    let len = cycle.len();
    let Some(start) = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, v)| v)
        .map(|(i, _)| i)
    else {
        return cycle;
    };
    let mut normalized: Vec<usize> = (0..len).map(|i| cycle[(start + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}

fn cycle_edges(view: &DenseView, cycle: &[usize]) -> Option<Vec<usize>> {
    let len = cycle.len();
    (0..len)
        .map(|i| view.edge_between(cycle[i], cycle[(i + 1) % len]))
        .collect()
}

/// Reduces `candidate` against `basis`, kept sorted by pivot (lowest set
/// bit), and inserts it when something is left.
fn try_add_to_basis(basis: &mut Vec<(usize, Vec<u64>)>, mut candidate: Vec<u64>) -> bool {
    for (pivot, row) in basis.iter() {
        if candidate[pivot / 64] & (1u64 << (pivot % 64)) != 0 {
            candidate.iter_mut().zip(row).for_each(|(a, b)| *a ^= *b);
        }
    }
    let Some(pivot) = lowest_bit(&candidate) else {
        return false;
    };
    let at = basis.partition_point(|(p, _)| *p < pivot);
    basis.insert(at, (pivot, candidate));
    true
}

fn lowest_bit(bits: &[u64]) -> Option<usize> {
    bits.iter()
        .enumerate()
        .find(|&(_, &w)| w != 0)
        .map(|(i, &w)| i * 64 + w.trailing_zeros() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::graph::tests::cycle_graph;

    #[test]
    fn tree_has_no_rings() {
        let mut graph = Graph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();

        let sssr = compute_sssr(&graph);
        assert!(sssr.rings().is_empty());
        assert_eq!(sssr.vertex_ring_count(b), 0);
        assert!(sssr.ring(0).is_err());
    }

    #[test]
    fn ring_edges_follow_consecutive_vertices() {
        let (graph, _) = cycle_graph(7);
        let sssr = compute_sssr(&graph);
        let ring = sssr.ring(0).unwrap();

        assert_eq!(ring.len(), 7);
        for (i, &e) in ring.edges.iter().enumerate() {
            let edge = graph.edge(e).unwrap();
            assert!(edge.contains(ring.vertices[i]));
            assert!(edge.contains(ring.vertices[(i + 1) % ring.len()]));
        }
    }

    #[test]
    fn cubane_has_five_four_membered_rings() {
        let mut graph = Graph::new();
        let v: Vec<VertexId> = (0..8).map(|_| graph.add_vertex()).collect();
        for &(a, b) in &[
            (0, 1), (1, 2), (2, 3), (3, 0),
            (4, 5), (5, 6), (6, 7), (7, 4),
            (0, 4), (1, 5), (2, 6), (3, 7),
        ] {
            graph.add_edge(v[a], v[b]).unwrap();
        }

        let sssr = compute_sssr(&graph);
        assert_eq!(sssr.rings().len(), 5);
        assert!(sssr.rings().iter().all(|r| r.len() == 4));
    }

    #[test]
    fn long_ring_is_a_single_ring() {
        let (graph, _) = cycle_graph(2000);
        let sssr = compute_sssr(&graph);
        assert_eq!(sssr.rings().len(), 1);
        assert_eq!(sssr.rings()[0].len(), 2000);
    }

    #[test]
    fn fused_rings_prefer_the_small_ones() {
        // Naphthalene skeleton: the 10-ring perimeter must not be chosen.
        let (mut graph, ids) = cycle_graph(6);
        let extra: Vec<VertexId> = (0..4).map(|_| graph.add_vertex()).collect();
        graph.add_edge(ids[0], extra[0]).unwrap();
        for pair in extra.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        graph.add_edge(extra[3], ids[1]).unwrap();

        let sssr = compute_sssr(&graph);
        assert_eq!(sssr.rings().len(), 2);
        assert!(sssr.rings().iter().all(|r| r.len() == 6));
    }

    #[test]
    fn spiro_rings_share_one_vertex() {
        let (mut graph, ids) = cycle_graph(5);
        let extra: Vec<VertexId> = (0..3).map(|_| graph.add_vertex()).collect();
        graph.add_edge(ids[0], extra[0]).unwrap();
        graph.add_edge(extra[0], extra[1]).unwrap();
        graph.add_edge(extra[1], extra[2]).unwrap();
        graph.add_edge(extra[2], ids[0]).unwrap();

        let sssr = compute_sssr(&graph);
        assert_eq!(sssr.rings().len(), 2);
        assert_eq!(sssr.vertex_ring_count(ids[0]), 2);
        assert_eq!(sssr.vertex_smallest_ring(ids[0]), Some(4));
        assert_eq!(sssr.vertex_smallest_ring(ids[2]), Some(5));
    }
}
