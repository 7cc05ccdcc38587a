use super::graph::Graph;
use super::ids::{EdgeId, VertexId};
use slotmap::{Key, SecondaryMap};
use std::borrow::Cow;

/// Comparison applied between a key's stored value and the filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Eq,
    Neq,
    Less,
    More,
}

/// A read-only predicate over vertex or edge handles.
///
/// The filter either borrows a caller-owned value array (which must outlive the
/// filter) or owns one, in which case keys can be hidden and unhidden
/// incrementally. A key that has no entry in the array is never valid.
#[derive(Debug, Clone)]
pub struct Filter<'a, K: Key> {
    values: Cow<'a, SecondaryMap<K, i32>>,
    kind: FilterKind,
    value: i32,
}

impl<'a, K: Key> Filter<'a, K> {
    /// Wraps an externally owned value array.
    pub fn new(values: &'a SecondaryMap<K, i32>, kind: FilterKind, value: i32) -> Self {
        Self {
            values: Cow::Borrowed(values),
            kind,
            value,
        }
    }

    /// Takes ownership of a value array.
    pub fn from_owned(values: SecondaryMap<K, i32>, kind: FilterKind, value: i32) -> Self {
        Self {
            values: Cow::Owned(values),
            kind,
            value,
        }
    }

    /// Creates an owned filter in which every given key is valid.
    pub fn init_all(keys: impl IntoIterator<Item = K>) -> Self {
        let values = keys.into_iter().map(|k| (k, 1)).collect();
        Self::from_owned(values, FilterKind::Eq, 1)
    }

    /// Creates an owned filter in which every given key is hidden.
    pub fn init_none(keys: impl IntoIterator<Item = K>) -> Self {
        let values = keys.into_iter().map(|k| (k, 0)).collect();
        Self::from_owned(values, FilterKind::Eq, 1)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn valid(&self, key: K) -> bool {
        match self.values.get(key) {
            None => false,
            Some(&stored) => match self.kind {
                FilterKind::Eq => stored == self.value,
                FilterKind::Neq => stored != self.value,
                FilterKind::Less => stored < self.value,
                FilterKind::More => stored > self.value,
            },
        }
    }

    /// Makes `key` invalid. A borrowed array is copied on first write.
    pub fn hide(&mut self, key: K) {
        let hidden = match self.kind {
            FilterKind::Eq | FilterKind::More => self.value.wrapping_sub(1),
            FilterKind::Neq => self.value,
            FilterKind::Less => self.value,
        };
        self.values.to_mut().insert(key, hidden);
    }

    /// Makes `key` valid. A borrowed array is copied on first write.
    pub fn unhide(&mut self, key: K) {
        let visible = match self.kind {
            FilterKind::Eq => self.value,
            FilterKind::Neq | FilterKind::More => self.value.wrapping_add(1),
            FilterKind::Less => self.value.wrapping_sub(1),
        };
        self.values.to_mut().insert(key, visible);
    }
}

impl Filter<'_, VertexId> {
    /// Number of live vertices of `graph` accepted by the filter.
    pub fn count(&self, graph: &Graph) -> usize {
        graph.vertex_ids().filter(|&v| self.valid(v)).count()
    }
}

impl Filter<'_, EdgeId> {
    /// Number of live edges of `graph` accepted by the filter.
    pub fn count(&self, graph: &Graph) -> usize {
        graph.edge_ids().filter(|&e| self.valid(e)).count()
    }
}

/// Treats a missing filter as "accept everything".
pub(crate) fn accepts<K: Key>(filter: Option<&Filter<'_, K>>, key: K) -> bool {
    filter.is_none_or(|f| f.valid(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_vertex_graph() -> (Graph, Vec<VertexId>) {
        let mut graph = Graph::new();
        let ids = (0..5).map(|_| graph.add_vertex()).collect();
        (graph, ids)
    }

    #[test]
    fn init_all_then_hide_excludes_only_hidden_vertex() {
        let (graph, ids) = five_vertex_graph();
        let mut filter = Filter::init_all(graph.vertex_ids());
        filter.hide(ids[2]);

        assert!(!filter.valid(ids[2]));
        for (i, &v) in ids.iter().enumerate() {
            if i != 2 {
                assert!(filter.valid(v));
            }
        }
        assert_eq!(filter.count(&graph), 4);
    }

    #[test]
    fn init_none_then_unhide_accepts_only_unhidden_vertex() {
        let (graph, ids) = five_vertex_graph();
        let mut filter = Filter::init_none(graph.vertex_ids());
        assert_eq!(filter.count(&graph), 0);

        filter.unhide(ids[4]);
        assert!(filter.valid(ids[4]));
        assert_eq!(filter.count(&graph), 1);
    }

    #[test]
    fn borrowed_array_supports_all_comparison_kinds() {
        let (graph, ids) = five_vertex_graph();
        let values: SecondaryMap<VertexId, i32> =
            ids.iter().enumerate().map(|(i, &v)| (v, i as i32)).collect();

        assert_eq!(Filter::new(&values, FilterKind::Eq, 3).count(&graph), 1);
        assert_eq!(Filter::new(&values, FilterKind::Neq, 3).count(&graph), 4);
        assert_eq!(Filter::new(&values, FilterKind::Less, 3).count(&graph), 3);
        assert_eq!(Filter::new(&values, FilterKind::More, 3).count(&graph), 1);
    }

    #[test]
    fn hide_on_borrowed_filter_leaves_caller_array_untouched() {
        let (_graph, ids) = five_vertex_graph();
        let values: SecondaryMap<VertexId, i32> = ids.iter().map(|&v| (v, 7)).collect();
        let mut filter = Filter::new(&values, FilterKind::Eq, 7);

        filter.hide(ids[0]);
        assert!(!filter.valid(ids[0]));
        assert_eq!(values[ids[0]], 7);
    }

    #[test]
    fn hide_and_unhide_respect_non_equality_kinds() {
        let (_graph, ids) = five_vertex_graph();
        let values: SecondaryMap<VertexId, i32> = ids.iter().map(|&v| (v, 0)).collect();

        for kind in [FilterKind::Neq, FilterKind::Less, FilterKind::More] {
            let mut filter = Filter::new(&values, kind, 0);
            filter.unhide(ids[1]);
            assert!(filter.valid(ids[1]), "{kind:?} unhide");
            filter.hide(ids[1]);
            assert!(!filter.valid(ids[1]), "{kind:?} hide");
        }
    }

    #[test]
    fn missing_key_is_never_valid() {
        let (mut graph, _ids) = five_vertex_graph();
        let filter = Filter::init_all(graph.vertex_ids());
        let late = graph.add_vertex();
        assert!(!filter.valid(late));
        assert!(accepts(None::<&Filter<'_, VertexId>>, late));
    }
}
