use nalgebra::Point2;
use rstar::RTree;
use rstar::primitives::GeomWithData;

type Entry<T> = GeomWithData<[f64; 2], T>;

fn entry<T>(key: T, p: &Point2<f64>) -> Entry<T> {
    GeomWithData::new([p.x, p.y], key)
}

/// R-tree over keyed 2D points for fixed-radius neighbour queries.
///
/// Keys are expected to be unique; moving a point goes through
/// [`SpatialIndex::relocate`] so the tree stays in sync with the caller's
/// coordinates.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T: Copy + PartialEq> {
    tree: RTree<Entry<T>>,
}

impl<T: Copy + PartialEq> SpatialIndex<T> {
    pub fn from_points(points: impl IntoIterator<Item = (T, Point2<f64>)>) -> Self {
        let entries: Vec<Entry<T>> = points.into_iter().map(|(key, p)| entry(key, &p)).collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Keys and positions of every point within `radius` of `center`.
    pub fn within(&self, center: &Point2<f64>, radius: f64) -> impl Iterator<Item = (T, Point2<f64>)> + '_ {
        self.tree
            .locate_within_distance([center.x, center.y], radius * radius)
            .map(|e| {
                let [x, y] = *e.geom();
                (e.data, Point2::new(x, y))
            })
    }

    /// Moves `key` from `from` to `to`. Returns false, leaving the index
    /// unchanged, when no point `key` sits at `from`.
    pub fn relocate(&mut self, key: T, from: &Point2<f64>, to: &Point2<f64>) -> bool {
        if from == to {
            return true;
        }
        if self.tree.remove(&entry(key, from)).is_none() {
            return false;
        }
        self.tree.insert(entry(key, to));
        true
    }
}
