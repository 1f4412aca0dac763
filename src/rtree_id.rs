use crate::*;
use rstar::{primitives::GeomWithData, RTree, AABB};

type Element<T> = GeomWithData<[float; 2], T>;

/// Point index carrying a payload, used for cluster centers and candidate tray sites.
#[derive(Debug, Clone)]
pub struct RtreeWithData<T> {
    tree: RTree<Element<T>>,
}
impl<T> Default for RtreeWithData<T> {
    fn default() -> Self {
        Self { tree: RTree::new() }
    }
}
impl<T: fmt::Debug> fmt::Display for RtreeWithData<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for point in self.tree.iter() {
            writeln!(f, "[{:?} {:?}]", point.geom(), point.data)?;
        }
        Ok(())
    }
}
impl<T: Copy + PartialEq> RtreeWithData<T> {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn from(a: Vec<([float; 2], T)>) -> Self {
        Self {
            tree: RTree::bulk_load(a.into_iter().map(|x| GeomWithData::new(x.0, x.1)).collect()),
        }
    }
    pub fn insert(&mut self, p: [float; 2], data: T) {
        self.tree.insert(GeomWithData::new(p, data));
    }
    pub fn iter_nearest(&self, p: [float; 2]) -> impl Iterator<Item = &Element<T>> {
        self.tree.nearest_neighbor_iter(&p)
    }
    pub fn k_nearest(&self, p: [float; 2], k: usize) -> Vec<&Element<T>> {
        self.tree.nearest_neighbor_iter(&p).take(k).collect()
    }
    pub fn delete(&mut self, p: [float; 2], data: T) -> bool {
        self.tree.remove(&GeomWithData::new(p, data)).is_some()
    }
    /// Removes and returns every point inside the closed box `a`.
    pub fn drain_in_bbox(&mut self, a: [[float; 2]; 2]) -> Vec<Element<T>> {
        self.tree
            .drain_in_envelope_intersecting(AABB::from_corners(a[0], a[1]))
            .collect_vec()
    }
    pub fn size(&self) -> usize {
        self.tree.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_and_drain() {
        let mut tree = RtreeWithData::from(vec![([0.0, 0.0], 0usize), ([3.0, 0.0], 1), ([10.0, 0.0], 2)]);
        let nearest = tree.k_nearest([2.5, 0.0], 2).iter().map(|x| x.data).collect_vec();
        assert_eq!(nearest, vec![1, 0]);
        let drained = tree.drain_in_bbox([[-1.0, -1.0], [4.0, 1.0]]);
        assert_eq!(drained.len(), 2);
        assert_eq!(tree.size(), 1);
        assert!(tree.delete([10.0, 0.0], 2));
        assert_eq!(tree.size(), 0);
    }
}
