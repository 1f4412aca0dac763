use crate::*;
use rstar::{primitives::Rectangle, RTree, AABB};

/// Rectangle index of occupied regions (blockages and placed trays).
#[derive(Default, Debug, Clone)]
pub struct Rtree {
    tree: RTree<Rectangle<[float; 2]>>,
}
impl Rtree {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }
    pub fn from<T>(boxes: T) -> Self
    where
        T: IntoIterator<Item = [[float; 2]; 2]>,
    {
        Self {
            tree: RTree::bulk_load(
                boxes
                    .into_iter()
                    .map(|x| Rectangle::from_corners(x[0], x[1]))
                    .collect(),
            ),
        }
    }
    pub fn insert_bbox(&mut self, a: [[float; 2]; 2]) {
        self.tree.insert(Rectangle::from_corners(a[0], a[1]));
    }
    /// Removes one rectangle with exactly these corners.
    pub fn remove_bbox(&mut self, a: [[float; 2]; 2]) -> bool {
        self.tree.remove(&Rectangle::from_corners(a[0], a[1])).is_some()
    }
    pub fn count_bbox(&self, a: [[float; 2]; 2]) -> usize {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_corners(a[0], a[1]))
            .count()
    }
    pub fn intersection_bbox(&self, a: [[float; 2]; 2]) -> Vec<[[float; 2]; 2]> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_corners(a[0], a[1]))
            .map(|x| [x.lower(), x.upper()])
            .collect()
    }
    pub fn size(&self) -> usize {
        self.tree.size()
    }
}
impl fmt::Display for Rtree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for rect in self.tree.iter() {
            writeln!(f, "[{:?} {:?}]", rect.lower(), rect.upper())?;
        }
        Ok(())
    }
}
