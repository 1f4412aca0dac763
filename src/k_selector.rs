use crate::*;
use std::collections::BTreeSet;
use std::fmt::Debug;

// (Reverse<P>, ID): the highest priority sorts first, ID breaks ties in insertion order.
type Item<P> = (Reverse<P>, usize);

/// Keeps the `k` highest-priority items among everything recorded so far.
pub struct TopKRecorder<P, K>
where
    P: Ord + Clone + Debug,
    K: Clone + Debug,
{
    k: usize,
    top_k: BTreeSet<Item<P>>,
    keys: Dict<usize, K>,
    recorded: usize,
}

impl<P, K> TopKRecorder<P, K>
where
    P: Ord + Clone + Debug,
    K: Clone + Debug,
{
    pub fn new(k: usize) -> Self {
        TopKRecorder {
            k,
            top_k: BTreeSet::new(),
            keys: Dict::new(),
            recorded: 0,
        }
    }

    /// Number of items ever recorded.
    pub fn len(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    pub fn max_element(&self) -> Option<(P, K)> {
        let (Reverse(p), id) = self.top_k.first()?;
        self.keys.get(id).map(|k| (p.clone(), k.clone()))
    }

    /// O(log k).
    pub fn record(&mut self, priority: P, key: K) {
        let id = self.recorded;
        self.recorded += 1;
        if self.k == 0 {
            return;
        }
        let item = (Reverse(priority), id);
        if self.top_k.len() < self.k {
            self.top_k.insert(item);
        } else if self.top_k.last().is_some_and(|last| item < *last) {
            if let Some((_, evicted)) = self.top_k.pop_last() {
                self.keys.remove(&evicted);
            }
            self.top_k.insert(item);
        } else {
            return;
        }
        self.keys.insert(id, key);
    }

    /// The recorded top elements, highest priority first.
    pub fn top_k(&self) -> Vec<(P, K)> {
        self.top_k
            .iter()
            .filter_map(|(Reverse(p), id)| self.keys.get(id).map(|k| (p.clone(), k.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn keeps_highest_priorities() {
        let mut recorder = TopKRecorder::<i32, String>::new(3);
        recorder.record(10, s("A"));
        assert_eq!(recorder.top_k(), vec![(10, s("A"))]);
        recorder.record(15, s("B"));
        recorder.record(25, s("C"));
        assert_eq!(recorder.top_k(), vec![(25, s("C")), (15, s("B")), (10, s("A"))]);

        recorder.record(2, s("D"));
        recorder.record(20, s("E"));
        assert_eq!(recorder.top_k(), vec![(25, s("C")), (20, s("E")), (15, s("B"))]);
        assert_eq!(recorder.max_element(), Some((25, s("C"))));
        assert_eq!(recorder.len(), 5);
    }

    #[test]
    fn ties_keep_the_earlier_item() {
        let mut recorder = TopKRecorder::<i32, &str>::new(2);
        recorder.record(5, "A");
        recorder.record(5, "B");
        recorder.record(5, "C");
        assert_eq!(recorder.top_k(), vec![(5, "A"), (5, "B")]);
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut recorder = TopKRecorder::<i32, &str>::new(0);
        recorder.record(1, "A");
        assert!(recorder.top_k().is_empty());
        assert_eq!(recorder.max_element(), None);
        assert_eq!(recorder.len(), 1);
    }
}
