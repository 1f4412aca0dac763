pub use crate::custom_trait::*;
pub use crate::geometry::Rect;
pub use bon::{bon, builder, Builder};
pub use colored::Colorize;
pub use derive_new::new;
pub use foldhash::{HashMapExt, HashSetExt};
pub use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
pub use itertools::Itertools;
pub use log::{debug, info, warn};
pub use logging_timer::{finish, time, timer};
pub use ordered_float::OrderedFloat;
pub use prettytable::*;
pub use rand::{Rng, SeedableRng};
pub use rayon::prelude::*;
pub use regex::Regex;
pub use rstar::{primitives::GeomWithData, RTree};
pub use smallvec::SmallVec;
pub use std::cmp::Reverse;
pub use std::fmt;
pub use std::hash::{Hash, Hasher};
pub use std::sync::LazyLock;

#[allow(non_camel_case_types)]
pub type float = f64;
#[allow(non_camel_case_types)]
pub type uint = u64;
#[allow(non_camel_case_types)]
pub type int = i64;

pub type PriorityQueue<T, K> = priority_queue::PriorityQueue<T, K, foldhash::fast::RandomState>;
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, foldhash::fast::RandomState>;
pub type IndexSet<T> = indexmap::IndexSet<T, foldhash::fast::RandomState>;
pub type Set<T> = foldhash::HashSet<T>;
pub type Dict<K, V> = foldhash::HashMap<K, V>;
pub type Vector2 = (float, float);

/// Manhattan distance between two points.
pub fn norm1(p1: Vector2, p2: Vector2) -> float {
    (p1.0 - p2.0).abs() + (p1.1 - p2.1).abs()
}

pub fn add(p1: Vector2, p2: Vector2) -> Vector2 {
    (p1.0 + p2.0, p1.1 + p2.1)
}

pub fn sub(p1: Vector2, p2: Vector2) -> Vector2 {
    (p1.0 - p2.0, p1.1 - p2.1)
}

/// Lower median of a slice. Minimizes the sum of absolute deviations.
pub fn median(values: &mut [float]) -> float {
    debug_assert!(!values.is_empty());
    values.sort_unstable_by_key(|&x| OrderedFloat(x));
    values[(values.len() - 1) / 2]
}

/// Coordinate-wise median of a point set, the L1 center of the set.
pub fn median_point(points: &[Vector2]) -> Vector2 {
    let mut xs = points.iter().map(|p| p.0).collect_vec();
    let mut ys = points.iter().map(|p| p.1).collect_vec();
    (median(&mut xs), median(&mut ys))
}

/// SplitMix64 step. Used to derive independent per-trial seeds from one base seed.
pub fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_even_slice_takes_lower_middle() {
        let mut values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), 2.0);
        assert_eq!(median_point(&[(0.0, 5.0), (10.0, 1.0), (2.0, 3.0)]), (2.0, 3.0));
    }

    #[test]
    fn seeds_differ_per_stream() {
        let seeds = (0..16).map(|i| mix_seed(42, i)).collect::<Set<_>>();
        assert_eq!(seeds.len(), 16);
        assert_eq!(mix_seed(7, 3), mix_seed(7, 3));
    }
}
