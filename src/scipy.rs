pub mod optimize {
    use crate::*;
    use ndarray::Array2;

    /// Minimum-cost assignment of rows to distinct columns, mirroring
    /// `scipy.optimize.linear_sum_assignment`. Returns `(row_ind, col_ind)`
    /// sorted by row. Rectangular matrices assign `min(rows, cols)` pairs.
    ///
    /// Shortest augmenting path with potentials, O(n^2 m). Costs must be finite.
    pub fn linear_sum_assignment(cost: &Array2<float>) -> (Vec<usize>, Vec<usize>) {
        let (n, m) = cost.dim();
        if n == 0 || m == 0 {
            return (Vec::new(), Vec::new());
        }
        if n > m {
            let (cols, rows) = linear_sum_assignment(&cost.t().to_owned());
            let pairs = rows.into_iter().zip(cols).sorted_unstable().collect_vec();
            return pairs.into_iter().unzip();
        }
        debug_assert!(cost.iter().all(|c| c.is_finite()));

        // 1-based potentials; column 0 is the virtual root of each augmenting tree
        let mut u = vec![0.0; n + 1];
        let mut v = vec![0.0; m + 1];
        let mut p = vec![0usize; m + 1];
        let mut way = vec![0usize; m + 1];
        for i in 1..=n {
            p[0] = i;
            let mut j0 = 0;
            let mut minv = vec![float::INFINITY; m + 1];
            let mut used = vec![false; m + 1];
            loop {
                used[j0] = true;
                let i0 = p[j0];
                let mut delta = float::INFINITY;
                let mut j1 = 0;
                for j in 1..=m {
                    if used[j] {
                        continue;
                    }
                    let cur = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
                if j1 == 0 {
                    break;
                }
                for j in 0..=m {
                    if used[j] {
                        u[p[j]] += delta;
                        v[j] -= delta;
                    } else {
                        minv[j] -= delta;
                    }
                }
                j0 = j1;
                if p[j0] == 0 {
                    break;
                }
            }
            while j0 != 0 {
                let j1 = way[j0];
                p[j0] = p[j1];
                j0 = j1;
            }
        }
        let mut col_ind = vec![0; n];
        for j in 1..=m {
            if p[j] != 0 {
                col_ind[p[j] - 1] = j - 1;
            }
        }
        ((0..n).collect(), col_ind)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use ndarray::array;
        use rand::rngs::StdRng;

        fn total(cost: &Array2<float>, rows: &[usize], cols: &[usize]) -> float {
            rows.iter().zip(cols).map(|(&r, &c)| cost[[r, c]]).sum()
        }

        fn brute_force(cost: &Array2<float>) -> float {
            let (n, m) = cost.dim();
            (0..m)
                .permutations(n)
                .map(|cols| (0..n).map(|r| cost[[r, cols[r]]]).sum::<float>())
                .min_by_key(|&c| OrderedFloat(c))
                .unwrap_or(0.0)
        }

        #[test]
        fn square_matches_known_answer() {
            let cost = array![[4.0, 1.0, 3.0], [2.0, 0.0, 5.0], [3.0, 2.0, 2.0]];
            let (rows, cols) = linear_sum_assignment(&cost);
            assert_eq!(rows, vec![0, 1, 2]);
            assert_eq!(cols, vec![1, 0, 2]);
            assert_eq!(total(&cost, &rows, &cols), 5.0);
        }

        #[test]
        fn random_rectangular_matches_brute_force() {
            let mut rng = StdRng::seed_from_u64(42);
            for n in 1..=5 {
                for m in n..=6 {
                    let cost = Array2::<float>::from_shape_fn((n, m), |_| rng.gen_range(0.0..10.0));
                    let (rows, cols) = linear_sum_assignment(&cost);
                    assert_eq!(cols.iter().unique().count(), n);
                    assert!((total(&cost, &rows, &cols) - brute_force(&cost)).abs() < 1e-9);
                }
            }
        }

        #[test]
        fn tall_matrix_is_transposed() {
            let cost = array![[1.0], [0.5], [3.0]];
            let (rows, cols) = linear_sum_assignment(&cost);
            assert_eq!(rows, vec![1]);
            assert_eq!(cols, vec![0]);
        }
    }
}

pub mod cluster {
    use crate::*;

    #[derive(Debug, Default, Clone)]
    pub struct KMeansResult {
        pub cluster_centers: Vec<Vector2>,
        pub labels: Vec<usize>,
        /// Sum of Manhattan distances from samples to their centers.
        pub cost: float,
        pub iterations: usize,
    }

    /// Closest center still accepting samples. Candidates come from the tree's
    /// Euclidean order; the winner is the Manhattan-closest of the first few.
    fn nearest_open(
        rtree: &RtreeWithData<usize>,
        centers: &[Vector2],
        point: Vector2,
    ) -> Option<(float, usize)> {
        rtree
            .iter_nearest([point.0, point.1])
            .take(8)
            .map(|e| (norm1(point, centers[e.data]), e.data))
            .min_by_key(|&(d, id)| (OrderedFloat(d), id))
    }

    fn nearest_any(centers: &[Vector2], point: Vector2) -> (float, usize) {
        centers
            .iter()
            .enumerate()
            .map(|(id, &c)| (norm1(point, c), id))
            .min_by_key(|&(d, id)| (OrderedFloat(d), id))
            .unwrap_or((0.0, 0))
    }

    /// Assigns each sample to the nearest center with room left, cheapest
    /// sample first. Ties go to the lower sample index.
    pub fn assign_capacitated(samples: &[Vector2], centers: &[Vector2], cap: usize) -> Vec<usize> {
        let mut rtree = RtreeWithData::from(
            centers
                .iter()
                .enumerate()
                .map(|(i, c)| ([c.0, c.1], i))
                .collect_vec(),
        );
        let mut counts = vec![0; centers.len()];
        let mut labels = vec![0; samples.len()];
        let mut target = vec![0; samples.len()];
        let mut pq = PriorityQueue::default();
        for (i, &s) in samples.iter().enumerate() {
            let (d, c) = nearest_open(&rtree, centers, s).unwrap_or_else(|| nearest_any(centers, s));
            target[i] = c;
            pq.push(i, Reverse((OrderedFloat(d), i)));
        }
        while let Some((i, _)) = pq.pop() {
            let c = target[i];
            if counts[c] >= cap && rtree.size() > 0 {
                // the preferred center filled up meanwhile
                if let Some((d, c)) = nearest_open(&rtree, centers, samples[i]) {
                    target[i] = c;
                    pq.push(i, Reverse((OrderedFloat(d), i)));
                    continue;
                }
            }
            labels[i] = c;
            counts[c] += 1;
            if counts[c] == cap {
                rtree.delete([centers[c].0, centers[c].1], c);
            }
        }
        labels
    }

    fn evaluate_kmeans_quality(samples: &[Vector2], centers: &[Vector2], labels: &[usize]) -> float {
        samples
            .iter()
            .zip(labels)
            .map(|(&s, &l)| norm1(s, centers[l]))
            .sum()
    }

    /// Capacitated k-means under the Manhattan metric. Centers move to the
    /// coordinate-wise median of their members; empty centers stay put.
    #[builder]
    pub fn kmeans(
        samples: &[Vector2],
        /// Initial centers; their count is the number of clusters.
        init: Vec<Vector2>,
        /// No cluster receives more than `cap` samples while `cap * k >= n`.
        cap: usize,
        /// Maximum number of refinement rounds
        max_iter: Option<usize>,
    ) -> KMeansResult {
        let max_iter = max_iter.unwrap_or(300).max(1);
        let mut centers = init;
        if samples.is_empty() || centers.is_empty() {
            return KMeansResult {
                cluster_centers: centers,
                ..Default::default()
            };
        }
        debug_assert!(cap * centers.len() >= samples.len());
        let mut labels: Vec<usize> = Vec::new();
        let mut iterations = 0;
        while iterations < max_iter {
            iterations += 1;
            let new_labels = assign_capacitated(samples, &centers, cap);
            let stable = new_labels == labels;
            labels = new_labels;
            let mut members = vec![Vec::new(); centers.len()];
            for (i, &l) in labels.iter().enumerate() {
                members[l].push(samples[i]);
            }
            for (center, points) in centers.iter_mut().zip(&members) {
                if !points.is_empty() {
                    *center = median_point(points);
                }
            }
            if stable {
                break;
            }
        }
        let cost = evaluate_kmeans_quality(samples, &centers, &labels);
        KMeansResult {
            cluster_centers: centers,
            labels,
            cost,
            iterations,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn respects_capacity() {
            // five points crowded around one corner, two far away
            let samples = vec![
                (0.0, 0.0),
                (1.0, 0.0),
                (0.0, 1.0),
                (1.0, 1.0),
                (0.5, 0.5),
                (50.0, 50.0),
                (51.0, 50.0),
            ];
            let result = kmeans()
                .samples(&samples)
                .init(vec![(0.0, 0.0), (50.0, 50.0)])
                .cap(4)
                .max_iter(20)
                .call();
            let counts = result.labels.iter().counts();
            assert!(counts.values().all(|&c| c <= 4));
            assert_eq!(result.labels[5], result.labels[6]);
            assert_eq!(result.labels[0], result.labels[1]);
        }

        #[test]
        fn separated_pairs_pair_up() {
            let samples = vec![(0.0, 0.0), (10.0, 0.0), (0.5, 0.0), (10.5, 0.0)];
            let result = kmeans()
                .samples(&samples)
                .init(vec![(0.0, 0.0), (1.0, 0.0)])
                .cap(2)
                .call();
            assert_eq!(result.labels[0], result.labels[2]);
            assert_eq!(result.labels[1], result.labels[3]);
            assert_ne!(result.labels[0], result.labels[1]);
            assert_eq!(result.cost, 1.0);
        }

        #[test]
        fn equal_distances_favor_lower_index() {
            let samples = vec![(1.0, 0.0), (-1.0, 0.0)];
            let labels = assign_capacitated(&samples, &[(0.0, 0.0), (100.0, 0.0)], 1);
            assert_eq!(labels, vec![0, 1]);
        }
    }
}
