use crate::scipy::cluster::kmeans;
use crate::*;
use rand::rngs::StdRng;
use serde::Serialize;

pub type Members = SmallVec<[FlopId; 8]>;

/// Flops that will share one tray. Every member has the same signature.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub members: Members,
    /// Median of the members' pin centers.
    pub center: Vector2,
}
impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One partition of the inventory. Each flop is either in exactly one cluster
/// or in `unclustered`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    pub unclustered: Vec<FlopId>,
}

/// Point a flop is clustered by: halfway between its data and output pins.
pub fn pin_center(flop: &Flop) -> Vector2 {
    (
        (flop.data_pos.0 + flop.output_pos.0) / 2.0,
        (flop.data_pos.1 + flop.output_pos.1) / 2.0,
    )
}

pub struct ClusteringEngine<'a> {
    inventory: &'a FlopInventory,
    catalog: &'a TrayCatalog,
    config: &'a EngineConfig,
}

impl<'a> ClusteringEngine<'a> {
    pub fn new(inventory: &'a FlopInventory, catalog: &'a TrayCatalog, config: &'a EngineConfig) -> Self {
        Self {
            inventory,
            catalog,
            config,
        }
    }

    /// Partitions every signature group. Trial 0 seeds deterministically;
    /// other trials draw their initial centers from `seed`.
    pub fn run(&self, trial: usize, seed: u64) -> Clustering {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut clustering = Clustering::default();
        for (signature, ids) in self.inventory.groups() {
            let required = signature.required_functions();
            let capacities = self.catalog.capacities_for(signature.edge, &required);
            let Some(&max_cap) = capacities.last() else {
                clustering.unclustered.extend(ids);
                continue;
            };
            if ids.len() < 2 {
                clustering.unclustered.extend(ids);
                continue;
            }
            let (clusters, rest) = self.cluster_group(&ids, &capacities, max_cap, trial, &mut rng);
            clustering.clusters.extend(clusters);
            clustering.unclustered.extend(rest);
        }
        clustering.unclustered.sort_unstable();
        clustering
    }

    fn cluster_group(
        &self,
        ids: &[FlopId],
        capacities: &[usize],
        max_cap: usize,
        trial: usize,
        rng: &mut StdRng,
    ) -> (Vec<Cluster>, Vec<FlopId>) {
        let samples = ids
            .iter()
            .map(|&id| pin_center(self.inventory.get(id)))
            .collect_vec();
        let k = ids.len().div_ceil(max_cap);
        let init = if trial == 0 {
            Self::window_seeds(&samples, k, max_cap)
        } else {
            rand::seq::index::sample(rng, samples.len(), k)
                .into_iter()
                .map(|i| samples[i])
                .collect_vec()
        };
        let result = kmeans()
            .samples(&samples)
            .init(init)
            .cap(max_cap)
            .max_iter(self.config.max_iterations)
            .call();

        let mut groups: Vec<Members> = vec![Members::new(); k];
        for (i, &label) in result.labels.iter().enumerate() {
            groups[label].push(ids[i]);
        }
        let mut clusters = Vec::new();
        let mut rest = Vec::new();
        for members in groups {
            match self.config.remainder_policy {
                RemainderPolicy::PartialTrays => self.keep_partial(members, &mut clusters, &mut rest),
                RemainderPolicy::ExactFill => {
                    self.split_exact(members, capacities, &mut clusters, &mut rest)
                }
            }
        }
        (clusters, rest)
    }

    // Sort by position and take the median of each window of `max_cap` flops.
    fn window_seeds(samples: &[Vector2], k: usize, max_cap: usize) -> Vec<Vector2> {
        let order = (0..samples.len())
            .sorted_by_key(|&i| (OrderedFloat(samples[i].0), OrderedFloat(samples[i].1), i))
            .collect_vec();
        order
            .chunks(max_cap)
            .take(k)
            .map(|window| median_point(&window.iter().map(|&i| samples[i]).collect_vec()))
            .collect()
    }

    fn make_cluster(&self, mut members: Members) -> Cluster {
        members.sort_unstable();
        let points = members
            .iter()
            .map(|&id| pin_center(self.inventory.get(id)))
            .collect_vec();
        Cluster {
            center: median_point(&points),
            members,
        }
    }

    fn keep_partial(&self, members: Members, clusters: &mut Vec<Cluster>, rest: &mut Vec<FlopId>) {
        if members.len() >= 2 {
            clusters.push(self.make_cluster(members));
        } else {
            rest.extend(members);
        }
    }

    // Carve groups of exactly an available capacity, largest first, nearest to the center first.
    fn split_exact(
        &self,
        members: Members,
        capacities: &[usize],
        clusters: &mut Vec<Cluster>,
        rest: &mut Vec<FlopId>,
    ) {
        if members.is_empty() {
            return;
        }
        let center = self.make_cluster(members.clone()).center;
        let mut remaining = members
            .into_iter()
            .sorted_by_key(|&id| (OrderedFloat(norm1(pin_center(self.inventory.get(id)), center)), id))
            .collect_vec();
        while let Some(&cap) = capacities.iter().rev().find(|&&c| c <= remaining.len()) {
            let taken: Members = remaining.drain(..cap).collect();
            clusters.push(self.make_cluster(taken));
        }
        rest.extend(remaining);
    }
}
