use crate::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// A cluster with the tray it will become.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTray {
    pub cluster: Cluster,
    pub assignment: SlotAssignment,
    /// Largest criticality weight among the members.
    pub criticality: float,
}

/// Outcome of one independent clustering + assignment trial.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSolution {
    pub trial: usize,
    pub seed: u64,
    pub trays: Vec<PlannedTray>,
    pub unclustered: Vec<FlopId>,
    pub skipped: Vec<(Members, AssignError)>,
    pub cost: float,
}
impl CandidateSolution {
    pub fn displacement(&self) -> float {
        self.trays.iter().map(|t| t.assignment.displacement).sum()
    }
    pub fn clustered_flops(&self) -> usize {
        self.trays.iter().map(|t| t.cluster.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: CandidateSolution,
    /// Aggregate cost of every completed trial, by trial index.
    pub trial_costs: BTreeMap<usize, float>,
}

pub struct MultiStartCoordinator<'a> {
    inventory: &'a FlopInventory,
    catalog: &'a TrayCatalog,
    config: &'a EngineConfig,
}

impl<'a> MultiStartCoordinator<'a> {
    pub fn new(inventory: &'a FlopInventory, catalog: &'a TrayCatalog, config: &'a EngineConfig) -> Self {
        Self {
            inventory,
            catalog,
            config,
        }
    }

    /// Runs one trial. Returns `None` when cancelled.
    pub fn run_trial(&self, trial: usize, cancel: &AtomicBool) -> Option<CandidateSolution> {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        let seed = mix_seed(self.config.seed, trial.uint());
        let clustering = ClusteringEngine::new(self.inventory, self.catalog, self.config).run(trial, seed);
        let solver = SlotAssignmentSolver::new(self.inventory, self.catalog, self.config);
        let mut unclustered = clustering.unclustered;
        let mut trays = Vec::with_capacity(clustering.clusters.len());
        let mut skipped = Vec::new();
        for cluster in clustering.clusters {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            match solver.best(&cluster) {
                Ok(assignment) => {
                    let criticality = cluster
                        .members
                        .iter()
                        .map(|&id| self.inventory.get(id).weight)
                        .fold(0.0, float::max);
                    trays.push(PlannedTray {
                        cluster,
                        assignment,
                        criticality,
                    });
                }
                Err(e) => {
                    unclustered.extend(cluster.members.iter().copied());
                    skipped.push((cluster.members, e));
                }
            }
        }
        unclustered.sort_unstable();
        let cost = trays.iter().map(|t| t.assignment.cost).sum::<float>()
            + self.config.unclustered_penalty * self.inventory.total_weight(unclustered.iter().copied());
        Some(CandidateSolution {
            trial,
            seed,
            trays,
            unclustered,
            skipped,
            cost,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        let pb = ProgressBar::new(self.config.multistart.uint());
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} trials",
        ) {
            pb.set_style(style.progress_chars("##-"));
        }
        if self.config.quiet {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb
    }

    /// Runs every trial on the worker pool and keeps the cheapest one.
    /// Ties go to the lowest trial index, so the result does not depend on
    /// completion order or thread count.
    #[time("info")]
    pub fn search(&self) -> Result<SearchOutcome, EngineError> {
        let cancel = AtomicBool::new(false);
        self.search_until(self.config.deadline(Instant::now()), &cancel)
    }

    /// Same as [`Self::search`] with an explicit deadline. A search that
    /// finds `cancel` set, or passes the deadline, discards every trial.
    fn search_until(&self, deadline: Option<Instant>, cancel: &AtomicBool) -> Result<SearchOutcome, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()?;
        let pb = self.progress_bar();

        let (results, timed_out) = pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel();
            for trial in 0..self.config.multistart {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    if let Some(solution) = self.run_trial(trial, cancel) {
                        // receiver gone means the search already gave up
                        let _ = tx.send(solution);
                    }
                });
            }
            drop(tx);

            let mut results = BTreeMap::new();
            loop {
                let received = match deadline {
                    Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok(solution) => {
                        pb.inc(1);
                        results.insert(solution.trial, solution);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        cancel.store(true, Ordering::Relaxed);
                        break (results, true);
                    }
                    Err(RecvTimeoutError::Disconnected) => break (results, false),
                }
            }
        });
        pb.finish_and_clear();

        let secs = self.config.timeout_secs.unwrap_or_default();
        if timed_out || cancel.load(Ordering::Relaxed) {
            warn!(target:"internal", "Search timed out after {secs:.1}s, discarding {} finished trials", results.len());
            return Err(EngineError::Timeout(secs));
        }
        let trial_costs = results.iter().map(|(&t, s)| (t, s.cost)).collect();
        let best = results
            .into_values()
            .min_by_key(|s| (OrderedFloat(s.cost), s.trial))
            .ok_or(EngineError::Timeout(secs))?;
        info!(target:"internal",
            "Best trial {} of {}: cost {:.3}, {} trays, {} unclustered",
            best.trial,
            self.config.multistart,
            best.cost,
            best.trays.len(),
            best.unclustered.len()
        );
        Ok(SearchOutcome { best, trial_costs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::{flop_at, signature};
    use crate::tray::tests::tray_with_bits;
    use pretty_assertions::assert_eq;

    fn scattered_inventory() -> FlopInventory {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let flops = (0..24)
            .map(|i| {
                flop_at(
                    &format!("f{i}"),
                    rng.gen_range(0.0..60.0),
                    rng.gen_range(0.0..20.0_f64).floor(),
                    signature(i % 2),
                )
            })
            .collect();
        FlopInventory::from_flops(flops)
    }

    fn catalog() -> TrayCatalog {
        TrayCatalog::from_masters([&tray_with_bits("T2", 2), &tray_with_bits("T4", 4)])
    }

    #[test]
    fn winner_is_minimum_over_trials() {
        let inventory = scattered_inventory();
        let catalog = catalog();
        let config = EngineConfig::builder().multistart(6).threads(2).quiet(true).build();
        let coordinator = MultiStartCoordinator::new(&inventory, &catalog, &config);
        let outcome = coordinator.search().unwrap();
        assert_eq!(outcome.trial_costs.len(), 6);
        assert!(outcome.trial_costs.values().all(|&c| outcome.best.cost <= c));
        let first_min = outcome
            .trial_costs
            .iter()
            .find(|&(_, &c)| c == outcome.best.cost)
            .map(|(&t, _)| t);
        assert_eq!(first_min, Some(outcome.best.trial));
    }

    #[test]
    fn same_seed_gives_same_result_regardless_of_threads() {
        let inventory = scattered_inventory();
        let catalog = catalog();
        let run = |threads: usize| {
            let config = EngineConfig::builder()
                .multistart(5)
                .threads(threads)
                .quiet(true)
                .build();
            MultiStartCoordinator::new(&inventory, &catalog, &config)
                .search()
                .unwrap()
        };
        let a = run(1);
        let b = run(4);
        assert_eq!(a.best.trial, b.best.trial);
        assert_eq!(a.trial_costs, b.trial_costs);
        assert_eq!(a.best.unclustered, b.best.unclustered);
        let members = |o: &SearchOutcome| {
            o.best
                .trays
                .iter()
                .map(|t| (t.cluster.members.to_vec(), t.assignment.pairs.clone()))
                .collect_vec()
        };
        assert_eq!(members(&a), members(&b));
    }

    #[test]
    fn trials_cover_every_flop_once() {
        let inventory = scattered_inventory();
        let catalog = catalog();
        let config = EngineConfig::default();
        let cancel = AtomicBool::new(false);
        let coordinator = MultiStartCoordinator::new(&inventory, &catalog, &config);
        for trial in 0..3 {
            let solution = coordinator.run_trial(trial, &cancel).unwrap();
            let mut ids = solution
                .trays
                .iter()
                .flat_map(|t| t.cluster.members.iter().copied())
                .chain(solution.unclustered.iter().copied())
                .collect_vec();
            ids.sort_unstable();
            assert_eq!(ids, (0..inventory.len()).collect_vec());
        }
        cancel.store(true, Ordering::Relaxed);
        assert!(coordinator.run_trial(0, &cancel).is_none());
    }

    #[test]
    fn expired_search_discards_every_trial() {
        let inventory = scattered_inventory();
        let catalog = catalog();
        let config = EngineConfig::builder()
            .multistart(4)
            .threads(2)
            .timeout_secs(0.0)
            .quiet(true)
            .build();
        let coordinator = MultiStartCoordinator::new(&inventory, &catalog, &config);

        let cancel = AtomicBool::new(true);
        let result = coordinator.search_until(Some(Instant::now()), &cancel);
        assert!(matches!(result, Err(EngineError::Timeout(secs)) if secs == 0.0));

        // cancelled without a deadline still yields no winner
        let cancel = AtomicBool::new(true);
        let result = coordinator.search_until(None, &cancel);
        assert!(matches!(result, Err(EngineError::Timeout(_))));
    }

    #[test]
    fn unrepresentable_timeout_runs_to_completion() {
        let inventory = scattered_inventory();
        let catalog = catalog();
        let config = EngineConfig::builder()
            .multistart(3)
            .timeout_secs(1e19)
            .quiet(true)
            .build();
        let outcome = MultiStartCoordinator::new(&inventory, &catalog, &config)
            .search()
            .unwrap();
        assert_eq!(outcome.trial_costs.len(), 3);
    }
}
