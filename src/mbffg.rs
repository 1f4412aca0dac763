use crate::*;

/// Displays the current progress step to the user via logging.
fn display_progress_step(step: int) {
    match step {
        1 => info!(
            target:"internal",
            "{} {}",
            "[1/4]".bold().dimmed(),
            "⠋ Classifying trays...".bold().bright_yellow()
        ),
        2 => info!(
            target:"internal",
            "{} {}",
            "[2/4]".bold().dimmed(),
            "⠙ Collecting flip-flops...".bold().bright_yellow()
        ),
        3 => info!(
            target:"internal",
            "{} {}",
            "[3/4]".bold().dimmed(),
            "⠴ Clustering...".bold().bright_yellow()
        ),
        4 => info!(
            target:"internal",
            "{} {}",
            "[4/4]".bold().dimmed(),
            "⠦ Legalizing...".bold().bright_yellow()
        ),
        _ => info!(target:"internal", "{}", "✔ Done".bold().bright_green()),
    }
}

// --------------------------------------------------------------------------------
// ## MBFFG Engine
// One invocation: classify trays, collect flops, search clusterings, rewrite the netlist.
// --------------------------------------------------------------------------------

pub struct MBFFG<'a, D: DesignEditor> {
    design: &'a mut D,
    timing: &'a dyn TimingProvider,
    observer: &'a dyn ProgressObserver,
    config: EngineConfig,
}

#[bon]
impl<'a, D: DesignEditor> MBFFG<'a, D> {
    #[builder]
    pub fn new(
        design: &'a mut D,
        timing: Option<&'a dyn TimingProvider>,
        observer: Option<&'a dyn ProgressObserver>,
        #[builder(default)] config: EngineConfig,
    ) -> Self {
        let observer: &'a dyn ProgressObserver = match observer {
            Some(observer) => observer,
            None if config.debug_graphics => &DebugObserver,
            None => &NoopObserver,
        };
        Self {
            design,
            timing: timing.unwrap_or(&NoTiming),
            observer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn design(&self) -> &D {
        &*self.design
    }

    fn slack_map(&self) -> SlackMap {
        if !self.config.timing_enabled() {
            return SlackMap::default();
        }
        let paths = self.timing.worst_paths(self.config.num_paths);
        debug!("Weighting flops on {} timing paths", paths.len());
        SlackMap::from_paths(&paths)
    }

    /// Runs the whole flow. Only an invalid configuration or a timeout fails
    /// the invocation, and both leave the design untouched.
    #[time("info")]
    pub fn run(&mut self) -> Result<Summary, EngineError> {
        self.config.validate()?;

        display_progress_step(1);
        let catalog = TrayCatalog::new(&*self.design);
        self.observer.on_phase(&PhaseSnapshot::Catalog(&catalog));
        let mut issues = catalog.issues().iter().map(ToString::to_string).collect_vec();
        if catalog.is_empty() {
            warn!(target:"internal", "No valid multi-bit tray in the library");
            return Ok(Summary {
                issues,
                ..Summary::no_op("library has no valid multi-bit tray")
            });
        }
        info!(target:"internal", "{} valid trays: {}", catalog.len(), catalog.trays().map(|t| &t.name).join(", "));

        display_progress_step(2);
        let slacks = self.slack_map();
        let inventory = FlopInventory::build(&*self.design, &catalog, &slacks, &self.config);
        self.observer.on_phase(&PhaseSnapshot::Inventory(&inventory));
        issues.extend(inventory.issues().iter().map(ToString::to_string));
        let mut summary = Summary {
            valid_trays: catalog.len(),
            flops_considered: inventory.len(),
            fixed_flops: inventory.fixed_count(),
            banked_flops: inventory.banked_count(),
            excluded: inventory.issues().len(),
            ..Default::default()
        };
        if inventory.is_empty() {
            warn!(target:"internal", "No clusterable single-bit flip-flop found");
            return Ok(Summary {
                no_op_reason: Some("no clusterable flip-flop".to_string()),
                issues,
                ..summary
            });
        }

        display_progress_step(3);
        let coordinator = MultiStartCoordinator::new(&inventory, &catalog, &self.config);
        let outcome = coordinator.search()?;
        self.observer.on_phase(&PhaseSnapshot::Search {
            inventory: &inventory,
            outcome: &outcome,
        });
        issues.extend(outcome.best.skipped.iter().map(|(_, e)| e.to_string()));

        display_progress_step(4);
        let report = Legalizer::new(&inventory, &catalog, &self.config).legalize(&mut *self.design, &outcome.best.trays);
        self.observer.on_phase(&PhaseSnapshot::Legalization(&report));
        issues.extend(report.rolled_back.iter().map(|r| r.error.to_string()));

        for placed in &report.placed {
            if let Some(tray) = catalog.tray(&placed.tray) {
                *summary.trays_per_capacity.entry(tray.capacity()).or_default() += 1;
            }
        }
        summary.clusters_formed = outcome.best.trays.len();
        summary.total_cost = outcome.best.cost;
        summary.total_displacement = outcome.best.displacement();
        summary.legalization_displacement = report.placed.iter().map(|p| p.moved).sum();
        summary.unclustered = outcome.best.unclustered.len();
        summary.rolled_back = report.rolled_back_flops();
        summary.winning_trial = Some(outcome.best.trial);
        summary.trial_costs = outcome.trial_costs;
        summary.placed = report.placed;
        summary.issues = issues;
        debug_assert_eq!(
            summary.flops_absorbed() + summary.rolled_back + summary.unclustered,
            inventory.len()
        );

        display_progress_step(5);
        for (bits, count) in &summary.trays_per_capacity {
            info!(target:"internal", "{bits}-bit → {count:>10} trays");
        }
        Ok(summary)
    }
}
