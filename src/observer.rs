use crate::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Phase {
    #[display("catalog")]
    Catalog,
    #[display("inventory")]
    Inventory,
    #[display("search")]
    Search,
    #[display("legalization")]
    Legalization,
}

/// State of the run at the end of a phase.
pub enum PhaseSnapshot<'a> {
    Catalog(&'a TrayCatalog),
    Inventory(&'a FlopInventory),
    Search {
        inventory: &'a FlopInventory,
        outcome: &'a SearchOutcome,
    },
    Legalization(&'a LegalizationReport),
}
impl PhaseSnapshot<'_> {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseSnapshot::Catalog(_) => Phase::Catalog,
            PhaseSnapshot::Inventory(_) => Phase::Inventory,
            PhaseSnapshot::Search { .. } => Phase::Search,
            PhaseSnapshot::Legalization(_) => Phase::Legalization,
        }
    }
}

/// Receives a snapshot after each phase. Called on the engine's thread,
/// never from inside a trial.
pub trait ProgressObserver {
    fn on_phase(&self, _snapshot: &PhaseSnapshot) {}
}

pub struct NoopObserver;
impl ProgressObserver for NoopObserver {}

/// Logs intermediate states as tables. Selected by the debug toggle.
#[derive(Default)]
pub struct DebugObserver;
impl DebugObserver {
    fn catalog_table(catalog: &TrayCatalog) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Tray", "Bits", "Size (W,H)", "Clock", "Scan"]);
        for tray in catalog.trays() {
            table.add_row(row![
                tray.name,
                tray.capacity(),
                format!("{:?}", tray.size()),
                if tray.layout.clock_collapsed { "collapsed" } else { "per-bit" },
                tray.has_scan()
            ]);
        }
        table
    }

    fn inventory_table(inventory: &FlopInventory) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Clock net", "Edge", "Polarity", "Scan", "Flops"]);
        for (signature, ids) in inventory.groups() {
            table.add_row(row![
                signature.clock_net,
                signature.edge,
                signature.polarity,
                signature.scan,
                ids.len()
            ]);
        }
        table
    }

    fn search_table(inventory: &FlopInventory, outcome: &SearchOutcome) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Tray", "Members", "Origin", "Cost"]);
        for planned in &outcome.best.trays {
            let members = planned
                .cluster
                .members
                .iter()
                .map(|&id| inventory.get(id).name.as_str())
                .join(" ");
            table.add_row(row![
                planned.assignment.tray,
                members,
                format!("({:.2}, {:.2})", planned.assignment.origin.0, planned.assignment.origin.1),
                format!("{:.3}", planned.assignment.cost)
            ]);
        }
        table
    }

    fn legalization_table(report: &LegalizationReport) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Instance", "Tray", "Position", "Moved"]);
        for placed in &report.placed {
            table.add_row(row![
                placed.name,
                placed.tray,
                format!("({}, {})", placed.pos.0, placed.pos.1),
                format!("{:.3}", placed.moved)
            ]);
        }
        for rolled in &report.rolled_back {
            table.add_row(row![rolled.members.join(" "), "-", "-", rolled.error]);
        }
        table
    }
}
impl ProgressObserver for DebugObserver {
    fn on_phase(&self, snapshot: &PhaseSnapshot) {
        let table = match snapshot {
            PhaseSnapshot::Catalog(catalog) => Self::catalog_table(catalog),
            PhaseSnapshot::Inventory(inventory) => Self::inventory_table(inventory),
            PhaseSnapshot::Search { inventory, outcome } => Self::search_table(inventory, outcome),
            PhaseSnapshot::Legalization(report) => Self::legalization_table(report),
        };
        debug!(target:"internal", "{} after {}:\n{}", "Snapshot".bold(), snapshot.phase(), table);
    }
}
