use crate::num_formater::{format_float, format_with_separator};
use crate::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one engine invocation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Summary {
    /// Set when the run stopped early without touching the design.
    pub no_op_reason: Option<String>,
    pub valid_trays: usize,
    pub flops_considered: usize,
    pub fixed_flops: usize,
    pub banked_flops: usize,
    pub clusters_formed: usize,
    /// Placed trays per capacity.
    pub trays_per_capacity: BTreeMap<usize, usize>,
    pub total_cost: float,
    pub total_displacement: float,
    pub legalization_displacement: float,
    pub unclustered: usize,
    pub rolled_back: usize,
    pub excluded: usize,
    pub winning_trial: Option<usize>,
    pub trial_costs: BTreeMap<usize, float>,
    pub placed: Vec<PlacedTray>,
    pub issues: Vec<String>,
}

impl Summary {
    pub fn no_op(reason: impl Into<String>) -> Self {
        Self {
            no_op_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn trays_placed(&self) -> usize {
        self.trays_per_capacity.values().sum()
    }

    /// Flops moved into placed trays. Partial trays count their members only.
    pub fn flops_absorbed(&self) -> usize {
        self.placed.iter().map(|p| p.members.len()).sum()
    }

    /// Slots left empty across all placed trays.
    pub fn empty_slots(&self) -> usize {
        let capacity: usize = self.trays_per_capacity.iter().map(|(bits, n)| bits * n).sum();
        capacity.saturating_sub(self.flops_absorbed())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.add_row(row!["Info", "Value"]);
        if let Some(reason) = &self.no_op_reason {
            table.add_row(row!["No-op", reason]);
        }
        table.add_row(row!["#ValidTrays", self.valid_trays]);
        table.add_row(row!["#FlipFlops", format_with_separator(self.flops_considered, ',')]);
        table.add_row(row!["#Fixed", self.fixed_flops]);
        table.add_row(row!["#AlreadyBanked", self.banked_flops]);
        table.add_row(row!["#Excluded", self.excluded]);
        table.add_row(row!["#Clusters", self.clusters_formed]);
        for (bits, count) in &self.trays_per_capacity {
            table.add_row(row![format!("{bits}-bit trays"), count]);
        }
        table.add_row(row!["#EmptySlots", self.empty_slots()]);
        table.add_row(row!["#Unclustered", self.unclustered]);
        table.add_row(row!["#RolledBack", self.rolled_back]);
        table.add_row(row!["Cost", format_float(self.total_cost, 6)]);
        table.add_row(row!["Displacement", format_float(self.total_displacement, 6)]);
        table.add_row(row!["Legalization shift", format_float(self.legalization_displacement, 6)]);
        if let Some(trial) = self.winning_trial {
            table.add_row(row!["Winning trial", format!("{trial} / {}", self.trial_costs.len())]);
        }
        table
    }

    pub fn issues_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["#", "Issue"]);
        for (i, issue) in self.issues.iter().enumerate() {
            table.add_row(row![i + 1, issue]);
        }
        table
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_absorbed_flops() {
        let mut summary = Summary::default();
        summary.trays_per_capacity.insert(2, 3);
        summary.trays_per_capacity.insert(4, 1);
        for (i, size) in [2, 2, 2, 3].into_iter().enumerate() {
            summary.placed.push(PlacedTray {
                name: format!("mbff_{i}"),
                tray: if size == 2 { "MBFF2" } else { "MBFF4" }.to_string(),
                pos: (0.0, 0.0),
                members: (0..size).map(|j| format!("ff{i}_{j}")).collect(),
                moved: 0.0,
            });
        }
        assert_eq!(summary.trays_placed(), 4);
        assert_eq!(summary.flops_absorbed(), 9);
        assert_eq!(summary.empty_slots(), 1);
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"trays_per_capacity\""));
        assert!(Summary::no_op("no trays").to_string().contains("no trays"));
    }
}
