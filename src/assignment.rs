use crate::scipy::optimize::linear_sum_assignment;
use crate::*;
use ndarray::Array2;
use serde::Serialize;

/// A cluster mapped onto one tray master at one origin.
#[derive(Debug, Clone, Serialize)]
pub struct SlotAssignment {
    pub tray: String,
    /// (flop, slot index) pairs, ordered by flop id.
    pub pairs: Vec<(FlopId, usize)>,
    pub origin: Vector2,
    /// Weighted displacement plus the unused-feature penalty.
    pub cost: float,
    /// Unweighted pin displacement.
    pub displacement: float,
    pub unused_features: usize,
}
impl SlotAssignment {
    pub fn slot_of(&self, flop: FlopId) -> Option<usize> {
        self.pairs.iter().find(|(f, _)| *f == flop).map(|(_, s)| *s)
    }
}

/// Result of solving at a fixed origin.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedOriginSolution {
    pub pairs: Vec<(FlopId, usize)>,
    pub weighted: float,
    pub displacement: float,
}

// Smallest value where the cumulative weight reaches half of the total.
fn weighted_median(mut values: Vec<(float, float)>) -> float {
    values.sort_unstable_by_key(|&(v, _)| OrderedFloat(v));
    let total: float = values.iter().map(|(_, w)| w).sum();
    let mut acc = 0.0;
    for &(v, w) in &values {
        acc += w;
        if acc >= total / 2.0 {
            return v;
        }
    }
    values.last().map(|(v, _)| *v).unwrap_or(0.0)
}

pub struct SlotAssignmentSolver<'a> {
    inventory: &'a FlopInventory,
    catalog: &'a TrayCatalog,
    config: &'a EngineConfig,
}

impl<'a> SlotAssignmentSolver<'a> {
    const MAX_ORIGIN_ROUNDS: usize = 16;

    pub fn new(inventory: &'a FlopInventory, catalog: &'a TrayCatalog, config: &'a EngineConfig) -> Self {
        Self {
            inventory,
            catalog,
            config,
        }
    }

    fn displacement(flop: &Flop, slot: &Slot, origin: Vector2) -> float {
        norm1(flop.data_pos, add(origin, slot.data_offset))
            + norm1(flop.output_pos, add(origin, slot.output_offset(flop.signature.polarity)))
    }

    /// Exact minimum-cost bijection of `members` into the tray's slots with
    /// the tray placed at `origin`.
    pub fn solve_at(
        &self,
        members: &[FlopId],
        tray: &TrayMaster,
        origin: Vector2,
    ) -> Result<FixedOriginSolution, AssignError> {
        if members.len() > tray.capacity() {
            return Err(AssignError::CapacityExceeded {
                tray: tray.name.clone(),
                capacity: tray.capacity(),
                size: members.len(),
            });
        }
        let slots = tray.slots();
        let cost = Array2::from_shape_fn((members.len(), slots.len()), |(i, s)| {
            let flop = self.inventory.get(members[i]);
            flop.weight * Self::displacement(flop, &slots[s], origin)
        });
        let (rows, cols) = linear_sum_assignment(&cost);
        let mut solution = FixedOriginSolution {
            pairs: Vec::with_capacity(members.len()),
            weighted: 0.0,
            displacement: 0.0,
        };
        for (r, c) in rows.into_iter().zip(cols) {
            let flop = self.inventory.get(members[r]);
            solution.weighted += cost[[r, c]];
            solution.displacement += Self::displacement(flop, &slots[c], origin);
            solution.pairs.push((members[r], c));
        }
        solution.pairs.sort_unstable();
        Ok(solution)
    }

    // Best origin for a fixed flop-to-slot mapping: weighted median per axis.
    fn optimal_origin(&self, tray: &TrayMaster, pairs: &[(FlopId, usize)]) -> Vector2 {
        let mut xs = Vec::with_capacity(pairs.len() * 2);
        let mut ys = Vec::with_capacity(pairs.len() * 2);
        for &(id, s) in pairs {
            let flop = self.inventory.get(id);
            let slot = &tray.slots()[s];
            for (pin, offset) in [
                (flop.data_pos, slot.data_offset),
                (flop.output_pos, slot.output_offset(flop.signature.polarity)),
            ] {
                let (x, y) = sub(pin, offset);
                xs.push((x, flop.weight));
                ys.push((y, flop.weight));
            }
        }
        (weighted_median(xs), weighted_median(ys))
    }

    /// Alternates between the optimal assignment and the optimal origin
    /// until the cost stops decreasing.
    pub fn solve(&self, cluster: &Cluster, tray: &TrayMaster) -> Result<SlotAssignment, AssignError> {
        let signature = &self.inventory.get(cluster.members[0]).signature;
        let unused = tray.supports(signature.edge, &signature.required_functions())?;
        let mut origin = sub(cluster.center, (tray.width / 2.0, tray.height / 2.0));
        let mut best = self.solve_at(&cluster.members, tray, origin)?;
        for _ in 0..Self::MAX_ORIGIN_ROUNDS {
            let next_origin = self.optimal_origin(tray, &best.pairs);
            let next = self.solve_at(&cluster.members, tray, next_origin)?;
            if next.weighted >= best.weighted - 1e-9 {
                break;
            }
            origin = next_origin;
            best = next;
        }
        Ok(SlotAssignment {
            tray: tray.name.clone(),
            pairs: best.pairs,
            origin,
            cost: best.weighted + unused.float() * self.config.unused_feature_penalty,
            displacement: best.displacement,
            unused_features: unused,
        })
    }

    /// Picks the cheapest tray among the compatible masters of the smallest
    /// sufficient capacity. Ties go to the tray name.
    pub fn best(&self, cluster: &Cluster) -> Result<SlotAssignment, AssignError> {
        let size = cluster.len();
        let Some(&first) = cluster.members.first() else {
            return Err(AssignError::NoCompatibleTray { size });
        };
        let signature = &self.inventory.get(first).signature;
        let required = signature.required_functions();
        let candidates = self
            .catalog
            .compatible_trays(signature.edge, &required, size)
            .map(|(t, _)| t)
            .collect_vec();
        let Some(capacity) = candidates.iter().map(|t| t.capacity()).min() else {
            return Err(AssignError::NoCompatibleTray { size });
        };
        candidates
            .into_iter()
            .filter(|t| t.capacity() == capacity)
            .filter_map(|t| self.solve(cluster, t).ok())
            .min_by(|a, b| {
                OrderedFloat(a.cost)
                    .cmp(&OrderedFloat(b.cost))
                    .then_with(|| a.tray.cmp(&b.tray))
            })
            .ok_or(AssignError::NoCompatibleTray { size })
    }
}
