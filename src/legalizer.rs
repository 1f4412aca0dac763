//! Turns the winning solution into design edits.
//!
//! Trays are placed one at a time on free row sites, most critical first.
//! A cluster whose tray cannot be placed or wired keeps its original flops
//! untouched.

use crate::helper::{conflict_region, enumerate_sites, footprint};
use crate::*;
use serde::Serialize;

type SizeKey = (OrderedFloat<float>, OrderedFloat<float>);

fn size_key(size: Vector2) -> SizeKey {
    (OrderedFloat(size.0), OrderedFloat(size.1))
}

/// Free legal sites for each tray footprint, kept consistent with the
/// occupied area as trays are placed and flops are released or reserved.
pub struct UncoveredPlaceLocator {
    pub global_rtree: Rtree,
    rows: Vec<PlacementRows>,
    die: DieSize,
    available_position_collection: IndexMap<SizeKey, RtreeWithData<()>>,
}
impl UncoveredPlaceLocator {
    #[time("Analyze placement resources")]
    pub fn new(design: &impl DesignView, sizes: &[Vector2], quiet: bool) -> Self {
        let gate_rtree = Rtree::from(
            design.instances().filter_map(|(_, inst)| {
                design
                    .master(&inst.master)
                    .map(|m| footprint(inst.pos(), m.size()))
            }),
        );
        let rows = design.placement_rows().to_vec();
        let die = design.die().clone();
        debug!(
            "Die Size: ({}, {}), Placement Rows: {}",
            die.width(),
            die.height(),
            rows.len()
        );
        let mut locator = Self {
            global_rtree: gate_rtree,
            rows,
            die,
            available_position_collection: IndexMap::default(),
        };
        for &size in sizes {
            if locator.available_position_collection.contains_key(&size_key(size)) {
                continue;
            }
            let positions = enumerate_sites(&locator.global_rtree, &locator.rows, &locator.die, size, None);
            let rtree = RtreeWithData::from(positions.into_iter().map(|(x, y)| ([x, y], ())).collect_vec());
            locator.available_position_collection.insert(size_key(size), rtree);
        }
        if !quiet {
            let mut table = Table::new();
            table.add_row(row!["Size (W,H)", "Available Positions"]);
            for (size, rtree) in &locator.available_position_collection {
                table.add_row(row![format!("({}, {})", size.0, size.1), rtree.size()]);
            }
            table.printstd();
        }
        locator
    }

    pub fn available(&self, size: Vector2) -> usize {
        self.available_position_collection
            .get(&size_key(size))
            .map_or(0, |t| t.size())
    }

    /// Manhattan-nearest free site within `radius` of `pos`. Ties go to the
    /// lower-left site.
    pub fn find_nearest_uncovered_place(&self, size: Vector2, pos: Vector2, radius: float) -> Option<Vector2> {
        let rtree = self.available_position_collection.get(&size_key(size))?;
        let mut best: Option<(OrderedFloat<float>, OrderedFloat<float>, OrderedFloat<float>)> = None;
        for element in rtree.iter_nearest([pos.0, pos.1]) {
            let [x, y] = *element.geom();
            let euclid = ((x - pos.0).powi(2) + (y - pos.1).powi(2)).sqrt();
            // Manhattan distance is never below the Euclidean one
            if euclid > radius || best.is_some_and(|b| euclid > b.0 .0) {
                break;
            }
            let manhattan = norm1((x, y), pos);
            if manhattan > radius {
                continue;
            }
            let candidate = (OrderedFloat(manhattan), OrderedFloat(y), OrderedFloat(x));
            if best.map_or(true, |b| candidate < b) {
                best = Some(candidate);
            }
        }
        let (_, y, x) = best?;
        debug_assert_eq!(self.global_rtree.count_bbox(footprint((x.0, y.0), size)), 0);
        Some((x.0, y.0))
    }

    /// Marks `bbox` occupied and drops every site that would overlap it.
    pub fn reserve(&mut self, bbox: [[float; 2]; 2]) {
        self.global_rtree.insert_bbox(bbox);
        for (size, rtree) in self.available_position_collection.iter_mut() {
            rtree.drain_in_bbox(conflict_region(bbox, (size.0 .0, size.1 .0)));
        }
    }

    pub fn mark_covered_position(&mut self, pos: Vector2, size: Vector2) {
        self.reserve(footprint(pos, size));
    }

    /// Frees `bbox` (previously reserved) and restores the sites it uncovers.
    pub fn release(&mut self, bbox: [[float; 2]; 2]) {
        if !self.global_rtree.remove_bbox(bbox) {
            return;
        }
        let keys = self.available_position_collection.keys().copied().collect_vec();
        for key in keys {
            let size = (key.0 .0, key.1 .0);
            let sites = enumerate_sites(&self.global_rtree, &self.rows, &self.die, size, Some(bbox));
            if let Some(rtree) = self.available_position_collection.get_mut(&key) {
                for (x, y) in sites {
                    // sites elsewhere in the box may still be present
                    rtree.delete([x, y], ());
                    rtree.insert([x, y], ());
                }
            }
        }
    }
}
impl fmt::Debug for UncoveredPlaceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Size (W,H)", "Available Positions"]);
        for (size, rtree) in self.available_position_collection.iter() {
            table.add_row(row![format!("({}, {})", size.0, size.1), rtree.size()]);
        }
        write!(f, "{}", table)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedTray {
    pub name: String,
    pub tray: String,
    pub pos: Vector2,
    pub members: Vec<String>,
    /// Manhattan distance between the solver's origin and the legal site.
    pub moved: float,
}

#[derive(Debug, Clone, Serialize)]
pub struct RolledBack {
    pub members: Vec<String>,
    pub error: LegalizeError,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct LegalizationReport {
    pub placed: Vec<PlacedTray>,
    pub rolled_back: Vec<RolledBack>,
    pub removed_flops: usize,
}
impl LegalizationReport {
    pub fn rolled_back_flops(&self) -> usize {
        self.rolled_back.iter().map(|r| r.members.len()).sum()
    }
}

pub struct Legalizer<'a> {
    inventory: &'a FlopInventory,
    catalog: &'a TrayCatalog,
    config: &'a EngineConfig,
}

const WIRED_FUNCTIONS: [PinFunction; 8] = [
    PinFunction::Clock,
    PinFunction::Data,
    PinFunction::Q,
    PinFunction::QN,
    PinFunction::ScanIn,
    PinFunction::ScanEnable,
    PinFunction::Reset,
    PinFunction::Set,
];

impl<'a> Legalizer<'a> {
    pub fn new(inventory: &'a FlopInventory, catalog: &'a TrayCatalog, config: &'a EngineConfig) -> Self {
        Self {
            inventory,
            catalog,
            config,
        }
    }

    /// Most critical first, then most expensive, then solution order.
    pub fn placement_order(trays: &[PlannedTray]) -> Vec<usize> {
        (0..trays.len())
            .sorted_by_key(|&i| {
                (
                    Reverse(OrderedFloat(trays[i].criticality)),
                    Reverse(OrderedFloat(trays[i].assignment.cost)),
                    i,
                )
            })
            .collect()
    }

    fn member_names(&self, planned: &PlannedTray) -> Vec<String> {
        planned
            .cluster
            .members
            .iter()
            .map(|&id| self.inventory.get(id).name.clone())
            .collect()
    }

    // Every net the flop drives must land on a pin of its slot.
    fn check_pins(&self, design: &impl DesignView, planned: &PlannedTray) -> Result<&'a TrayMaster, LegalizeError> {
        let name = &planned.assignment.tray;
        let tray = self
            .catalog
            .tray(name)
            .filter(|_| design.master(name).is_some())
            .ok_or_else(|| LegalizeError::UnknownMaster(name.clone()))?;
        for &(id, slot) in &planned.assignment.pairs {
            let flop = self.inventory.get(id);
            if design.instance(flop.inst).is_none() {
                return Err(LegalizeError::MissingFlop(flop.name.clone()));
            }
            let Some(slot_pins) = tray.slots().get(slot) else {
                return Err(LegalizeError::PinMismatch {
                    tray: name.clone(),
                    slot,
                    flop: flop.name.clone(),
                    role: "slot",
                });
            };
            for function in WIRED_FUNCTIONS {
                if flop.nets.net(function).is_some() && slot_pins.pin(function).is_none() {
                    return Err(LegalizeError::PinMismatch {
                        tray: name.clone(),
                        slot,
                        flop: flop.name.clone(),
                        role: function.keyword(),
                    });
                }
            }
        }
        Ok(tray)
    }

    /// Places, wires and substitutes every planned tray. Never drops a flop:
    /// each member either ends up in a placed tray or stays as it was.
    #[time("info")]
    pub fn legalize<D: DesignEditor>(&self, design: &mut D, trays: &[PlannedTray]) -> LegalizationReport {
        let sizes = trays
            .iter()
            .filter_map(|t| self.catalog.tray(&t.assignment.tray))
            .map(TrayMaster::size)
            .collect_vec();
        // flops of every planned cluster start out reserved and are released
        // only while their own cluster is placed
        let mut locator = UncoveredPlaceLocator::new(&*design, &sizes, self.config.quiet);

        let mut report = LegalizationReport::default();
        let radius = self.config.search_radius();
        for index in Self::placement_order(trays) {
            let planned = &trays[index];
            let members = self.member_names(planned);
            match self.place(design, &mut locator, planned, radius, index) {
                Ok(placed) => {
                    report.removed_flops += planned.cluster.len();
                    report.placed.push(placed);
                }
                Err(error) => {
                    warn!(target:"internal", "Keeping {} as single-bit flops: {error}", members.join(", "));
                    report.rolled_back.push(RolledBack { members, error });
                }
            }
        }
        info!(target:"internal",
            "Placed {} trays, rolled back {} clusters",
            report.placed.len(),
            report.rolled_back.len()
        );
        report
    }

    fn place<D: DesignEditor>(
        &self,
        design: &mut D,
        locator: &mut UncoveredPlaceLocator,
        planned: &PlannedTray,
        radius: float,
        index: usize,
    ) -> Result<PlacedTray, LegalizeError> {
        let tray = self.check_pins(&*design, planned)?;
        let flops = planned
            .cluster
            .members
            .iter()
            .map(|&id| self.inventory.get(id))
            .collect_vec();
        for flop in &flops {
            locator.release(footprint(flop.pos, flop.size));
        }
        let target = planned.assignment.origin;
        let Some(pos) = locator.find_nearest_uncovered_place(tray.size(), target, radius) else {
            for flop in &flops {
                locator.reserve(footprint(flop.pos, flop.size));
            }
            return Err(LegalizeError::NoLegalSite {
                tray: tray.name.clone(),
                x: target.0,
                y: target.1,
                radius,
            });
        };

        let name = design.unique_instance_name(&format!("mbff_{index}"));
        let Some(inst) = design.create_instance(&name, &tray.name, pos) else {
            for flop in &flops {
                locator.reserve(footprint(flop.pos, flop.size));
            }
            return Err(LegalizeError::UnknownMaster(tray.name.clone()));
        };
        locator.mark_covered_position(pos, tray.size());
        for &(id, slot) in &planned.assignment.pairs {
            let flop = self.inventory.get(id);
            let slot = &tray.slots()[slot];
            for function in WIRED_FUNCTIONS {
                if let (Some(pin), Some(net)) = (slot.pin(function), flop.nets.net(function)) {
                    design.connect(inst, pin, net);
                }
            }
        }
        for flop in &flops {
            design.remove_instance(flop.inst);
        }
        debug!(
            "Banking [{}] to [{}]",
            flops.iter().map(|f| f.name.as_str()).join(", "),
            name
        );
        Ok(PlacedTray {
            name,
            tray: tray.name.clone(),
            pos,
            members: self.member_names(planned),
            moved: norm1(pos, target),
        })
    }
}
