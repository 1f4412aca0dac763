use crate::*;
use serde::Serialize;

pub type FlopId = usize;

/// Which data outputs of a flop drive anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, derive_more::Display)]
pub enum OutputPolarity {
    #[display("Q")]
    True,
    #[display("QN")]
    Inverted,
    #[display("Q+QN")]
    Both,
}

/// Everything that must be identical for two flops to share a tray.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClockSignature {
    pub clock_net: NetId,
    pub edge: ClockEdge,
    pub reset_net: Option<NetId>,
    pub set_net: Option<NetId>,
    pub scan_enable_net: Option<NetId>,
    /// The flop sits on a scan chain (its scan-in pin is connected).
    pub scan: bool,
    pub polarity: OutputPolarity,
}
impl ClockSignature {
    /// Pin functions every slot of a hosting tray must expose.
    pub fn required_functions(&self) -> SmallVec<[PinFunction; 6]> {
        let mut required = SmallVec::new();
        match self.polarity {
            OutputPolarity::True => required.push(PinFunction::Q),
            OutputPolarity::Inverted => required.push(PinFunction::QN),
            OutputPolarity::Both => required.extend([PinFunction::Q, PinFunction::QN]),
        }
        if self.scan {
            required.push(PinFunction::ScanIn);
        }
        if self.scan_enable_net.is_some() {
            required.push(PinFunction::ScanEnable);
        }
        if self.reset_net.is_some() {
            required.push(PinFunction::Reset);
        }
        if self.set_net.is_some() {
            required.push(PinFunction::Set);
        }
        required
    }
}

/// Nets on the pins of a single-bit flop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlopNets {
    pub clock: NetId,
    pub data: NetId,
    pub q: Option<NetId>,
    pub qn: Option<NetId>,
    pub scan_in: Option<NetId>,
    pub scan_enable: Option<NetId>,
    pub reset: Option<NetId>,
    pub set: Option<NetId>,
}
impl FlopNets {
    pub fn net(&self, function: PinFunction) -> Option<NetId> {
        match function {
            PinFunction::Clock => Some(self.clock),
            PinFunction::Data => Some(self.data),
            PinFunction::Q => self.q,
            PinFunction::QN => self.qn,
            PinFunction::ScanIn => self.scan_in,
            PinFunction::ScanEnable => self.scan_enable,
            PinFunction::Reset => self.reset,
            PinFunction::Set => self.set,
            _ => None,
        }
    }
}

/// Read-only snapshot of one clusterable single-bit flip-flop.
#[derive(Debug, Clone, Serialize)]
pub struct Flop {
    pub id: FlopId,
    #[serde(skip)]
    pub inst: InstKey,
    pub name: String,
    pub master: String,
    pub pos: Vector2,
    pub size: Vector2,
    pub data_pos: Vector2,
    pub output_pos: Vector2,
    pub nets: FlopNets,
    pub signature: ClockSignature,
    /// Criticality multiplier of this flop's displacement, 1.0 without timing.
    pub weight: float,
    pub slack: Option<float>,
}
impl Flop {
    pub fn bbox(&self) -> [[float; 2]; 2] {
        Rect::from_size(self.pos.0, self.pos.1, self.size.0, self.size.1).bbox()
    }
}

#[derive(Debug, Default)]
pub struct FlopInventory {
    flops: Vec<Flop>,
    issues: Vec<InventoryError>,
    fixed: usize,
    banked: usize,
}

impl FlopInventory {
    #[time]
    pub fn build(
        design: &impl DesignView,
        catalog: &TrayCatalog,
        slacks: &SlackMap,
        config: &EngineConfig,
    ) -> Self {
        let mut inventory = Self::default();
        let instances = design
            .instances()
            .sorted_by(|a, b| natord::compare(&a.1.name, &b.1.name))
            .collect_vec();
        for (key, inst) in instances {
            let Some(layout) = catalog.layout(&inst.master) else {
                continue;
            };
            if layout.capacity() != 1 {
                inventory.banked += 1;
                continue;
            }
            if inst.fixed {
                inventory.fixed += 1;
                continue;
            }
            let Some(master) = design.master(&inst.master) else {
                continue;
            };
            let slot = &layout.slots[0];
            match Self::extract(inst, slot, layout.edge) {
                Ok((nets, signature)) => {
                    let slack = slacks.slack_of(&inst.name).filter(|_| config.timing_enabled());
                    if let (Some(slack), Some(limit)) = (slack, config.critical_slack_limit) {
                        if slack < limit {
                            inventory.issues.push(InventoryError::TimingCritical {
                                inst: inst.name.clone(),
                                slack,
                            });
                            continue;
                        }
                    }
                    let weight = if config.timing_enabled() {
                        slacks.weight_of(&inst.name, config.criticality_gain)
                    } else {
                        1.0
                    };
                    let pos = inst.pos();
                    inventory.flops.push(Flop {
                        id: inventory.flops.len(),
                        inst: key,
                        name: inst.name.clone(),
                        master: inst.master.clone(),
                        pos,
                        size: master.size(),
                        data_pos: add(pos, slot.data_offset),
                        output_pos: add(pos, slot.output_offset(signature.polarity)),
                        nets,
                        signature,
                        weight,
                        slack,
                    });
                }
                Err(e) => {
                    debug!(target:"internal", "{e}");
                    inventory.issues.push(e);
                }
            }
        }
        inventory
    }

    fn extract(
        inst: &Instance,
        slot: &Slot,
        edge: ClockEdge,
    ) -> Result<(FlopNets, ClockSignature), InventoryError> {
        let net = |pin: Option<&str>| pin.and_then(|p| inst.net_of(p));
        let required = |pin: &str| {
            inst.net_of(pin).ok_or_else(|| InventoryError::MissingConnection {
                inst: inst.name.clone(),
                pin: pin.to_string(),
            })
        };
        let clock = required(&slot.clock)?;
        let data = required(&slot.data)?;
        let q = net(slot.q.as_deref());
        let qn = net(slot.qn.as_deref());
        let polarity = match (q, qn) {
            (Some(_), None) => OutputPolarity::True,
            (None, Some(_)) => OutputPolarity::Inverted,
            (Some(_), Some(_)) => OutputPolarity::Both,
            (None, None) => {
                return Err(InventoryError::MissingConnection {
                    inst: inst.name.clone(),
                    pin: slot.q.clone().or_else(|| slot.qn.clone()).unwrap_or_default(),
                })
            }
        };
        let nets = FlopNets {
            clock,
            data,
            q,
            qn,
            scan_in: net(slot.scan_in.as_deref()),
            scan_enable: net(slot.scan_enable.as_deref()),
            reset: net(slot.reset.as_deref()),
            set: net(slot.set.as_deref()),
        };
        let signature = ClockSignature {
            clock_net: clock,
            edge,
            reset_net: nets.reset,
            set_net: nets.set,
            scan_enable_net: nets.scan_enable,
            scan: nets.scan_in.is_some(),
            polarity,
        };
        Ok((nets, signature))
    }

    /// Inventory over already extracted flops; ids are reassigned densely.
    pub fn from_flops(flops: Vec<Flop>) -> Self {
        let flops = flops
            .into_iter()
            .enumerate()
            .map(|(id, flop)| Flop { id, ..flop })
            .collect();
        Self {
            flops,
            ..Default::default()
        }
    }

    pub fn flops(&self) -> &[Flop] {
        &self.flops
    }
    pub fn get(&self, id: FlopId) -> &Flop {
        &self.flops[id]
    }
    pub fn len(&self) -> usize {
        self.flops.len()
    }
    pub fn is_empty(&self) -> bool {
        self.flops.is_empty()
    }
    pub fn issues(&self) -> &[InventoryError] {
        &self.issues
    }
    pub fn fixed_count(&self) -> usize {
        self.fixed
    }
    pub fn banked_count(&self) -> usize {
        self.banked
    }
    /// Flops partitioned by signature, groups in order of first appearance.
    pub fn groups(&self) -> IndexMap<&ClockSignature, Vec<FlopId>> {
        let mut groups: IndexMap<&ClockSignature, Vec<FlopId>> = IndexMap::default();
        for flop in &self.flops {
            groups.entry(&flop.signature).or_default().push(flop.id);
        }
        groups
    }
    pub fn total_weight(&self, ids: impl IntoIterator<Item = FlopId>) -> float {
        ids.into_iter().map(|id| self.flops[id].weight).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn signature(clock: NetId) -> ClockSignature {
        ClockSignature {
            clock_net: clock,
            edge: ClockEdge::Rising,
            reset_net: None,
            set_net: None,
            scan_enable_net: None,
            scan: false,
            polarity: OutputPolarity::True,
        }
    }

    /// A 2x1 single-bit flop with D at (0, 0.5) and Q at (2, 0.5).
    pub(crate) fn flop_at(name: &str, x: float, y: float, signature: ClockSignature) -> Flop {
        Flop {
            id: 0,
            inst: InstKey::default(),
            name: name.to_string(),
            master: "DFF".to_string(),
            pos: (x, y),
            size: (2.0, 1.0),
            data_pos: (x, y + 0.5),
            output_pos: (x + 2.0, y + 0.5),
            nets: FlopNets {
                clock: signature.clock_net,
                q: Some(0),
                ..Default::default()
            },
            signature,
            weight: 1.0,
            slack: None,
        }
    }

    const DESIGN: &str = "\
DieSize 0 0 100 100
Cell DFF 2 1 sequential rising
Pin D 0 0.5 data
Pin Q 2 0.5 q
Pin CK 1 0 clock
Cell DFFR 2 1 sequential rising
Pin D 0 0.5 data
Pin Q 2 0.5 q
Pin CK 1 0 clock
Pin RN 1 1 reset
Cell MBFF2 4 1 sequential rising
Pin D0 0 0.5 data
Pin D1 2 0.5 data
Pin Q0 1 0.5 q
Pin Q1 3 0.5 q
Pin CK 2 0 clock
Inst f10 DFF 10 0
Inst f2 DFF 2 0
Inst r1 DFFR 5 0
Inst locked DFF 20 0 fixed
Inst bank MBFF2 30 0
Inst open DFF 40 0
Net clk
Pin f10/CK
Pin f2/CK
Pin r1/CK
Pin locked/CK
Pin open/CK
Net rst
Pin r1/RN
Net d1
Pin f10/D
Net d2
Pin f2/D
Net d3
Pin r1/D
Net q1
Pin f10/Q
Net q2
Pin f2/Q
Net q3
Pin r1/Q
Net q4
Pin open/Q
TimingPath -4 f2
TimingPath -1 f10 r1
";

    fn build(config: &EngineConfig) -> FlopInventory {
        let design = DesignContext::parse(DESIGN).unwrap();
        let catalog = TrayCatalog::new(&design);
        let slacks = SlackMap::from_paths(&design.timing_paths);
        FlopInventory::build(&design, &catalog, &slacks, config)
    }

    #[test]
    fn collects_single_bit_flops_in_natural_order() {
        let inventory = build(&EngineConfig::default());
        let names = inventory.flops().iter().map(|f| f.name.as_str()).collect_vec();
        assert_eq!(names, vec!["f2", "f10", "r1"]);
        assert_eq!(inventory.fixed_count(), 1);
        assert_eq!(inventory.banked_count(), 1);
        assert_eq!(inventory.issues().len(), 1);
        assert!(matches!(
            &inventory.issues()[0],
            InventoryError::MissingConnection { inst, pin } if inst == "open" && pin == "D"
        ));
        let f2 = &inventory.flops()[0];
        assert_eq!(f2.data_pos, (2.0, 0.5));
        assert_eq!(f2.output_pos, (4.0, 0.5));
        assert_eq!(f2.weight, 1.0);
    }

    #[test]
    fn reset_net_splits_signatures() {
        let inventory = build(&EngineConfig::default());
        let groups = inventory.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.values().map(Vec::len).collect_vec(), vec![2, 1]);
        let reset = &inventory.flops()[2].signature;
        assert!(reset.required_functions().contains(&PinFunction::Reset));
    }

    #[test]
    fn timing_weights_and_exclusion() {
        let config = EngineConfig::builder().num_paths(10).criticality_gain(1.0).build();
        let inventory = build(&config);
        assert_eq!(inventory.get(0).weight, 2.0);
        assert_eq!(inventory.get(1).weight, 1.25);

        let config = EngineConfig::builder()
            .num_paths(10)
            .critical_slack_limit(-2.0)
            .build();
        let inventory = build(&config);
        assert_eq!(inventory.len(), 2);
        assert!(inventory
            .issues()
            .iter()
            .any(|e| matches!(e, InventoryError::TimingCritical { inst, .. } if inst == "f2")));
    }
}
