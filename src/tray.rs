//! Classification of library masters into multi-bit trays.
//!
//! A sequential master is decomposed into bit groups ("slots") from its pin
//! functions. Pins carry an explicit bit index or end in one (`D0`, `Q[1]`);
//! unindexed clock, scan-enable, reset and set pins are shared by every slot.

use crate::*;
use serde::Serialize;
use std::collections::BTreeMap;

static BIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>[A-Za-z_][A-Za-z_]*?)(?:\[(?P<bus>\d+)\]|(?P<idx>\d+))$")
        .expect("bit suffix pattern is valid")
});

/// Functions that may differ between trays of the same capacity.
pub const OPTIONAL_FUNCTIONS: [PinFunction; 4] = [
    PinFunction::ScanIn,
    PinFunction::ScanEnable,
    PinFunction::Reset,
    PinFunction::Set,
];

fn bit_of(pin: &Pin) -> Option<u32> {
    if let Some(bit) = pin.bit {
        return Some(bit);
    }
    let caps = BIT_SUFFIX.captures(&pin.name)?;
    caps.name("bus")
        .or_else(|| caps.name("idx"))
        .and_then(|m| m.as_str().parse().ok())
}

fn role_name(function: PinFunction) -> &'static str {
    match function {
        PinFunction::Clock => "clock",
        PinFunction::Data => "data-in",
        PinFunction::Q | PinFunction::QN => "data-out",
        PinFunction::ScanIn => "scan-in",
        PinFunction::ScanEnable => "scan-enable",
        PinFunction::Reset => "reset",
        PinFunction::Set => "set",
        _ => "signal",
    }
}

/// One bit position of a sequential master, with every pin resolved to a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub index: usize,
    pub clock: String,
    pub data: String,
    pub q: Option<String>,
    pub qn: Option<String>,
    pub scan_in: Option<String>,
    pub scan_enable: Option<String>,
    pub reset: Option<String>,
    pub set: Option<String>,
    pub data_offset: Vector2,
    pub q_offset: Option<Vector2>,
    pub qn_offset: Option<Vector2>,
}
impl Slot {
    /// Name of the pin serving `function` in this slot, shared pins included.
    pub fn pin(&self, function: PinFunction) -> Option<&str> {
        match function {
            PinFunction::Clock => Some(self.clock.as_str()),
            PinFunction::Data => Some(self.data.as_str()),
            PinFunction::Q => self.q.as_deref(),
            PinFunction::QN => self.qn.as_deref(),
            PinFunction::ScanIn => self.scan_in.as_deref(),
            PinFunction::ScanEnable => self.scan_enable.as_deref(),
            PinFunction::Reset => self.reset.as_deref(),
            PinFunction::Set => self.set.as_deref(),
            _ => None,
        }
    }
    /// Offset of the output pin a flop of the given polarity would use.
    pub fn output_offset(&self, polarity: OutputPolarity) -> Vector2 {
        let preferred = match polarity {
            OutputPolarity::Inverted => self.qn_offset.or(self.q_offset),
            OutputPolarity::True | OutputPolarity::Both => self.q_offset.or(self.qn_offset),
        };
        preferred.unwrap_or(self.data_offset)
    }
}

/// Bit structure of a sequential master.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotLayout {
    pub slots: Vec<Slot>,
    /// One physical clock pin serves every slot.
    pub clock_collapsed: bool,
    pub edge: ClockEdge,
}
impl SlotLayout {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    /// True when every slot exposes a pin for `function`.
    pub fn provides(&self, function: PinFunction) -> bool {
        self.slots.iter().all(|s| s.pin(function).is_some())
    }
}

/// A library master accepted as a multi-bit tray. Capacity is at least 2.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrayMaster {
    pub name: String,
    pub width: float,
    pub height: float,
    pub layout: SlotLayout,
}
impl TrayMaster {
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }
    pub fn slots(&self) -> &[Slot] {
        &self.layout.slots
    }
    pub fn size(&self) -> Vector2 {
        (self.width, self.height)
    }
    pub fn has_scan(&self) -> bool {
        self.layout.provides(PinFunction::ScanEnable)
    }
    /// Checks that every function the cluster drives has a pin in each slot.
    /// Returns the number of optional features the cluster would leave unused.
    pub fn supports(&self, edge: ClockEdge, required: &[PinFunction]) -> Result<usize, AssignError> {
        if self.layout.edge != edge {
            return Err(AssignError::MissingFeature {
                tray: self.name.clone(),
                feature: "clock edge",
            });
        }
        if let Some(&missing) = required.iter().find(|&&f| !self.layout.provides(f)) {
            return Err(AssignError::MissingFeature {
                tray: self.name.clone(),
                feature: role_name(missing),
            });
        }
        let unused = OPTIONAL_FUNCTIONS
            .iter()
            .filter(|f| self.layout.provides(**f) && !required.contains(f))
            .count();
        Ok(unused)
    }
}
impl fmt::Display for TrayMaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut features = vec![format!("{} bits", self.capacity())];
        if self.has_scan() {
            features.push("scan".to_string());
        }
        if self.layout.provides(PinFunction::Reset) {
            features.push("reset".to_string());
        }
        if self.layout.clock_collapsed {
            features.push("collapsed clock".to_string());
        }
        write!(f, "{} ({})", self.name, features.join(", "))
    }
}

#[derive(Default)]
struct GroupPins<'a> {
    pins: BTreeMap<&'static str, Vec<&'a Pin>>,
}
impl<'a> GroupPins<'a> {
    fn push(&mut self, pin: &'a Pin) {
        self.pins.entry(role_key(pin.function)).or_default().push(pin);
    }
    fn get(&self, function: PinFunction) -> &[&'a Pin] {
        self.pins
            .get(role_key(function))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
    fn take(&mut self, function: PinFunction) -> Vec<&'a Pin> {
        self.pins.remove(role_key(function)).unwrap_or_default()
    }
}
fn role_key(function: PinFunction) -> &'static str {
    function.keyword()
}

/// Decomposes a master into slots. `Ok(None)` means the master has no flop
/// structure at all (combinational cells, sequential cells without data pins).
pub fn analyze_slots(master: &MasterCell) -> Result<Option<SlotLayout>, ClassifyError> {
    if !master.sequential {
        return Ok(None);
    }
    let mut shared = GroupPins::default();
    let mut bits: BTreeMap<u32, GroupPins> = BTreeMap::new();
    for pin in master.pins.values() {
        match pin.function {
            PinFunction::Input | PinFunction::Output | PinFunction::Supply => continue,
            _ => {}
        }
        match bit_of(pin) {
            Some(bit) => bits.entry(bit).or_default().push(pin),
            None => shared.push(pin),
        }
    }

    let indexed_data = bits.values().any(|g| !g.get(PinFunction::Data).is_empty());
    let unindexed_data = !shared.get(PinFunction::Data).is_empty();
    if indexed_data && unindexed_data {
        return Err(ClassifyError::MixedBitIndexing {
            master: master.name.clone(),
        });
    }
    if unindexed_data {
        // A plain single-bit flop: its unindexed data-path pins form bit 0.
        let group = bits.entry(0).or_default();
        for function in [PinFunction::Data, PinFunction::Q, PinFunction::QN, PinFunction::ScanIn] {
            for pin in shared.take(function) {
                group.push(pin);
            }
        }
    }
    if bits.values().all(|g| g.get(PinFunction::Data).is_empty()) {
        return Ok(None);
    }

    let shared_one = |function: PinFunction| {
        match shared.get(function) {
            [] => Ok(None),
            [pin] => Ok(Some(*pin)),
            _ => Err(ClassifyError::DuplicateSharedPin {
                master: master.name.clone(),
                role: role_name(function),
            }),
        }
    };
    let shared_clock = shared_one(PinFunction::Clock)?;
    let shared_scan_enable = shared_one(PinFunction::ScanEnable)?;
    let shared_reset = shared_one(PinFunction::Reset)?;
    let shared_set = shared_one(PinFunction::Set)?;

    let per_bit_clock = bits.values().any(|g| !g.get(PinFunction::Clock).is_empty());
    if shared_clock.is_some() && per_bit_clock {
        return Err(ClassifyError::InconsistentClocking {
            master: master.name.clone(),
        });
    }

    let mut slots = Vec::with_capacity(bits.len());
    for (index, (&bit, group)) in bits.iter().enumerate() {
        let one = |function: PinFunction| {
            match group.get(function) {
                [] => Ok(None),
                [pin] => Ok(Some(*pin)),
                _ => Err(ClassifyError::DuplicateSlotPin {
                    master: master.name.clone(),
                    bit,
                    role: role_name(function),
                }),
            }
        };
        let missing = |function: PinFunction| ClassifyError::MissingSlotPin {
            master: master.name.clone(),
            bit,
            role: role_name(function),
        };
        let data = one(PinFunction::Data)?.ok_or_else(|| missing(PinFunction::Data))?;
        let q = one(PinFunction::Q)?;
        let qn = one(PinFunction::QN)?;
        if q.is_none() && qn.is_none() {
            return Err(missing(PinFunction::Q));
        }
        let clock = one(PinFunction::Clock)?
            .or(shared_clock)
            .ok_or_else(|| missing(PinFunction::Clock))?;
        let either = |function: PinFunction, shared: Option<&Pin>| -> Result<Option<String>, ClassifyError> {
            Ok(one(function)?.or(shared).map(|p| p.name.clone()))
        };
        slots.push(Slot {
            index,
            clock: clock.name.clone(),
            data: data.name.clone(),
            q: q.map(|p| p.name.clone()),
            qn: qn.map(|p| p.name.clone()),
            scan_in: one(PinFunction::ScanIn)?.map(|p| p.name.clone()),
            scan_enable: either(PinFunction::ScanEnable, shared_scan_enable)?,
            reset: either(PinFunction::Reset, shared_reset)?,
            set: either(PinFunction::Set, shared_set)?,
            data_offset: data.offset(),
            q_offset: q.map(Pin::offset),
            qn_offset: qn.map(Pin::offset),
        });
    }

    let scan_bits = slots.iter().filter(|s| s.scan_in.is_some()).count();
    if scan_bits > 0 && scan_bits < slots.len() {
        return Err(ClassifyError::PartialScan {
            master: master.name.clone(),
        });
    }
    if scan_bits > 0 && slots.iter().any(|s| s.scan_enable.is_none()) {
        return Err(ClassifyError::MissingScanEnable {
            master: master.name.clone(),
        });
    }
    for function in [PinFunction::ScanEnable, PinFunction::Reset, PinFunction::Set] {
        let present = slots.iter().filter(|s| s.pin(function).is_some()).count();
        if present > 0 && present < slots.len() {
            let bit = slots
                .iter()
                .position(|s| s.pin(function).is_none())
                .unwrap_or_default();
            return Err(ClassifyError::MissingSlotPin {
                master: master.name.clone(),
                bit: bit as u32,
                role: role_name(function),
            });
        }
    }

    Ok(Some(SlotLayout {
        slots,
        clock_collapsed: shared_clock.is_some(),
        edge: master.clock_edge,
    }))
}

/// The set of multi-bit trays available in a library, plus the slot layout of
/// every sequential master (single-bit flops included) for inventory lookups.
#[derive(Debug, Default, Clone)]
pub struct TrayCatalog {
    trays: IndexMap<String, TrayMaster>,
    layouts: IndexMap<String, SlotLayout>,
    issues: Vec<ClassifyError>,
}

impl TrayCatalog {
    /// Classifies a single master. Pure: the same master always yields the same answer.
    pub fn classify(master: &MasterCell) -> Result<Option<TrayMaster>, ClassifyError> {
        let layout = analyze_slots(master)?;
        Ok(layout.and_then(|layout| Self::tray_of(master, layout)))
    }

    // A layout becomes a tray only when it holds two bits or more.
    fn tray_of(master: &MasterCell, layout: SlotLayout) -> Option<TrayMaster> {
        (layout.capacity() >= 2).then(|| TrayMaster {
            name: master.name.clone(),
            width: master.width,
            height: master.height,
            layout,
        })
    }

    pub fn is_valid_tray(master: &MasterCell) -> bool {
        matches!(Self::classify(master), Ok(Some(_)))
    }

    #[time]
    pub fn new(design: &impl DesignView) -> Self {
        Self::from_masters(design.masters())
    }

    pub fn from_masters<'a>(masters: impl IntoIterator<Item = &'a MasterCell>) -> Self {
        let mut catalog = Self::default();
        for master in masters {
            match analyze_slots(master) {
                Ok(Some(layout)) => {
                    if let Some(tray) = Self::tray_of(master, layout.clone()) {
                        catalog.trays.insert(master.name.clone(), tray);
                    }
                    catalog.layouts.insert(master.name.clone(), layout);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target:"internal", "Excluding library master: {e}");
                    catalog.issues.push(e);
                }
            }
        }
        catalog
    }

    pub fn trays(&self) -> impl Iterator<Item = &TrayMaster> {
        self.trays.values()
    }
    pub fn tray(&self, name: &str) -> Option<&TrayMaster> {
        self.trays.get(name)
    }
    pub fn len(&self) -> usize {
        self.trays.len()
    }
    pub fn is_empty(&self) -> bool {
        self.trays.is_empty()
    }
    pub fn issues(&self) -> &[ClassifyError] {
        &self.issues
    }
    /// Slot layout of any well-formed sequential master, trays included.
    pub fn layout(&self, master: &str) -> Option<&SlotLayout> {
        self.layouts.get(master)
    }

    /// Trays able to host `size` flops with the given requirements, with their unused-feature count.
    pub fn compatible_trays<'a>(
        &'a self,
        edge: ClockEdge,
        required: &'a [PinFunction],
        size: usize,
    ) -> impl Iterator<Item = (&'a TrayMaster, usize)> + 'a {
        self.trays
            .values()
            .filter(move |t| t.capacity() >= size)
            .filter_map(move |t| t.supports(edge, required).ok().map(|unused| (t, unused)))
    }

    /// Distinct capacities of the trays compatible with the requirements, ascending.
    pub fn capacities_for(&self, edge: ClockEdge, required: &[PinFunction]) -> Vec<usize> {
        self.compatible_trays(edge, required, 0)
            .map(|(t, _)| t.capacity())
            .sorted_unstable()
            .dedup()
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn pin(name: &str, x: float, function: PinFunction) -> Pin {
        Pin::new(name, x, 0.5, function)
    }

    pub(crate) fn dff() -> MasterCell {
        MasterCell::builder()
            .name("DFF")
            .width(2.0)
            .height(1.0)
            .sequential(true)
            .pins(vec![
                pin("D", 0.0, PinFunction::Data),
                pin("Q", 2.0, PinFunction::Q),
                pin("CK", 1.0, PinFunction::Clock),
            ])
            .build()
    }

    /// Two-bit tray; `scan` adds SI0/SI1 + SE, `collapsed` uses one CK pin.
    pub(crate) fn mbff2(name: &str, scan: bool, collapsed: bool) -> MasterCell {
        let mut pins = vec![
            pin("D0", 0.0, PinFunction::Data),
            pin("D1", 2.0, PinFunction::Data),
            pin("Q0", 1.0, PinFunction::Q),
            pin("Q1", 3.0, PinFunction::Q),
        ];
        if collapsed {
            pins.push(pin("CK", 1.5, PinFunction::Clock));
        } else {
            pins.push(pin("CK0", 0.5, PinFunction::Clock));
            pins.push(pin("CK1", 2.5, PinFunction::Clock));
        }
        if scan {
            pins.push(pin("SI0", 0.2, PinFunction::ScanIn));
            pins.push(pin("SI1", 2.2, PinFunction::ScanIn));
            pins.push(pin("SE", 1.8, PinFunction::ScanEnable));
        }
        MasterCell::builder()
            .name(name)
            .width(4.0)
            .height(1.0)
            .sequential(true)
            .pins(pins)
            .build()
    }

    /// Collapsed-clock tray with `bits` slots, one site of width 2 per bit.
    pub(crate) fn tray_with_bits(name: &str, bits: u32) -> MasterCell {
        let pins = (0..bits)
            .flat_map(|i| {
                let x = 2.0 * i as float;
                [
                    pin(&format!("D{i}"), x, PinFunction::Data),
                    pin(&format!("Q{i}"), x + 1.5, PinFunction::Q),
                ]
            })
            .chain([pin("CK", 0.5, PinFunction::Clock)])
            .collect();
        MasterCell::builder()
            .name(name)
            .width(2.0 * bits as float)
            .height(1.0)
            .sequential(true)
            .pins(pins)
            .build()
    }

    fn inv() -> MasterCell {
        MasterCell::builder()
            .name("INV")
            .width(1.0)
            .height(1.0)
            .pins(vec![pin("A", 0.0, PinFunction::Input), pin("Y", 1.0, PinFunction::Output)])
            .build()
    }

    #[test]
    fn single_bit_and_gates_are_not_trays() {
        assert!(!TrayCatalog::is_valid_tray(&inv()));
        assert!(!TrayCatalog::is_valid_tray(&dff()));
        let layout = analyze_slots(&dff()).unwrap().unwrap();
        assert_eq!(layout.capacity(), 1);
        assert_eq!(layout.slots[0].clock, "CK");
        assert!(layout.clock_collapsed);
    }

    #[test]
    fn two_bit_variants_are_trays() {
        for (scan, collapsed) in [(false, false), (true, false), (false, true), (true, true)] {
            let master = mbff2("T", scan, collapsed);
            let tray = TrayCatalog::classify(&master).unwrap().unwrap();
            assert_eq!(tray.capacity(), 2);
            assert_eq!(tray.has_scan(), scan);
            assert_eq!(tray.layout.clock_collapsed, collapsed);
            assert_eq!(tray.slots()[1].data, "D1");
        }
    }

    #[test]
    fn classification_is_idempotent() {
        let master = mbff2("MBFF2SE", true, false);
        let first = TrayCatalog::classify(&master).unwrap().unwrap();
        for _ in 0..3 {
            let again = TrayCatalog::classify(&master).unwrap().unwrap();
            assert_eq!(again.layout, first.layout);
        }
    }

    #[test]
    fn catalog_agrees_with_classify() {
        let masters = [
            inv(),
            dff(),
            mbff2("MBFF2", false, false),
            mbff2("MBFF2SECLPS", true, true),
            tray_with_bits("T4", 4),
        ];
        let catalog = TrayCatalog::from_masters(&masters);
        for master in &masters {
            let classified = TrayCatalog::classify(master).unwrap();
            assert_eq!(catalog.tray(&master.name), classified.as_ref(), "{}", master.name);
        }
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn bus_style_names_are_indexed() {
        let master = MasterCell::builder()
            .name("BUS4")
            .width(8.0)
            .height(1.0)
            .sequential(true)
            .pins(
                (0..4)
                    .flat_map(|i| {
                        [
                            pin(&format!("D[{i}]"), i as float, PinFunction::Data),
                            pin(&format!("Q[{i}]"), i as float + 0.5, PinFunction::Q),
                        ]
                    })
                    .chain([pin("CLK", 4.0, PinFunction::Clock)])
                    .collect(),
            )
            .build();
        assert_eq!(TrayCatalog::classify(&master).unwrap().unwrap().capacity(), 4);
    }

    #[test]
    fn malformed_masters_are_reported() {
        let mut master = mbff2("BAD", false, false);
        master.pins.shift_remove("Q1");
        assert_eq!(
            TrayCatalog::classify(&master).err(),
            Some(ClassifyError::MissingSlotPin {
                master: "BAD".into(),
                bit: 1,
                role: "data-out"
            })
        );

        let mut mixed = mbff2("MIXED", false, false);
        mixed.pins.insert("CK".into(), pin("CK", 0.0, PinFunction::Clock));
        assert!(matches!(
            TrayCatalog::classify(&mixed),
            Err(ClassifyError::InconsistentClocking { .. })
        ));

        let mut partial = mbff2("PSCAN", true, true);
        partial.pins.shift_remove("SI1");
        assert!(matches!(
            TrayCatalog::classify(&partial),
            Err(ClassifyError::PartialScan { .. })
        ));

        let catalog = TrayCatalog::from_masters([&master, &mixed, &partial, &dff()]);
        assert!(catalog.is_empty());
        assert_eq!(catalog.issues().len(), 3);
        assert!(catalog.layout("DFF").is_some());
    }

    #[test]
    fn compatibility_requires_needed_features() {
        let catalog = TrayCatalog::from_masters([
            &mbff2("MBFF2", false, false),
            &mbff2("MBFF2SE", true, false),
        ]);
        let plain = catalog
            .compatible_trays(ClockEdge::Rising, &[], 2)
            .map(|(t, unused)| (t.name.as_str(), unused))
            .collect_vec();
        assert_eq!(plain, vec![("MBFF2", 0), ("MBFF2SE", 2)]);

        let scan = [PinFunction::ScanIn, PinFunction::ScanEnable];
        let names = catalog
            .compatible_trays(ClockEdge::Rising, &scan, 2)
            .map(|(t, _)| t.name.clone())
            .collect_vec();
        assert_eq!(names, vec!["MBFF2SE"]);
        assert_eq!(catalog.compatible_trays(ClockEdge::Falling, &[], 2).count(), 0);
        assert_eq!(catalog.capacities_for(ClockEdge::Rising, &[]), vec![2]);
    }
}
