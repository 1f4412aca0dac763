use crate::*;
use serde::Serialize;
use std::str::FromStr;

slotmap::new_key_type! {
    /// Stable handle of a cell instance in the design database.
    pub struct InstKey;
}
pub type NetId = usize;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, derive_more::Display,
)]
pub enum ClockEdge {
    #[default]
    #[display("rising")]
    Rising,
    #[display("falling")]
    Falling,
}
impl FromStr for ClockEdge {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rising" | "posedge" => Ok(ClockEdge::Rising),
            "falling" | "negedge" => Ok(ClockEdge::Falling),
            _ => Err(format!("unknown clock edge '{s}'")),
        }
    }
}

/// Role of a library pin as exposed by the cell library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PinFunction {
    Input,
    Output,
    Clock,
    Data,
    Q,
    QN,
    ScanIn,
    ScanEnable,
    Reset,
    Set,
    Supply,
}
impl PinFunction {
    pub fn keyword(&self) -> &'static str {
        match self {
            PinFunction::Input => "input",
            PinFunction::Output => "output",
            PinFunction::Clock => "clock",
            PinFunction::Data => "data",
            PinFunction::Q => "q",
            PinFunction::QN => "qn",
            PinFunction::ScanIn => "scan_in",
            PinFunction::ScanEnable => "scan_enable",
            PinFunction::Reset => "reset",
            PinFunction::Set => "set",
            PinFunction::Supply => "supply",
        }
    }
}
impl FromStr for PinFunction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let function = match s.to_lowercase().as_str() {
            "input" => PinFunction::Input,
            "output" => PinFunction::Output,
            "clock" => PinFunction::Clock,
            "data" => PinFunction::Data,
            "q" => PinFunction::Q,
            "qn" => PinFunction::QN,
            "scan_in" => PinFunction::ScanIn,
            "scan_enable" => PinFunction::ScanEnable,
            "reset" => PinFunction::Reset,
            "set" => PinFunction::Set,
            "supply" => PinFunction::Supply,
            _ => return Err(format!("unknown pin function '{s}'")),
        };
        Ok(function)
    }
}

#[derive(Debug, Clone, new)]
pub struct Pin {
    #[new(into)]
    pub name: String,
    pub x: float,
    pub y: float,
    pub function: PinFunction,
    /// Bit group this pin belongs to, when the library states it explicitly.
    #[new(default)]
    pub bit: Option<u32>,
}
impl Pin {
    pub fn offset(&self) -> Vector2 {
        (self.x, self.y)
    }
    pub fn with_bit(mut self, bit: u32) -> Self {
        self.bit = Some(bit);
        self
    }
}

/// A library master cell.
#[derive(Debug, Clone)]
pub struct MasterCell {
    pub name: String,
    pub width: float,
    pub height: float,
    pub sequential: bool,
    pub clock_edge: ClockEdge,
    pub pins: IndexMap<String, Pin>,
}
#[bon]
impl MasterCell {
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        width: float,
        height: float,
        #[builder(default = false)] sequential: bool,
        #[builder(default)] clock_edge: ClockEdge,
        #[builder(default)] pins: Vec<Pin>,
    ) -> Self {
        Self {
            name,
            width,
            height,
            sequential,
            clock_edge,
            pins: pins.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }
    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.get(name)
    }
    /// returns the (width, height) of the master
    pub fn size(&self) -> Vector2 {
        (self.width, self.height)
    }
    pub fn area(&self) -> float {
        self.width * self.height
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub master: String,
    pub x: float,
    pub y: float,
    /// Locked by an upstream step; never moved or replaced.
    pub fixed: bool,
    /// Pin name to connected net.
    pub connections: IndexMap<String, NetId>,
}
impl Instance {
    pub fn new(name: impl Into<String>, master: impl Into<String>, pos: Vector2) -> Self {
        Self {
            name: name.into(),
            master: master.into(),
            x: pos.0,
            y: pos.1,
            fixed: false,
            connections: IndexMap::default(),
        }
    }
    pub fn pos(&self) -> Vector2 {
        (self.x, self.y)
    }
    pub fn net_of(&self, pin: &str) -> Option<NetId> {
        self.connections.get(pin).copied()
    }
    pub fn bbox(&self, master: &MasterCell, amount: float) -> [[float; 2]; 2] {
        Rect::from_size(self.x, self.y, master.width, master.height)
            .erosion(amount)
            .bbox()
    }
}

#[derive(Debug, Clone, new)]
pub struct Net {
    pub id: NetId,
    #[new(into)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacementRows {
    pub x: float,
    pub y: float,
    /// Site width; every site in the row starts at `x + k * width`.
    pub width: float,
    pub height: float,
    pub num_cols: int,
}
impl PlacementRows {
    pub fn get_position(&self, column: int) -> Vector2 {
        (self.x + column.float() * self.width, self.y)
    }
    pub fn end_x(&self) -> float {
        self.x + self.num_cols.float() * self.width
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DieSize {
    pub x_lower_left: float,
    pub y_lower_left: float,
    pub x_upper_right: float,
    pub y_upper_right: float,
}
#[bon]
impl DieSize {
    #[builder]
    pub fn new(
        x_lower_left: float,
        y_lower_left: float,
        x_upper_right: float,
        y_upper_right: float,
    ) -> Self {
        Self {
            x_lower_left,
            y_lower_left,
            x_upper_right,
            y_upper_right,
        }
    }
    pub fn width(&self) -> float {
        self.x_upper_right - self.x_lower_left
    }
    pub fn height(&self) -> float {
        self.y_upper_right - self.y_lower_left
    }
    pub fn rect(&self) -> Rect {
        Rect::from_size(self.x_lower_left, self.y_lower_left, self.width(), self.height())
    }
}

/// Read access to a design database: library, placed instances, nets and rows.
pub trait DesignView {
    fn masters(&self) -> impl Iterator<Item = &MasterCell>;
    fn master(&self, name: &str) -> Option<&MasterCell>;
    fn instances(&self) -> impl Iterator<Item = (InstKey, &Instance)>;
    fn instance(&self, key: InstKey) -> Option<&Instance>;
    fn find_instance(&self, name: &str) -> Option<InstKey>;
    fn net(&self, id: NetId) -> Option<&Net>;
    fn placement_rows(&self) -> &[PlacementRows];
    fn die(&self) -> &DieSize;

    fn master_of(&self, key: InstKey) -> Option<&MasterCell> {
        self.instance(key).and_then(|inst| self.master(&inst.master))
    }
}

/// Mutating access used by the netlist rewriter.
pub trait DesignEditor: DesignView {
    /// Creates an unconnected instance. Returns `None` when the master is unknown.
    fn create_instance(&mut self, name: &str, master: &str, pos: Vector2) -> Option<InstKey>;
    fn connect(&mut self, inst: InstKey, pin: &str, net: NetId);
    fn remove_instance(&mut self, inst: InstKey) -> Option<Instance>;

    fn unique_instance_name(&self, base: &str) -> String {
        let mut name = base.to_string();
        let mut idx = 0;
        while self.find_instance(&name).is_some() {
            idx += 1;
            name = format!("{base}_{idx}");
        }
        name
    }
}
