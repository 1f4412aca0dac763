use crate::*;
use slotmap::SlotMap;
use std::io::Write;
use std::str::FromStr;

/// In-memory design database: library, placed instances, nets, rows and the
/// timing report that came with the design.
///
/// The text format is line oriented, one record per line, `#` starts a comment:
///
/// ```text
/// DieSize 0 0 100 100
/// Cell DFF 2 1 sequential rising
/// Pin D 0 0.5 data
/// Pin Q 2 0.5 q
/// Pin CK 1 0 clock
/// PlacementRows 0 0 0.5 1 200
/// Inst ff1 DFF 10 4
/// Inst ff2 DFF 14 4 fixed
/// Net clk
/// Pin ff1/CK
/// TimingPath -0.25 ff1 ff2
/// ```
///
/// `Pin` lines belong to the closest preceding `Cell` (library pin: name,
/// offset, function, optional bit index) or `Net` (connection `inst/pin`).
#[derive(Debug, Default)]
pub struct DesignContext {
    pub die_dimensions: DieSize,
    pub placement_rows: Vec<PlacementRows>,
    pub library: IndexMap<String, MasterCell>,
    pub instances: SlotMap<InstKey, Instance>,
    name_index: Dict<String, InstKey>,
    pub nets: Vec<Net>,
    net_index: Dict<String, NetId>,
    pub timing_paths: Vec<TimingPath>,
}

enum Section {
    Header,
    Cell(String),
    Net(NetId),
}

impl DesignContext {
    /// Parses and initializes a new design context from a given input file.
    #[time("info")]
    pub fn from_file(input_path: &str) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(input_path)?;
        Self::parse(&content)
    }

    pub fn add_master(&mut self, master: MasterCell) {
        self.library.insert(master.name.clone(), master);
    }

    /// Adds a net, or returns the id of the existing net with that name.
    pub fn add_net(&mut self, name: &str) -> NetId {
        if let Some(&id) = self.net_index.get(name) {
            return id;
        }
        let id = self.nets.len();
        self.nets.push(Net::new(id, name));
        self.net_index.insert(name.to_string(), id);
        id
    }

    pub fn net_id(&self, name: &str) -> Option<NetId> {
        self.net_index.get(name).copied()
    }

    pub fn add_instance(&mut self, inst: Instance) -> InstKey {
        let name = inst.name.clone();
        let key = self.instances.insert(inst);
        self.name_index.insert(name, key);
        key
    }

    /// Connects `inst/pin` to the named net, creating the net if needed.
    pub fn connect_by_name(&mut self, inst: &str, pin: &str, net: &str) -> Option<NetId> {
        let key = self.find_instance(inst)?;
        let id = self.add_net(net);
        self.connect(key, pin, id);
        Some(id)
    }

    pub fn instance_by_name(&self, name: &str) -> Option<&Instance> {
        self.find_instance(name).and_then(|k| self.instances.get(k))
    }

    /// Parses the raw design file contents into a complete context.
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        fn syntax(line: usize, message: impl Into<String>) -> ParseError {
            ParseError::Syntax {
                line,
                message: message.into(),
            }
        }
        fn parse_next<T: FromStr>(
            it: &mut std::str::SplitWhitespace,
            line: usize,
            what: &str,
        ) -> Result<T, ParseError> {
            let token = it
                .next()
                .ok_or_else(|| syntax(line, format!("missing {what}")))?;
            token
                .parse::<T>()
                .map_err(|_| syntax(line, format!("invalid {what} '{token}'")))
        }
        fn next_str<'a>(
            it: &mut std::str::SplitWhitespace<'a>,
            line: usize,
            what: &str,
        ) -> Result<&'a str, ParseError> {
            it.next().ok_or_else(|| syntax(line, format!("missing {what}")))
        }
        let mut ctx = DesignContext::default();
        let mut section = Section::Header;
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut it = line.split_whitespace();
            let Some(key) = it.next() else {
                continue;
            };
            match key {
                "DieSize" => {
                    ctx.die_dimensions = DieSize::builder()
                        .x_lower_left(parse_next(&mut it, line_no, "die x")?)
                        .y_lower_left(parse_next(&mut it, line_no, "die y")?)
                        .x_upper_right(parse_next(&mut it, line_no, "die x")?)
                        .y_upper_right(parse_next(&mut it, line_no, "die y")?)
                        .build();
                }
                "Cell" => {
                    let name = next_str(&mut it, line_no, "cell name")?;
                    let width = parse_next(&mut it, line_no, "cell width")?;
                    let height = parse_next(&mut it, line_no, "cell height")?;
                    let sequential = match next_str(&mut it, line_no, "cell kind")? {
                        "sequential" => true,
                        "combinational" => false,
                        other => return Err(syntax(line_no, format!("unknown cell kind '{other}'"))),
                    };
                    let clock_edge = match it.next() {
                        Some(token) => token.parse::<ClockEdge>().map_err(|e| syntax(line_no, e))?,
                        None => ClockEdge::default(),
                    };
                    ctx.add_master(
                        MasterCell::builder()
                            .name(name)
                            .width(width)
                            .height(height)
                            .sequential(sequential)
                            .clock_edge(clock_edge)
                            .build(),
                    );
                    section = Section::Cell(name.to_string());
                }
                "Pin" => match &section {
                    Section::Cell(cell) => {
                        let name = next_str(&mut it, line_no, "pin name")?;
                        let x = parse_next(&mut it, line_no, "pin x")?;
                        let y = parse_next(&mut it, line_no, "pin y")?;
                        let function = next_str(&mut it, line_no, "pin function")?
                            .parse::<PinFunction>()
                            .map_err(|e| syntax(line_no, e))?;
                        let mut pin = Pin::new(name, x, y, function);
                        if let Some(token) = it.next() {
                            let bit = token
                                .parse::<u32>()
                                .map_err(|_| syntax(line_no, format!("invalid bit '{token}'")))?;
                            pin = pin.with_bit(bit);
                        }
                        if let Some(master) = ctx.library.get_mut(cell) {
                            master.pins.insert(name.to_string(), pin);
                        }
                    }
                    Section::Net(net) => {
                        let net = *net;
                        let token = next_str(&mut it, line_no, "pin reference")?;
                        let (inst_name, pin_name) = token
                            .split_once('/')
                            .ok_or_else(|| syntax(line_no, format!("expected inst/pin, got '{token}'")))?;
                        let key = ctx.find_instance(inst_name).ok_or_else(|| ParseError::Unknown {
                            line: line_no,
                            kind: "instance",
                            name: inst_name.to_string(),
                        })?;
                        let known_pin = ctx
                            .master_of(key)
                            .is_some_and(|master| master.pin(pin_name).is_some());
                        if !known_pin {
                            return Err(ParseError::Unknown {
                                line: line_no,
                                kind: "pin",
                                name: token.to_string(),
                            });
                        }
                        ctx.connect(key, pin_name, net);
                    }
                    Section::Header => return Err(syntax(line_no, "Pin outside of a Cell or Net")),
                },
                "PlacementRows" => {
                    let row = PlacementRows {
                        x: parse_next(&mut it, line_no, "row x")?,
                        y: parse_next(&mut it, line_no, "row y")?,
                        width: parse_next(&mut it, line_no, "site width")?,
                        height: parse_next(&mut it, line_no, "row height")?,
                        num_cols: parse_next(&mut it, line_no, "site count")?,
                    };
                    ctx.placement_rows.push(row);
                }
                "Inst" => {
                    let name = next_str(&mut it, line_no, "instance name")?;
                    let master = next_str(&mut it, line_no, "instance master")?;
                    let x = parse_next(&mut it, line_no, "instance x")?;
                    let y = parse_next(&mut it, line_no, "instance y")?;
                    if !ctx.library.contains_key(master) {
                        return Err(ParseError::Unknown {
                            line: line_no,
                            kind: "master",
                            name: master.to_string(),
                        });
                    }
                    if ctx.name_index.contains_key(name) {
                        return Err(syntax(line_no, format!("duplicate instance '{name}'")));
                    }
                    let mut inst = Instance::new(name, master, (x, y));
                    inst.fixed = matches!(it.next(), Some("fixed"));
                    ctx.add_instance(inst);
                    section = Section::Header;
                }
                "Net" => {
                    let name = next_str(&mut it, line_no, "net name")?;
                    section = Section::Net(ctx.add_net(name));
                }
                "TimingPath" => {
                    let slack = parse_next(&mut it, line_no, "path slack")?;
                    let flops = it.map(str::to_string).collect_vec();
                    if flops.is_empty() {
                        return Err(syntax(line_no, "timing path without instances"));
                    }
                    ctx.timing_paths.push(TimingPath::new(slack, flops));
                }
                _ => {
                    debug!("line {line_no}: skipping unknown record '{key}'");
                }
            }
        }
        ctx.placement_rows
            .sort_by_key(|x| (OrderedFloat(x.y), OrderedFloat(x.x)));
        Ok(ctx)
    }

    /// Serializes the design back into the text format accepted by [`DesignContext::parse`].
    pub fn export(&self) -> String {
        let mut out = String::new();
        let die = &self.die_dimensions;
        out.push_str(&format!(
            "DieSize {} {} {} {}\n",
            die.x_lower_left, die.y_lower_left, die.x_upper_right, die.y_upper_right
        ));
        for master in self.library.values() {
            let kind = if master.sequential {
                "sequential"
            } else {
                "combinational"
            };
            out.push_str(&format!(
                "Cell {} {} {} {} {}\n",
                master.name, master.width, master.height, kind, master.clock_edge
            ));
            for pin in master.pins.values() {
                out.push_str(&format!(
                    "Pin {} {} {} {}",
                    pin.name,
                    pin.x,
                    pin.y,
                    pin.function.keyword()
                ));
                if let Some(bit) = pin.bit {
                    out.push_str(&format!(" {bit}"));
                }
                out.push('\n');
            }
        }
        for row in &self.placement_rows {
            out.push_str(&format!(
                "PlacementRows {} {} {} {} {}\n",
                row.x, row.y, row.width, row.height, row.num_cols
            ));
        }
        let mut net_pins: Vec<Vec<String>> = vec![Vec::new(); self.nets.len()];
        for inst in self.instances.values() {
            out.push_str(&format!("Inst {} {} {} {}", inst.name, inst.master, inst.x, inst.y));
            if inst.fixed {
                out.push_str(" fixed");
            }
            out.push('\n');
            for (pin, &net) in &inst.connections {
                net_pins[net].push(format!("{}/{}", inst.name, pin));
            }
        }
        for (net, pins) in self.nets.iter().zip(net_pins) {
            out.push_str(&format!("Net {}\n", net.name));
            for pin in pins {
                out.push_str(&format!("Pin {pin}\n"));
            }
        }
        for path in &self.timing_paths {
            out.push_str(&format!("TimingPath {} {}\n", path.slack, path.flops.join(" ")));
        }
        out
    }

    pub fn write_to(&self, path: &str) -> std::io::Result<()> {
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        writer.write_all(self.export().as_bytes())?;
        writer.flush()
    }
}

impl DesignView for DesignContext {
    fn masters(&self) -> impl Iterator<Item = &MasterCell> {
        self.library.values()
    }
    fn master(&self, name: &str) -> Option<&MasterCell> {
        self.library.get(name)
    }
    fn instances(&self) -> impl Iterator<Item = (InstKey, &Instance)> {
        self.instances.iter()
    }
    fn instance(&self, key: InstKey) -> Option<&Instance> {
        self.instances.get(key)
    }
    fn find_instance(&self, name: &str) -> Option<InstKey> {
        self.name_index.get(name).copied()
    }
    fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id)
    }
    fn placement_rows(&self) -> &[PlacementRows] {
        &self.placement_rows
    }
    fn die(&self) -> &DieSize {
        &self.die_dimensions
    }
}

impl DesignEditor for DesignContext {
    fn create_instance(&mut self, name: &str, master: &str, pos: Vector2) -> Option<InstKey> {
        if !self.library.contains_key(master) {
            return None;
        }
        Some(self.add_instance(Instance::new(name, master, pos)))
    }
    fn connect(&mut self, inst: InstKey, pin: &str, net: NetId) {
        if let Some(instance) = self.instances.get_mut(inst) {
            instance.connections.insert(pin.to_string(), net);
        }
    }
    fn remove_instance(&mut self, inst: InstKey) -> Option<Instance> {
        let removed = self.instances.remove(inst)?;
        self.name_index.remove(&removed.name);
        Some(removed)
    }
}
