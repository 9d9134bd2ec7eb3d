//! In-memory routing fabric used as the reference architecture backend.
//!
//! [`FabricModel`] implements [`RoutingContext`] over explicitly-constructed
//! wires, PIPs, and nets. It is the backend the test suite routes against;
//! the [`mesh`](FabricModel::mesh) constructor builds a regular
//! nearest-neighbour interconnect for convergence scenarios.

use crate::ids::{NetId, PipId, WireId};
use crate::types::{BindStrength, Delay, Loc, Rect};
use crate::RoutingContext;
use std::collections::HashMap;

/// Errors raised while constructing a fabric.
#[derive(Debug, thiserror::Error)]
pub enum ArchError {
    /// A wire was placed outside the device grid.
    #[error("wire '{name}' at ({x}, {y}) lies outside the {width}x{height} grid")]
    WireOffGrid {
        /// Name of the offending wire.
        name: String,
        /// Column of the offending wire.
        x: i16,
        /// Row of the offending wire.
        y: i16,
        /// Grid width.
        width: u16,
        /// Grid height.
        height: u16,
    },
}

#[derive(Debug, Clone)]
struct WireData {
    name: String,
    loc: Loc,
    avail: bool,
    delay: Delay,
    downhill: Vec<PipId>,
}

#[derive(Debug, Clone)]
struct PipData {
    src: WireId,
    dst: WireId,
    avail: bool,
    delay: Delay,
}

#[derive(Debug, Clone)]
struct NetData {
    name: String,
    driver: Option<WireId>,
    sinks: Vec<WireId>,
    bound_wires: Vec<(WireId, BindStrength)>,
    bound_pips: Vec<(PipId, BindStrength)>,
}

/// A programmable in-memory routing fabric.
///
/// Build one with [`new`](FabricModel::new) plus
/// [`add_wire`](FabricModel::add_wire) / [`add_pip`](FabricModel::add_pip) /
/// [`add_net`](FabricModel::add_net), or use [`mesh`](FabricModel::mesh) for
/// a regular grid interconnect.
#[derive(Debug, Clone)]
pub struct FabricModel {
    width: u16,
    height: u16,
    wires: Vec<WireData>,
    pips: Vec<PipData>,
    nets: Vec<NetData>,
}

impl FabricModel {
    /// Creates an empty fabric on a grid of the given dimensions.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            wires: Vec::new(),
            pips: Vec::new(),
            nets: Vec::new(),
        }
    }

    /// Adds a wire at the given location.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WireOffGrid`] if the location lies outside the grid.
    pub fn add_wire(&mut self, name: &str, loc: Loc) -> Result<WireId, ArchError> {
        if loc.x < 0 || loc.y < 0 || loc.x as u16 >= self.width || loc.y as u16 >= self.height {
            return Err(ArchError::WireOffGrid {
                name: name.to_string(),
                x: loc.x,
                y: loc.y,
                width: self.width,
                height: self.height,
            });
        }
        let id = WireId::from_raw(self.wires.len() as u32);
        self.wires.push(WireData {
            name: name.to_string(),
            loc,
            avail: true,
            delay: Delay::ZERO,
            downhill: Vec::new(),
        });
        Ok(id)
    }

    /// Adds a directed PIP from `src` to `dst` with the given delay.
    pub fn add_pip(&mut self, src: WireId, dst: WireId, delay: Delay) -> PipId {
        let id = PipId::from_raw(self.pips.len() as u32);
        self.pips.push(PipData {
            src,
            dst,
            avail: true,
            delay,
        });
        self.wires[src.as_raw() as usize].downhill.push(id);
        id
    }

    /// Adds a net with the given driver and sink wires.
    pub fn add_net(&mut self, name: &str, driver: Option<WireId>, sinks: Vec<WireId>) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        self.nets.push(NetData {
            name: name.to_string(),
            driver,
            sinks,
            bound_wires: Vec::new(),
            bound_pips: Vec::new(),
        });
        id
    }

    /// Sets the per-wire segment delay.
    pub fn set_wire_delay(&mut self, wire: WireId, delay: Delay) {
        self.wires[wire.as_raw() as usize].delay = delay;
    }

    /// Marks a wire available or unavailable for routing.
    pub fn set_wire_avail(&mut self, wire: WireId, avail: bool) {
        self.wires[wire.as_raw() as usize].avail = avail;
    }

    /// Marks a PIP available or unavailable for routing.
    pub fn set_pip_avail(&mut self, pip: PipId, avail: bool) {
        self.pips[pip.as_raw() as usize].avail = avail;
    }

    /// Returns the name of a wire.
    pub fn wire_name(&self, wire: WireId) -> &str {
        &self.wires[wire.as_raw() as usize].name
    }

    /// Returns the source wire of a PIP.
    pub fn pip_src(&self, pip: PipId) -> WireId {
        self.pips[pip.as_raw() as usize].src
    }

    /// Returns the nets currently bound to a wire.
    pub fn nets_on_wire(&self, wire: WireId) -> Vec<NetId> {
        let mut out = Vec::new();
        for (i, net) in self.nets.iter().enumerate() {
            if net.bound_wires.iter().any(|&(w, _)| w == wire) {
                out.push(NetId::from_raw(i as u32));
            }
        }
        out
    }

    /// Returns the PIPs currently bound to a net.
    pub fn net_bound_pips(&self, net: NetId) -> Vec<PipId> {
        self.nets[net.as_raw() as usize]
            .bound_pips
            .iter()
            .map(|&(p, _)| p)
            .collect()
    }

    /// Builds a `width` x `height` mesh fabric: one wire per tile, PIPs in
    /// both directions between horizontal and vertical neighbours.
    ///
    /// Wire delay is zero; every PIP carries a 1 ns delay, so path cost is
    /// proportional to Manhattan hop count.
    pub fn mesh(width: u16, height: u16) -> Self {
        let mut fabric = Self::new(width, height);
        let mut grid = HashMap::new();
        for y in 0..height as i16 {
            for x in 0..width as i16 {
                let id = WireId::from_raw(fabric.wires.len() as u32);
                fabric.wires.push(WireData {
                    name: format!("tile_x{x}y{y}"),
                    loc: Loc::new(x, y),
                    avail: true,
                    delay: Delay::ZERO,
                    downhill: Vec::new(),
                });
                grid.insert((x, y), id);
            }
        }
        let hop = Delay::from_ns(1.0);
        for y in 0..height as i16 {
            for x in 0..width as i16 {
                let here = grid[&(x, y)];
                for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                    if let Some(&there) = grid.get(&(nx, ny)) {
                        fabric.add_pip(here, there, hop);
                    }
                }
            }
        }
        fabric
    }

    /// Returns the wire at mesh coordinate `(x, y)`.
    ///
    /// Only meaningful for fabrics built with [`mesh`](FabricModel::mesh),
    /// where wires are laid out row-major.
    pub fn wire_at(&self, x: u16, y: u16) -> WireId {
        WireId::from_raw(y as u32 * self.width as u32 + x as u32)
    }
}

impl RoutingContext for FabricModel {
    fn grid_dim(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn wires(&self) -> Vec<WireId> {
        (0..self.wires.len() as u32).map(WireId::from_raw).collect()
    }

    fn wire_bbox(&self, wire: WireId) -> Rect {
        let loc = self.wires[wire.as_raw() as usize].loc;
        Rect::new(loc.x, loc.y, loc.x, loc.y)
    }

    fn wire_avail(&self, wire: WireId) -> bool {
        self.wires[wire.as_raw() as usize].avail
    }

    fn wire_delay(&self, wire: WireId) -> Delay {
        self.wires[wire.as_raw() as usize].delay
    }

    fn downhill_pips(&self, wire: WireId) -> Vec<PipId> {
        self.wires[wire.as_raw() as usize].downhill.clone()
    }

    fn pip_avail(&self, pip: PipId) -> bool {
        self.pips[pip.as_raw() as usize].avail
    }

    fn pip_dst(&self, pip: PipId) -> WireId {
        self.pips[pip.as_raw() as usize].dst
    }

    fn pip_delay(&self, pip: PipId) -> Delay {
        self.pips[pip.as_raw() as usize].delay
    }

    fn nets(&self) -> Vec<NetId> {
        (0..self.nets.len() as u32).map(NetId::from_raw).collect()
    }

    fn net_name(&self, net: NetId) -> &str {
        &self.nets[net.as_raw() as usize].name
    }

    fn net_driver_wire(&self, net: NetId) -> Option<WireId> {
        self.nets[net.as_raw() as usize].driver
    }

    fn net_sink_wires(&self, net: NetId) -> Vec<WireId> {
        self.nets[net.as_raw() as usize].sinks.clone()
    }

    fn net_bound_wires(&self, net: NetId) -> Vec<(WireId, BindStrength)> {
        self.nets[net.as_raw() as usize].bound_wires.clone()
    }

    fn bind_wire(&mut self, wire: WireId, net: NetId, strength: BindStrength) {
        self.nets[net.as_raw() as usize]
            .bound_wires
            .push((wire, strength));
    }

    fn bind_pip(&mut self, pip: PipId, net: NetId, strength: BindStrength) {
        self.nets[net.as_raw() as usize]
            .bound_pips
            .push((pip, strength));
    }

    fn ripup_net(&mut self, net: NetId) {
        let data = &mut self.nets[net.as_raw() as usize];
        data.bound_wires.clear();
        data.bound_pips.clear();
    }
}
