//! Linked network data model: instances, pins, nets, hierarchy, constants.
//!
//! The network is delivered linked: every instance references a library
//! cell, every leaf pin resolves to a liberty port, every net lists its
//! connected pins. Hierarchical pins are transparent for timing; they map
//! to the nets above and below the boundary so graph construction can
//! follow them without materialising hierarchy.

use crate::ids::{CellId, InstanceId, NetId, PinId, PortId};
use crate::liberty::{Library, LibertyPort, PortDirection};
use chronos_common::{Ident, LogicValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a pin is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinKind {
    /// A top-level design port. A top input drives the design, so its
    /// direction is inverted relative to instance pins.
    TopPort {
        /// Direction as seen from outside the design.
        direction: PortDirection,
    },
    /// A pin on a leaf instance, resolving to a liberty port.
    InstancePin {
        /// Owning instance.
        instance: InstanceId,
        /// Liberty port on the instance's cell.
        port: PortId,
    },
    /// A hierarchical pin: a boundary crossing with no timing of its own.
    Hierarchical {
        /// The nets connected on either side of the boundary.
        nets: Vec<NetId>,
    },
}

/// A pin in the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    /// This pin's id.
    pub id: PinId,
    /// Full hierarchical path name.
    pub name: Ident,
    /// Attachment.
    pub kind: PinKind,
    /// The net this pin connects to, if any.
    pub net: Option<NetId>,
}

/// A leaf instance of a library cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// This instance's id.
    pub id: InstanceId,
    /// Full hierarchical path name.
    pub name: Ident,
    /// The library cell.
    pub cell: CellId,
    /// Pins, one per connected cell port.
    pub pins: Vec<PinId>,
}

/// A net connecting leaf pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// This net's id.
    pub id: NetId,
    /// Full hierarchical path name.
    pub name: Ident,
    /// Connected leaf pins, in connection order.
    pub pins: Vec<PinId>,
}

/// The linked design network, consumed read-only by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    /// All pins, indexed by `PinId`.
    pub pins: Vec<Pin>,
    /// All instances, indexed by `InstanceId`.
    pub instances: Vec<Instance>,
    /// All nets, indexed by `NetId`.
    pub nets: Vec<Net>,
    /// Constant values from tie cells and case analysis.
    constants: HashMap<PinId, LogicValue>,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pin with the given id.
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.as_usize()]
    }

    /// The instance with the given id.
    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.as_usize()]
    }

    /// The net with the given id.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.as_usize()]
    }

    /// Number of pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Resolves a pin to its liberty port, if it is an instance pin.
    pub fn pin_port<'a>(&self, pin: PinId, library: &'a Library) -> Option<&'a LibertyPort> {
        match &self.pin(pin).kind {
            PinKind::InstancePin { instance, port } => {
                let cell = library.cell(self.instance(*instance).cell);
                Some(cell.port(*port))
            }
            _ => None,
        }
    }

    /// True for hierarchical pins.
    pub fn is_hierarchical(&self, pin: PinId) -> bool {
        matches!(self.pin(pin).kind, PinKind::Hierarchical { .. })
    }

    /// The direction of a pin as seen by the net it connects to: a top
    /// input port drives, an instance output port drives.
    pub fn pin_direction(&self, pin: PinId, library: &Library) -> PortDirection {
        match &self.pin(pin).kind {
            PinKind::TopPort { direction } => match direction {
                PortDirection::Input => PortDirection::Output,
                PortDirection::Output => PortDirection::Input,
                other => *other,
            },
            PinKind::InstancePin { .. } => {
                self.pin_port(pin, library)
                    .map_or(PortDirection::Internal, |p| p.direction)
            }
            PinKind::Hierarchical { .. } => PortDirection::Internal,
        }
    }

    /// True if the pin drives its net.
    pub fn is_driver(&self, pin: PinId, library: &Library) -> bool {
        self.pin_direction(pin, library).is_driver()
    }

    /// True if the pin loads its net.
    pub fn is_load(&self, pin: PinId, library: &Library) -> bool {
        self.pin_direction(pin, library).is_load()
    }

    /// Drivers of a net, in pin-id order.
    pub fn net_drivers(&self, net: NetId, library: &Library) -> Vec<PinId> {
        let mut drivers: Vec<PinId> = self
            .net(net)
            .pins
            .iter()
            .copied()
            .filter(|&p| self.is_driver(p, library))
            .collect();
        drivers.sort();
        drivers
    }

    /// Loads of a net, in pin-id order. Bidirect pins appear as both
    /// drivers and loads.
    pub fn net_loads(&self, net: NetId, library: &Library) -> Vec<PinId> {
        let mut loads: Vec<PinId> = self
            .net(net)
            .pins
            .iter()
            .copied()
            .filter(|&p| self.is_load(p, library))
            .collect();
        loads.sort();
        loads
    }

    /// True for nets with no drivers or no loads; the graph builder skips
    /// them.
    pub fn net_is_isolated(&self, net: NetId, library: &Library) -> bool {
        self.net_drivers(net, library).is_empty() || self.net_loads(net, library).is_empty()
    }

    /// The constant value on a pin; `Unknown` when not pinned.
    pub fn constant_value(&self, pin: PinId) -> LogicValue {
        self.constants.get(&pin).copied().unwrap_or(LogicValue::Unknown)
    }

    /// Pins a constant value (tie cell or case analysis) on a pin.
    pub fn set_constant(&mut self, pin: PinId, value: LogicValue) {
        if value == LogicValue::Unknown {
            self.constants.remove(&pin);
        } else {
            self.constants.insert(pin, value);
        }
    }

    /// The nets on either side of a hierarchical pin.
    pub fn hier_pin_nets(&self, pin: PinId) -> &[NetId] {
        match &self.pin(pin).kind {
            PinKind::Hierarchical { nets } => nets,
            _ => &[],
        }
    }

    // Construction API, used by the linker and by tests.

    /// Adds a top-level port pin.
    pub fn make_top_port(&mut self, name: Ident, direction: PortDirection) -> PinId {
        let id = PinId::from_raw(self.pins.len() as u32);
        self.pins.push(Pin {
            id,
            name,
            kind: PinKind::TopPort { direction },
            net: None,
        });
        id
    }

    /// Adds a leaf instance of `cell`, creating one pin per cell port.
    /// Pin names are formed by the caller; `pin_names[i]` names the pin
    /// for port `i`.
    pub fn make_instance(&mut self, name: Ident, cell: CellId, pin_names: Vec<Ident>) -> InstanceId {
        let inst_id = InstanceId::from_raw(self.instances.len() as u32);
        let mut pins = Vec::with_capacity(pin_names.len());
        for (port_idx, pin_name) in pin_names.into_iter().enumerate() {
            let pin_id = PinId::from_raw(self.pins.len() as u32);
            self.pins.push(Pin {
                id: pin_id,
                name: pin_name,
                kind: PinKind::InstancePin {
                    instance: inst_id,
                    port: PortId::from_raw(port_idx as u32),
                },
                net: None,
            });
            pins.push(pin_id);
        }
        self.instances.push(Instance {
            id: inst_id,
            name,
            cell,
            pins,
        });
        inst_id
    }

    /// Adds a hierarchical pin crossing between `nets`.
    pub fn make_hier_pin(&mut self, name: Ident, nets: Vec<NetId>) -> PinId {
        let id = PinId::from_raw(self.pins.len() as u32);
        self.pins.push(Pin {
            id,
            name,
            kind: PinKind::Hierarchical { nets },
            net: None,
        });
        id
    }

    /// Adds an empty net.
    pub fn make_net(&mut self, name: Ident) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        self.nets.push(Net {
            id,
            name,
            pins: Vec::new(),
        });
        id
    }

    /// Connects a pin to a net.
    pub fn connect(&mut self, pin: PinId, net: NetId) {
        self.pins[pin.as_usize()].net = Some(net);
        self.nets[net.as_usize()].pins.push(pin);
    }

    /// Disconnects a pin from its net.
    pub fn disconnect(&mut self, pin: PinId) {
        if let Some(net) = self.pins[pin.as_usize()].net.take() {
            self.nets[net.as_usize()].pins.retain(|&p| p != pin);
        }
    }
}
