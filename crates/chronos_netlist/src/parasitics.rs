//! Per-net parasitic models with on-demand reduction.
//!
//! A net's parasitic is delivered in one of three forms. The delay
//! calculator reports which form it consumes; the other forms reduce to it
//! on demand. Reduction here is the collaborator contract, not a full RC
//! solver: an RC tree reduces to a π-model by lumping total capacitance
//! around the total tree resistance, and any form reduces to a lumped cap
//! by summing capacitance.

use crate::ids::{NetId, PinId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The form of a parasitic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParasiticForm {
    /// A single lumped capacitance.
    LumpedCap,
    /// A π-model: near cap, series resistance, far cap.
    PiModel,
    /// A full RC tree.
    RcNetwork,
}

/// A parasitic model for one net at one analysis point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Parasitic {
    /// Lumped wire capacitance.
    LumpedCap {
        /// Total wire capacitance.
        cap: f64,
    },
    /// π-model as seen from the driver.
    PiModel {
        /// Capacitance at the driver side.
        c2: f64,
        /// Series resistance.
        rpi: f64,
        /// Capacitance at the load side.
        c1: f64,
    },
    /// RC tree with named nodes; node 0 is the driver node.
    RcNetwork {
        /// Resistors as (node, node, ohms).
        resistors: Vec<(u32, u32, f64)>,
        /// Grounded capacitors as (node, farads-in-library-units).
        caps: Vec<(u32, f64)>,
        /// Load pin attachment nodes.
        pin_nodes: Vec<(PinId, u32)>,
    },
}

impl Parasitic {
    /// The form of this model.
    pub fn form(&self) -> ParasiticForm {
        match self {
            Parasitic::LumpedCap { .. } => ParasiticForm::LumpedCap,
            Parasitic::PiModel { .. } => ParasiticForm::PiModel,
            Parasitic::RcNetwork { .. } => ParasiticForm::RcNetwork,
        }
    }

    /// Total wire capacitance of the model.
    pub fn total_cap(&self) -> f64 {
        match self {
            Parasitic::LumpedCap { cap } => *cap,
            Parasitic::PiModel { c2, c1, .. } => c1 + c2,
            Parasitic::RcNetwork { caps, .. } => caps.iter().map(|(_, c)| c).sum(),
        }
    }

    /// Reduces this model to a lumped cap.
    pub fn reduce_to_cap(&self) -> Parasitic {
        Parasitic::LumpedCap {
            cap: self.total_cap(),
        }
    }

    /// Reduces this model to a π-model. A lumped cap becomes a π with zero
    /// resistance; an RC tree lumps half its capacitance on each side of
    /// its total resistance.
    pub fn reduce_to_pi(&self) -> Parasitic {
        match self {
            Parasitic::PiModel { .. } => self.clone(),
            Parasitic::LumpedCap { cap } => Parasitic::PiModel {
                c2: *cap,
                rpi: 0.0,
                c1: 0.0,
            },
            Parasitic::RcNetwork { resistors, .. } => {
                let total_cap = self.total_cap();
                let total_res: f64 = resistors.iter().map(|(_, _, r)| r).sum();
                Parasitic::PiModel {
                    c2: total_cap / 2.0,
                    rpi: total_res,
                    c1: total_cap / 2.0,
                }
            }
        }
    }

    /// Reduces to the requested form.
    pub fn reduce_to(&self, form: ParasiticForm) -> Parasitic {
        match form {
            ParasiticForm::LumpedCap => self.reduce_to_cap(),
            ParasiticForm::PiModel => self.reduce_to_pi(),
            ParasiticForm::RcNetwork => self.clone(),
        }
    }

    /// The elmore-style resistance from the driver to a load pin, for
    /// RC trees; zero otherwise.
    pub fn resistance_to(&self, pin: PinId) -> f64 {
        match self {
            Parasitic::RcNetwork {
                resistors,
                pin_nodes,
                ..
            } => {
                // Path resistance from node 0 following the tree.
                let Some(&(_, target)) = pin_nodes.iter().find(|(p, _)| *p == pin) else {
                    return 0.0;
                };
                // Walk the (tree) resistor list from the target back to
                // the driver node accumulating resistance.
                let mut total = 0.0;
                let mut node = target;
                let mut remaining: Vec<&(u32, u32, f64)> = resistors.iter().collect();
                while node != 0 {
                    let Some(pos) = remaining.iter().position(|(a, b, _)| *a == node || *b == node)
                    else {
                        break;
                    };
                    let (a, b, r) = *remaining.swap_remove(pos);
                    total += r;
                    node = if a == node { b } else { a };
                }
                total
            }
            _ => 0.0,
        }
    }
}

/// The parasitics collaborator: per-(net, analysis point) models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parasitics {
    models: HashMap<(NetId, usize), Parasitic>,
}

impl Parasitics {
    /// Creates an empty parasitics store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The parasitic for a net at an analysis point, if annotated.
    pub fn parasitic(&self, net: NetId, ap_index: usize) -> Option<&Parasitic> {
        self.models.get(&(net, ap_index))
    }

    /// Annotates a net's parasitic at an analysis point.
    pub fn set_parasitic(&mut self, net: NetId, ap_index: usize, parasitic: Parasitic) {
        self.models.insert((net, ap_index), parasitic);
    }

    /// Removes a net's annotation.
    pub fn remove_parasitic(&mut self, net: NetId, ap_index: usize) {
        self.models.remove(&(net, ap_index));
    }

    /// Number of annotated (net, ap) slots.
    pub fn annotation_count(&self) -> usize {
        self.models.len()
    }
}
