//! Timing derating factors (`set_timing_derate`).
//!
//! Derates are applied to arc delays at read time inside the search, where
//! the context (clock vs data path, early vs late) is known. Factors
//! compose multiplicatively: global × net/instance/cell scoped.

use chronos_common::{EarlyLate, RiseFall};
use chronos_netlist::{CellId, InstanceId, NetId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of delay a derate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerateCategory {
    /// Cell propagation delays.
    CellDelay,
    /// Cell timing-check margins.
    CellCheck,
    /// Net wire delays.
    NetDelay,
}

impl DerateCategory {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            DerateCategory::CellDelay => 0,
            DerateCategory::CellCheck => 1,
            DerateCategory::NetDelay => 2,
        }
    }
}

/// Whether the derated delay is on a clock path or a data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeratePathKind {
    /// Clock network path.
    Clk,
    /// Data path.
    Data,
}

impl DeratePathKind {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        match self {
            DeratePathKind::Clk => 0,
            DeratePathKind::Data => 1,
        }
    }
}

/// A dense factor table over
/// category × path kind × transition × early/late. Unset entries are 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerateTable {
    factors: Vec<f64>,
}

impl DerateTable {
    const SIZE: usize = DerateCategory::COUNT * DeratePathKind::COUNT * 2 * 2;

    /// Creates an identity table.
    pub fn new() -> Self {
        Self {
            factors: vec![1.0; Self::SIZE],
        }
    }

    fn slot(
        category: DerateCategory,
        path_kind: DeratePathKind,
        rf: RiseFall,
        early_late: EarlyLate,
    ) -> usize {
        ((category.index() * DeratePathKind::COUNT + path_kind.index()) * 2 + rf.index()) * 2
            + early_late.index()
    }

    /// The factor for a slot.
    pub fn factor(
        &self,
        category: DerateCategory,
        path_kind: DeratePathKind,
        rf: RiseFall,
        early_late: EarlyLate,
    ) -> f64 {
        self.factors[Self::slot(category, path_kind, rf, early_late)]
    }

    /// Sets the factor for a slot.
    pub fn set_factor(
        &mut self,
        category: DerateCategory,
        path_kind: DeratePathKind,
        rf: RiseFall,
        early_late: EarlyLate,
        factor: f64,
    ) {
        self.factors[Self::slot(category, path_kind, rf, early_late)] = factor;
    }

    /// Sets the factor for a category across all path kinds and
    /// transitions at one pole, matching the common SDC form.
    pub fn set_factor_all(&mut self, category: DerateCategory, early_late: EarlyLate, factor: f64) {
        for path_kind in [DeratePathKind::Clk, DeratePathKind::Data] {
            for rf in RiseFall::ALL {
                self.set_factor(category, path_kind, rf, early_late, factor);
            }
        }
    }
}

impl Default for DerateTable {
    fn default() -> Self {
        Self::new()
    }
}

/// All derating state: a global table plus tables scoped to nets,
/// instances, and library cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Derates {
    /// Design-wide factors.
    pub global: DerateTable,
    /// Per-net factors (net delays only in practice).
    pub nets: HashMap<NetId, DerateTable>,
    /// Per-instance factors.
    pub instances: HashMap<InstanceId, DerateTable>,
    /// Per-library-cell factors.
    pub cells: HashMap<CellId, DerateTable>,
}

impl Derates {
    /// Creates identity derates.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no scoped or non-identity global factors exist.
    pub fn is_identity(&self) -> bool {
        self.nets.is_empty()
            && self.instances.is_empty()
            && self.cells.is_empty()
            && self.global == DerateTable::new()
    }

    /// The composed factor for a cell delay or check on `instance` of
    /// `cell`: global × instance × cell.
    pub fn cell_factor(
        &self,
        category: DerateCategory,
        path_kind: DeratePathKind,
        rf: RiseFall,
        early_late: EarlyLate,
        instance: Option<InstanceId>,
        cell: Option<CellId>,
    ) -> f64 {
        let mut factor = self.global.factor(category, path_kind, rf, early_late);
        if let Some(table) = instance.and_then(|i| self.instances.get(&i)) {
            factor *= table.factor(category, path_kind, rf, early_late);
        }
        if let Some(table) = cell.and_then(|c| self.cells.get(&c)) {
            factor *= table.factor(category, path_kind, rf, early_late);
        }
        factor
    }

    /// The composed factor for a wire delay on `net`: global × net.
    pub fn net_factor(
        &self,
        path_kind: DeratePathKind,
        rf: RiseFall,
        early_late: EarlyLate,
        net: Option<NetId>,
    ) -> f64 {
        let mut factor = self
            .global
            .factor(DerateCategory::NetDelay, path_kind, rf, early_late);
        if let Some(table) = net.and_then(|n| self.nets.get(&n)) {
            factor *= table.factor(DerateCategory::NetDelay, path_kind, rf, early_late);
        }
        factor
    }
}
