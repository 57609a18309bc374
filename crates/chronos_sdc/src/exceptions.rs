//! Path exceptions: false paths, multicycles, path delays, group paths,
//! filters, with from/thru/to matching and the state cursor that rides on
//! search tags.

use crate::clock::ClockId;
use chronos_common::{Ident, MinMax, RiseFall};
use chronos_netlist::{InstanceId, PinId};
use serde::{Deserialize, Serialize};

/// An exception's index in the constraint set's exception table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ExceptionId(u32);

impl ExceptionId {
    /// Creates an id from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the index as `usize`.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A from/thru/to match point: a set of pins, instances, and clocks,
/// optionally narrowed to one transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionPt {
    /// Matching pins.
    pub pins: Vec<PinId>,
    /// Matching instances (any pin of the instance matches).
    pub instances: Vec<InstanceId>,
    /// Matching clocks (for -from/-to clock forms).
    pub clocks: Vec<ClockId>,
    /// Transition filter; `None` matches both.
    pub rf: Option<RiseFall>,
}

impl ExceptionPt {
    /// A point matching a single pin.
    pub fn pin(pin: PinId) -> Self {
        Self {
            pins: vec![pin],
            ..Self::default()
        }
    }

    /// A point matching a single clock.
    pub fn clock(clock: ClockId) -> Self {
        Self {
            clocks: vec![clock],
            ..Self::default()
        }
    }

    /// True if the point matches the given pin and transition.
    /// `instance_of` resolves the pin's owning instance, if any.
    pub fn matches_pin(
        &self,
        pin: PinId,
        rf: RiseFall,
        instance_of: Option<InstanceId>,
    ) -> bool {
        if let Some(want_rf) = self.rf {
            if want_rf != rf {
                return false;
            }
        }
        if self.pins.contains(&pin) {
            return true;
        }
        if let Some(inst) = instance_of {
            if self.instances.contains(&inst) {
                return true;
            }
        }
        false
    }

    /// True if the point matches the given clock (and transition, when the
    /// point has one).
    pub fn matches_clock(&self, clock: ClockId, rf: RiseFall) -> bool {
        if let Some(want_rf) = self.rf {
            if want_rf != rf {
                return false;
            }
        }
        self.clocks.contains(&clock)
    }

    /// True when the point names nothing concrete (matches everything).
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty() && self.instances.is_empty() && self.clocks.is_empty()
    }
}

/// The kind of a path exception, in priority order (highest first when two
/// exceptions match the same path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExceptionKind {
    /// `set_false_path`: the path is not timed.
    FalsePath,
    /// `set_max_delay`/`set_min_delay`: absolute bound replacing the
    /// clock-derived required time.
    PathDelay {
        /// The bound.
        delay: f64,
        /// `Max` bounds late paths, `Min` bounds early paths.
        min_max: MinMax,
    },
    /// `set_multicycle_path`: shifts the capture edge.
    Multicycle {
        /// Cycle count; setup capture moves `cycles - 1` periods late.
        /// Hold is unshifted by default.
        cycles: u32,
        /// Apply to hold checks instead of setup.
        hold: bool,
    },
    /// Report filter: narrows eligible paths without altering checks.
    Filter,
    /// `group_path`: names the endpoint's report group.
    GroupPath {
        /// The group name.
        name: Ident,
    },
}

impl ExceptionKind {
    /// Priority for conflict resolution:
    /// false > path_delay > multicycle > filter > group_path.
    pub fn priority(&self) -> u8 {
        match self {
            ExceptionKind::FalsePath => 4,
            ExceptionKind::PathDelay { .. } => 3,
            ExceptionKind::Multicycle { .. } => 2,
            ExceptionKind::Filter => 1,
            ExceptionKind::GroupPath { .. } => 0,
        }
    }
}

/// A path exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionPath {
    /// This exception's id in the constraint table.
    pub id: ExceptionId,
    /// What the exception does.
    pub kind: ExceptionKind,
    /// Startpoint filter; `None` matches any start.
    pub from: Option<ExceptionPt>,
    /// Intermediate points, matched in order.
    pub thrus: Vec<ExceptionPt>,
    /// Endpoint filter; `None` matches any end.
    pub to: Option<ExceptionPt>,
    /// Restricts the exception to one analysis pole.
    pub min_max: Option<MinMax>,
}

impl ExceptionPath {
    /// True if the exception applies to the given analysis pole.
    pub fn matches_min_max(&self, min_max: MinMax) -> bool {
        self.min_max.map_or(true, |mm| mm == min_max)
    }

    /// True if a path launched at (pin, rf) under `clock` can enter this
    /// exception.
    pub fn matches_from(
        &self,
        pin: PinId,
        rf: RiseFall,
        clock: Option<ClockId>,
        instance_of: Option<InstanceId>,
    ) -> bool {
        match &self.from {
            None => true,
            Some(pt) => {
                pt.matches_pin(pin, rf, instance_of)
                    || clock.is_some_and(|c| pt.matches_clock(c, rf))
            }
        }
    }

    /// True if the exception's endpoint filter accepts (pin, rf) captured
    /// by `clock`.
    pub fn matches_to(
        &self,
        pin: PinId,
        rf: RiseFall,
        clock: Option<ClockId>,
        instance_of: Option<InstanceId>,
    ) -> bool {
        match &self.to {
            None => true,
            Some(pt) => {
                pt.matches_pin(pin, rf, instance_of)
                    || clock.is_some_and(|c| pt.matches_clock(c, rf))
            }
        }
    }

    /// Compares two exceptions that both match a path. Higher kind
    /// priority wins; at equal priority the more specific match (more thru
    /// points) wins, then the lower id as the deterministic tie-break.
    pub fn priority_cmp(&self, other: &ExceptionPath) -> std::cmp::Ordering {
        self.kind
            .priority()
            .cmp(&other.kind.priority())
            .then(self.thrus.len().cmp(&other.thrus.len()))
            .then(other.id.cmp(&self.id))
    }
}

/// A cursor into an exception's thru list, carried on search tags.
///
/// The state is `complete` when every thru point has been matched in path
/// order; only complete states govern the endpoint check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExceptionState {
    /// The exception.
    pub exception: ExceptionId,
    /// Index of the next unmet thru point.
    pub next_thru: u32,
}

impl ExceptionState {
    /// The initial state of an exception.
    pub fn initial(exception: ExceptionId) -> Self {
        Self {
            exception,
            next_thru: 0,
        }
    }

    /// True when all thru points are matched.
    pub fn is_complete(&self, exception: &ExceptionPath) -> bool {
        self.next_thru as usize >= exception.thrus.len()
    }

    /// Advances past the next thru point if (pin, rf) matches it; returns
    /// the possibly-advanced state.
    pub fn advanced(
        &self,
        exception: &ExceptionPath,
        pin: PinId,
        rf: RiseFall,
        instance_of: Option<InstanceId>,
    ) -> Self {
        if let Some(pt) = exception.thrus.get(self.next_thru as usize) {
            if pt.matches_pin(pin, rf, instance_of) {
                return Self {
                    exception: self.exception,
                    next_thru: self.next_thru + 1,
                };
            }
        }
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(n: u32) -> PinId {
        PinId::from_raw(n)
    }

    fn false_path(id: u32, from: Option<ExceptionPt>, to: Option<ExceptionPt>) -> ExceptionPath {
        ExceptionPath {
            id: ExceptionId::from_raw(id),
            kind: ExceptionKind::FalsePath,
            from,
            thrus: vec![],
            to,
            min_max: None,
        }
    }

    #[test]
    fn point_matches_pin_and_rf() {
        let pt = ExceptionPt {
            pins: vec![pin(3)],
            rf: Some(RiseFall::Rise),
            ..ExceptionPt::default()
        };
        assert!(pt.matches_pin(pin(3), RiseFall::Rise, None));
        assert!(!pt.matches_pin(pin(3), RiseFall::Fall, None));
        assert!(!pt.matches_pin(pin(4), RiseFall::Rise, None));
    }

    #[test]
    fn point_matches_instance() {
        let inst = InstanceId::from_raw(7);
        let pt = ExceptionPt {
            instances: vec![inst],
            ..ExceptionPt::default()
        };
        assert!(pt.matches_pin(pin(0), RiseFall::Rise, Some(inst)));
        assert!(!pt.matches_pin(pin(0), RiseFall::Rise, None));
    }

    #[test]
    fn from_none_matches_everything() {
        let exc = false_path(0, None, Some(ExceptionPt::pin(pin(9))));
        assert!(exc.matches_from(pin(1), RiseFall::Rise, None, None));
        assert!(exc.matches_to(pin(9), RiseFall::Fall, None, None));
        assert!(!exc.matches_to(pin(8), RiseFall::Fall, None, None));
    }

    #[test]
    fn from_clock_matching() {
        let clk = ClockId::from_raw(2);
        let exc = false_path(0, Some(ExceptionPt::clock(clk)), None);
        assert!(exc.matches_from(pin(1), RiseFall::Rise, Some(clk), None));
        assert!(!exc.matches_from(pin(1), RiseFall::Rise, Some(ClockId::from_raw(3)), None));
        assert!(!exc.matches_from(pin(1), RiseFall::Rise, None, None));
    }

    #[test]
    fn kind_priorities() {
        assert!(ExceptionKind::FalsePath.priority() > ExceptionKind::Filter.priority());
        assert!(
            ExceptionKind::PathDelay {
                delay: 1.0,
                min_max: MinMax::Max
            }
            .priority()
                > ExceptionKind::Multicycle {
                    cycles: 2,
                    hold: false
                }
                .priority()
        );
    }

    #[test]
    fn equal_priority_prefers_more_thrus() {
        let a = ExceptionPath {
            id: ExceptionId::from_raw(0),
            kind: ExceptionKind::FalsePath,
            from: None,
            thrus: vec![ExceptionPt::pin(pin(1))],
            to: None,
            min_max: None,
        };
        let b = false_path(1, None, None);
        assert_eq!(a.priority_cmp(&b), std::cmp::Ordering::Greater);
        // Identical shape: lower id wins.
        let c = false_path(2, None, None);
        assert_eq!(b.priority_cmp(&c), std::cmp::Ordering::Greater);
    }

    #[test]
    fn state_advances_in_order() {
        let exc = ExceptionPath {
            id: ExceptionId::from_raw(0),
            kind: ExceptionKind::FalsePath,
            from: None,
            thrus: vec![ExceptionPt::pin(pin(1)), ExceptionPt::pin(pin(2))],
            to: None,
            min_max: None,
        };
        let s0 = ExceptionState::initial(exc.id);
        assert!(!s0.is_complete(&exc));
        // Wrong pin leaves the cursor alone.
        let s0b = s0.advanced(&exc, pin(2), RiseFall::Rise, None);
        assert_eq!(s0b, s0);
        let s1 = s0.advanced(&exc, pin(1), RiseFall::Rise, None);
        assert_eq!(s1.next_thru, 1);
        let s2 = s1.advanced(&exc, pin(2), RiseFall::Fall, None);
        assert!(s2.is_complete(&exc));
    }

    #[test]
    fn min_max_restriction() {
        let exc = ExceptionPath {
            id: ExceptionId::from_raw(0),
            kind: ExceptionKind::Multicycle {
                cycles: 2,
                hold: false,
            },
            from: None,
            thrus: vec![],
            to: None,
            min_max: Some(MinMax::Max),
        };
        assert!(exc.matches_min_max(MinMax::Max));
        assert!(!exc.matches_min_max(MinMax::Min));
    }
}
