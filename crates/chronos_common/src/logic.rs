//! Constant logic values supplied by case analysis and constant propagation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// A constant value on a pin, as delivered by the network collaborator.
///
/// The engine consumes constants to disable conditional timing arcs and to
/// derive simulated timing senses; it does not simulate logic itself, so
/// anything not pinned to a constant is `Unknown`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogicValue {
    /// Driven logic low.
    Zero = 0,
    /// Driven logic high.
    One = 1,
    /// Not a constant.
    Unknown = 2,
}

impl LogicValue {
    /// True if the value is a driven constant.
    pub fn is_constant(self) -> bool {
        matches!(self, LogicValue::Zero | LogicValue::One)
    }

    /// Converts a character to a value. Accepts '0', '1', 'x'/'X'.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(LogicValue::Zero),
            '1' => Some(LogicValue::One),
            'x' | 'X' => Some(LogicValue::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for LogicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicValue::Zero => write!(f, "0"),
            LogicValue::One => write!(f, "1"),
            LogicValue::Unknown => write!(f, "X"),
        }
    }
}

/// AND truth table: 0 dominates, 1 is identity.
impl BitAnd for LogicValue {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        use LogicValue::*;
        match (self, rhs) {
            (Zero, _) | (_, Zero) => Zero,
            (One, One) => One,
            _ => Unknown,
        }
    }
}

/// OR truth table: 1 dominates, 0 is identity.
impl BitOr for LogicValue {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        use LogicValue::*;
        match (self, rhs) {
            (One, _) | (_, One) => One,
            (Zero, Zero) => Zero,
            _ => Unknown,
        }
    }
}

impl Not for LogicValue {
    type Output = Self;

    fn not(self) -> Self {
        use LogicValue::*;
        match self {
            Zero => One,
            One => Zero,
            Unknown => Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicValue::*;

    #[test]
    fn constant_test() {
        assert!(Zero.is_constant());
        assert!(One.is_constant());
        assert!(!Unknown.is_constant());
    }

    #[test]
    fn and_table() {
        assert_eq!(Zero & One, Zero);
        assert_eq!(Zero & Unknown, Zero);
        assert_eq!(One & One, One);
        assert_eq!(One & Unknown, Unknown);
        assert_eq!(Unknown & Unknown, Unknown);
    }

    #[test]
    fn or_table() {
        assert_eq!(One | Zero, One);
        assert_eq!(One | Unknown, One);
        assert_eq!(Zero | Zero, Zero);
        assert_eq!(Zero | Unknown, Unknown);
    }

    #[test]
    fn not_table() {
        assert_eq!(!Zero, One);
        assert_eq!(!One, Zero);
        assert_eq!(!Unknown, Unknown);
    }

    #[test]
    fn from_char() {
        assert_eq!(LogicValue::from_char('0'), Some(Zero));
        assert_eq!(LogicValue::from_char('1'), Some(One));
        assert_eq!(LogicValue::from_char('X'), Some(Unknown));
        assert_eq!(LogicValue::from_char('z'), None);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{Zero}"), "0");
        assert_eq!(format!("{One}"), "1");
        assert_eq!(format!("{Unknown}"), "X");
    }
}
