use std::fmt;

use crate::error::{SimError, SimResult};

/// Value carried by test and task results.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Val {
    #[default]
    None,
    String(String),
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::None => Ok(()),
            Val::String(s) => f.write_str(s),
        }
    }
}

/// An 8-bit tri-statable bus as seen by an observer.
///
/// `HighImpedance` is distinct from `Driven(0)`: nothing drives the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusValue {
    Driven(u8),
    HighImpedance,
}

impl BusValue {
    pub fn is_high_impedance(self) -> bool {
        matches!(self, BusValue::HighImpedance)
    }

    /// MSB-first bit string, `zzzzzzzz` when undriven.
    pub fn to_bin(self) -> String {
        LogicVec::from(self).to_bin()
    }
}

impl fmt::Display for BusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusValue::Driven(v) => write!(f, "{} (0b{:08b})", v, v),
            BusValue::HighImpedance => f.write_str("zzzzzzzz"),
        }
    }
}

/// Four-valued logic vector of up to 64 bits.
///
/// Every bit is `0`, `1`, `z` or `x`. A bit set in `z` or `x` ignores the
/// corresponding bit of `val`, which is kept cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicVec {
    width: u32,
    val: u64,
    z: u64,
    x: u64,
}

pub const MAX_WIDTH: u32 = 64;

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl LogicVec {
    pub fn zero(width: u32) -> Self {
        Self::from_u64(width, 0)
    }

    /// Keeps the low `width` bits of `value`.
    pub fn from_u64(width: u32, value: u64) -> Self {
        debug_assert!(width > 0 && width <= MAX_WIDTH);
        LogicVec { width, val: value & mask(width), z: 0, x: 0 }
    }

    pub fn high_z(width: u32) -> Self {
        LogicVec { width, val: 0, z: mask(width), x: 0 }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_fully_driven(&self) -> bool {
        self.z == 0 && self.x == 0
    }

    pub fn is_high_z(&self) -> bool {
        self.z == mask(self.width)
    }

    pub fn has_z(&self) -> bool {
        self.z != 0
    }

    /// Integer value, if no bit is `z` or `x`.
    pub fn to_u64(&self) -> Option<u64> {
        self.is_fully_driven().then_some(self.val)
    }

    /// Integer value with `z` and `x` bits read as 0.
    pub fn to_u64_lossy(&self) -> u64 {
        self.val
    }

    pub fn bit(&self, index: u32) -> char {
        let b = 1u64 << index;
        if self.z & b != 0 {
            'z'
        } else if self.x & b != 0 {
            'x'
        } else if self.val & b != 0 {
            '1'
        } else {
            '0'
        }
    }

    /// MSB-first bit string.
    pub fn to_bin(&self) -> String {
        (0..self.width).rev().map(|i| self.bit(i)).collect()
    }

    /// Parses an MSB-first string of `0`, `1`, `z` and `x`. A `0b` prefix and
    /// `_` separators are ignored.
    pub fn parse_bin(s: &str) -> SimResult<Self> {
        let stripped = s.trim_start_matches("0b").replace('_', "");
        let width = stripped.chars().count() as u32;
        if width == 0 || width > MAX_WIDTH {
            return Err(SimError::InvalidBitString(s.to_string()));
        }
        let mut v = LogicVec::zero(width);
        for (i, c) in stripped.chars().rev().enumerate() {
            let b = 1u64 << i;
            match c.to_ascii_lowercase() {
                '0' => {}
                '1' => v.val |= b,
                'z' => v.z |= b,
                'x' => v.x |= b,
                _ => return Err(SimError::InvalidBitString(s.to_string())),
            }
        }
        Ok(v)
    }

    pub fn to_bus(&self) -> Option<BusValue> {
        if self.width != 8 {
            return None;
        }
        if self.is_high_z() {
            Some(BusValue::HighImpedance)
        } else {
            self.to_u64().map(|v| BusValue::Driven(v as u8))
        }
    }
}

impl From<BusValue> for LogicVec {
    fn from(bus: BusValue) -> Self {
        match bus {
            BusValue::Driven(v) => LogicVec::from_u64(8, u64::from(v)),
            BusValue::HighImpedance => LogicVec::high_z(8),
        }
    }
}

impl fmt::Display for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0b0111_1001", Some(121))]
    #[case("00000000", Some(0))]
    #[case("zzzzzzzz", None)]
    #[case("0000000x", None)]
    fn parses_bit_strings(#[case] s: &str, #[case] expected: Option<u64>) {
        let v = LogicVec::parse_bin(s).unwrap();
        assert_eq!(v.width(), 8);
        assert_eq!(v.to_u64(), expected);
    }

    #[test]
    fn rejects_bad_bit_strings() {
        assert!(LogicVec::parse_bin("01a1").is_err());
        assert!(LogicVec::parse_bin("").is_err());
        assert!(LogicVec::parse_bin(&"1".repeat(65)).is_err());
    }

    #[test]
    fn high_z_is_not_zero() {
        let z = LogicVec::from(BusValue::HighImpedance);
        let zero = LogicVec::from(BusValue::Driven(0));
        assert_ne!(z, zero);
        assert_eq!(z.to_bin(), "zzzzzzzz");
        assert_eq!(zero.to_bin(), "00000000");
        assert_eq!(z.to_bus(), Some(BusValue::HighImpedance));
        assert_eq!(zero.to_bus(), Some(BusValue::Driven(0)));
    }

    #[test]
    fn partially_driven_bus_has_no_bus_value() {
        let v = LogicVec::parse_bin("zzzz0101").unwrap();
        assert!(v.has_z());
        assert!(!v.is_high_z());
        assert_eq!(v.to_bus(), None);
        assert_eq!(v.to_u64_lossy(), 0b0101);
    }

    #[test]
    fn from_u64_truncates_to_width() {
        assert_eq!(LogicVec::from_u64(4, 0x1f).to_u64(), Some(0xf));
        assert_eq!(LogicVec::from_u64(64, u64::MAX).to_u64(), Some(u64::MAX));
    }
}
