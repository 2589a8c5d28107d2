//! Addresses within a binary's address space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in the binary's address space.
///
/// An `Address` is an opaque integer of the owning architecture's pointer
/// width. It is comparable and offsettable; formatting renders the value as
/// fixed-width uppercase hex, and parsing back from text is the owning
/// architecture's job (`Architecture::try_parse_address`), since radix and
/// width rules differ per family.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Address {
    value: u64,
    bits: usize,
}

impl Address {
    /// Create a new `Address` of the given pointer width in bits.
    ///
    /// The value is truncated to the width, the same way the hardware's
    /// program counter would wrap.
    pub fn new(value: u64, bits: usize) -> Address {
        Address {
            value: value & Address::mask(bits),
            bits,
        }
    }

    fn mask(bits: usize) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1 << bits) - 1
        }
    }

    /// Get the numeric value of this address.
    pub fn value(self) -> u64 {
        self.value
    }

    /// Get the pointer width of this address in bits.
    pub fn bits(self) -> usize {
        self.bits
    }

    /// Offset this address by a signed displacement, wrapping within the
    /// address width.
    pub fn wrapping_offset(self, offset: i64) -> Address {
        Address::new(self.value.wrapping_add(offset as u64), self.bits)
    }

    /// Offset this address by a signed displacement, or `None` if the result
    /// would leave the address space.
    pub fn checked_offset(self, offset: i64) -> Option<Address> {
        let value = self.value.checked_add_signed(offset)?;
        if value > Address::mask(self.bits) {
            return None;
        }
        Some(Address::new(value, self.bits))
    }

    /// The distance in bytes from `other` to this address, or `None` if
    /// `other` is above this address.
    pub fn distance_from(self, other: Address) -> Option<u64> {
        self.value.checked_sub(other.value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0width$X}", self.value, width = (self.bits + 3) / 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_to_width() {
        assert_eq!(Address::new(0x12345, 16).value(), 0x2345);
        assert_eq!(Address::new(0xFFFF, 16).wrapping_offset(1).value(), 0);
    }

    #[test]
    fn checked_offset_rejects_out_of_space() {
        let addr = Address::new(0xFFFF, 16);
        assert_eq!(addr.checked_offset(1), None);
        assert_eq!(addr.checked_offset(-1), Some(Address::new(0xFFFE, 16)));
        assert_eq!(Address::new(0, 16).checked_offset(-1), None);
    }

    #[test]
    fn displays_fixed_width_hex() {
        assert_eq!(Address::new(0x40, 16).to_string(), "0040");
        assert_eq!(Address::new(0x1A2B, 16).to_string(), "1A2B");
    }

    #[test]
    fn distance() {
        let base = Address::new(0x100, 16);
        assert_eq!(Address::new(0x140, 16).distance_from(base), Some(0x40));
        assert_eq!(base.distance_from(Address::new(0x140, 16)), None);
    }
}
