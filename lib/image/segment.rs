//! The segment map of a loaded program.

use crate::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named, bounded region of the program's address space.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Segment {
    name: String,
    address: Address,
    size: u64,
}

impl Segment {
    pub fn new<S: Into<String>>(name: S, address: Address, size: u64) -> Segment {
        Segment {
            name: name.into(),
            address,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// True if `address` falls inside this segment.
    pub fn contains(&self, address: Address) -> bool {
        address
            .value()
            .checked_sub(self.address.value())
            .map(|offset| offset < self.size)
            .unwrap_or(false)
    }
}

/// An ordered map of the segments a loader placed in the address space.
///
/// The pointer scanner validates candidate addresses against this map; the
/// loader that populates it lives above this crate.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SegmentMap {
    segments: BTreeMap<u64, Segment>,
}

impl SegmentMap {
    pub fn new() -> SegmentMap {
        SegmentMap {
            segments: BTreeMap::new(),
        }
    }

    /// Add a segment, keyed by its start address.
    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.insert(segment.address().value(), segment);
    }

    /// Get the segments in this map, in address order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// The segment containing `address`, if any.
    pub fn segment_at(&self, address: Address) -> Option<&Segment> {
        self.segments
            .range(..=address.value())
            .next_back()
            .map(|(_, segment)| segment)
            .filter(|segment| segment.contains(address))
    }

    /// True if some segment contains `address`.
    pub fn is_valid_address(&self, address: Address) -> bool {
        self.segment_at(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_lookup() {
        let mut map = SegmentMap::new();
        map.add_segment(Segment::new("code", Address::new(0x0000, 16), 0x100));
        map.add_segment(Segment::new("data", Address::new(0x2000, 16), 0x80));

        assert!(map.is_valid_address(Address::new(0x00FF, 16)));
        assert!(!map.is_valid_address(Address::new(0x0100, 16)));
        assert!(map.is_valid_address(Address::new(0x2000, 16)));
        assert_eq!(
            map.segment_at(Address::new(0x2010, 16)).map(Segment::name),
            Some("data")
        );
        assert!(!map.is_valid_address(Address::new(0x3000, 16)));
    }
}
