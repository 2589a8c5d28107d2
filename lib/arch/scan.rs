//! Heuristic pointer scanning.

use crate::address::Address;
use crate::arch::PointerScanFlags;
use crate::image::{ImageReader, SegmentMap};
use rustc_hash::FxHashSet;

/// A lazy scan of an image for bit patterns that look like valid pointers.
///
/// The scanner probes every byte position in the reader's range for a
/// pointer-width value, sliding forward one byte at a time, and yields the
/// positions whose value lands somewhere acceptable: inside the segment
/// map, or in the seeded set of known-valid addresses, per the scan flags.
/// Used to seed code and data discovery; neither exhaustive nor sound by
/// design.
pub struct PointerScanner<'a> {
    reader: ImageReader<'a>,
    map: &'a SegmentMap,
    known: FxHashSet<u64>,
    flags: PointerScanFlags,
    pointer_bits: usize,
}

impl<'a> PointerScanner<'a> {
    pub fn new(
        map: &'a SegmentMap,
        reader: ImageReader<'a>,
        known: &[Address],
        flags: PointerScanFlags,
        pointer_bits: usize,
    ) -> PointerScanner<'a> {
        PointerScanner {
            reader,
            map,
            known: known.iter().map(|address| address.value()).collect(),
            flags,
            pointer_bits,
        }
    }

    fn read_candidate(&self) -> Option<u64> {
        // Probe at the cursor without committing it; the cursor itself
        // slides by single bytes.
        let mut probe = self.reader.clone();
        match self.pointer_bits {
            16 => probe.read_u16().ok().map(u64::from),
            32 => probe.read_u32().ok().map(u64::from),
            64 => probe.read_u64().ok(),
            _ => None,
        }
    }

    fn accepts(&self, target: Address) -> bool {
        if self.flags.contains(PointerScanFlags::KNOWN) && self.known.contains(&target.value()) {
            return true;
        }
        self.flags.contains(PointerScanFlags::SEGMENTS) && self.map.is_valid_address(target)
    }
}

impl Iterator for PointerScanner<'_> {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        loop {
            let candidate = self.read_candidate()?;
            let position = self.reader.address();
            if self.reader.read_u8().is_err() {
                return None;
            }
            let target = Address::new(candidate, self.pointer_bits);
            if self.accepts(target) {
                return Some(position);
            }
        }
    }
}
