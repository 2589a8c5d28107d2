//! In-memory binary images and endian-aware access to them.
//!
//! An [`Image`] is the ordered byte buffer a binary was loaded into, plus its
//! base address. The decode path never mutates an image; all reading goes
//! through short-lived [`ImageReader`] cursors with a fixed byte order, and
//! patching goes through [`ImageWriter`] with the same discipline. Accessors
//! over the same image with different declared bounds do not interfere.

mod reader;
mod segment;
mod writer;

pub use self::reader::ImageReader;
pub use self::segment::{Segment, SegmentMap};
pub use self::writer::ImageWriter;

use crate::address::Address;
use serde::{Deserialize, Serialize};

/// A contiguous region of a loaded binary.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Image {
    base: Address,
    data: Vec<u8>,
}

impl Image {
    /// Create a new image over the given bytes, loaded at `base`.
    pub fn new(base: Address, data: Vec<u8>) -> Image {
        Image { base, data }
    }

    /// Get the base address of this image.
    pub fn base(&self) -> Address {
        self.base
    }

    /// Get this image's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the length of this image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if `address` falls inside this image.
    pub fn contains(&self, address: Address) -> bool {
        self.offset_of(address).is_some()
    }

    /// The byte offset of `address` into this image, or `None` if the
    /// address falls outside it.
    pub fn offset_of(&self, address: Address) -> Option<usize> {
        let offset = address.value().checked_sub(self.base.value())?;
        if offset >= self.data.len() as u64 {
            return None;
        }
        Some(offset as usize)
    }

    /// Random access to a single byte. The sequential decode path uses
    /// [`ImageReader`] instead; this is for scanners that probe arbitrary
    /// positions.
    pub fn read_u8(&self, address: Address) -> Option<u8> {
        self.offset_of(address).map(|offset| self.data[offset])
    }

    /// The address one past the last byte of this image.
    pub fn end(&self) -> Address {
        self.base.wrapping_offset(self.data.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_and_containment() {
        let image = Image::new(Address::new(0x100, 16), vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(image.offset_of(Address::new(0x101, 16)), Some(1));
        assert_eq!(image.offset_of(Address::new(0x103, 16)), None);
        assert_eq!(image.offset_of(Address::new(0xFF, 16)), None);
        assert!(image.contains(Address::new(0x102, 16)));
        assert_eq!(image.read_u8(Address::new(0x102, 16)), Some(0xCC));
        assert_eq!(image.end(), Address::new(0x103, 16));
    }
}
