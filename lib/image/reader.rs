//! Sequential, bounds-checked reading from an image.

use crate::address::Address;
use crate::image::Image;
use crate::types::Endian;
use crate::{Error, Result};

/// A cursor over an [`Image`] with a fixed byte order.
///
/// Typed reads of N bytes advance the cursor by N and interpret the bytes
/// per the reader's endianness. A read that would cross the reader's
/// declared bound fails with [`Error::Bounds`]; after such a failure the
/// cursor position is unspecified and the reader must not be used further.
///
/// Readers are cheap to construct and intended to be short-lived, one per
/// decode or rewrite pass.
#[derive(Clone, Debug)]
pub struct ImageReader<'a> {
    image: &'a Image,
    endian: Endian,
    offset: usize,
    end: usize,
}

impl<'a> ImageReader<'a> {
    /// A reader over `[address, image end)`.
    pub fn new(image: &'a Image, endian: Endian, address: Address) -> Result<ImageReader<'a>> {
        ImageReader::bounded(image, endian, address, image.end())
    }

    /// A reader over `[address, end)`. The range may be empty, in which case
    /// every read fails with a bounds error.
    pub fn bounded(
        image: &'a Image,
        endian: Endian,
        address: Address,
        end: Address,
    ) -> Result<ImageReader<'a>> {
        let offset = in_image_offset(image, address)?;
        let end = in_image_offset(image, end)?;
        if end < offset {
            return Err(Error::Bounds {
                address: end as u64 + image.base().value(),
                bytes: 0,
            });
        }
        Ok(ImageReader {
            image,
            endian,
            offset,
            end,
        })
    }

    /// A reader over `[address, address + length)`.
    pub fn sized(
        image: &'a Image,
        endian: Endian,
        address: Address,
        length: usize,
    ) -> Result<ImageReader<'a>> {
        let end = address
            .checked_offset(length as i64)
            .ok_or(Error::Bounds {
                address: address.value(),
                bytes: length,
            })?;
        ImageReader::bounded(image, endian, address, end)
    }

    /// A reader starting at a raw byte offset into the image, bounded by the
    /// image's end.
    pub fn at_offset(image: &'a Image, endian: Endian, offset: usize) -> Result<ImageReader<'a>> {
        if offset > image.len() {
            return Err(Error::Bounds {
                address: image.base().value() + offset as u64,
                bytes: 0,
            });
        }
        Ok(ImageReader {
            image,
            endian,
            offset,
            end: image.len(),
        })
    }

    /// The byte order of this reader.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The address of the cursor.
    pub fn address(&self) -> Address {
        self.image.base().wrapping_offset(self.offset as i64)
    }

    /// The cursor as a raw byte offset into the image.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes remaining before the declared bound.
    pub fn bytes_left(&self) -> usize {
        self.end - self.offset
    }

    /// True once the cursor has reached the declared bound.
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.end
    }

    /// Move the cursor to `address`, which must lie within the declared
    /// bounds.
    pub fn seek(&mut self, address: Address) -> Result<()> {
        let offset = in_image_offset(self.image, address)?;
        if offset > self.end {
            return Err(Error::Bounds {
                address: address.value(),
                bytes: 0,
            });
        }
        self.offset = offset;
        Ok(())
    }

    fn take(&mut self, bytes: usize) -> Result<&'a [u8]> {
        if self.offset + bytes > self.end {
            return Err(Error::Bounds {
                address: self.address().value(),
                bytes,
            });
        }
        let slice = &self.image.data()[self.offset..self.offset + bytes];
        self.offset += bytes;
        Ok(slice)
    }

    /// Read the next byte without advancing the cursor.
    pub fn peek_u8(&self) -> Result<u8> {
        if self.offset >= self.end {
            return Err(Error::Bounds {
                address: self.address().value(),
                bytes: 1,
            });
        }
        Ok(self.image.data()[self.offset])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(match self.endian {
            Endian::Big => (bytes[0] as u16) << 8 | bytes[1] as u16,
            Endian::Little => (bytes[1] as u16) << 8 | bytes[0] as u16,
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(match self.endian {
            Endian::Big => bytes
                .iter()
                .fold(0u32, |word, &byte| word << 8 | byte as u32),
            Endian::Little => bytes
                .iter()
                .rev()
                .fold(0u32, |word, &byte| word << 8 | byte as u32),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(match self.endian {
            Endian::Big => bytes
                .iter()
                .fold(0u64, |word, &byte| word << 8 | byte as u64),
            Endian::Little => bytes
                .iter()
                .rev()
                .fold(0u64, |word, &byte| word << 8 | byte as u64),
        })
    }

    /// Read `length` raw bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        self.take(length)
    }
}

fn in_image_offset(image: &Image, address: Address) -> Result<usize> {
    let offset = address
        .value()
        .checked_sub(image.base().value())
        .ok_or(Error::Bounds {
            address: address.value(),
            bytes: 0,
        })?;
    // One past the end is a legal (empty) cursor position.
    if offset > image.len() as u64 {
        return Err(Error::Bounds {
            address: address.value(),
            bytes: 0,
        });
    }
    Ok(offset as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Image {
        Image::new(
            Address::new(0x100, 16),
            vec![0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0],
        )
    }

    #[test]
    fn endian_reads_advance_cursor() {
        let image = image();
        let mut be = ImageReader::new(&image, Endian::Big, Address::new(0x100, 16)).unwrap();
        assert_eq!(be.read_u16().unwrap(), 0x1234);
        assert_eq!(be.read_u32().unwrap(), 0x56789ABC);
        assert_eq!(be.address(), Address::new(0x106, 16));

        let mut le = ImageReader::new(&image, Endian::Little, Address::new(0x100, 16)).unwrap();
        assert_eq!(le.read_u16().unwrap(), 0x3412);
        assert_eq!(le.read_u32().unwrap(), 0xBC9A7856);
    }

    #[test]
    fn read_u64_le() {
        let image = image();
        let mut le = ImageReader::new(&image, Endian::Little, Address::new(0x100, 16)).unwrap();
        assert_eq!(le.read_u64().unwrap(), 0xF0DEBC9A78563412);
    }

    #[test]
    fn bounds_violation_is_an_error() {
        let image = image();
        let mut rdr =
            ImageReader::sized(&image, Endian::Big, Address::new(0x106, 16), 2).unwrap();
        assert_eq!(rdr.read_u16().unwrap(), 0xDEF0);
        assert!(matches!(rdr.read_u8(), Err(Error::Bounds { .. })));
    }

    #[test]
    fn empty_range_fails_all_reads() {
        let image = image();
        let addr = Address::new(0x102, 16);
        let mut rdr = ImageReader::bounded(&image, Endian::Big, addr, addr).unwrap();
        assert!(rdr.is_exhausted());
        assert!(matches!(rdr.read_u8(), Err(Error::Bounds { .. })));
    }

    #[test]
    fn out_of_range_construction_fails() {
        let image = image();
        assert!(ImageReader::new(&image, Endian::Big, Address::new(0x200, 16)).is_err());
        assert!(ImageReader::sized(&image, Endian::Big, Address::new(0x106, 16), 4).is_err());
        assert!(ImageReader::at_offset(&image, Endian::Big, 9).is_err());
    }

    #[test]
    fn at_offset_starts_mid_image() {
        let image = image();
        let mut rdr = ImageReader::at_offset(&image, Endian::Big, 6).unwrap();
        assert_eq!(rdr.address(), Address::new(0x106, 16));
        assert_eq!(rdr.read_u16().unwrap(), 0xDEF0);
    }

    #[test]
    fn readers_do_not_interfere() {
        let image = image();
        let mut a = ImageReader::sized(&image, Endian::Big, Address::new(0x100, 16), 2).unwrap();
        let mut b = ImageReader::sized(&image, Endian::Big, Address::new(0x104, 16), 2).unwrap();
        assert_eq!(a.read_u16().unwrap(), 0x1234);
        assert_eq!(b.read_u16().unwrap(), 0x9ABC);
    }
}
