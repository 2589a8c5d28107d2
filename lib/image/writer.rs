//! Sequential, bounds-checked writing into an image.

use crate::address::Address;
use crate::image::Image;
use crate::types::Endian;
use crate::{Error, Result};

/// The writing counterpart of [`crate::image::ImageReader`].
///
/// Writers follow the same contract: a fixed byte order for the lifetime of
/// the writer, typed writes that advance the cursor, and a bounds error,
/// never a silent truncation, for any write that would cross the image's
/// end. The decode path never uses a writer; these exist for patching
/// workflows above this crate.
#[derive(Debug)]
pub struct ImageWriter<'a> {
    image: &'a mut Image,
    endian: Endian,
    offset: usize,
}

impl<'a> ImageWriter<'a> {
    /// A writer positioned at `address`.
    pub fn new(image: &'a mut Image, endian: Endian, address: Address) -> Result<ImageWriter<'a>> {
        let offset = image.offset_of(address).ok_or(Error::Bounds {
            address: address.value(),
            bytes: 0,
        })?;
        Ok(ImageWriter {
            image,
            endian,
            offset,
        })
    }

    /// The address of the cursor.
    pub fn address(&self) -> Address {
        self.image.base().wrapping_offset(self.offset as i64)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if self.offset + bytes.len() > self.image.len() {
            return Err(Error::Bounds {
                address: self.address().value(),
                bytes: bytes.len(),
            });
        }
        self.image.data_mut()[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        match self.endian {
            Endian::Big => self.put(&value.to_be_bytes()),
            Endian::Little => self.put(&value.to_le_bytes()),
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        match self.endian {
            Endian::Big => self.put(&value.to_be_bytes()),
            Endian::Little => self.put(&value.to_le_bytes()),
        }
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        match self.endian {
            Endian::Big => self.put(&value.to_be_bytes()),
            Endian::Little => self.put(&value.to_le_bytes()),
        }
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageReader;

    #[test]
    fn write_then_read_round_trips() {
        let mut image = Image::new(Address::new(0, 16), vec![0; 4]);
        let addr = Address::new(0, 16);

        let mut writer = ImageWriter::new(&mut image, Endian::Big, addr).unwrap();
        writer.write_u16(0x1234).unwrap();
        writer.write_u16(0x5678).unwrap();

        let mut reader = ImageReader::new(&image, Endian::Big, addr).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert_eq!(image.data(), &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn write_past_end_is_an_error() {
        let mut image = Image::new(Address::new(0, 16), vec![0; 3]);
        let mut writer =
            ImageWriter::new(&mut image, Endian::Big, Address::new(2, 16)).unwrap();
        assert!(matches!(writer.write_u16(0xBEEF), Err(Error::Bounds { .. })));
    }
}
