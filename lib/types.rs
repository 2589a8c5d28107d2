//! Types used across multiple Merlin modules.

use serde::{Deserialize, Serialize};

/// The underlying endianness of an architecture's multi-byte values.
///
/// An endianness is fixed per architecture instance, and every image
/// accessor the architecture creates inherits it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Endian {
    Big,
    Little,
}

/// The semantic data type carried by operands and storage locations.
///
/// This is deliberately coarser than a full type system. It records the
/// width and pointer-ness decoding already knows, so downstream consumers
/// can emit type-annotated text without re-deriving either.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum DataType {
    Bool,
    Byte,
    Word16,
    Word32,
    Word64,
    Ptr16,
    Ptr32,
}

impl DataType {
    /// The width of a value of this type in bits.
    pub fn bits(self) -> usize {
        match self {
            DataType::Bool => 1,
            DataType::Byte => 8,
            DataType::Word16 | DataType::Ptr16 => 16,
            DataType::Word32 | DataType::Ptr32 => 32,
            DataType::Word64 => 64,
        }
    }

    /// True if values of this type identify locations in an address space.
    pub fn is_pointer(self) -> bool {
        matches!(self, DataType::Ptr16 | DataType::Ptr32)
    }
}

#[test]
fn data_type_bits() {
    assert_eq!(DataType::Bool.bits(), 1);
    assert_eq!(DataType::Byte.bits(), 8);
    assert_eq!(DataType::Ptr16.bits(), 16);
    assert!(DataType::Ptr16.is_pointer());
    assert!(!DataType::Word16.is_pointer());
}
