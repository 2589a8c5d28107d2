//! The architecture contract and its per-family implementations.
//!
//! [`Architecture`] is the single capability set a consumer uses regardless
//! of target CPU. One implementing instance exists per supported family,
//! selected by a stable identifier string through [`architecture`]. The
//! contract composes the rest of the crate: it creates endian-fixed image
//! accessors, decoders, and rewriters, and owns the family's register set
//! and flag-group intern table.
//!
//! Not every architecture implements every capability. A pure-accumulator
//! machine has no stack access to model; a family may have no pointer
//! scanning heuristic worth running. Such operations return
//! [`crate::Error::Unsupported`], a first-class outcome distinguishable
//! from an empty result, and callers degrade gracefully.

pub mod i8051;
mod scan;
mod storage;

pub use self::scan::PointerScanner;
pub use self::storage::{FlagGroupCache, FlagGroupStorage, RegisterStorage};

use crate::address::Address;
use crate::image::{Image, ImageReader, ImageWriter, SegmentMap};
use crate::machine::MachineInstruction;
use crate::rtl::{Constant, RtlCluster, Scalar};
use crate::state::ProcessorState;
use crate::types::{DataType, Endian};
use crate::{Error, Result};
use bitflags::bitflags;
use std::fmt::Debug;
use std::sync::Arc;

bitflags! {
    /// What a pointer scan should treat as a plausible target.
    pub struct PointerScanFlags: u32 {
        /// Accept candidates whose target is one of the seeded known
        /// addresses.
        const KNOWN    = 0b01;
        /// Accept candidates whose target falls inside any mapped segment.
        const SEGMENTS = 0b10;
        const ALL      = 0b11;
    }
}

/// Maps abstract storages to the RTL scalars of the current procedure.
///
/// Rewriters never name scalars directly; they bind every register and
/// flag group through the binder, so a consumer building per-procedure
/// frames can substitute its own naming.
pub trait StorageBinder {
    fn bind_register(&self, register: &'static RegisterStorage) -> Scalar;
    fn bind_flag_group(&self, group: &FlagGroupStorage) -> Scalar;
}

/// The identity binder: storages bind to scalars of the same name.
#[derive(Clone, Debug, Default)]
pub struct FrameBinder;

impl FrameBinder {
    pub fn new() -> FrameBinder {
        FrameBinder
    }
}

impl StorageBinder for FrameBinder {
    fn bind_register(&self, register: &'static RegisterStorage) -> Scalar {
        register.scalar()
    }

    fn bind_flag_group(&self, group: &FlagGroupStorage) -> Scalar {
        group.scalar()
    }
}

/// Callback surface for cross-cutting concerns a rewriter hits mid-stream.
pub trait RewriterHost {
    /// A problem severe enough that the affected instruction was rewritten
    /// to an intrinsic marker.
    fn error(&self, address: Address, message: &str);
    /// A recoverable oddity worth surfacing.
    fn warn(&self, address: Address, message: &str);
}

/// A host that forwards diagnostics to the `log` facade.
#[derive(Clone, Debug, Default)]
pub struct LoggingHost;

impl LoggingHost {
    pub fn new() -> LoggingHost {
        LoggingHost
    }
}

impl RewriterHost for LoggingHost {
    fn error(&self, address: Address, message: &str) {
        log::error!("rewriter: 0x{}: {}", address, message);
    }

    fn warn(&self, address: Address, message: &str) {
        log::warn!("rewriter: 0x{}: {}", address, message);
    }
}

/// A default type-library association an external configuration layer
/// resolves for an architecture, keyed by `(name, arch, module)`.
///
/// This crate only defines the value type; reading configuration is a
/// consumer concern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeLibraryReference {
    pub name: String,
    pub arch: String,
    pub module: Option<String>,
}

/// Necessary capabilities for decoding and rewriting an architecture.
///
/// Implemented once per CPU family. All methods are effectively stateless
/// per call; the only mutable state behind an instance is the flag-group
/// intern table, which is safe for concurrent use.
pub trait Architecture: Debug + Send + Sync {
    /// The stable identifier external configuration registers this
    /// architecture under.
    fn name(&self) -> &'static str;

    /// A human-readable display name.
    fn description(&self) -> &'static str;

    /// The endianness of this architecture.
    fn endian(&self) -> Endian;

    /// The size of the architecture's instruction unit in bits.
    fn instruction_bits(&self) -> usize;

    /// The size of a natural word for this architecture in bits.
    fn word_bits(&self) -> usize;

    /// The width of a code pointer in bits.
    fn pointer_bits(&self) -> usize;

    /// This architecture's register set, indexable by register number.
    fn registers(&self) -> &'static [&'static RegisterStorage];

    /// The register with the given number.
    fn register(&self, number: usize) -> Result<&'static RegisterStorage> {
        self.registers()
            .get(number)
            .copied()
            .ok_or_else(|| Error::UnknownRegister(number.to_string()))
    }

    /// The register with the given name.
    fn register_by_name(&self, name: &str) -> Result<&'static RegisterStorage> {
        self.registers()
            .iter()
            .find(|register| register.name() == name)
            .copied()
            .ok_or_else(|| Error::UnknownRegister(name.to_string()))
    }

    /// The register used as the stack pointer, if the architecture has a
    /// modelable stack.
    fn stack_register(&self) -> Option<&'static RegisterStorage> {
        None
    }

    /// The status register flag groups are drawn from, if any.
    fn flag_register(&self) -> Option<&'static RegisterStorage> {
        None
    }

    /// The interned flag group for `mask`. Deterministic and idempotent:
    /// the same mask always returns the identical cached storage.
    fn flag_group(&self, mask: u32) -> Result<Arc<FlagGroupStorage>>;

    /// Resolve a textual flag-group name (e.g. `"CO"`) back to its
    /// storage. Inverse of [`Architecture::grf_to_string`].
    fn flag_group_by_name(&self, name: &str) -> Result<Arc<FlagGroupStorage>>;

    /// The canonical textual rendering of a flag bitmask: the single-letter
    /// name of every set bit, concatenated in the architecture's fixed bit
    /// order. A zero mask is an internal-consistency failure.
    fn grf_to_string(&self, mask: u32) -> Result<String>;

    /// A reader over `[address, image end)` with this architecture's byte
    /// order.
    fn reader<'a>(&self, image: &'a Image, address: Address) -> Result<ImageReader<'a>> {
        ImageReader::new(image, self.endian(), address)
    }

    /// A reader bounded to `[address, end)`.
    fn reader_bounded<'a>(
        &self,
        image: &'a Image,
        address: Address,
        end: Address,
    ) -> Result<ImageReader<'a>> {
        ImageReader::bounded(image, self.endian(), address, end)
    }

    /// A reader bounded to `[address, address + length)`.
    fn reader_sized<'a>(
        &self,
        image: &'a Image,
        address: Address,
        length: usize,
    ) -> Result<ImageReader<'a>> {
        ImageReader::sized(image, self.endian(), address, length)
    }

    /// A reader starting at a raw byte offset into the image.
    fn reader_at_offset<'a>(&self, image: &'a Image, offset: usize) -> Result<ImageReader<'a>> {
        ImageReader::at_offset(image, self.endian(), offset)
    }

    /// A writer positioned at `address` with this architecture's byte
    /// order.
    fn writer<'a>(&self, image: &'a mut Image, address: Address) -> Result<ImageWriter<'a>> {
        ImageWriter::new(image, self.endian(), address)
    }

    /// A lazy sequence of decoded instructions starting at the reader's
    /// current position. Each element advances the reader past the bytes
    /// it consumed; the sequence ends at reader exhaustion. Malformed
    /// bytes decode to explicit invalid instructions, never errors, so a
    /// caller can keep scanning across data interleaved with code.
    fn decoder<'a>(
        &self,
        reader: ImageReader<'a>,
    ) -> Box<dyn Iterator<Item = MachineInstruction> + 'a>;

    /// A lazy sequence of RTL clusters, one per decoded instruction, in
    /// address order. Consumes a decoder internally.
    fn rewriter<'a>(
        &self,
        reader: ImageReader<'a>,
        state: ProcessorState,
        binder: &'a dyn StorageBinder,
        host: &'a dyn RewriterHost,
    ) -> Box<dyn Iterator<Item = RtlCluster> + 'a>;

    /// A fresh processor state with no known register values.
    fn processor_state(&self) -> ProcessorState {
        ProcessorState::new()
    }

    /// A typed memory access at a byte offset from the current stack
    /// pointer.
    fn stack_access(
        &self,
        _binder: &dyn StorageBinder,
        _offset: i64,
        _data_type: DataType,
    ) -> Result<crate::machine::MemoryOperand> {
        Err(Error::Unsupported {
            arch: self.name(),
            operation: "stack access",
        })
    }

    /// Convert a raw constant into an `Address`, honoring the
    /// architecture's pointer width.
    fn address_from_constant(&self, constant: &Constant) -> Result<Address>;

    /// Read a code address of the given width from the reader, honoring
    /// endianness. `state` supplies register values for architectures
    /// whose code addresses depend on them (segmentation, banking).
    fn read_code_address(
        &self,
        _bits: usize,
        _reader: &mut ImageReader,
        _state: &ProcessorState,
    ) -> Result<Address> {
        Err(Error::Unsupported {
            arch: self.name(),
            operation: "code address reading",
        })
    }

    /// Parse a textual address in the architecture's native radix and
    /// width. Returns `None` rather than failing hard; this runs on
    /// untrusted user input.
    fn try_parse_address(&self, text: &str) -> Option<Address>;

    /// Format an address canonically. Every string this produces is
    /// accepted back by [`Architecture::try_parse_address`].
    fn format_address(&self, address: Address) -> String {
        address.to_string()
    }

    /// A lazy sequence of candidate addresses found by scanning the image
    /// for bit patterns plausible as pointers. Heuristic: not required to
    /// be exhaustive or sound.
    fn pointer_scanner<'a>(
        &self,
        _map: &'a SegmentMap,
        _reader: ImageReader<'a>,
        _known: &[Address],
        _flags: PointerScanFlags,
    ) -> Result<Box<dyn Iterator<Item = Address> + 'a>> {
        Err(Error::Unsupported {
            arch: self.name(),
            operation: "pointer scanning",
        })
    }
}

/// Resolve an architecture identifier to its implementation.
///
/// External configuration maps identifiers to display names and default
/// type libraries; this is the hook it calls to obtain the contract
/// instance itself.
pub fn architecture(id: &str) -> Option<Box<dyn Architecture>> {
    match id {
        "i8051" => Some(Box::new(i8051::I8051::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_ids() {
        let arch = architecture("i8051").unwrap();
        assert_eq!(arch.name(), "i8051");
        assert!(architecture("m68k").is_none());
    }

    #[test]
    fn unsupported_operations_are_first_class() {
        // A minimal architecture that opts out of everything optional.
        #[derive(Debug)]
        struct Bare;

        impl Architecture for Bare {
            fn name(&self) -> &'static str {
                "bare"
            }
            fn description(&self) -> &'static str {
                "a bare test architecture"
            }
            fn endian(&self) -> Endian {
                Endian::Little
            }
            fn instruction_bits(&self) -> usize {
                8
            }
            fn word_bits(&self) -> usize {
                8
            }
            fn pointer_bits(&self) -> usize {
                16
            }
            fn registers(&self) -> &'static [&'static RegisterStorage] {
                &[]
            }
            fn flag_group(&self, _: u32) -> Result<Arc<FlagGroupStorage>> {
                Err(Error::InvalidFlagGroup)
            }
            fn flag_group_by_name(&self, name: &str) -> Result<Arc<FlagGroupStorage>> {
                Err(Error::UnknownRegister(name.to_string()))
            }
            fn grf_to_string(&self, _: u32) -> Result<String> {
                Err(Error::InvalidFlagGroup)
            }
            fn decoder<'a>(
                &self,
                _: ImageReader<'a>,
            ) -> Box<dyn Iterator<Item = MachineInstruction> + 'a> {
                Box::new(std::iter::empty())
            }
            fn rewriter<'a>(
                &self,
                _: ImageReader<'a>,
                _: ProcessorState,
                _: &'a dyn StorageBinder,
                _: &'a dyn RewriterHost,
            ) -> Box<dyn Iterator<Item = RtlCluster> + 'a> {
                Box::new(std::iter::empty())
            }
            fn address_from_constant(&self, constant: &Constant) -> Result<Address> {
                Ok(Address::new(constant.value(), 16))
            }
            fn try_parse_address(&self, _: &str) -> Option<Address> {
                None
            }
        }

        let bare = Bare;
        let binder = FrameBinder::new();
        assert!(matches!(
            bare.stack_access(&binder, 4, DataType::Byte),
            Err(Error::Unsupported { .. })
        ));
        assert!(matches!(
            bare.register(0),
            Err(Error::UnknownRegister(_))
        ));
    }
}
