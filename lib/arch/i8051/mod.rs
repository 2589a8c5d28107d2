//! The Intel 8051 microcontroller core.
//!
//! The reference architecture of this crate: an 8-bit accumulator machine
//! with big-endian 16-bit immediates, 16-bit code addresses, a one-byte
//! stack pointer into internal RAM, and status flags in the PSW register.

mod decoder;
pub mod registers;
mod rewriter;
#[cfg(test)]
mod test;

pub use self::decoder::{Decoder, Mnemonic};
pub use self::rewriter::Rewriter;

use self::registers::{FlagM, FLAG_LETTERS, PSW, REGISTERS, SP};
use crate::address::Address;
use crate::arch::{
    Architecture, FlagGroupCache, FlagGroupStorage, PointerScanFlags, PointerScanner,
    RegisterStorage, RewriterHost, StorageBinder,
};
use crate::image::{ImageReader, SegmentMap};
use crate::machine::{MachineInstruction, MemoryOperand};
use crate::rtl::{expr_const, Constant, Expression, RtlCluster};
use crate::state::ProcessorState;
use crate::types::{DataType, Endian};
use crate::{Error, Result};
use std::sync::Arc;

/// The i8051 architecture.
#[derive(Debug, Default)]
pub struct I8051 {
    flag_groups: FlagGroupCache,
}

impl I8051 {
    pub fn new() -> I8051 {
        I8051 {
            flag_groups: FlagGroupCache::new(),
        }
    }

    fn grf_string(mask: u32) -> Result<String> {
        if mask & !FlagM::all().bits() != 0 {
            return Err(Error::InvalidFlagGroup);
        }
        let name: String = FLAG_LETTERS
            .iter()
            .filter(|(flag, _)| mask & flag.bits() != 0)
            .map(|(_, letter)| letter)
            .collect();
        // A flag group must always name at least one bit.
        if name.is_empty() {
            return Err(Error::InvalidFlagGroup);
        }
        Ok(name)
    }
}

impl Architecture for I8051 {
    fn name(&self) -> &'static str {
        "i8051"
    }

    fn description(&self) -> &'static str {
        "Intel i8051"
    }

    fn endian(&self) -> Endian {
        Endian::Big
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
        &REGISTERS
    }

    fn stack_register(&self) -> Option<&'static RegisterStorage> {
        Some(&SP)
    }

    fn flag_register(&self) -> Option<&'static RegisterStorage> {
        Some(&PSW)
    }

    fn flag_group(&self, mask: u32) -> Result<Arc<FlagGroupStorage>> {
        self.flag_groups.get_or_insert_with(mask, || {
            let name = I8051::grf_string(mask)?;
            let data_type = if mask.count_ones() == 1 {
                DataType::Bool
            } else {
                DataType::Byte
            };
            Ok(FlagGroupStorage::new(&PSW, mask, name, data_type))
        })
    }

    fn flag_group_by_name(&self, name: &str) -> Result<Arc<FlagGroupStorage>> {
        let mut mask = 0u32;
        for letter in name.chars() {
            let flag = FLAG_LETTERS
                .iter()
                .find(|(_, l)| *l == letter)
                .map(|(flag, _)| flag)
                .ok_or_else(|| Error::Custom(format!("unknown flag letter '{}'", letter)))?;
            mask |= flag.bits();
        }
        self.flag_group(mask)
    }

    fn grf_to_string(&self, mask: u32) -> Result<String> {
        I8051::grf_string(mask)
    }

    fn decoder<'a>(
        &self,
        reader: ImageReader<'a>,
    ) -> Box<dyn Iterator<Item = MachineInstruction> + 'a> {
        Box::new(Decoder::new(reader))
    }

    fn rewriter<'a>(
        &self,
        reader: ImageReader<'a>,
        state: ProcessorState,
        binder: &'a dyn StorageBinder,
        host: &'a dyn RewriterHost,
    ) -> Box<dyn Iterator<Item = RtlCluster> + 'a> {
        // Single-bit masks always form valid groups; resolve the four the
        // rewriter assigns up front so iteration cannot fail on them.
        let flags = rewriter::FlagScalars::resolve(self, binder)
            .expect("single-bit PSW flag groups must resolve");
        Box::new(Rewriter::new(Decoder::new(reader), state, binder, host, flags))
    }

    fn stack_access(
        &self,
        binder: &dyn StorageBinder,
        offset: i64,
        data_type: DataType,
    ) -> Result<MemoryOperand> {
        let sp = binder.bind_register(&SP);
        let effective_address = Expression::add(
            Expression::scalar(sp),
            expr_const(offset as u64 & 0xFF, 8),
        )?;
        Ok(MemoryOperand::new(data_type, effective_address))
    }

    fn address_from_constant(&self, constant: &Constant) -> Result<Address> {
        Ok(Address::new(constant.value(), 16))
    }

    fn read_code_address(
        &self,
        bits: usize,
        reader: &mut ImageReader,
        _state: &ProcessorState,
    ) -> Result<Address> {
        // The 8051 has only full-width code addresses.
        if bits != 16 {
            return Err(Error::Unsupported {
                arch: self.name(),
                operation: "sub-width code address reading",
            });
        }
        Ok(Address::new(reader.read_u16()? as u64, 16))
    }

    fn try_parse_address(&self, text: &str) -> Option<Address> {
        // Native rendering is 16-bit bare hexadecimal; anything longer
        // than four digits is out of range for this address space.
        if text.is_empty() || text.len() > 4 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(text, 16)
            .ok()
            .map(|value| Address::new(value, 16))
    }

    fn pointer_scanner<'a>(
        &self,
        map: &'a SegmentMap,
        reader: ImageReader<'a>,
        known: &[Address],
        flags: PointerScanFlags,
    ) -> Result<Box<dyn Iterator<Item = Address> + 'a>> {
        Ok(Box::new(PointerScanner::new(
            map,
            reader,
            known,
            flags,
            self.pointer_bits(),
        )))
    }
}
