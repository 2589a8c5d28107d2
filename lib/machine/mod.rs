//! Decoded machine instructions and their operands.
//!
//! These types are architecture-neutral: a decoder for any CPU family
//! produces them, and consumers above this crate render and index them
//! without knowing which family they came from. The opcode identity is an
//! architecture-defined number plus a mnemonic; operand structure is the
//! small closed set in [`Operand`].

mod operand;

pub use self::operand::{BitOperand, MemoryOperand, Operand};

use crate::address::Address;
use crate::rtl::InstrClass;
use std::fmt;

/// One decoded machine instruction.
///
/// Immutable once produced. An instruction that did not decode is still a
/// `MachineInstruction`, with class [`InstrClass::INVALID`] and a length of
/// at least one byte, so a scan of interleaved code and data always makes
/// forward progress.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineInstruction {
    address: Address,
    length: usize,
    opcode: u16,
    mnemonic: &'static str,
    class: InstrClass,
    operands: Vec<Operand>,
}

impl MachineInstruction {
    pub fn new(
        address: Address,
        length: usize,
        opcode: u16,
        mnemonic: &'static str,
        class: InstrClass,
        operands: Vec<Operand>,
    ) -> MachineInstruction {
        MachineInstruction {
            address,
            length,
            opcode,
            mnemonic,
            class,
            operands,
        }
    }

    /// An explicit invalid-instruction placeholder spanning `length` bytes.
    pub fn invalid(address: Address, length: usize) -> MachineInstruction {
        MachineInstruction {
            address,
            length: length.max(1),
            opcode: u16::MAX,
            mnemonic: "invalid",
            class: InstrClass::INVALID,
            operands: Vec::new(),
        }
    }

    /// The address this instruction was decoded at.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The length of this instruction in bytes. Always at least one.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The architecture-defined opcode identity.
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn class(&self) -> InstrClass {
        self.class
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn is_valid(&self) -> bool {
        !self.class.contains(InstrClass::INVALID)
    }
}

impl fmt::Display for MachineInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, "\t{}", operand)?;
            } else {
                write!(f, ",{}", operand)?;
            }
        }
        Ok(())
    }
}
