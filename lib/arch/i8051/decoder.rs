//! Decoder for the i8051 instruction stream.
//!
//! Decoding is purely a function of the byte stream from the current
//! reader position: one opcode byte dispatches to an operand format, which
//! reads however many further bytes it needs. Running out of bytes mid
//! instruction, or hitting the one undefined opcode (0xA5), yields an
//! explicit invalid instruction spanning at least one byte, so a scan over
//! data interleaved with code always makes forward progress.

use crate::address::Address;
use crate::arch::i8051::registers::{self, BANK};
use crate::image::ImageReader;
use crate::machine::{BitOperand, MachineInstruction, MemoryOperand, Operand};
use crate::rtl::{expr_const, Constant, Expression, InstrClass};
use crate::types::DataType;
use crate::Result;

/// Opcode identities for the i8051.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum Mnemonic {
    Acall,
    Add,
    Addc,
    Ajmp,
    Anl,
    Cjne,
    Clr,
    Cpl,
    Da,
    Dec,
    Div,
    Djnz,
    Inc,
    Jb,
    Jbc,
    Jc,
    Jmp,
    Jnb,
    Jnc,
    Jnz,
    Jz,
    Lcall,
    Ljmp,
    Mov,
    Movc,
    Movx,
    Mul,
    Nop,
    Orl,
    Pop,
    Push,
    Ret,
    Reti,
    Rl,
    Rlc,
    Rr,
    Rrc,
    Setb,
    Sjmp,
    Subb,
    Swap,
    Xch,
    Xchd,
    Xrl,
}

impl Mnemonic {
    const ALL: &'static [Mnemonic] = &[
        Mnemonic::Acall,
        Mnemonic::Add,
        Mnemonic::Addc,
        Mnemonic::Ajmp,
        Mnemonic::Anl,
        Mnemonic::Cjne,
        Mnemonic::Clr,
        Mnemonic::Cpl,
        Mnemonic::Da,
        Mnemonic::Dec,
        Mnemonic::Div,
        Mnemonic::Djnz,
        Mnemonic::Inc,
        Mnemonic::Jb,
        Mnemonic::Jbc,
        Mnemonic::Jc,
        Mnemonic::Jmp,
        Mnemonic::Jnb,
        Mnemonic::Jnc,
        Mnemonic::Jnz,
        Mnemonic::Jz,
        Mnemonic::Lcall,
        Mnemonic::Ljmp,
        Mnemonic::Mov,
        Mnemonic::Movc,
        Mnemonic::Movx,
        Mnemonic::Mul,
        Mnemonic::Nop,
        Mnemonic::Orl,
        Mnemonic::Pop,
        Mnemonic::Push,
        Mnemonic::Ret,
        Mnemonic::Reti,
        Mnemonic::Rl,
        Mnemonic::Rlc,
        Mnemonic::Rr,
        Mnemonic::Rrc,
        Mnemonic::Setb,
        Mnemonic::Sjmp,
        Mnemonic::Subb,
        Mnemonic::Swap,
        Mnemonic::Xch,
        Mnemonic::Xchd,
        Mnemonic::Xrl,
    ];

    /// Recover a mnemonic from the opcode identity stored on a decoded
    /// instruction.
    pub fn from_u16(value: u16) -> Option<Mnemonic> {
        Mnemonic::ALL.get(value as usize).copied()
    }

    pub fn string(self) -> &'static str {
        match self {
            Mnemonic::Acall => "acall",
            Mnemonic::Add => "add",
            Mnemonic::Addc => "addc",
            Mnemonic::Ajmp => "ajmp",
            Mnemonic::Anl => "anl",
            Mnemonic::Cjne => "cjne",
            Mnemonic::Clr => "clr",
            Mnemonic::Cpl => "cpl",
            Mnemonic::Da => "da",
            Mnemonic::Dec => "dec",
            Mnemonic::Div => "div",
            Mnemonic::Djnz => "djnz",
            Mnemonic::Inc => "inc",
            Mnemonic::Jb => "jb",
            Mnemonic::Jbc => "jbc",
            Mnemonic::Jc => "jc",
            Mnemonic::Jmp => "jmp",
            Mnemonic::Jnb => "jnb",
            Mnemonic::Jnc => "jnc",
            Mnemonic::Jnz => "jnz",
            Mnemonic::Jz => "jz",
            Mnemonic::Lcall => "lcall",
            Mnemonic::Ljmp => "ljmp",
            Mnemonic::Mov => "mov",
            Mnemonic::Movc => "movc",
            Mnemonic::Movx => "movx",
            Mnemonic::Mul => "mul",
            Mnemonic::Nop => "nop",
            Mnemonic::Orl => "orl",
            Mnemonic::Pop => "pop",
            Mnemonic::Push => "push",
            Mnemonic::Ret => "ret",
            Mnemonic::Reti => "reti",
            Mnemonic::Rl => "rl",
            Mnemonic::Rlc => "rlc",
            Mnemonic::Rr => "rr",
            Mnemonic::Rrc => "rrc",
            Mnemonic::Setb => "setb",
            Mnemonic::Sjmp => "sjmp",
            Mnemonic::Subb => "subb",
            Mnemonic::Swap => "swap",
            Mnemonic::Xch => "xch",
            Mnemonic::Xchd => "xchd",
            Mnemonic::Xrl => "xrl",
        }
    }
}

const LIN: InstrClass = InstrClass::LINEAR;
const JMP: InstrClass = InstrClass::TRANSFER;
const CND: InstrClass = InstrClass::from_bits_truncate(
    InstrClass::TRANSFER.bits() | InstrClass::CONDITIONAL.bits(),
);
const CAL: InstrClass =
    InstrClass::from_bits_truncate(InstrClass::TRANSFER.bits() | InstrClass::CALL.bits());
const RET: InstrClass =
    InstrClass::from_bits_truncate(InstrClass::TRANSFER.bits() | InstrClass::RETURN.bits());

/// A lazy, forward-only sequence of decoded i8051 instructions.
pub struct Decoder<'a> {
    reader: ImageReader<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(reader: ImageReader<'a>) -> Decoder<'a> {
        Decoder { reader }
    }

    /// The reader, for callers that need the resume position.
    pub fn reader(&self) -> &ImageReader<'a> {
        &self.reader
    }

    fn accumulator(&self) -> Operand {
        Operand::Register(&registers::A)
    }

    fn bank_register(&self, opcode: u8) -> Operand {
        Operand::Register(BANK[(opcode & 0x07) as usize])
    }

    /// A direct-address operand. Named special function registers decode
    /// as register operands; everything else is a memory operand with a
    /// constant effective address.
    fn direct(&mut self) -> Result<Operand> {
        let direct = self.reader.read_u8()?;
        Ok(match registers::sfr(direct) {
            Some(register) => Operand::Register(register),
            None => Operand::Memory(MemoryOperand::new(
                DataType::Byte,
                expr_const(direct as u64, 8),
            )),
        })
    }

    fn immediate8(&mut self) -> Result<Operand> {
        let value = self.reader.read_u8()?;
        Ok(Operand::Immediate(Constant::new(value as u64, 8)))
    }

    fn immediate16(&mut self) -> Result<Operand> {
        let value = self.reader.read_u16()?;
        Ok(Operand::Immediate(Constant::new(value as u64, 16)))
    }

    /// A register-indirect memory operand through R0 or R1.
    fn indirect(&mut self, opcode: u8) -> Operand {
        let register = BANK[(opcode & 0x01) as usize];
        Operand::Memory(MemoryOperand::new(DataType::Byte, register.expression()))
    }

    fn bit(&mut self, negated: bool) -> Result<Operand> {
        let encoded = self.reader.read_u8()?;
        // Bit addresses below 0x80 index the bit-addressable RAM at
        // 0x20..0x30; the rest name a bit of an SFR on an 8-aligned
        // address.
        let byte_address = if encoded < 0x80 {
            0x20 + (encoded >> 3)
        } else {
            encoded & 0xF8
        };
        Ok(Operand::Bit(BitOperand::new(
            byte_address,
            encoded & 0x07,
            negated,
        )))
    }

    /// The PSW carry bit as an operand, for the opcodes that name it
    /// implicitly.
    fn carry(&self) -> Operand {
        Operand::Bit(BitOperand::new(registers::PSW_DIRECT, 7, false))
    }

    /// A relative branch target. The displacement byte is relative to the
    /// address of the next instruction, which is the cursor position once
    /// all operand bytes are consumed.
    fn relative(&mut self) -> Result<Operand> {
        let displacement = self.reader.read_u8()? as i8;
        Ok(Operand::Address(
            self.reader.address().wrapping_offset(displacement as i64),
        ))
    }

    fn address16(&mut self) -> Result<Operand> {
        let target = self.reader.read_u16()?;
        Ok(Operand::Address(Address::new(target as u64, 16)))
    }

    /// An 11-bit in-page target: the top three bits come from the opcode,
    /// the page from the address of the next instruction.
    fn address11(&mut self, opcode: u8) -> Result<Operand> {
        let low = self.reader.read_u8()? as u64;
        let next = self.reader.address().value();
        let target = (next & 0xF800) | (((opcode & 0xE0) as u64) << 3) | low;
        Ok(Operand::Address(Address::new(target, 16)))
    }

    /// Code memory indexed by the accumulator plus a base register.
    fn code_indexed(&self, base: Expression) -> Result<Operand> {
        let index = Expression::zext(16, registers::A.expression())?;
        Ok(Operand::Memory(MemoryOperand::new(
            DataType::Byte,
            Expression::add(index, base)?,
        )))
    }

    fn decode(
        &mut self,
        opcode: u8,
    ) -> Result<(Mnemonic, InstrClass, Vec<Operand>)> {
        use Mnemonic::*;

        // The low nibbles 0x8..0xF of most rows address the register bank,
        // and nibbles 0x6/0x7 address indirectly through R0/R1.
        Ok(match opcode {
            0x00 => (Nop, LIN, vec![]),
            0x01 | 0x21 | 0x41 | 0x61 | 0x81 | 0xA1 | 0xC1 | 0xE1 => {
                (Ajmp, JMP, vec![self.address11(opcode)?])
            }
            0x02 => (Ljmp, JMP, vec![self.address16()?]),
            0x03 => (Rr, LIN, vec![self.accumulator()]),
            0x04 => (Inc, LIN, vec![self.accumulator()]),
            0x05 => (Inc, LIN, vec![self.direct()?]),
            0x06 | 0x07 => (Inc, LIN, vec![self.indirect(opcode)]),
            0x08..=0x0F => (Inc, LIN, vec![self.bank_register(opcode)]),
            0x10 => {
                let bit = self.bit(false)?;
                (Jbc, CND, vec![bit, self.relative()?])
            }
            0x11 | 0x31 | 0x51 | 0x71 | 0x91 | 0xB1 | 0xD1 | 0xF1 => {
                (Acall, CAL, vec![self.address11(opcode)?])
            }
            0x12 => (Lcall, CAL, vec![self.address16()?]),
            0x13 => (Rrc, LIN, vec![self.accumulator()]),
            0x14 => (Dec, LIN, vec![self.accumulator()]),
            0x15 => (Dec, LIN, vec![self.direct()?]),
            0x16 | 0x17 => (Dec, LIN, vec![self.indirect(opcode)]),
            0x18..=0x1F => (Dec, LIN, vec![self.bank_register(opcode)]),
            0x20 => {
                let bit = self.bit(false)?;
                (Jb, CND, vec![bit, self.relative()?])
            }
            0x22 => (Ret, RET, vec![]),
            0x23 => (Rl, LIN, vec![self.accumulator()]),
            0x24 => (Add, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x25 => (Add, LIN, vec![self.accumulator(), self.direct()?]),
            0x26 | 0x27 => (Add, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0x28..=0x2F => (Add, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0x30 => {
                let bit = self.bit(false)?;
                (Jnb, CND, vec![bit, self.relative()?])
            }
            0x32 => (Reti, RET, vec![]),
            0x33 => (Rlc, LIN, vec![self.accumulator()]),
            0x34 => (Addc, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x35 => (Addc, LIN, vec![self.accumulator(), self.direct()?]),
            0x36 | 0x37 => (Addc, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0x38..=0x3F => (Addc, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0x40 => (Jc, CND, vec![self.relative()?]),
            0x42 => (Orl, LIN, vec![self.direct()?, self.accumulator()]),
            0x43 => {
                let dst = self.direct()?;
                (Orl, LIN, vec![dst, self.immediate8()?])
            }
            0x44 => (Orl, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x45 => (Orl, LIN, vec![self.accumulator(), self.direct()?]),
            0x46 | 0x47 => (Orl, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0x48..=0x4F => (Orl, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0x50 => (Jnc, CND, vec![self.relative()?]),
            0x52 => (Anl, LIN, vec![self.direct()?, self.accumulator()]),
            0x53 => {
                let dst = self.direct()?;
                (Anl, LIN, vec![dst, self.immediate8()?])
            }
            0x54 => (Anl, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x55 => (Anl, LIN, vec![self.accumulator(), self.direct()?]),
            0x56 | 0x57 => (Anl, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0x58..=0x5F => (Anl, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0x60 => (Jz, CND, vec![self.relative()?]),
            0x62 => (Xrl, LIN, vec![self.direct()?, self.accumulator()]),
            0x63 => {
                let dst = self.direct()?;
                (Xrl, LIN, vec![dst, self.immediate8()?])
            }
            0x64 => (Xrl, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x65 => (Xrl, LIN, vec![self.accumulator(), self.direct()?]),
            0x66 | 0x67 => (Xrl, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0x68..=0x6F => (Xrl, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0x70 => (Jnz, CND, vec![self.relative()?]),
            0x72 => (Orl, LIN, vec![self.carry(), self.bit(false)?]),
            0x73 => {
                let target = self.code_indexed(registers::DPTR.expression())?;
                (Jmp, JMP, vec![target])
            }
            0x74 => (Mov, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x75 => {
                let dst = self.direct()?;
                (Mov, LIN, vec![dst, self.immediate8()?])
            }
            0x76 | 0x77 => {
                let dst = self.indirect(opcode);
                (Mov, LIN, vec![dst, self.immediate8()?])
            }
            0x78..=0x7F => {
                let dst = self.bank_register(opcode);
                (Mov, LIN, vec![dst, self.immediate8()?])
            }
            0x80 => (Sjmp, JMP, vec![self.relative()?]),
            0x82 => (Anl, LIN, vec![self.carry(), self.bit(false)?]),
            0x83 => {
                // The base is the address of the next instruction, known
                // at decode time.
                let pc = expr_const(self.reader.address().value(), 16);
                (Movc, LIN, vec![self.accumulator(), self.code_indexed(pc)?])
            }
            0x84 => (
                Div,
                LIN,
                vec![self.accumulator(), Operand::Register(&registers::B)],
            ),
            0x85 => {
                // The source direct address is encoded before the
                // destination.
                let src = self.direct()?;
                let dst = self.direct()?;
                (Mov, LIN, vec![dst, src])
            }
            0x86 | 0x87 => {
                let src = self.indirect(opcode);
                (Mov, LIN, vec![self.direct()?, src])
            }
            0x88..=0x8F => {
                let src = self.bank_register(opcode);
                (Mov, LIN, vec![self.direct()?, src])
            }
            0x90 => (
                Mov,
                LIN,
                vec![Operand::Register(&registers::DPTR), self.immediate16()?],
            ),
            0x92 => {
                let bit = self.bit(false)?;
                (Mov, LIN, vec![bit, self.carry()])
            }
            0x93 => (
                Movc,
                LIN,
                vec![
                    self.accumulator(),
                    self.code_indexed(registers::DPTR.expression())?,
                ],
            ),
            0x94 => (Subb, LIN, vec![self.accumulator(), self.immediate8()?]),
            0x95 => (Subb, LIN, vec![self.accumulator(), self.direct()?]),
            0x96 | 0x97 => (Subb, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0x98..=0x9F => (Subb, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0xA0 => (Orl, LIN, vec![self.carry(), self.bit(true)?]),
            0xA2 => (Mov, LIN, vec![self.carry(), self.bit(false)?]),
            0xA3 => (Inc, LIN, vec![Operand::Register(&registers::DPTR)]),
            0xA4 => (
                Mul,
                LIN,
                vec![self.accumulator(), Operand::Register(&registers::B)],
            ),
            // 0xA5 is the one undefined opcode.
            0xA6 | 0xA7 => {
                let dst = self.indirect(opcode);
                (Mov, LIN, vec![dst, self.direct()?])
            }
            0xA8..=0xAF => {
                let dst = self.bank_register(opcode);
                (Mov, LIN, vec![dst, self.direct()?])
            }
            0xB0 => (Anl, LIN, vec![self.carry(), self.bit(true)?]),
            0xB2 => (Cpl, LIN, vec![self.bit(false)?]),
            0xB3 => (Cpl, LIN, vec![self.carry()]),
            0xB4 => {
                let imm = self.immediate8()?;
                (Cjne, CND, vec![self.accumulator(), imm, self.relative()?])
            }
            0xB5 => {
                let direct = self.direct()?;
                (Cjne, CND, vec![self.accumulator(), direct, self.relative()?])
            }
            0xB6 | 0xB7 => {
                let lhs = self.indirect(opcode);
                let imm = self.immediate8()?;
                (Cjne, CND, vec![lhs, imm, self.relative()?])
            }
            0xB8..=0xBF => {
                let lhs = self.bank_register(opcode);
                let imm = self.immediate8()?;
                (Cjne, CND, vec![lhs, imm, self.relative()?])
            }
            0xC0 => (Push, LIN, vec![self.direct()?]),
            0xC2 => (Clr, LIN, vec![self.bit(false)?]),
            0xC3 => (Clr, LIN, vec![self.carry()]),
            0xC4 => (Swap, LIN, vec![self.accumulator()]),
            0xC5 => (Xch, LIN, vec![self.accumulator(), self.direct()?]),
            0xC6 | 0xC7 => (Xch, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0xC8..=0xCF => (Xch, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0xD0 => (Pop, LIN, vec![self.direct()?]),
            0xD2 => (Setb, LIN, vec![self.bit(false)?]),
            0xD3 => (Setb, LIN, vec![self.carry()]),
            0xD4 => (Da, LIN, vec![self.accumulator()]),
            0xD5 => {
                let direct = self.direct()?;
                (Djnz, CND, vec![direct, self.relative()?])
            }
            0xD6 | 0xD7 => (Xchd, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0xD8..=0xDF => {
                let register = self.bank_register(opcode);
                (Djnz, CND, vec![register, self.relative()?])
            }
            0xE0 => {
                let src = Operand::Memory(MemoryOperand::new(
                    DataType::Byte,
                    registers::DPTR.expression(),
                ));
                (Movx, LIN, vec![self.accumulator(), src])
            }
            0xE2 | 0xE3 => {
                let src = self.indirect(opcode);
                (Movx, LIN, vec![self.accumulator(), src])
            }
            0xE4 => (Clr, LIN, vec![self.accumulator()]),
            0xE5 => (Mov, LIN, vec![self.accumulator(), self.direct()?]),
            0xE6 | 0xE7 => (Mov, LIN, vec![self.accumulator(), self.indirect(opcode)]),
            0xE8..=0xEF => (Mov, LIN, vec![self.accumulator(), self.bank_register(opcode)]),
            0xF0 => {
                let dst = Operand::Memory(MemoryOperand::new(
                    DataType::Byte,
                    registers::DPTR.expression(),
                ));
                (Movx, LIN, vec![dst, self.accumulator()])
            }
            0xF2 | 0xF3 => {
                let dst = self.indirect(opcode);
                (Movx, LIN, vec![dst, self.accumulator()])
            }
            0xF4 => (Cpl, LIN, vec![self.accumulator()]),
            0xF5 => (Mov, LIN, vec![self.direct()?, self.accumulator()]),
            0xF6 | 0xF7 => {
                let dst = self.indirect(opcode);
                (Mov, LIN, vec![dst, self.accumulator()])
            }
            0xF8..=0xFF => {
                let dst = self.bank_register(opcode);
                (Mov, LIN, vec![dst, self.accumulator()])
            }
            _ => {
                return Err(crate::Error::Custom(format!(
                    "undefined opcode 0x{:02x}",
                    opcode
                )))
            }
        })
    }
}

impl Iterator for Decoder<'_> {
    type Item = MachineInstruction;

    fn next(&mut self) -> Option<MachineInstruction> {
        if self.reader.is_exhausted() {
            return None;
        }
        let address = self.reader.address();
        let opcode = self.reader.read_u8().ok()?;

        match self.decode(opcode) {
            Ok((mnemonic, class, operands)) => {
                let length = self
                    .reader
                    .address()
                    .distance_from(address)
                    .unwrap_or(1) as usize;
                Some(MachineInstruction::new(
                    address,
                    length,
                    mnemonic as u16,
                    mnemonic.string(),
                    class,
                    operands,
                ))
            }
            Err(_) => {
                // Undefined opcode, or the stream ended mid-instruction.
                // The placeholder spans whatever was consumed so the
                // sequence keeps advancing.
                log::debug!("invalid i8051 encoding at 0x{}", address);
                let length = self
                    .reader
                    .address()
                    .distance_from(address)
                    .unwrap_or(1)
                    .max(1) as usize;
                Some(MachineInstruction::invalid(address, length))
            }
        }
    }
}
