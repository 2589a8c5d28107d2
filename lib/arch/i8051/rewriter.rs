//! Rewriter for decoded i8051 instructions.
//!
//! Each machine instruction becomes one self-contained RTL cluster. Flag
//! effects are explicit: every instruction the 8051 defines as touching
//! PSW flags assigns the corresponding flag-group scalars, so later
//! analyses treat flags like any other storage. Instructions whose
//! semantics are not modeled, and bytes that never decoded, become
//! explicit intrinsic clusters rather than being skipped, preserving
//! address continuity.

use crate::arch::i8051::decoder::{Decoder, Mnemonic};
use crate::arch::i8051::registers::{self, FlagM};
use crate::arch::{Architecture, RewriterHost, StorageBinder};
use crate::machine::{BitOperand, MachineInstruction, Operand};
use crate::rtl::{expr_const, Constant, Expression, Intrinsic, Operation, RtlCluster, Scalar};
use crate::state::ProcessorState;
use crate::Result;

/// The bound scalars of the four PSW flag groups the rewriter assigns.
pub struct FlagScalars {
    c: Scalar,
    ac: Scalar,
    ov: Scalar,
    p: Scalar,
}

impl FlagScalars {
    pub fn resolve(
        arch: &crate::arch::i8051::I8051,
        binder: &dyn StorageBinder,
    ) -> Result<FlagScalars> {
        Ok(FlagScalars {
            c: binder.bind_flag_group(&*arch.flag_group(FlagM::C.bits())?),
            ac: binder.bind_flag_group(&*arch.flag_group(FlagM::H.bits())?),
            ov: binder.bind_flag_group(&*arch.flag_group(FlagM::O.bits())?),
            p: binder.bind_flag_group(&*arch.flag_group(FlagM::P.bits())?),
        })
    }

    /// The flag scalar stored at the given PSW bit position, for bit
    /// operands that name a status flag directly.
    fn for_psw_bit(&self, bit: u8) -> Option<&Scalar> {
        let mask = registers::psw_bit_mask(bit)?;
        if mask == FlagM::C {
            Some(&self.c)
        } else if mask == FlagM::H {
            Some(&self.ac)
        } else if mask == FlagM::O {
            Some(&self.ov)
        } else if mask == FlagM::P {
            Some(&self.p)
        } else {
            None
        }
    }
}

/// A lazy sequence of RTL clusters over an i8051 instruction stream.
pub struct Rewriter<'a> {
    decoder: Decoder<'a>,
    state: ProcessorState,
    binder: &'a dyn StorageBinder,
    host: &'a dyn RewriterHost,
    flags: FlagScalars,
    temp_index: usize,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(
        decoder: Decoder<'a>,
        state: ProcessorState,
        binder: &'a dyn StorageBinder,
        host: &'a dyn RewriterHost,
        flags: FlagScalars,
    ) -> Rewriter<'a> {
        Rewriter {
            decoder,
            state,
            binder,
            host,
            flags,
            temp_index: 0,
        }
    }

    fn temp(&mut self, bits: usize) -> Scalar {
        let scalar = Scalar::new(format!("v{}", self.temp_index), bits);
        self.temp_index += 1;
        scalar
    }

    fn accumulator(&self) -> Scalar {
        self.binder.bind_register(&registers::A)
    }

    /// Bind the register scalars a decode-time effective address names,
    /// substituting values the processor state knows.
    fn bind_expression(&self, expression: &Expression) -> Expression {
        let bind = |e: &Expression| Box::new(self.bind_expression(e));
        match expression {
            Expression::Scalar(scalar) => {
                let register = registers::REGISTERS
                    .iter()
                    .copied()
                    .find(|register| register.name() == scalar.name());
                match register {
                    Some(register) => match self.state.get(register) {
                        Some(value) => expr_const(value.value(), register.bits()),
                        None => Expression::scalar(self.binder.bind_register(register)),
                    },
                    None => Expression::Scalar(scalar.clone()),
                }
            }
            Expression::Constant(constant) => Expression::Constant(constant.clone()),
            Expression::Add(lhs, rhs) => Expression::Add(bind(lhs), bind(rhs)),
            Expression::Sub(lhs, rhs) => Expression::Sub(bind(lhs), bind(rhs)),
            Expression::Mulu(lhs, rhs) => Expression::Mulu(bind(lhs), bind(rhs)),
            Expression::Divu(lhs, rhs) => Expression::Divu(bind(lhs), bind(rhs)),
            Expression::Modu(lhs, rhs) => Expression::Modu(bind(lhs), bind(rhs)),
            Expression::Muls(lhs, rhs) => Expression::Muls(bind(lhs), bind(rhs)),
            Expression::Divs(lhs, rhs) => Expression::Divs(bind(lhs), bind(rhs)),
            Expression::Mods(lhs, rhs) => Expression::Mods(bind(lhs), bind(rhs)),
            Expression::And(lhs, rhs) => Expression::And(bind(lhs), bind(rhs)),
            Expression::Or(lhs, rhs) => Expression::Or(bind(lhs), bind(rhs)),
            Expression::Xor(lhs, rhs) => Expression::Xor(bind(lhs), bind(rhs)),
            Expression::Shl(lhs, rhs) => Expression::Shl(bind(lhs), bind(rhs)),
            Expression::Shr(lhs, rhs) => Expression::Shr(bind(lhs), bind(rhs)),
            Expression::Cmpeq(lhs, rhs) => Expression::Cmpeq(bind(lhs), bind(rhs)),
            Expression::Cmpneq(lhs, rhs) => Expression::Cmpneq(bind(lhs), bind(rhs)),
            Expression::Cmplts(lhs, rhs) => Expression::Cmplts(bind(lhs), bind(rhs)),
            Expression::Cmpltu(lhs, rhs) => Expression::Cmpltu(bind(lhs), bind(rhs)),
            Expression::Zext(bits, src) => Expression::Zext(*bits, bind(src)),
            Expression::Sext(bits, src) => Expression::Sext(*bits, bind(src)),
            Expression::Trun(bits, src) => Expression::Trun(*bits, bind(src)),
        }
    }

    /// The value of an operand as an expression, emitting a load for
    /// memory operands.
    fn read_operand(
        &mut self,
        operations: &mut Vec<Operation>,
        operand: &Operand,
    ) -> Result<Expression> {
        match operand {
            Operand::Register(register) => {
                Ok(Expression::scalar(self.binder.bind_register(register)))
            }
            Operand::Immediate(constant) => Ok(Expression::constant(constant.clone())),
            Operand::Address(address) => Ok(expr_const(address.value(), address.bits())),
            Operand::Memory(memory) => {
                let address = self.bind_expression(memory.effective_address());
                let value = self.temp(memory.data_type().bits());
                operations.push(Operation::load(value.clone(), address));
                Ok(value.into())
            }
            Operand::Bit(bit) => self.read_bit(operations, bit),
        }
    }

    /// Write `value` to an operand, emitting a store for memory operands.
    fn write_operand(
        &mut self,
        operations: &mut Vec<Operation>,
        operand: &Operand,
        value: Expression,
    ) -> Result<()> {
        match operand {
            Operand::Register(register) => {
                // Writes through the data pointer lose any value the state
                // was tracking for it.
                if registers::DPTR.number() == register.number()
                    || registers::DPL.number() == register.number()
                    || registers::DPH.number() == register.number()
                {
                    self.state.invalidate(&registers::DPTR);
                }
                operations.push(Operation::assign(
                    self.binder.bind_register(register),
                    value,
                ));
                Ok(())
            }
            Operand::Memory(memory) => {
                let address = self.bind_expression(memory.effective_address());
                operations.push(Operation::store(address, value));
                Ok(())
            }
            Operand::Bit(bit) => self.write_bit(operations, bit, value),
            Operand::Immediate(_) | Operand::Address(_) => {
                Err("write to a read-only operand".into())
            }
        }
    }

    /// The value of a bit operand as a 1-bit expression.
    fn read_bit(
        &mut self,
        operations: &mut Vec<Operation>,
        bit: &BitOperand,
    ) -> Result<Expression> {
        let value = if bit.address() == registers::PSW_DIRECT {
            match self.flags.for_psw_bit(bit.bit()) {
                Some(flag) => Expression::scalar(flag.clone()),
                None => self.extract_bit(operations, bit)?,
            }
        } else {
            self.extract_bit(operations, bit)?
        };
        if bit.negated() {
            Expression::cmpeq(value, expr_const(0, 1))
        } else {
            Ok(value)
        }
    }

    fn extract_bit(
        &mut self,
        operations: &mut Vec<Operation>,
        bit: &BitOperand,
    ) -> Result<Expression> {
        let byte = self.temp(8);
        operations.push(Operation::load(
            byte.clone(),
            expr_const(bit.address() as u64, 8),
        ));
        Expression::trun(
            1,
            Expression::shr(byte.into(), expr_const(bit.bit() as u64, 8))?,
        )
    }

    /// Assign a 1-bit `value` to a bit operand.
    fn write_bit(
        &mut self,
        operations: &mut Vec<Operation>,
        bit: &BitOperand,
        value: Expression,
    ) -> Result<()> {
        if bit.address() == registers::PSW_DIRECT {
            if let Some(flag) = self.flags.for_psw_bit(bit.bit()) {
                operations.push(Operation::assign(flag.clone(), value));
                return Ok(());
            }
        }
        let byte = self.temp(8);
        operations.push(Operation::load(
            byte.clone(),
            expr_const(bit.address() as u64, 8),
        ));
        let cleared = Expression::and(
            byte.into(),
            expr_const(!(1u64 << bit.bit()) & 0xFF, 8),
        )?;
        let inserted = Expression::or(
            cleared,
            Expression::shl(
                Expression::zext(8, value)?,
                expr_const(bit.bit() as u64, 8),
            )?,
        )?;
        operations.push(Operation::store(
            expr_const(bit.address() as u64, 8),
            inserted,
        ));
        Ok(())
    }

    /// Emit the C, AC, OV and P assignments of an 8-bit add or subtract.
    ///
    /// `wide` holds the 16-bit result including the carry bit, `result`
    /// its 8-bit truncation; `a` and `s` are the original operands.
    fn arith_flags(
        &mut self,
        operations: &mut Vec<Operation>,
        a: &Expression,
        s: &Expression,
        wide: &Scalar,
        result: &Scalar,
        subtract: bool,
    ) -> Result<()> {
        let result_expr = Expression::scalar(result.clone());

        // Carry, or borrow, out of bit 7.
        operations.push(Operation::assign(
            self.flags.c.clone(),
            Expression::trun(
                1,
                Expression::shr(wide.clone().into(), expr_const(8, 16))?,
            )?,
        ));

        // Auxiliary carry: the carry into bit 4, recovered from the
        // operand/result carry bits.
        let carries = Expression::xor(
            Expression::xor(a.clone(), s.clone())?,
            result_expr.clone(),
        )?;
        operations.push(Operation::assign(
            self.flags.ac.clone(),
            Expression::trun(
                1,
                Expression::shr(
                    Expression::and(carries, expr_const(0x10, 8))?,
                    expr_const(4, 8),
                )?,
            )?,
        ));

        // Signed overflow.
        let overflow = if subtract {
            Expression::and(
                Expression::xor(a.clone(), s.clone())?,
                Expression::xor(a.clone(), result_expr.clone())?,
            )?
        } else {
            Expression::and(
                Expression::xor(a.clone(), result_expr.clone())?,
                Expression::xor(s.clone(), result_expr.clone())?,
            )?
        };
        operations.push(Operation::assign(
            self.flags.ov.clone(),
            Expression::trun(1, Expression::shr(overflow, expr_const(7, 8))?)?,
        ));

        self.parity(operations, result_expr)
    }

    /// Assign P from the parity of `value` by xor-folding it down to one
    /// bit.
    fn parity(&mut self, operations: &mut Vec<Operation>, value: Expression) -> Result<()> {
        let fold4 = self.temp(8);
        operations.push(Operation::assign(
            fold4.clone(),
            Expression::xor(
                value.clone(),
                Expression::shr(value, expr_const(4, 8))?,
            )?,
        ));
        let fold2 = self.temp(8);
        operations.push(Operation::assign(
            fold2.clone(),
            Expression::xor(
                fold4.clone().into(),
                Expression::shr(fold4.into(), expr_const(2, 8))?,
            )?,
        ));
        operations.push(Operation::assign(
            self.flags.p.clone(),
            Expression::trun(
                1,
                Expression::xor(
                    fold2.clone().into(),
                    Expression::shr(fold2.into(), expr_const(1, 8))?,
                )?,
            )?,
        ));
        Ok(())
    }

    /// ADD, ADDC and SUBB, which share their flag behavior.
    fn arithmetic(
        &mut self,
        operations: &mut Vec<Operation>,
        src: &Operand,
        carry_in: bool,
        subtract: bool,
    ) -> Result<()> {
        let a_scalar = self.accumulator();
        let a = Expression::scalar(a_scalar.clone());
        let s = self.read_operand(operations, src)?;

        let mut wide_expr = if subtract {
            Expression::sub(
                Expression::zext(16, a.clone())?,
                Expression::zext(16, s.clone())?,
            )?
        } else {
            Expression::add(
                Expression::zext(16, a.clone())?,
                Expression::zext(16, s.clone())?,
            )?
        };
        if carry_in {
            let carry = Expression::zext(16, Expression::scalar(self.flags.c.clone()))?;
            wide_expr = if subtract {
                Expression::sub(wide_expr, carry)?
            } else {
                Expression::add(wide_expr, carry)?
            };
        }

        let wide = self.temp(16);
        operations.push(Operation::assign(wide.clone(), wide_expr));
        let result = self.temp(8);
        operations.push(Operation::assign(
            result.clone(),
            Expression::trun(8, wide.clone().into())?,
        ));

        self.arith_flags(operations, &a, &s, &wide, &result, subtract)?;
        operations.push(Operation::assign(a_scalar, result.into()));
        Ok(())
    }

    /// ANL, ORL and XRL in all their operand forms.
    fn logic(
        &mut self,
        operations: &mut Vec<Operation>,
        dst: &Operand,
        src: &Operand,
        combine: fn(Expression, Expression) -> Result<Expression>,
    ) -> Result<()> {
        if let Operand::Bit(bit) = dst {
            // The carry-and-bit forms: anl C,bit / orl C,/bit.
            let carry = self.read_bit(operations, bit)?;
            let value = self.read_operand(operations, src)?;
            let combined = combine(carry, value)?;
            self.write_bit(operations, bit, combined)?;
            return Ok(());
        }
        let lhs = self.read_operand(operations, dst)?;
        let rhs = self.read_operand(operations, src)?;
        let combined = combine(lhs, rhs)?;
        self.write_operand(operations, dst, combined)
    }

    fn mov(
        &mut self,
        operations: &mut Vec<Operation>,
        dst: &Operand,
        src: &Operand,
    ) -> Result<()> {
        let value = self.read_operand(operations, src)?;
        self.write_operand(operations, dst, value)?;

        // A constant loaded into the data pointer is worth remembering;
        // a later jmp @A+DPTR resolves against it.
        if let (Operand::Register(register), Operand::Immediate(constant)) = (dst, src) {
            if register.number() == registers::DPTR.number() {
                self.state.set(&registers::DPTR, constant.clone());
            }
        }
        Ok(())
    }

    fn exchange(
        &mut self,
        operations: &mut Vec<Operation>,
        other: &Operand,
        nibbles_only: bool,
    ) -> Result<()> {
        let a_scalar = self.accumulator();
        let a = Expression::scalar(a_scalar.clone());
        let value = self.read_operand(operations, other)?;
        let old_a = self.temp(8);
        operations.push(Operation::assign(old_a.clone(), a));

        if nibbles_only {
            let old_a: Expression = old_a.into();
            operations.push(Operation::assign(
                a_scalar,
                Expression::or(
                    Expression::and(old_a.clone(), expr_const(0xF0, 8))?,
                    Expression::and(value.clone(), expr_const(0x0F, 8))?,
                )?,
            ));
            let back = Expression::or(
                Expression::and(value, expr_const(0xF0, 8))?,
                Expression::and(old_a, expr_const(0x0F, 8))?,
            )?;
            self.write_operand(operations, other, back)
        } else {
            operations.push(Operation::assign(a_scalar, value));
            self.write_operand(operations, other, old_a.into())
        }
    }

    fn rotate(
        &mut self,
        operations: &mut Vec<Operation>,
        left: bool,
        through_carry: bool,
    ) -> Result<()> {
        let a_scalar = self.accumulator();
        let a = Expression::scalar(a_scalar.clone());

        if through_carry {
            let shifted_out = self.temp(1);
            let out_expr = if left {
                Expression::trun(1, Expression::shr(a.clone(), expr_const(7, 8))?)?
            } else {
                Expression::trun(1, a.clone())?
            };
            operations.push(Operation::assign(shifted_out.clone(), out_expr));

            let carry_in = Expression::zext(8, Expression::scalar(self.flags.c.clone()))?;
            let rotated = if left {
                Expression::or(
                    Expression::shl(a, expr_const(1, 8))?,
                    carry_in,
                )?
            } else {
                Expression::or(
                    Expression::shr(a, expr_const(1, 8))?,
                    Expression::shl(carry_in, expr_const(7, 8))?,
                )?
            };
            operations.push(Operation::assign(a_scalar, rotated));
            operations.push(Operation::assign(self.flags.c.clone(), shifted_out.into()));
        } else {
            let rotated = if left {
                Expression::or(
                    Expression::shl(a.clone(), expr_const(1, 8))?,
                    Expression::shr(a, expr_const(7, 8))?,
                )?
            } else {
                Expression::or(
                    Expression::shr(a.clone(), expr_const(1, 8))?,
                    Expression::shl(a, expr_const(7, 8))?,
                )?
            };
            operations.push(Operation::assign(a_scalar, rotated));
        }
        Ok(())
    }

    fn rewrite(
        &mut self,
        instruction: &MachineInstruction,
    ) -> Result<Vec<Operation>> {
        use Mnemonic::*;

        let mnemonic = match Mnemonic::from_u16(instruction.opcode()) {
            Some(mnemonic) => mnemonic,
            None => return Ok(vec![self.not_supported(instruction)]),
        };

        let mut ops = Vec::new();
        match (mnemonic, instruction.operands()) {
            (Nop, _) => ops.push(Operation::nop()),

            (Mov | Movx | Movc, [dst, src]) => self.mov(&mut ops, dst, src)?,

            (Add, [_, src]) => self.arithmetic(&mut ops, src, false, false)?,
            (Addc, [_, src]) => self.arithmetic(&mut ops, src, true, false)?,
            (Subb, [_, src]) => self.arithmetic(&mut ops, src, true, true)?,

            (Inc, [dst]) => {
                let value = self.read_operand(&mut ops, dst)?;
                let bits = value.bits();
                let incremented = Expression::add(value, expr_const(1, bits))?;
                self.write_operand(&mut ops, dst, incremented)?;
                // inc DPTR with a tracked value stays tracked.
                if let Operand::Register(register) = dst {
                    if register.number() == registers::DPTR.number() {
                        if let Some(known) = self.state.get(&registers::DPTR).cloned() {
                            self.state.set(
                                &registers::DPTR,
                                Constant::new(known.value().wrapping_add(1), 16),
                            );
                        }
                    }
                }
            }
            (Dec, [dst]) => {
                let value = self.read_operand(&mut ops, dst)?;
                let bits = value.bits();
                let decremented = Expression::sub(value, expr_const(1, bits))?;
                self.write_operand(&mut ops, dst, decremented)?;
            }

            (Anl, [dst, src]) => self.logic(&mut ops, dst, src, Expression::and)?,
            (Orl, [dst, src]) => self.logic(&mut ops, dst, src, Expression::or)?,
            (Xrl, [dst, src]) => self.logic(&mut ops, dst, src, Expression::xor)?,

            (Clr, [Operand::Bit(bit)]) => {
                self.write_bit(&mut ops, bit, expr_const(0, 1))?;
            }
            (Setb, [Operand::Bit(bit)]) => {
                self.write_bit(&mut ops, bit, expr_const(1, 1))?;
            }
            (Cpl, [Operand::Bit(bit)]) => {
                let value = self.read_bit(&mut ops, bit)?;
                let complemented = Expression::xor(value, expr_const(1, 1))?;
                self.write_bit(&mut ops, bit, complemented)?;
            }
            (Clr, [Operand::Register(_)]) => {
                ops.push(Operation::assign(self.accumulator(), expr_const(0, 8)));
            }
            (Cpl, [Operand::Register(_)]) => {
                let a = self.accumulator();
                ops.push(Operation::assign(
                    a.clone(),
                    Expression::xor(a.into(), expr_const(0xFF, 8))?,
                ));
            }

            (Swap, [_]) => {
                let a = self.accumulator();
                let a_expr = Expression::scalar(a.clone());
                ops.push(Operation::assign(
                    a,
                    Expression::or(
                        Expression::shl(a_expr.clone(), expr_const(4, 8))?,
                        Expression::shr(a_expr, expr_const(4, 8))?,
                    )?,
                ));
            }
            (Rl, [_]) => self.rotate(&mut ops, true, false)?,
            (Rr, [_]) => self.rotate(&mut ops, false, false)?,
            (Rlc, [_]) => self.rotate(&mut ops, true, true)?,
            (Rrc, [_]) => self.rotate(&mut ops, false, true)?,

            (Xch, [_, other]) => self.exchange(&mut ops, other, false)?,
            (Xchd, [_, other]) => self.exchange(&mut ops, other, true)?,

            (Mul, [_, _]) => {
                let a = self.accumulator();
                let b = self.binder.bind_register(&registers::B);
                let wide = self.temp(16);
                ops.push(Operation::assign(
                    wide.clone(),
                    Expression::mulu(
                        Expression::zext(16, a.clone().into())?,
                        Expression::zext(16, b.clone().into())?,
                    )?,
                ));
                ops.push(Operation::assign(
                    a,
                    Expression::trun(8, wide.clone().into())?,
                ));
                ops.push(Operation::assign(
                    b.clone(),
                    Expression::trun(
                        8,
                        Expression::shr(wide.into(), expr_const(8, 16))?,
                    )?,
                ));
                ops.push(Operation::assign(self.flags.c.clone(), expr_const(0, 1)));
                ops.push(Operation::assign(
                    self.flags.ov.clone(),
                    Expression::cmpneq(b.into(), expr_const(0, 8))?,
                ));
            }
            (Div, [_, _]) => {
                let a = self.accumulator();
                let b = self.binder.bind_register(&registers::B);
                let quotient = self.temp(8);
                let remainder = self.temp(8);
                ops.push(Operation::assign(
                    quotient.clone(),
                    Expression::divu(a.clone().into(), b.clone().into())?,
                ));
                ops.push(Operation::assign(
                    remainder.clone(),
                    Expression::modu(a.clone().into(), b.clone().into())?,
                ));
                // Division by zero leaves A and B undefined and sets OV.
                ops.push(Operation::assign(
                    self.flags.ov.clone(),
                    Expression::cmpeq(b.clone().into(), expr_const(0, 8))?,
                ));
                ops.push(Operation::assign(a, quotient.into()));
                ops.push(Operation::assign(b, remainder.into()));
                ops.push(Operation::assign(self.flags.c.clone(), expr_const(0, 1)));
            }

            (Da, [_]) => {
                // Decimal adjust depends on half-carry chains not worth
                // modeling exactly; an intrinsic keeps it explicit.
                ops.push(Operation::intrinsic(Intrinsic::new(
                    "da",
                    "da\tA",
                    vec![self.accumulator().into()],
                    Vec::new(),
                )));
            }

            (Push, [src]) => {
                let value = self.read_operand(&mut ops, src)?;
                let sp = self.binder.bind_register(&registers::SP);
                ops.push(Operation::assign(
                    sp.clone(),
                    Expression::add(sp.clone().into(), expr_const(1, 8))?,
                ));
                ops.push(Operation::store(sp.into(), value));
            }
            (Pop, [dst]) => {
                let sp = self.binder.bind_register(&registers::SP);
                let value = self.temp(8);
                ops.push(Operation::load(value.clone(), sp.clone().into()));
                self.write_operand(&mut ops, dst, value.into())?;
                ops.push(Operation::assign(
                    sp.clone(),
                    Expression::sub(sp.into(), expr_const(1, 8))?,
                ));
            }

            (Sjmp | Ljmp | Ajmp, [Operand::Address(target)]) => {
                ops.push(Operation::branch(expr_const(target.value(), 16)));
            }
            (Jmp, [Operand::Memory(memory)]) => {
                let target = self.bind_expression(memory.effective_address());
                ops.push(Operation::branch(target));
            }
            (Acall | Lcall, [Operand::Address(target)]) => {
                ops.push(Operation::call(expr_const(target.value(), 16)));
            }
            (Ret | Reti, _) => ops.push(Operation::ret()),

            (Jz, [Operand::Address(target)]) => {
                let condition =
                    Expression::cmpeq(self.accumulator().into(), expr_const(0, 8))?;
                ops.push(Operation::branch_if(
                    condition,
                    expr_const(target.value(), 16),
                ));
            }
            (Jnz, [Operand::Address(target)]) => {
                let condition =
                    Expression::cmpneq(self.accumulator().into(), expr_const(0, 8))?;
                ops.push(Operation::branch_if(
                    condition,
                    expr_const(target.value(), 16),
                ));
            }
            (Jc, [Operand::Address(target)]) => {
                ops.push(Operation::branch_if(
                    self.flags.c.clone().into(),
                    expr_const(target.value(), 16),
                ));
            }
            (Jnc, [Operand::Address(target)]) => {
                let condition =
                    Expression::cmpeq(self.flags.c.clone().into(), expr_const(0, 1))?;
                ops.push(Operation::branch_if(
                    condition,
                    expr_const(target.value(), 16),
                ));
            }
            (Jb, [Operand::Bit(bit), Operand::Address(target)]) => {
                let condition = self.read_bit(&mut ops, bit)?;
                ops.push(Operation::branch_if(
                    condition,
                    expr_const(target.value(), 16),
                ));
            }
            (Jnb, [Operand::Bit(bit), Operand::Address(target)]) => {
                let value = self.read_bit(&mut ops, bit)?;
                let condition = Expression::cmpeq(value, expr_const(0, 1))?;
                ops.push(Operation::branch_if(
                    condition,
                    expr_const(target.value(), 16),
                ));
            }
            (Jbc, [Operand::Bit(bit), Operand::Address(target)]) => {
                let taken = self.temp(1);
                let value = self.read_bit(&mut ops, bit)?;
                ops.push(Operation::assign(taken.clone(), value));
                self.write_bit(&mut ops, bit, expr_const(0, 1))?;
                ops.push(Operation::branch_if(
                    taken.into(),
                    expr_const(target.value(), 16),
                ));
            }

            (Cjne, [lhs, rhs, Operand::Address(target)]) => {
                let lhs = self.read_operand(&mut ops, lhs)?;
                let rhs = self.read_operand(&mut ops, rhs)?;
                ops.push(Operation::assign(
                    self.flags.c.clone(),
                    Expression::cmpltu(lhs.clone(), rhs.clone())?,
                ));
                ops.push(Operation::branch_if(
                    Expression::cmpneq(lhs, rhs)?,
                    expr_const(target.value(), 16),
                ));
            }
            (Djnz, [dst, Operand::Address(target)]) => {
                let value = self.read_operand(&mut ops, dst)?;
                let decremented = self.temp(8);
                ops.push(Operation::assign(
                    decremented.clone(),
                    Expression::sub(value, expr_const(1, 8))?,
                ));
                self.write_operand(&mut ops, dst, decremented.clone().into())?;
                ops.push(Operation::branch_if(
                    Expression::cmpneq(decremented.into(), expr_const(0, 8))?,
                    expr_const(target.value(), 16),
                ));
            }

            _ => {
                self.host.warn(
                    instruction.address(),
                    &format!("unexpected operand shape for {}", instruction.mnemonic()),
                );
                ops.push(self.not_supported(instruction));
            }
        }
        Ok(ops)
    }

    fn not_supported(&self, instruction: &MachineInstruction) -> Operation {
        Operation::intrinsic(Intrinsic::new(
            instruction.mnemonic(),
            instruction.to_string(),
            Vec::new(),
            Vec::new(),
        ))
    }
}

impl Iterator for Rewriter<'_> {
    type Item = RtlCluster;

    fn next(&mut self) -> Option<RtlCluster> {
        let instruction = self.decoder.next()?;
        self.temp_index = 0;
        let operations = match self.rewrite(&instruction) {
            Ok(operations) => operations,
            Err(e) => {
                // A rewriting failure is contained to its own cluster; the
                // sequence itself keeps its address continuity.
                self.host.error(instruction.address(), &e.to_string());
                vec![self.not_supported(&instruction)]
            }
        };
        Some(RtlCluster::new(
            instruction.address(),
            instruction.length(),
            instruction.class(),
            operations,
        ))
    }
}
