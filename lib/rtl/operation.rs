use crate::rtl::{Expression, Intrinsic, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An RTL operation updates some state.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Operation {
    /// Assign the value given in the expression to the scalar indicated.
    Assign { dst: Scalar, src: Expression },
    /// Load the value at `address` and place the result in `dst`. The size
    /// of the load is the size of the scalar loaded into.
    Load { dst: Scalar, address: Expression },
    /// Store `src` at `address`. The size of the store is the size of the
    /// expression being stored.
    Store { address: Expression, src: Expression },
    /// Transfer control to `target`. If `condition` is present, control
    /// transfers only when it evaluates non-zero; execution otherwise falls
    /// through to the next cluster.
    Branch {
        target: Expression,
        condition: Option<Expression>,
    },
    /// Transfer control to a procedure at `target`, with the expectation of
    /// a later return to the following instruction.
    Call { target: Expression },
    /// Return from the current procedure.
    Return,
    /// An instruction whose semantics are not modeled. See [`Intrinsic`].
    Intrinsic { intrinsic: Intrinsic },
    /// No operation. Holds a position for instructions with no visible
    /// effect.
    Nop,
}

impl Operation {
    pub fn assign(dst: Scalar, src: Expression) -> Operation {
        Operation::Assign { dst, src }
    }

    pub fn load(dst: Scalar, address: Expression) -> Operation {
        Operation::Load { dst, address }
    }

    pub fn store(address: Expression, src: Expression) -> Operation {
        Operation::Store { address, src }
    }

    /// An unconditional branch.
    pub fn branch(target: Expression) -> Operation {
        Operation::Branch {
            target,
            condition: None,
        }
    }

    /// A branch taken only when `condition` evaluates non-zero.
    pub fn branch_if(condition: Expression, target: Expression) -> Operation {
        Operation::Branch {
            target,
            condition: Some(condition),
        }
    }

    pub fn call(target: Expression) -> Operation {
        Operation::Call { target }
    }

    pub fn ret() -> Operation {
        Operation::Return
    }

    pub fn intrinsic(intrinsic: Intrinsic) -> Operation {
        Operation::Intrinsic { intrinsic }
    }

    pub fn nop() -> Operation {
        Operation::Nop
    }

    /// The scalars read by this operation.
    pub fn scalars_read(&self) -> Vec<&Scalar> {
        match self {
            Operation::Assign { src, .. } => src.scalars(),
            Operation::Load { address, .. } => address.scalars(),
            Operation::Store { address, src } => {
                let mut scalars = address.scalars();
                scalars.append(&mut src.scalars());
                scalars
            }
            Operation::Branch { target, condition } => {
                let mut scalars = target.scalars();
                if let Some(condition) = condition {
                    scalars.append(&mut condition.scalars());
                }
                scalars
            }
            Operation::Call { target } => target.scalars(),
            Operation::Intrinsic { intrinsic } => intrinsic
                .arguments()
                .iter()
                .flat_map(|argument| argument.scalars())
                .collect(),
            Operation::Return | Operation::Nop => Vec::new(),
        }
    }

    /// The scalar written by this operation, if any.
    pub fn scalar_written(&self) -> Option<&Scalar> {
        match self {
            Operation::Assign { dst, .. } | Operation::Load { dst, .. } => Some(dst),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Assign { dst, src } => write!(f, "{} = {}", dst, src),
            Operation::Load { dst, address } => write!(f, "{} = [{}]", dst, address),
            Operation::Store { address, src } => write!(f, "[{}] = {}", address, src),
            Operation::Branch {
                target,
                condition: Some(condition),
            } => write!(f, "branch {} ? {}", target, condition),
            Operation::Branch {
                target,
                condition: None,
            } => write!(f, "branch {}", target),
            Operation::Call { target } => write!(f, "call {}", target),
            Operation::Return => write!(f, "return"),
            Operation::Intrinsic { intrinsic } => intrinsic.fmt(f),
            Operation::Nop => write!(f, "nop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtl::{expr_const, expr_scalar, scalar};

    #[test]
    fn reads_and_writes() {
        let operation = Operation::assign(
            scalar("A", 8),
            Expression::add(expr_scalar("A", 8), expr_scalar("B", 8)).unwrap(),
        );
        assert_eq!(operation.scalar_written().unwrap().name(), "A");
        assert_eq!(operation.scalars_read().len(), 2);

        let branch = Operation::branch_if(expr_scalar("C", 1), expr_const(0x100, 16));
        assert_eq!(branch.scalar_written(), None);
        assert_eq!(branch.scalars_read().len(), 1);
    }

    #[test]
    fn display() {
        let operation = Operation::store(expr_scalar("R0", 8), expr_scalar("A", 8));
        assert_eq!(operation.to_string(), "[R0:8] = A:8");
    }
}
