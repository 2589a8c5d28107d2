use crate::address::Address;
use crate::rtl::Operation;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Classification of a machine instruction's control-flow behavior.
    ///
    /// Clusters carry the class of the instruction they were rewritten
    /// from, so control-flow recovery can partition work without
    /// re-inspecting operations.
    #[derive(Deserialize, Serialize)]
    pub struct InstrClass: u32 {
        /// Falls through to the next instruction.
        const LINEAR      = 0b0000_0000;
        /// Transfers control somewhere else.
        const TRANSFER    = 0b0000_0001;
        /// The transfer happens only under a condition.
        const CONDITIONAL = 0b0000_0010;
        /// Calls a procedure.
        const CALL        = 0b0000_0100;
        /// Returns from a procedure.
        const RETURN      = 0b0000_1000;
        /// Did not decode to any known instruction.
        const INVALID     = 0b0001_0000;
    }
}

/// The RTL operations equivalent to one machine instruction's effect.
///
/// A cluster is self-contained: no operation in it references a value
/// defined in a different instruction's cluster except through named
/// scalars. The address and length map the cluster back to the bytes it
/// was rewritten from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RtlCluster {
    address: Address,
    length: usize,
    class: InstrClass,
    operations: Vec<Operation>,
}

impl RtlCluster {
    pub fn new(
        address: Address,
        length: usize,
        class: InstrClass,
        operations: Vec<Operation>,
    ) -> RtlCluster {
        RtlCluster {
            address,
            length,
            class,
            operations,
        }
    }

    /// The address of the instruction this cluster was rewritten from.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The length in bytes of the originating instruction.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn class(&self) -> InstrClass {
        self.class
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

impl fmt::Display for RtlCluster {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} ({}):", self.address, self.length)?;
        for operation in &self.operations {
            writeln!(f, "  {}", operation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtl::{expr_const, scalar, Operation};

    #[test]
    fn serde_round_trip() {
        let cluster = RtlCluster::new(
            Address::new(0x40, 16),
            2,
            InstrClass::LINEAR,
            vec![Operation::assign(scalar("A", 8), expr_const(0x7F, 8))],
        );
        let json = serde_json::to_string(&cluster).unwrap();
        let back: RtlCluster = serde_json::from_str(&json).unwrap();
        assert_eq!(cluster, back);
    }
}
