//! Intrinsics are instructions whose semantics are not modeled.

use crate::rtl::Expression;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An explicit marker for an instruction the rewriter could not model.
///
/// Unsupported and undecodable instructions rewrite to an intrinsic rather
/// than being skipped, so address continuity is preserved for control-flow
/// recovery. The original bytes and rendering are carried along for
/// diagnostics.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Intrinsic {
    mnemonic: String,
    rendering: String,
    arguments: Vec<Expression>,
    bytes: Vec<u8>,
}

impl Intrinsic {
    pub fn new<S: Into<String>, SS: Into<String>>(
        mnemonic: S,
        rendering: SS,
        arguments: Vec<Expression>,
        bytes: Vec<u8>,
    ) -> Intrinsic {
        Intrinsic {
            mnemonic: mnemonic.into(),
            rendering: rendering.into(),
            arguments,
            bytes,
        }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// The assembly-like rendering of the instruction this intrinsic stands
    /// in for.
    pub fn rendering(&self) -> &str {
        &self.rendering
    }

    /// Operand expressions, where decoding recovered them.
    pub fn arguments(&self) -> &[Expression] {
        &self.arguments
    }

    /// The undecoded instruction bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self
            .bytes
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<String>>()
            .join("");
        write!(f, "intrinsic({} {})", bytes, self.rendering)
    }
}
