//! Concrete processor state carried through a rewrite pass.

use crate::arch::RegisterStorage;
use crate::rtl::Constant;
use rustc_hash::FxHashMap;

/// The values of registers known at the current point of a rewrite pass.
///
/// Most register values are unknown during static rewriting. The state
/// tracks the ones that are not, so a rewriter can resolve semantics that
/// depend on prior instructions, such as a jump through a pointer register
/// that an earlier instruction loaded with a constant.
#[derive(Clone, Debug, Default)]
pub struct ProcessorState {
    values: FxHashMap<&'static str, Constant>,
}

impl ProcessorState {
    pub fn new() -> ProcessorState {
        ProcessorState {
            values: FxHashMap::default(),
        }
    }

    /// The known value of `register`, or `None` if it is unknown here.
    pub fn get(&self, register: &'static RegisterStorage) -> Option<&Constant> {
        self.values.get(register.name())
    }

    /// Record that `register` holds `value` from this point on.
    pub fn set(&mut self, register: &'static RegisterStorage, value: Constant) {
        self.values.insert(register.name(), value);
    }

    /// Forget the value of `register`.
    pub fn invalidate(&mut self, register: &'static RegisterStorage) {
        self.values.remove(register.name());
    }

    /// Forget everything. Used when crossing an instruction whose effect on
    /// the registers cannot be tracked.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
