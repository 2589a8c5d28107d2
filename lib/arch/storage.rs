//! Architecture storage locations: registers and flag groups.

use crate::rtl::{Expression, Scalar};
use crate::types::DataType;
use crate::Result;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A named, fixed-width register slot of some architecture.
///
/// Architectures expose a finite set of these as `&'static` values; the
/// number is a stable small index usable for dense lookup tables.
#[derive(Debug, Eq, Hash, PartialEq)]
pub struct RegisterStorage {
    name: &'static str,
    number: usize,
    data_type: DataType,
}

impl RegisterStorage {
    pub const fn new(name: &'static str, number: usize, data_type: DataType) -> RegisterStorage {
        RegisterStorage {
            name,
            number,
            data_type,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn bits(&self) -> usize {
        self.data_type.bits()
    }

    /// The RTL scalar naming this register.
    pub fn scalar(&self) -> Scalar {
        Scalar::new(self.name, self.bits())
    }

    /// An RTL expression which evaluates to the value of this register.
    pub fn expression(&self) -> Expression {
        Expression::scalar(self.scalar())
    }
}

impl fmt::Display for RegisterStorage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named subset of the bits of a status register, treated as one
/// semantic storage location.
///
/// The bitmask determines the semantic type: exactly one set bit means the
/// group is a boolean, more than one means it is a byte-sized multi-flag
/// field. Flag groups are interned per architecture instance (see
/// [`FlagGroupCache`]), keyed by the mask, because one set of bits always
/// maps to one semantic group no matter how it is referenced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlagGroupStorage {
    flag_register: &'static RegisterStorage,
    mask: u32,
    name: String,
    data_type: DataType,
}

impl FlagGroupStorage {
    pub fn new<S: Into<String>>(
        flag_register: &'static RegisterStorage,
        mask: u32,
        name: S,
        data_type: DataType,
    ) -> FlagGroupStorage {
        FlagGroupStorage {
            flag_register,
            mask,
            name: name.into(),
            data_type,
        }
    }

    /// The status register this group's bits live in.
    pub fn flag_register(&self) -> &'static RegisterStorage {
        self.flag_register
    }

    /// The bitmask identifying this group within the status register.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn bits(&self) -> usize {
        self.data_type.bits()
    }

    /// The RTL scalar naming this flag group.
    pub fn scalar(&self) -> Scalar {
        Scalar::new(self.name.clone(), self.bits())
    }

    pub fn expression(&self) -> Expression {
        Expression::scalar(self.scalar())
    }
}

impl fmt::Display for FlagGroupStorage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The per-architecture-instance intern table for flag groups.
///
/// Read-mostly: lookups of already-cached masks take the read lock only,
/// and concurrent first-insertions of the same mask are serialized on the
/// write lock. Entries live for the lifetime of the owning architecture;
/// there is no eviction, bounded by the handful of distinct masks an
/// architecture ever uses.
#[derive(Debug, Default)]
pub struct FlagGroupCache {
    groups: RwLock<FxHashMap<u32, Arc<FlagGroupStorage>>>,
}

impl FlagGroupCache {
    pub fn new() -> FlagGroupCache {
        FlagGroupCache {
            groups: RwLock::new(FxHashMap::default()),
        }
    }

    /// Get the interned group for `mask`, creating it with `make` on first
    /// request. Two calls with the same mask return the identical `Arc`.
    pub fn get_or_insert_with<F>(&self, mask: u32, make: F) -> Result<Arc<FlagGroupStorage>>
    where
        F: FnOnce() -> Result<FlagGroupStorage>,
    {
        if let Some(group) = self
            .groups
            .read()
            .expect("flag group cache poisoned")
            .get(&mask)
        {
            return Ok(group.clone());
        }

        let mut groups = self.groups.write().expect("flag group cache poisoned");
        // Another thread may have inserted while we waited on the lock.
        if let Some(group) = groups.get(&mask) {
            return Ok(group.clone());
        }
        let group = Arc::new(make()?);
        groups.insert(mask, group.clone());
        Ok(group)
    }

    /// The interned group for `mask`, if one was already created.
    pub fn get(&self, mask: u32) -> Option<Arc<FlagGroupStorage>> {
        self.groups
            .read()
            .expect("flag group cache poisoned")
            .get(&mask)
            .cloned()
    }
}
