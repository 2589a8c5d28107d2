//! Merlin is a retargetable decompiler core.
//!
//! Merlin turns raw machine code for heterogeneous CPU families into one
//! canonical register-transfer representation (RTL). Everything downstream of
//! this crate, control-flow recovery, type reconstruction, source emission,
//! consumes that representation and never sees an architecture-specific
//! encoding.
//!
//! The crate is organized around the [`arch::Architecture`] contract, the
//! capability set implemented once per CPU family:
//!
//! * [`image`] - Endian-aware readers and writers over a loaded binary image.
//! * [`machine`] - Decoded machine instructions and their operands.
//! * [`rtl`] - The canonical IR: expressions, operations, and the per
//!   instruction clusters rewriters emit.
//! * [`state`] - Concrete register values a rewriter may consult mid-stream.
//! * [`arch`] - The architecture contract, storage modeling, and the
//!   reference i8051 backend.
//!
//! Decoding and rewriting are lazy, pull-based sequences. A consumer that
//! needs to re-enter at a different address constructs a fresh reader and a
//! fresh decoder there; sequences themselves are forward-only.

pub mod address;
pub mod arch;
pub mod image;
pub mod machine;
pub mod rtl;
pub mod state;
pub mod types;

pub mod error {
    use thiserror::Error;

    /// Error type for all fallible operations in the decompiler core.
    #[derive(Clone, Debug, Error, Eq, PartialEq)]
    pub enum Error {
        /// An access crossed the bounds declared for an image accessor.
        #[error("access of {bytes} byte(s) at 0x{address:X} is out of bounds")]
        Bounds { address: u64, bytes: usize },
        /// The architecture has no meaningful implementation of the requested
        /// operation. Callers should degrade gracefully.
        #[error("{operation} is not supported by the {arch} architecture")]
        Unsupported {
            arch: &'static str,
            operation: &'static str,
        },
        /// A flag group mask must always name at least one bit of the status
        /// register. A zero mask is a contract violation by the caller.
        #[error("flag group mask does not name any bit")]
        InvalidFlagGroup,
        /// Lookup of a register by name or number failed.
        #[error("no such register: {0}")]
        UnknownRegister(String),
        /// An expression was built over operands of differing bitness.
        #[error("sort error, expression bitness mismatch")]
        Sort,
        #[error("{0}")]
        Custom(String),
    }

    impl From<String> for Error {
        fn from(s: String) -> Error {
            Error::Custom(s)
        }
    }

    impl From<&str> for Error {
        fn from(s: &str) -> Error {
            Error::Custom(s.to_string())
        }
    }
}

pub use crate::error::Error;

/// A specialized `Result` for decompiler core operations.
pub type Result<T> = std::result::Result<T, Error>;
