//! `DimmError`: unified error type for the dimm public APIs.
//!
//! Every fallible operation in the crate reports through this enum. All
//! error paths are non-recoverable at the core layer: the library never
//! retries, and the tools translate errors into non-zero exit codes after
//! releasing outstanding requests and closing the store.

use thiserror::Error;

/// Unified error type for dimm operations.
#[derive(Debug, Error)]
pub enum DimmError {
    /// A plan's element list disagrees with its offset table.
    #[error("plan {side} list holds {got} entries but offsets claim {expected}")]
    PlanSizeMismatch {
        /// "send" or "recv".
        side: &'static str,
        /// Total claimed by the last offset entry.
        expected: usize,
        /// Actual list length.
        got: usize,
    },
    /// A plan or map was built for a different communicator size.
    #[error("plan sized for {plan} ranks used with a {comm}-rank communicator")]
    RankCountMismatch {
        /// Ranks the plan was resized for.
        plan: usize,
        /// Ranks in the communicator.
        comm: usize,
    },
    /// A point-to-point exchange with a peer failed.
    #[error("communication with rank {neighbor} failed: {reason}")]
    CommError {
        /// Peer rank involved in the failed exchange.
        neighbor: usize,
        /// Human-readable failure description.
        reason: String,
    },
    /// A received message did not match the posted buffer length.
    #[error("rank {neighbor} delivered {got} bytes where {expected} were posted")]
    BufferSizeMismatch {
        /// Peer rank the bytes came from.
        neighbor: usize,
        /// Posted receive length.
        expected: usize,
        /// Delivered length.
        got: usize,
    },
    /// An index was outside the owning rank's slice.
    #[error("local index {index} out of bounds for a slice of {len}")]
    IndexOutOfBounds {
        /// Offending local index.
        index: usize,
        /// Length of the local slice.
        len: usize,
    },
    /// The store rejected an open/read/write, or a link was missing.
    #[error("store access failed: {0}")]
    StoreAccess(String),
    /// The store's index width tag does not match the requested type.
    #[error("store index width is {stored} bytes, caller requested {requested}")]
    IndexWidthMismatch {
        /// Width recorded in the `IntegerT` attribute.
        stored: usize,
        /// Width of the requested index type.
        requested: usize,
    },
    /// Importer input could not be parsed.
    #[error("mesh import parse error: {0}")]
    ImportParse(String),
    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hdf5::Error> for DimmError {
    fn from(err: hdf5::Error) -> Self {
        DimmError::StoreAccess(err.to_string())
    }
}
