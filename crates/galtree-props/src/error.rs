//! Error types for the `galtree-props` crate.
//!
//! Lookups never fail: unknown identifiers, absent blocks, and out-of-range
//! indices fall back to caller-supplied defaults. [`PropertyError`] is
//! reserved for operations that must either complete or leave the record
//! untouched (allocation and deep copy).

use std::collections::TryReserveError;

use galtree_types::RunConfigError;

/// Errors that can occur while allocating or copying a physics block.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    /// The run configuration cannot size a physics block.
    #[error("invalid run configuration: {source}")]
    InvalidConfig {
        /// The underlying validation failure.
        #[from]
        source: RunConfigError,
    },

    /// Memory for a physics block or one of its arrays could not be reserved.
    #[error("physics block allocation failed: {source}")]
    AllocationFailed {
        /// The underlying reservation failure.
        #[from]
        source: TryReserveError,
    },

    /// The source record of a copy has no physics block.
    #[error("source record has no physics block")]
    MissingBlock,

    /// The source block was sized for a different run configuration.
    #[error("physics block layout mismatch: expected dynamic length {expected}, found {actual}")]
    LayoutMismatch {
        /// Dynamic array length required by the run configuration.
        expected: usize,
        /// Dynamic array length of the source block.
        actual: usize,
    },
}

impl PropertyError {
    /// Whether this error reports memory exhaustion rather than bad input.
    pub const fn is_allocation_failure(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }
}
