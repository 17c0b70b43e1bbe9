//! Growable, property-aware storage for galaxy records.
//!
//! [`GalaxyArray`] owns a contiguous buffer of [`Galaxy`] records and,
//! through them, every physics block. Appending a borrowed record stores
//! an independent deep copy, so the caller keeps full ownership of its
//! original. Growth doubles the capacity and relocates only the fixed-size
//! records: each physics block sits behind its own heap handle and never
//! moves.

use std::collections::TryReserveError;

use galtree_props::{Galaxy, PropertyError};
use galtree_types::RunConfig;
use tracing::debug;

/// Capacity reserved by the first append.
pub const INITIAL_CAPACITY: usize = 16;

/// Errors that can occur while appending to a [`GalaxyArray`].
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The record buffer could not grow.
    #[error("record array growth failed: {source}")]
    AllocationFailed {
        /// The underlying reservation failure.
        #[from]
        source: TryReserveError,
    },

    /// Copying or allocating the record's physics block failed.
    #[error("record property error: {source}")]
    Property {
        /// The underlying property store error.
        #[from]
        source: PropertyError,
    },
}

impl RecordError {
    /// Whether this error reports memory exhaustion rather than bad input.
    pub const fn is_allocation_failure(&self) -> bool {
        match self {
            Self::AllocationFailed { .. } => true,
            Self::Property { source } => source.is_allocation_failure(),
        }
    }
}

/// An ordered, growable collection of galaxy records.
///
/// Every stored record has an allocated physics block that no other record
/// shares.
#[derive(Debug, Default)]
pub struct GalaxyArray {
    records: Vec<Galaxy>,
}

impl GalaxyArray {
    /// An empty array with no reserved capacity.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a deep copy of `galaxy` and return its slot index.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the buffer cannot grow or the copy
    /// cannot be made. The array is unchanged on failure.
    pub fn append(&mut self, galaxy: &Galaxy, config: &RunConfig) -> Result<usize, RecordError> {
        let copy = galaxy.duplicate(config)?;
        self.push(copy)
    }

    /// Move an already-independent record into the array and return its
    /// slot index. A record without a physics block gets a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the buffer cannot grow or the block
    /// cannot be allocated. The array is unchanged on failure.
    pub fn append_owned(
        &mut self,
        mut galaxy: Galaxy,
        config: &RunConfig,
    ) -> Result<usize, RecordError> {
        galaxy.allocate(config)?;
        self.push(galaxy)
    }

    fn push(&mut self, galaxy: Galaxy) -> Result<usize, RecordError> {
        self.reserve_one()?;
        let index = self.records.len();
        self.records.push(galaxy);
        Ok(index)
    }

    /// Make room for one more record, doubling the capacity when full.
    fn reserve_one(&mut self) -> Result<(), TryReserveError> {
        let capacity = self.records.capacity();
        if self.records.len() < capacity {
            return Ok(());
        }
        let target = capacity.saturating_mul(2).max(INITIAL_CAPACITY);
        let additional = target.saturating_sub(self.records.len());
        self.records.try_reserve_exact(additional)?;
        debug!(
            from = capacity,
            to = self.records.capacity(),
            "Galaxy array grown"
        );
        Ok(())
    }

    /// The record at `index`, or `None` when `index` is negative or out of
    /// range.
    pub fn get<I: TryInto<usize>>(&self, index: I) -> Option<&Galaxy> {
        self.records.get(index.try_into().ok()?)
    }

    /// Mutable access to the record at `index`.
    pub fn get_mut<I: TryInto<usize>>(&mut self, index: I) -> Option<&mut Galaxy> {
        self.records.get_mut(index.try_into().ok()?)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records the buffer can hold without growing.
    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Contiguous view of every record.
    pub fn raw_view(&self) -> &[Galaxy] {
        &self.records
    }

    /// Mutable contiguous view of every record.
    pub fn raw_view_mut(&mut self) -> &mut [Galaxy] {
        &mut self.records
    }

    /// Iterate over the records in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, Galaxy> {
        self.records.iter()
    }

    /// Drop records from `len` onwards. Capacity is kept.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Release every physics block and then the buffer. Calling it again
    /// is a no-op.
    pub fn free(&mut self) {
        for galaxy in &mut self.records {
            galaxy.free();
        }
        self.records = Vec::new();
    }
}

impl<'a> IntoIterator for &'a GalaxyArray {
    type Item = &'a Galaxy;
    type IntoIter = std::slice::Iter<'a, Galaxy>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
