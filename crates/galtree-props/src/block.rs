//! The physics block: one heap allocation per galaxy holding every
//! physics property.
//!
//! A block is a vector of typed slots in registry order. Scalars are stored
//! inline in their slot; fixed and dynamic arrays own their own vector.
//! The galaxy record keeps the block behind a `Box`, so moving a record
//! (for example when a record array grows) moves only the handle.
//!
//! Every allocation goes through fallible reservation, so memory
//! exhaustion surfaces as [`PropertyError::AllocationFailed`] instead of
//! aborting.

use std::collections::TryReserveError;

use galtree_types::RunConfig;

use crate::error::PropertyError;
use crate::registry::{self, Shape, Value};

/// Storage for one physics property.
#[derive(Debug, PartialEq)]
pub(crate) enum Slot {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Int32s(Vec<i32>),
    Int64s(Vec<i64>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
    Bools(Vec<bool>),
}

/// A vector of `len` copies of `value`, reserved fallibly.
fn filled<T: Copy>(value: T, len: usize) -> Result<Vec<T>, TryReserveError> {
    let mut values = Vec::new();
    values.try_reserve_exact(len)?;
    values.resize(len, value);
    Ok(values)
}

/// A fallibly reserved copy of `src`.
fn copied<T: Copy>(src: &[T]) -> Result<Vec<T>, TryReserveError> {
    let mut values = Vec::new();
    values.try_reserve_exact(src.len())?;
    values.extend_from_slice(src);
    Ok(values)
}

impl Slot {
    /// A slot holding `default` in every element.
    fn with_default(default: Value, shape: Shape, dynamic_len: usize) -> Result<Self, TryReserveError> {
        let len = match shape {
            Shape::Scalar => {
                return Ok(match default {
                    Value::Int32(v) => Self::Int32(v),
                    Value::Int64(v) => Self::Int64(v),
                    Value::Float(v) => Self::Float(v),
                    Value::Double(v) => Self::Double(v),
                    Value::Bool(v) => Self::Bool(v),
                });
            }
            Shape::Fixed(len) => len,
            Shape::Dynamic => dynamic_len,
        };
        Ok(match default {
            Value::Int32(v) => Self::Int32s(filled(v, len)?),
            Value::Int64(v) => Self::Int64s(filled(v, len)?),
            Value::Float(v) => Self::Floats(filled(v, len)?),
            Value::Double(v) => Self::Doubles(filled(v, len)?),
            Value::Bool(v) => Self::Bools(filled(v, len)?),
        })
    }

    /// Deep copy with fallible reservation.
    fn try_clone(&self) -> Result<Self, TryReserveError> {
        Ok(match self {
            Self::Int32(v) => Self::Int32(*v),
            Self::Int64(v) => Self::Int64(*v),
            Self::Float(v) => Self::Float(*v),
            Self::Double(v) => Self::Double(*v),
            Self::Bool(v) => Self::Bool(*v),
            Self::Int32s(v) => Self::Int32s(copied(v)?),
            Self::Int64s(v) => Self::Int64s(copied(v)?),
            Self::Floats(v) => Self::Floats(copied(v)?),
            Self::Doubles(v) => Self::Doubles(copied(v)?),
            Self::Bools(v) => Self::Bools(copied(v)?),
        })
    }

    /// Number of elements; 0 for scalars.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Int32(_) | Self::Int64(_) | Self::Float(_) | Self::Double(_) | Self::Bool(_) => 0,
            Self::Int32s(v) => v.len(),
            Self::Int64s(v) => v.len(),
            Self::Floats(v) => v.len(),
            Self::Doubles(v) => v.len(),
            Self::Bools(v) => v.len(),
        }
    }

    /// Whether `self` can receive `other`'s values without reallocating.
    fn same_layout(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other) && self.len() == other.len()
    }

    /// Value-for-value copy; the caller has checked [`Slot::same_layout`].
    fn assign(&mut self, src: &Self) {
        match (self, src) {
            (Self::Int32(d), Self::Int32(s)) => *d = *s,
            (Self::Int64(d), Self::Int64(s)) => *d = *s,
            (Self::Float(d), Self::Float(s)) => *d = *s,
            (Self::Double(d), Self::Double(s)) => *d = *s,
            (Self::Bool(d), Self::Bool(s)) => *d = *s,
            (Self::Int32s(d), Self::Int32s(s)) => d.copy_from_slice(s),
            (Self::Int64s(d), Self::Int64s(s)) => d.copy_from_slice(s),
            (Self::Floats(d), Self::Floats(s)) => d.copy_from_slice(s),
            (Self::Doubles(d), Self::Doubles(s)) => d.copy_from_slice(s),
            (Self::Bools(d), Self::Bools(s)) => d.copy_from_slice(s),
            _ => {}
        }
    }

    /// Element `index` as a dynamically typed value. Scalars answer only
    /// index 0.
    pub(crate) fn value_at(&self, index: usize) -> Option<Value> {
        match self {
            Self::Int32(v) => (index == 0).then_some(Value::Int32(*v)),
            Self::Int64(v) => (index == 0).then_some(Value::Int64(*v)),
            Self::Float(v) => (index == 0).then_some(Value::Float(*v)),
            Self::Double(v) => (index == 0).then_some(Value::Double(*v)),
            Self::Bool(v) => (index == 0).then_some(Value::Bool(*v)),
            Self::Int32s(v) => v.get(index).copied().map(Value::Int32),
            Self::Int64s(v) => v.get(index).copied().map(Value::Int64),
            Self::Floats(v) => v.get(index).copied().map(Value::Float),
            Self::Doubles(v) => v.get(index).copied().map(Value::Double),
            Self::Bools(v) => v.get(index).copied().map(Value::Bool),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed slot access
// ---------------------------------------------------------------------------

/// Element types that can be read from and written to a [`Slot`].
pub(crate) trait SlotValue: Copy {
    fn scalar(slot: &Slot) -> Option<Self>;
    fn scalar_mut(slot: &mut Slot) -> Option<&mut Self>;
    fn elements(slot: &Slot) -> Option<&[Self]>;
    fn elements_mut(slot: &mut Slot) -> Option<&mut [Self]>;
}

macro_rules! impl_slot_value {
    ($ty:ty, $scalar:ident, $array:ident) => {
        impl SlotValue for $ty {
            fn scalar(slot: &Slot) -> Option<Self> {
                match slot {
                    Slot::$scalar(v) => Some(*v),
                    _ => None,
                }
            }

            fn scalar_mut(slot: &mut Slot) -> Option<&mut Self> {
                match slot {
                    Slot::$scalar(v) => Some(v),
                    _ => None,
                }
            }

            fn elements(slot: &Slot) -> Option<&[Self]> {
                match slot {
                    Slot::$array(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn elements_mut(slot: &mut Slot) -> Option<&mut [Self]> {
                match slot {
                    Slot::$array(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_slot_value!(i32, Int32, Int32s);
impl_slot_value!(i64, Int64, Int64s);
impl_slot_value!(f32, Float, Floats);
impl_slot_value!(f64, Double, Doubles);
impl_slot_value!(bool, Bool, Bools);

// ---------------------------------------------------------------------------
// PhysicsBlock
// ---------------------------------------------------------------------------

/// Every physics property of one galaxy.
///
/// Blocks are created only through
/// [`Galaxy::allocate`](crate::Galaxy::allocate) and
/// [`copy_properties`](crate::copy_properties); there is no way to share
/// one between two records.
#[derive(Debug, PartialEq)]
pub struct PhysicsBlock {
    /// One slot per physics property, in registry order.
    slots: Vec<Slot>,
    /// Length of every `Shape::Dynamic` array in this block.
    dynamic_len: usize,
}

impl PhysicsBlock {
    /// Allocate a block with every property at its schema default.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::InvalidConfig`] if `config` cannot size the
    /// dynamic arrays, or [`PropertyError::AllocationFailed`] if memory
    /// cannot be reserved. No partial block escapes on failure.
    pub(crate) fn new(config: &RunConfig) -> Result<Self, PropertyError> {
        config.check_layout()?;
        let dynamic_len = config.output_snapshot_count;

        let mut slots = Vec::new();
        slots.try_reserve_exact(registry::physics_count())?;
        for (_, info) in registry::physics_properties() {
            slots.push(Slot::with_default(info.default, info.shape, dynamic_len)?);
        }

        Ok(Self { slots, dynamic_len })
    }

    /// Deep copy with fallible reservation.
    pub(crate) fn try_clone(&self) -> Result<Self, PropertyError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(self.slots.len())?;
        for slot in &self.slots {
            slots.push(slot.try_clone()?);
        }
        Ok(Self {
            slots,
            dynamic_len: self.dynamic_len,
        })
    }

    /// Copy every value of `src` into this block's own storage.
    ///
    /// Returns `false` without touching anything when the two blocks do not
    /// share a layout.
    pub(crate) fn assign_from(&mut self, src: &Self) -> bool {
        let compatible = self.slots.len() == src.slots.len()
            && self
                .slots
                .iter()
                .zip(&src.slots)
                .all(|(dst, src)| dst.same_layout(src));
        if !compatible {
            return false;
        }
        for (dst, src) in self.slots.iter_mut().zip(&src.slots) {
            dst.assign(src);
        }
        true
    }

    /// Length of the dynamically sized arrays.
    pub const fn dynamic_len(&self) -> usize {
        self.dynamic_len
    }

    /// Number of slots (physics properties) in the block.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }
}
