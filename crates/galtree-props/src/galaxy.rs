//! The galaxy record: fixed core fields plus an owned physics block.
//!
//! Core properties are plain public fields and are read and written
//! directly; the physics pipeline touches them in its innermost loops.
//! Physics properties go through the identifier-based accessors on
//! [`Galaxy`], which never fail: an unknown identifier, a core identifier,
//! a type mismatch, an out-of-range index, or an unallocated block all
//! yield the caller's default (reads) or leave the record unchanged
//! (writes, which return `false`).
//!
//! Callers holding an optional record use
//! `record.map_or(default, |g| g.get_f32(id, default))`.

use galtree_types::{GalaxyType, RunConfig};

use crate::block::{PhysicsBlock, SlotValue};
use crate::error::PropertyError;
use crate::registry::{self, Property, PropertyId, StorageClass, Value};

/// One galaxy.
///
/// A record exclusively owns its physics block. Records are never cloned
/// implicitly; [`Galaxy::duplicate`] produces an independent deep copy.
#[derive(Debug, Default, PartialEq)]
pub struct Galaxy {
    /// Per-forest galaxy number.
    pub galaxy_nr: u32,
    /// Globally unique galaxy index.
    pub galaxy_index: u64,
    /// Working-array index of this galaxy's central, if assigned.
    pub central_gal: Option<usize>,
    /// Index of the halo the galaxy belongs to.
    pub halo_nr: usize,
    /// Classification.
    pub galaxy_type: GalaxyType,
    /// Snapshot of the last update.
    pub snap_num: u32,
    /// Particle count of the host halo.
    pub len: u32,
    /// Virial mass. Always zero for orphans.
    pub mvir: f32,
    /// Virial radius.
    pub rvir: f32,
    /// Virial velocity.
    pub vvir: f32,
    /// Maximum circular velocity.
    pub vmax: f32,
    /// Comoving position.
    pub pos: [f32; 3],
    /// Peculiar velocity.
    pub vel: [f32; 3],
    /// Most bound particle identifier.
    pub most_bound_id: i64,
    /// Physics properties; `None` before allocation and after `free`.
    properties: Option<Box<PhysicsBlock>>,
}

/// Generates the typed public accessors for one element type.
macro_rules! typed_accessors {
    ($ty:ty, $kind:literal, $get:ident, $set:ident, $get_el:ident, $set_el:ident) => {
        #[doc = concat!("Read a scalar ", $kind, " physics property, or `default`.")]
        pub fn $get(&self, id: PropertyId, default: $ty) -> $ty {
            self.scalar(id).unwrap_or(default)
        }

        #[doc = concat!("Write a scalar ", $kind, " physics property. Returns whether it was written.")]
        pub fn $set(&mut self, id: PropertyId, value: $ty) -> bool {
            self.set_scalar(id, value)
        }

        #[doc = concat!("Read element `index` of a ", $kind, " array property, or `default`.")]
        pub fn $get_el<I: TryInto<usize>>(&self, id: PropertyId, index: I, default: $ty) -> $ty {
            self.element(id, index).unwrap_or(default)
        }

        #[doc = concat!("Write element `index` of a ", $kind, " array property. Returns whether it was written.")]
        pub fn $set_el<I: TryInto<usize>>(&mut self, id: PropertyId, index: I, value: $ty) -> bool {
            self.set_element(id, index, value)
        }
    };
}

impl Galaxy {
    /// A record with zeroed core fields and no physics block.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------
    // Physics block lifecycle
    // -------------------------------------------------------------------

    /// Allocate the physics block with every property at its default.
    ///
    /// Already-allocated records are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::InvalidConfig`] or
    /// [`PropertyError::AllocationFailed`]; the record stays unallocated.
    pub fn allocate(&mut self, config: &RunConfig) -> Result<(), PropertyError> {
        if self.properties.is_some() {
            return Ok(());
        }
        let block = PhysicsBlock::new(config).inspect_err(|err| {
            tracing::warn!(galaxy_index = self.galaxy_index, %err, "Physics block allocation failed");
        })?;
        self.properties = Some(Box::new(block));
        Ok(())
    }

    /// Whether the physics block exists.
    pub const fn is_allocated(&self) -> bool {
        self.properties.is_some()
    }

    /// The physics block, if allocated.
    pub fn physics(&self) -> Option<&PhysicsBlock> {
        self.properties.as_deref()
    }

    /// Release the physics block. Calling it again is a no-op.
    pub fn free(&mut self) {
        self.properties = None;
    }

    /// An independent deep copy: same core fields, a freshly allocated
    /// block holding the same values.
    ///
    /// # Errors
    ///
    /// Propagates [`copy_properties`] failures.
    pub fn duplicate(&self, config: &RunConfig) -> Result<Self, PropertyError> {
        let mut copy = self.core_fields();
        copy_properties(&mut copy, self, config)?;
        Ok(copy)
    }

    /// Copy of the core fields with no physics block.
    pub const fn core_fields(&self) -> Self {
        Self {
            galaxy_nr: self.galaxy_nr,
            galaxy_index: self.galaxy_index,
            central_gal: self.central_gal,
            halo_nr: self.halo_nr,
            galaxy_type: self.galaxy_type,
            snap_num: self.snap_num,
            len: self.len,
            mvir: self.mvir,
            rvir: self.rvir,
            vvir: self.vvir,
            vmax: self.vmax,
            pos: self.pos,
            vel: self.vel,
            most_bound_id: self.most_bound_id,
            properties: None,
        }
    }

    // -------------------------------------------------------------------
    // Typed physics accessors
    // -------------------------------------------------------------------

    typed_accessors!(i32, "32-bit integer", get_i32, set_i32, get_i32_element, set_i32_element);
    typed_accessors!(i64, "64-bit integer", get_i64, set_i64, get_i64_element, set_i64_element);
    typed_accessors!(f32, "float", get_f32, set_f32, get_f32_element, set_f32_element);
    typed_accessors!(f64, "double", get_f64, set_f64, get_f64_element, set_f64_element);
    typed_accessors!(bool, "boolean", get_bool, set_bool, get_bool_element, set_bool_element);

    /// Number of elements of an array property.
    ///
    /// Fixed arrays report their schema length, dynamic arrays the length
    /// chosen at allocation. Scalars, core or unknown identifiers, and
    /// unallocated records report 0.
    pub fn array_size(&self, id: PropertyId) -> usize {
        self.slot_index(id)
            .and_then(|idx| self.physics()?.slot(idx))
            .map_or(0, crate::block::Slot::len)
    }

    /// Read any property, core or physics, as a dynamically typed value.
    ///
    /// `index` selects the element of an array property and must be 0 for
    /// scalars. Intended for output writers.
    pub fn read_value(&self, id: PropertyId, index: usize) -> Option<Value> {
        let property = Property::from_id(id)?;
        match property.info().class {
            StorageClass::Core => self.core_value(property, index),
            StorageClass::Physics => self
                .slot_index(id)
                .and_then(|idx| self.physics()?.slot(idx))
                .and_then(|slot| slot.value_at(index)),
        }
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn slot_index(&self, id: PropertyId) -> Option<usize> {
        registry::physics_slot(id)
    }

    fn scalar<T: SlotValue>(&self, id: PropertyId) -> Option<T> {
        let idx = self.slot_index(id)?;
        T::scalar(self.physics()?.slot(idx)?)
    }

    fn set_scalar<T: SlotValue>(&mut self, id: PropertyId, value: T) -> bool {
        let Some(idx) = self.slot_index(id) else {
            return false;
        };
        let target = self
            .properties
            .as_deref_mut()
            .and_then(|block| block.slot_mut(idx))
            .and_then(T::scalar_mut);
        match target {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn element<T: SlotValue, I: TryInto<usize>>(&self, id: PropertyId, index: I) -> Option<T> {
        let index = index.try_into().ok()?;
        let idx = self.slot_index(id)?;
        T::elements(self.physics()?.slot(idx)?)?.get(index).copied()
    }

    fn set_element<T: SlotValue, I: TryInto<usize>>(
        &mut self,
        id: PropertyId,
        index: I,
        value: T,
    ) -> bool {
        let Ok(index) = index.try_into() else {
            return false;
        };
        let Some(idx) = self.slot_index(id) else {
            return false;
        };
        let target = self
            .properties
            .as_deref_mut()
            .and_then(|block| block.slot_mut(idx))
            .and_then(T::elements_mut)
            .and_then(|elements| elements.get_mut(index));
        match target {
            Some(element) => {
                *element = value;
                true
            }
            None => false,
        }
    }

    fn core_value(&self, property: Property, index: usize) -> Option<Value> {
        let scalar = |value: Value| (index == 0).then_some(value);
        match property {
            Property::GalaxyNr => scalar(Value::Int32(i32::try_from(self.galaxy_nr).ok()?)),
            Property::GalaxyIndex => scalar(Value::Int64(i64::try_from(self.galaxy_index).ok()?)),
            Property::CentralGal => scalar(Value::Int32(
                self.central_gal
                    .map_or(Some(-1), |idx| i32::try_from(idx).ok())?,
            )),
            Property::HaloNr => scalar(Value::Int32(i32::try_from(self.halo_nr).ok()?)),
            Property::Type => scalar(Value::Int32(self.galaxy_type.code())),
            Property::SnapNum => scalar(Value::Int32(i32::try_from(self.snap_num).ok()?)),
            Property::Len => scalar(Value::Int32(i32::try_from(self.len).ok()?)),
            Property::Mvir => scalar(Value::Float(self.mvir)),
            Property::Rvir => scalar(Value::Float(self.rvir)),
            Property::Vvir => scalar(Value::Float(self.vvir)),
            Property::Vmax => scalar(Value::Float(self.vmax)),
            Property::Pos => self.pos.get(index).copied().map(Value::Float),
            Property::Vel => self.vel.get(index).copied().map(Value::Float),
            Property::MostBoundId => scalar(Value::Int64(self.most_bound_id)),
            _ => None,
        }
    }
}

/// Deep-copy every physics property of `src` into `dest`'s own block.
///
/// `dest` gets a block if it has none; an existing block with the same
/// layout is overwritten in place. The block handle itself is never shared.
///
/// # Errors
///
/// - [`PropertyError::MissingBlock`] if `src` is unallocated.
/// - [`PropertyError::LayoutMismatch`] if `src` was sized for a different
///   output snapshot count than `config`.
/// - [`PropertyError::AllocationFailed`] if a fresh block cannot be
///   reserved; `dest` is unchanged.
pub fn copy_properties(
    dest: &mut Galaxy,
    src: &Galaxy,
    config: &RunConfig,
) -> Result<(), PropertyError> {
    let src_block = src.physics().ok_or(PropertyError::MissingBlock)?;
    config.check_layout()?;
    if src_block.dynamic_len() != config.output_snapshot_count {
        return Err(PropertyError::LayoutMismatch {
            expected: config.output_snapshot_count,
            actual: src_block.dynamic_len(),
        });
    }

    if let Some(dest_block) = dest.properties.as_deref_mut() {
        if dest_block.assign_from(src_block) {
            return Ok(());
        }
    }

    let fresh = src_block.try_clone()?;
    dest.properties = Some(Box::new(fresh));
    Ok(())
}
