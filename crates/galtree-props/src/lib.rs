//! Galaxy records and the two-tier property store.
//!
//! Every galaxy carries a small set of core fields that the inheritance
//! engine reads and writes directly, plus one physics block holding every
//! property the physics modules evolve. Physics properties are addressed by
//! a [`PropertyId`] resolved once from a name; reads and writes never fail,
//! falling back to a caller-supplied default instead.
//!
//! # Modules
//!
//! - [`registry`] -- The fixed property schema, name resolution, and
//!   per-property metadata.
//! - [`block`] -- [`PhysicsBlock`], the owned per-galaxy physics storage.
//! - [`galaxy`] -- The [`Galaxy`] record, typed accessors, and deep copy.
//! - [`error`] -- Error types for allocation and copying.

pub mod block;
pub mod error;
pub mod galaxy;
pub mod registry;

// Re-export primary types at crate root.
pub use block::PhysicsBlock;
pub use error::PropertyError;
pub use galaxy::{Galaxy, copy_properties};
pub use registry::{
    PROPERTY_COUNT, Property, PropertyId, PropertyInfo, STEPS, Shape, StorageClass, Value,
    ValueType, physics_count, physics_properties, property_info, resolve,
};
