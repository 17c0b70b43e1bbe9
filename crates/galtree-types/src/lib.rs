//! Shared type definitions for the galtree merger-tree engine.
//!
//! This crate holds the plain data that flows between the tree reader, the
//! property store, and the inheritance engine. Nothing here allocates
//! galaxy state or walks a tree; it only describes the inputs.
//!
//! # Modules
//!
//! - [`enums`] -- Galaxy classification ([`GalaxyType`]).
//! - [`halo`] -- The read-only merger-tree node ([`Halo`]).
//! - [`run`] -- Run parameters ([`RunConfig`]) and cosmology ([`Cosmology`]).

pub mod enums;
pub mod halo;
pub mod run;

// Re-export all public types at crate root for convenience.
pub use enums::GalaxyType;
pub use halo::Halo;
pub use run::{Cosmology, MAX_OUTPUT_SNAPSHOTS, RunConfig, RunConfigError};
