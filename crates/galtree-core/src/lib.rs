//! Record arrays, merger-tree inheritance, and forest traversal.
//!
//! This crate walks a forest of halos in snapshot order and decides which
//! galaxies every halo hosts: spawned, inherited from one progenitor,
//! merged from several, or demoted to orphans.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `galtree-config.yaml` into
//!   strongly-typed structs.
//! - [`records`] -- [`GalaxyArray`], growable storage of deep-copied records.
//! - [`virial`] -- Virial radius and velocity from mass and cosmology.
//! - [`tree`] -- [`TreeContext`], the per-forest inheritance engine.
//! - [`pipeline`] -- [`PhysicsPipeline`] trait and [`NoopPipeline`].
//! - [`forest`] -- [`process_forest`], the snapshot-ordered driver.
//!
//! [`GalaxyArray`]: records::GalaxyArray
//! [`TreeContext`]: tree::TreeContext
//! [`PhysicsPipeline`]: pipeline::PhysicsPipeline
//! [`NoopPipeline`]: pipeline::NoopPipeline
//! [`process_forest`]: forest::process_forest

pub mod config;
pub mod forest;
pub mod pipeline;
pub mod records;
pub mod tree;
pub mod virial;

pub use config::{ConfigError, LoggingConfig, SimulationConfig};
pub use forest::{ForestSummary, process_forest, snapshot_order};
pub use pipeline::{NoopPipeline, PhysicsPipeline, PipelineError};
pub use records::{GalaxyArray, INITIAL_CAPACITY, RecordError};
pub use tree::{HaloAux, TraversalStats, TreeContext, TreeError, measure_gap};
