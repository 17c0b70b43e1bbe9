//! Physics pipeline trait and no-op implementation.
//!
//! After a halo's galaxies have been collected or inherited, the forest
//! driver hands that contiguous block to a [`PhysicsPipeline`]. The
//! pipeline may change any property of those galaxies through the property
//! store accessors; it never sees the rest of the working array.
//!
//! [`NoopPipeline`] leaves every galaxy as inherited, which exercises the
//! traversal end-to-end without any astrophysics.

use galtree_props::Galaxy;
use galtree_types::Halo;

/// Errors a physics pipeline can report for one halo.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A physics step rejected the halo's galaxies.
    #[error("physics step `{step}` failed on halo {halo_nr}: {message}")]
    Step {
        /// Name of the failing step.
        step: String,
        /// Index of the halo being evolved.
        halo_nr: usize,
        /// Description of the failure.
        message: String,
    },
}

/// A source of galaxy evolution between snapshots.
///
/// The driver calls [`evolve`] once per halo, in snapshot order, after the
/// halo's galaxies are in place.
///
/// [`evolve`]: PhysicsPipeline::evolve
pub trait PhysicsPipeline {
    /// Evolve the galaxies hosted by `halo`.
    ///
    /// `galaxies` is the halo's block in the working array; its first
    /// entry is the block's central. An empty slice means the halo hosts
    /// no galaxy.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the halo cannot be evolved. The driver
    /// aborts the forest.
    fn evolve(
        &mut self,
        halo_nr: usize,
        halo: &Halo,
        galaxies: &mut [Galaxy],
    ) -> Result<(), PipelineError>;
}

/// A pipeline that leaves every galaxy unchanged.
#[derive(Debug, Clone, Default)]
pub struct NoopPipeline;

impl NoopPipeline {
    /// Create a new no-op pipeline.
    pub const fn new() -> Self {
        Self
    }
}

impl PhysicsPipeline for NoopPipeline {
    fn evolve(
        &mut self,
        _halo_nr: usize,
        _halo: &Halo,
        _galaxies: &mut [Galaxy],
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}
