//! Forest input and the per-forest worker.
//!
//! The tree reader is outside this workspace; the binary consumes a JSON
//! file of the form `{ "forests": [ { "forest_id": 0, "halos": [...] } ] }`
//! instead. Each forest is processed by [`run_forest`] with its own
//! traversal context, so forests can run on separate threads.

use std::path::Path;

use galtree_core::{ForestSummary, NoopPipeline, TreeContext, TreeError, process_forest};
use galtree_types::{Halo, RunConfig};
use serde::Deserialize;
use tracing::debug;

use crate::error::EngineError;

/// Galaxy index stride between consecutive forests.
pub const FOREST_INDEX_STRIDE: u64 = 1_000_000_000;

/// Contents of a forest file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForestFile {
    /// Every forest of the file, in file order.
    #[serde(default)]
    pub forests: Vec<ForestInput>,
}

/// One forest: a flat slice of halos with index links.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestInput {
    /// Identifier of the forest.
    pub forest_id: u64,
    /// The forest's halos.
    #[serde(default)]
    pub halos: Vec<Halo>,
}

/// Outcome of one forest.
#[derive(Debug, Clone, Copy)]
pub struct ForestReport {
    /// Identifier of the forest.
    pub forest_id: u64,
    /// Traversal summary.
    pub summary: ForestSummary,
}

impl ForestFile {
    /// Load a forest file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be read, or
    /// [`EngineError::Json`] if it is not a valid forest file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a forest file from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Json`] if the string is not a valid forest
    /// file.
    pub fn parse(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Global galaxy index offset of the forest at `position` in the file.
pub fn index_offset(position: usize) -> u64 {
    u64::try_from(position)
        .unwrap_or(u64::MAX)
        .saturating_mul(FOREST_INDEX_STRIDE)
}

/// Traverse one forest with a fresh context.
///
/// # Errors
///
/// Returns the first [`TreeError`] of the traversal.
pub fn run_forest(
    forest: &ForestInput,
    config: &RunConfig,
    index_offset: u64,
) -> Result<ForestReport, TreeError> {
    debug!(
        forest_id = forest.forest_id,
        halos = forest.halos.len(),
        index_offset,
        "Forest worker starting"
    );
    let mut ctx = TreeContext::new(&forest.halos, config).with_index_offset(index_offset);
    let mut pipeline = NoopPipeline::new();
    let summary = process_forest(&mut ctx, &mut pipeline, &config.output_snapshots)?;
    Ok(ForestReport {
        forest_id: forest.forest_id,
        summary,
    })
}
