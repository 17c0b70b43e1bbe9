//! Forest runner binary for the galtree engine.
//!
//! Loads the run configuration and a forest file, then traverses every
//! forest on its own blocking worker. Forests share no mutable state, so
//! they run in parallel; halos within one forest are visited in snapshot
//! order by a single worker.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `galtree-config.yaml` (or `GALTREE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the forest file named by the first argument
//! 4. Spawn one worker per forest
//! 5. Collect and log the per-forest summaries

mod error;
mod forests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use galtree_core::{LoggingConfig, SimulationConfig};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::forests::ForestFile;

/// Config file used when `GALTREE_CONFIG` is not set.
const DEFAULT_CONFIG_FILE: &str = "galtree-config.yaml";

/// Forest file used when no argument is given.
const DEFAULT_FOREST_FILE: &str = "demos/forests.json";

/// Application entry point for the forest runner.
///
/// # Errors
///
/// Returns an error if configuration or input loading fails, or if any
/// forest fails to traverse.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::var("GALTREE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("galtree-engine starting");
    if !from_file {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        output_snapshot_count = config.run.output_snapshot_count,
        output_snapshots = ?config.run.output_snapshots,
        snapshots_with_redshift = config.run.snapshot_redshifts.len(),
        "Configuration loaded"
    );

    // 3. Load forests.
    let forest_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_FOREST_FILE), PathBuf::from);
    let file = ForestFile::from_file(&forest_path)?;
    info!(
        path = %forest_path.display(),
        forests = file.forests.len(),
        "Forest file loaded"
    );

    // 4. One blocking worker per forest.
    let run = Arc::new(config.run);
    let mut workers = JoinSet::new();
    for (position, forest) in file.forests.into_iter().enumerate() {
        let run = Arc::clone(&run);
        let offset = forests::index_offset(position);
        workers.spawn_blocking(move || {
            let forest_id = forest.forest_id;
            forests::run_forest(&forest, &run, offset)
                .map_err(|source| EngineError::Forest { forest_id, source })
        });
    }

    // 5. Collect results.
    let mut completed: u64 = 0;
    let mut halos: usize = 0;
    let mut galaxies: usize = 0;
    let mut orphans: u64 = 0;
    let mut gap_events: u64 = 0;
    while let Some(joined) = workers.join_next().await {
        let report = joined.map_err(EngineError::from)??;
        info!(
            forest_id = report.forest_id,
            halos = report.summary.halos,
            galaxies = report.summary.galaxies,
            output_galaxies = report.summary.output_galaxies,
            orphans = report.summary.stats.orphans_created,
            max_gap = report.summary.stats.max_gap,
            "Forest complete"
        );
        completed = completed.saturating_add(1);
        halos = halos.saturating_add(report.summary.halos);
        galaxies = galaxies.saturating_add(report.summary.galaxies);
        orphans = orphans.saturating_add(report.summary.stats.orphans_created);
        gap_events = gap_events.saturating_add(report.summary.stats.gap_events);
    }

    info!(
        forests = completed,
        halos,
        galaxies,
        orphans,
        gap_events,
        "galtree-engine finished"
    );
    Ok(())
}

/// Load the configuration, falling back to defaults when the file is
/// missing. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        let mut config = SimulationConfig::default();
        config.logging.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
