//! Run parameters shared by the property store and the inheritance engine.
//!
//! [`RunConfig`] is the read-only input consulted when a galaxy's physics
//! block is allocated (dynamic array lengths) and when a primordial galaxy
//! is synthesized (cosmology, snapshot redshifts). It is loaded from the
//! `run` section of the YAML configuration by `galtree-core`.

use serde::{Deserialize, Serialize};

/// Upper bound on the number of output snapshots a run may request.
pub const MAX_OUTPUT_SNAPSHOTS: usize = 1000;

/// Reasons a [`RunConfig`] cannot be used to size a physics block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunConfigError {
    /// No output snapshots were requested.
    #[error("output_snapshot_count must be positive")]
    NoOutputSnapshots,
    /// More output snapshots were requested than [`MAX_OUTPUT_SNAPSHOTS`].
    #[error("output_snapshot_count {requested} exceeds maximum {max}", max = MAX_OUTPUT_SNAPSHOTS)]
    TooManyOutputSnapshots {
        /// The requested count.
        requested: usize,
    },
    /// More output snapshots are listed than history slots exist.
    #[error("{listed} output snapshots listed but output_snapshot_count is {slots}")]
    TooManyOutputSlots {
        /// Number of listed output snapshots.
        listed: usize,
        /// The configured `output_snapshot_count`.
        slots: usize,
    },
    /// A listed output snapshot has no redshift entry.
    #[error("output snapshot {snapshot} has no redshift entry")]
    MissingRedshift {
        /// The snapshot without a redshift.
        snapshot: u32,
    },
}

/// Parameters of one semi-analytic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Length of every dynamically sized physics array.
    #[serde(default = "default_output_snapshot_count")]
    pub output_snapshot_count: usize,

    /// Snapshots at which galaxies are extracted into the output array.
    #[serde(default)]
    pub output_snapshots: Vec<u32>,

    /// Redshift of every simulation snapshot, indexed by snapshot number.
    #[serde(default)]
    pub snapshot_redshifts: Vec<f64>,

    /// Cosmological parameters in internal units.
    #[serde(default)]
    pub cosmology: Cosmology,
}

impl RunConfig {
    /// Check that the configuration can size a physics block.
    ///
    /// # Errors
    ///
    /// Returns [`RunConfigError`] when the dynamic array length is zero or
    /// above [`MAX_OUTPUT_SNAPSHOTS`].
    pub const fn check_layout(&self) -> Result<(), RunConfigError> {
        if self.output_snapshot_count == 0 {
            return Err(RunConfigError::NoOutputSnapshots);
        }
        if self.output_snapshot_count > MAX_OUTPUT_SNAPSHOTS {
            return Err(RunConfigError::TooManyOutputSnapshots {
                requested: self.output_snapshot_count,
            });
        }
        Ok(())
    }

    /// Full validation: layout, one history slot per listed output
    /// snapshot, and a redshift for every output snapshot when a redshift
    /// table is given.
    ///
    /// # Errors
    ///
    /// Returns the first [`RunConfigError`] found.
    pub fn validate(&self) -> Result<(), RunConfigError> {
        self.check_layout()?;
        if self.output_snapshots.len() > self.output_snapshot_count {
            return Err(RunConfigError::TooManyOutputSlots {
                listed: self.output_snapshots.len(),
                slots: self.output_snapshot_count,
            });
        }
        if !self.snapshot_redshifts.is_empty() {
            for &snapshot in &self.output_snapshots {
                if self.redshift(snapshot).is_none() {
                    return Err(RunConfigError::MissingRedshift { snapshot });
                }
            }
        }
        Ok(())
    }

    /// Redshift of `snapshot`, if the table covers it.
    pub fn redshift(&self, snapshot: u32) -> Option<f64> {
        let idx = usize::try_from(snapshot).ok()?;
        self.snapshot_redshifts.get(idx).copied()
    }

    /// Whether galaxies should be extracted at `snapshot`.
    pub fn is_output_snapshot(&self, snapshot: u32) -> bool {
        self.output_snapshots.contains(&snapshot)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_snapshot_count: default_output_snapshot_count(),
            output_snapshots: Vec::new(),
            snapshot_redshifts: Vec::new(),
            cosmology: Cosmology::default(),
        }
    }
}

/// Cosmological parameters, in internal units (length Mpc/h, mass
/// 1e10 Msun/h, velocity km/s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cosmology {
    /// Matter density parameter.
    #[serde(default = "default_omega")]
    pub omega: f64,
    /// Dark energy density parameter.
    #[serde(default = "default_omega_lambda")]
    pub omega_lambda: f64,
    /// Dimensionless Hubble parameter.
    #[serde(default = "default_hubble_h")]
    pub hubble_h: f64,
    /// Simulation particle mass in 1e10 Msun/h.
    #[serde(default = "default_part_mass")]
    pub part_mass: f64,
    /// Gravitational constant in internal units.
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Hubble constant in internal units (100 h km/s/Mpc).
    #[serde(default = "default_hubble")]
    pub hubble: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            omega: default_omega(),
            omega_lambda: default_omega_lambda(),
            hubble_h: default_hubble_h(),
            part_mass: default_part_mass(),
            gravity: default_gravity(),
            hubble: default_hubble(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_output_snapshot_count() -> usize {
    8
}

const fn default_omega() -> f64 {
    0.25
}

const fn default_omega_lambda() -> f64 {
    0.75
}

const fn default_hubble_h() -> f64 {
    0.73
}

const fn default_part_mass() -> f64 {
    0.086_065_7
}

const fn default_gravity() -> f64 {
    43.007_1
}

const fn default_hubble() -> f64 {
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        let config = RunConfig::default();
        assert!(config.check_layout().is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_output_snapshots_rejected() {
        let config = RunConfig {
            output_snapshot_count: 0,
            ..RunConfig::default()
        };
        assert_eq!(config.check_layout(), Err(RunConfigError::NoOutputSnapshots));
    }

    #[test]
    fn oversized_layout_rejected() {
        let config = RunConfig {
            output_snapshot_count: MAX_OUTPUT_SNAPSHOTS + 1,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.check_layout(),
            Err(RunConfigError::TooManyOutputSnapshots { .. })
        ));
    }

    #[test]
    fn output_snapshot_without_redshift_rejected() {
        let config = RunConfig {
            output_snapshots: vec![0, 5],
            snapshot_redshifts: vec![3.0, 2.0, 1.0],
            ..RunConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(RunConfigError::MissingRedshift { snapshot: 5 })
        );
    }

    #[test]
    fn more_outputs_than_slots_rejected() {
        let config = RunConfig {
            output_snapshot_count: 1,
            output_snapshots: vec![0, 1],
            ..RunConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(RunConfigError::TooManyOutputSlots { listed: 2, slots: 1 })
        );

        let filled = RunConfig {
            output_snapshot_count: 2,
            ..config
        };
        assert!(filled.validate().is_ok());
    }

    #[test]
    fn redshift_lookup() {
        let config = RunConfig {
            snapshot_redshifts: vec![2.0, 1.0, 0.0],
            ..RunConfig::default()
        };
        assert_eq!(config.redshift(1), Some(1.0));
        assert_eq!(config.redshift(3), None);
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Option<RunConfig> = serde_json::from_str("{}").ok();
        assert_eq!(config, Some(RunConfig::default()));
    }
}
