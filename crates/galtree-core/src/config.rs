//! Configuration loading and typed config structures for a galtree run.
//!
//! The configuration is a YAML file with two sections: `run` (the
//! [`RunConfig`] consulted by the property store and the inheritance
//! engine) and `logging`. Every field has a default, so an empty file is a
//! valid configuration.

use std::path::Path;

use galtree_types::{RunConfig, RunConfigError};
use serde::Deserialize;

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "GALTREE_LOG_LEVEL";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The `run` section cannot drive a run.
    #[error("invalid run section: {source}")]
    Invalid {
        /// The underlying validation failure.
        #[from]
        source: RunConfigError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run parameters: output layout, snapshot redshifts, cosmology.
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `GALTREE_LOG_LEVEL` overrides `logging.level` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the run section fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the run section fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.logging.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check the run section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] with the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Override the level with `GALTREE_LOG_LEVEL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(LOG_LEVEL_ENV) {
            self.level = val;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.run.output_snapshot_count, 8);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
run:
  output_snapshot_count: 3
  output_snapshots: [2, 5, 9]
  snapshot_redshifts: [6.0, 5.0, 4.0, 3.0, 2.5, 2.0, 1.5, 1.0, 0.5, 0.0]
  cosmology:
    omega: 0.3
    omega_lambda: 0.7
    hubble_h: 0.7

logging:
  level: debug
  json: true
";

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.run.output_snapshot_count, 3);
        assert_eq!(config.run.output_snapshots, vec![2, 5, 9]);
        assert_eq!(config.run.redshift(9), Some(0.0));
        assert!((config.run.cosmology.omega - 0.3).abs() < f64::EPSILON);
        // Unlisted cosmology fields keep their defaults.
        assert!((config.run.cosmology.hubble - 100.0).abs() < f64::EPSILON);
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "run:\n  output_snapshot_count: 2\n";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.run.output_snapshot_count, 2);
        assert!(config.run.output_snapshots.is_empty());
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SimulationConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn zero_output_snapshots_rejected() {
        let yaml = "run:\n  output_snapshot_count: 0\n";
        let config = SimulationConfig::parse(yaml);
        assert!(matches!(config, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn more_outputs_than_history_slots_rejected() {
        let yaml = "run:\n  output_snapshot_count: 1\n  output_snapshots: [0, 1]\n";
        let config = SimulationConfig::parse(yaml);
        assert!(matches!(
            config,
            Err(ConfigError::Invalid {
                source: RunConfigError::TooManyOutputSlots { listed: 2, slots: 1 }
            })
        ));
    }

    #[test]
    fn malformed_yaml_rejected() {
        let config = SimulationConfig::parse("run: [unclosed");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let config = SimulationConfig::from_file(Path::new("/nonexistent/galtree.yaml"));
        assert!(matches!(config, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("galtree-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
