//! Engine settings
//!
//! Settings are read from an optional file (TOML, YAML or JSON, picked by
//! extension) and then from `POMSYNC_*` environment variables, later sources
//! overriding earlier ones. Anything left unset falls back to the defaults.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::Encoding;
use crate::error::{PomSyncError, Result};

/// Default cap on distinct `(id, old, new)` announcements in one cascade
pub const DEFAULT_MAX_PROPAGATION_DEPTH: usize = 1024;

/// Default descriptor file name inside a project directory
pub const DEFAULT_DESCRIPTOR_FILE_NAME: &str = "pom.xml";

const ENV_PREFIX: &str = "POMSYNC";

/// Settings that shape how projects are loaded and how far changes propagate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_propagation_depth: usize,

    pub descriptor_file_name: String,

    /// Used for descriptors without an encoding declaration
    pub default_encoding: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: DEFAULT_MAX_PROPAGATION_DEPTH,
            descriptor_file_name: DEFAULT_DESCRIPTOR_FILE_NAME.to_string(),
            default_encoding: Encoding::Utf8.label().to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads settings from `path` (if it exists) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Loading engine configuration from {:?}", path);
            builder = builder.add_source(File::from(PathBuf::from(path)).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_propagation_depth == 0 {
            return Err(PomSyncError::Configuration(
                "max_propagation_depth must be greater than 0".to_string(),
            ));
        }
        if self.descriptor_file_name.trim().is_empty() {
            return Err(PomSyncError::Configuration(
                "descriptor_file_name must not be empty".to_string(),
            ));
        }
        self.encoding()?;
        Ok(())
    }

    pub fn encoding(&self) -> Result<Encoding> {
        Encoding::from_label(&self.default_encoding).ok_or_else(|| {
            PomSyncError::Configuration(format!(
                "unsupported default_encoding {}",
                self.default_encoding
            ))
        })
    }

    pub fn with_max_propagation_depth(mut self, depth: usize) -> Self {
        self.max_propagation_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.max_propagation_depth, 1024);
        assert_eq!(config.descriptor_file_name, "pom.xml");
        assert!(config.validate().is_ok());
        assert_eq!(config.encoding().unwrap(), Encoding::Utf8);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pomsync.toml");
        std::fs::write(&path, "max_propagation_depth = 16\ndefault_encoding = \"ISO-8859-1\"\n").unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_propagation_depth, 16);
        assert_eq!(config.descriptor_file_name, "pom.xml");
        assert_eq!(config.encoding().unwrap(), Encoding::Latin1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.descriptor_file_name, DEFAULT_DESCRIPTOR_FILE_NAME);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(EngineConfig::default().with_max_propagation_depth(0).validate().is_err());

        let config = EngineConfig {
            default_encoding: "EBCDIC".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PomSyncError::Configuration(_))));
    }
}
