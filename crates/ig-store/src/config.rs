use std::fs;
use std::path::Path;

use ig_core::DiscoveryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Contents of `config.toml` in the data directory. Every key is optional.
///
/// ```toml
/// owner = "research"
///
/// [discovery]
/// threshold = 0.1
/// limit = 5
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub owner: Option<String>,
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.discovery.threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(StoreError::InvalidData(format!(
                "discovery.threshold must be in [0, 1), got {threshold}"
            )));
        }
        Ok(())
    }
}
