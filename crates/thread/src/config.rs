//! Synthesis configuration.
//!
//! Small knobs that shape generated hardware: the default register width
//! and the prefix used for generated register names. Loadable from TOML
//! so build scripts can keep the settings next to the design sources.

use serde::Deserialize;
use std::path::Path;

fn default_datawidth() -> usize {
    32
}

fn default_prefix() -> String {
    "_thread".to_string()
}

/// Configuration for a [`ThreadGenerator`](crate::ThreadGenerator).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SynthesisConfig {
    /// Bit width of registers backing source variables.
    #[serde(default = "default_datawidth")]
    pub datawidth: usize,
    /// Prefix for generated register names.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for SynthesisConfig {
    fn default() -> SynthesisConfig {
        SynthesisConfig {
            datawidth: default_datawidth(),
            prefix: default_prefix(),
        }
    }
}

impl SynthesisConfig {
    pub fn new() -> SynthesisConfig {
        SynthesisConfig::default()
    }

    pub fn with_datawidth(mut self, datawidth: usize) -> SynthesisConfig {
        self.datawidth = datawidth;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> SynthesisConfig {
        self.prefix = prefix.to_string();
        self
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<SynthesisConfig, String> {
        let config: SynthesisConfig =
            toml::from_str(text).map_err(|e| format!("invalid synthesis config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_path(path: &Path) -> Result<SynthesisConfig, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        SynthesisConfig::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.datawidth == 0 {
            return Err("datawidth must be non-zero".to_string());
        }
        if self.prefix.is_empty() {
            return Err("prefix must be non-empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SynthesisConfig::default();
        assert_eq!(c.datawidth, 32);
        assert_eq!(c.prefix, "_thread");
    }

    #[test]
    fn test_parse_partial_toml() {
        let c = SynthesisConfig::from_toml_str("datawidth = 64").unwrap();
        assert_eq!(c.datawidth, 64);
        assert_eq!(c.prefix, "_thread");
    }

    #[test]
    fn test_zero_datawidth_rejected() {
        let err = SynthesisConfig::from_toml_str("datawidth = 0").unwrap_err();
        assert!(err.contains("datawidth"));
    }

    #[test]
    fn test_builder() {
        let c = SynthesisConfig::new().with_datawidth(16).with_prefix("_th");
        assert_eq!(c.datawidth, 16);
        assert_eq!(c.prefix, "_th");
    }
}
