use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::validate::DEFAULT_MAX_VALUE_LENGTH;

const DEFAULT_BLOCK_LABEL: &str = "SwitchEnv";

/// User settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Name written into shell block header and footer comments
    #[serde(default = "default_block_label")]
    pub block_label: String,
    /// Override for the generated env file (`~` and `$VAR` are expanded)
    #[serde(default)]
    pub env_file: Option<String>,
    /// Values longer than this raise a validation warning
    #[serde(default = "default_max_value_length")]
    pub max_value_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_label: default_block_label(),
            env_file: None,
            max_value_length: default_max_value_length(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {:?}", path))
    }

    /// Expanded `env_file` override, if one is configured.
    pub fn env_file_override(&self) -> Result<Option<PathBuf>> {
        self.env_file
            .as_deref()
            .map(|raw| {
                shellexpand::full(raw)
                    .map(|expanded| PathBuf::from(expanded.as_ref()))
                    .with_context(|| format!("Failed to expand env_file path '{raw}'"))
            })
            .transpose()
    }
}

fn default_block_label() -> String {
    DEFAULT_BLOCK_LABEL.to_string()
}

fn default_max_value_length() -> usize {
    DEFAULT_MAX_VALUE_LENGTH
}
