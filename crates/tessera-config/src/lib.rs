//! Runtime configuration for Tessera, loaded from `tessera.toml`.
//!
//! Only the pieces that change observable encoding live here; everything
//! else is declared in code on the entity builder.

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Default separator joining composite components in their string form.
pub const DEFAULT_SEPARATOR: char = ',';

/// Default escape character guarding separators inside components.
pub const DEFAULT_ESCAPE: char = '~';

/// Conventional config file name looked up by `TesseraConfig::load_dir`.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("codec separator and escape must differ (both are '{0}')")]
    Codec(char),
}

///
/// TesseraConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TesseraConfig {
    #[serde(default)]
    pub codec: CodecConfig,
}

impl TesseraConfig {
    /// Parse and validate a config document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    /// Load `tessera.toml` from `dir`, falling back to defaults when absent.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.codec.validate()
    }
}

///
/// CodecConfig
///
/// Characters used by the composite string codec.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CodecConfig {
    #[serde(default = "default_separator")]
    pub separator: char,

    #[serde(default = "default_escape")]
    pub escape: char,
}

impl CodecConfig {
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.separator == self.escape {
            return Err(ConfigError::Codec(self.separator));
        }

        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            escape: DEFAULT_ESCAPE,
        }
    }
}

const fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

const fn default_escape() -> char {
    DEFAULT_ESCAPE
}
