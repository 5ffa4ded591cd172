//! Toolchain configuration (vela.toml)

use crate::module::BinaryVersion;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Compiled-artifact format this toolchain reads and writes
pub const SUPPORTED_BINARY_VERSION: BinaryVersion = BinaryVersion::new(3, 2);

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Toolchain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub toolchain: ToolchainSettings,

    /// The module every other module implicitly imports
    #[serde(default)]
    pub foundational: FoundationalModule,

    /// Host runtime description
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Compiler-wide resolution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ToolchainSettings {
    /// Supported compiled-artifact format version
    #[serde(default = "default_binary_version")]
    pub binary_version: BinaryVersion,

    /// Load binary modules even when nothing being compiled needs them
    #[serde(default)]
    pub load_transitive_dependencies: bool,

    /// Archive formats searched by the locator, in order
    #[serde(default = "default_artifact_extensions")]
    pub artifact_extensions: Vec<String>,
}

fn default_binary_version() -> BinaryVersion {
    SUPPORTED_BINARY_VERSION
}

fn default_artifact_extensions() -> Vec<String> {
    vec!["vmod".to_string(), "nar".to_string()]
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            binary_version: default_binary_version(),
            load_transitive_dependencies: false,
            artifact_extensions: default_artifact_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoundationalModule {
    #[serde(default = "default_foundational_name")]
    pub name: String,

    #[serde(default = "default_foundational_version")]
    pub version: String,
}

fn default_foundational_name() -> String {
    "vela.lang".to_string()
}

fn default_foundational_version() -> String {
    "1.0.0".to_string()
}

impl Default for FoundationalModule {
    fn default() -> Self {
        Self {
            name: default_foundational_name(),
            version: default_foundational_version(),
        }
    }
}

/// Host runtime description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformConfig {
    /// Version the runtime reports
    #[serde(default = "default_platform_version")]
    pub version: String,

    /// Lowest version the runtime still provides
    #[serde(default = "default_oldest_provided")]
    pub oldest_provided: String,

    /// Builtin module names
    #[serde(default)]
    pub modules: Vec<String>,
}

fn default_platform_version() -> String {
    "11".to_string()
}

fn default_oldest_provided() -> String {
    "8".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            version: default_platform_version(),
            oldest_provided: default_oldest_provided(),
            modules: Vec::new(),
        }
    }
}

impl ToolchainConfig {
    /// Parse a config from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a config from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ToolchainConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.foundational.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Foundational module name cannot be empty".to_string(),
            ));
        }

        if self.foundational.version.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Foundational module '{}' has empty version",
                self.foundational.name
            )));
        }

        if self.platform.version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Platform version cannot be empty".to_string(),
            ));
        }

        if self.toolchain.artifact_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one artifact extension is required".to_string(),
            ));
        }

        Ok(())
    }

    pub fn supported_binary_version(&self) -> BinaryVersion {
        self.toolchain.binary_version
    }
}
