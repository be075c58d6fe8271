//! Configuration management for the CLI.
//!
//! Settings live in `~/.cardwright/config.toml`:
//!
//! ```toml
//! [model]
//! endpoint = "http://localhost:1234/v1/chat/completions"
//! model = "local-model"
//!
//! [generation]
//! target_language = "English"
//! card_density = "Medium"
//! concurrency = 2
//!
//! [validation]
//! min_question_len = 10
//!
//! [limits]
//! max_chunks = 500
//!
//! [output]
//! format = "table"
//! color = true
//! ```
//!
//! Every section is optional; missing keys take their defaults.

use crate::error::{CliError, Result};
use cardwright_extractor::GenerationConfig;
use cardwright_gatekeeper::{ResourceLimits, ValidationConfig};
use cardwright_llm::ModelSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model server connection
    #[serde(default)]
    pub model: ModelSettings,

    /// Generation run settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Card acceptance rules
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Pre-flight ceilings
    #[serde(default)]
    pub limits: ResourceLimits,

    /// Output settings
    #[serde(default)]
    pub output: OutputSettings,
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (tab-separated) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".cardwright").join("config.toml"))
    }

    /// Load configuration from the default path, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load configuration from `path`, or defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.model
            .validate()
            .map_err(|e| CliError::Config(format!("[model] {}", e)))?;
        self.generation
            .validate()
            .map_err(|e| CliError::Config(format!("[generation] {}", e)))?;
        self.validation
            .validate()
            .map_err(|e| CliError::Config(format!("[validation] {}", e)))?;
        self.limits
            .validate()
            .map_err(|e| CliError::Config(format!("[limits] {}", e)))?;
        Ok(())
    }

    /// Apply connection overrides from the command line.
    pub fn override_model(
        &mut self,
        endpoint: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
    ) {
        if let Some(endpoint) = endpoint {
            self.model.endpoint = endpoint;
        }
        if let Some(model) = model {
            self.model.model = model;
        }
        if let Some(api_key) = api_key {
            self.model.api_key = api_key;
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwright_extractor::CardDensity;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.output.color);
        assert_eq!(config.output.format, OutputFormat::Table);
        assert_eq!(config.limits.max_chunks, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[generation]\ncard_density = \"High\"\nconcurrency = 3\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.generation.card_density, CardDensity::High);
        assert_eq!(config.generation.concurrency, 3);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.color);
        assert_eq!(config.model, ModelSettings::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.generation.target_language = "Turkish".to_string();

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_section_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[generation]\nconcurrency = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("[generation]"));
    }

    #[test]
    fn test_model_overrides() {
        let mut config = Config::default();
        config.override_model(Some("http://10.0.0.2:8080/v1/chat/completions".into()), None, None);
        assert_eq!(config.model.endpoint, "http://10.0.0.2:8080/v1/chat/completions");
        assert_eq!(config.model.model, ModelSettings::default().model);
    }
}
