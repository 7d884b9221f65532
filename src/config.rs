//! Configuration management for dexharvest
//!
//! All configuration is loaded from `./config/dexharvest.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/dexharvest.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/dexharvest.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be a fraction in 0.0..=1.0, got {value}")]
    InvalidRate { field: String, value: f64 },

    #[error("Unsupported export format '{format}', expected 'json' or 'csv'")]
    UnsupportedExportFormat { format: String },

    #[error("At least one description language must be configured")]
    NoLanguagesConfigured,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub pipeline: PipelineConfig,
    pub languages: LanguagesConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Content API access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL; payloads live at {base_url}/{locale}/{kind}/{id}.json
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Batch processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Entities per batch (grouping only, processing stays sequential)
    pub batch_size: usize,
    /// Pause between consecutive entities in milliseconds
    pub inter_item_delay_ms: u64,
    /// Fetch attempts per entity beyond the first
    pub max_retries: u32,
    /// First backoff delay in milliseconds, doubled per attempt
    pub retry_base_delay_ms: u64,
    /// Backoff cap in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Cumulative failure rate above which the run aborts; 1.0 disables
    #[serde(default = "default_abort_failure_rate")]
    pub abort_failure_rate: f64,
    /// Success rate below which a completed run exits non-zero
    #[serde(default)]
    pub min_success_rate: f64,
    /// Forward invalid records, flagged, instead of failing them
    #[serde(default = "default_include_degraded")]
    pub include_degraded: bool,
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_abort_failure_rate() -> f64 {
    0.5
}

fn default_include_degraded() -> bool {
    true
}

/// Description language priority for attribute extraction
#[derive(Debug, Clone, Deserialize)]
pub struct LanguagesConfig {
    /// Tried in order; the first language with usable text wins
    pub priority: Vec<String>,
}

/// Result export configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_format")]
    pub format: String,
    #[serde(default = "default_export_output")]
    pub output: String,
}

fn default_export_format() -> String {
    "json".to_string()
}

fn default_export_output() -> String {
    "./dexharvest-results".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_export_format(),
            output: default_export_output(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "api.base_url".to_string(),
            });
        }
        if Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::InvalidUrl {
                field: "api.base_url".to_string(),
                url: self.api.base_url.clone(),
            });
        }
        if self.api.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "api.user_agent".to_string(),
            });
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "api.request_timeout_secs".to_string(),
            });
        }

        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "pipeline.batch_size".to_string(),
            });
        }
        for (field, value) in [
            ("pipeline.abort_failure_rate", self.pipeline.abort_failure_rate),
            ("pipeline.min_success_rate", self.pipeline.min_success_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRate {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.languages.priority.is_empty() {
            return Err(ConfigError::NoLanguagesConfigured);
        }

        match self.export.format.as_str() {
            "json" | "csv" => {}
            other => {
                return Err(ConfigError::UnsupportedExportFormat {
                    format: other.to_string(),
                })
            }
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write default config
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        atty::is(atty::Stream::Stdin)
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok(), "Default config should validate");
    }

    #[test]
    fn test_export_section_is_optional() {
        let config_str = r#"
[api]
base_url = "https://catalog.example.net/data"
user_agent = "test/1.0"
request_timeout_secs = 10

[pipeline]
batch_size = 5
inter_item_delay_ms = 0
max_retries = 2
retry_base_delay_ms = 100

[languages]
priority = ["en"]
"#;

        let config: AppConfig = toml::from_str(config_str).expect("Config should parse");
        assert_eq!(config.export.format, "json");
        assert_eq!(config.export.output, "./dexharvest-results");
        assert!((config.pipeline.abort_failure_rate - 0.5).abs() < f64::EPSILON);
        assert!(config.pipeline.include_degraded);
        assert_eq!(config.pipeline.retry_max_delay_ms, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_out_of_range_rejected() {
        let config_str = r#"
[api]
base_url = "https://catalog.example.net/data"
user_agent = "test/1.0"
request_timeout_secs = 10

[pipeline]
batch_size = 5
inter_item_delay_ms = 0
max_retries = 2
retry_base_delay_ms = 100
abort_failure_rate = 1.5

[languages]
priority = ["en"]
"#;

        let config: AppConfig = toml::from_str(config_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRate { .. }));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let config_str = r#"
[api]
base_url = "not a url"
user_agent = "test/1.0"
request_timeout_secs = 10

[pipeline]
batch_size = 5
inter_item_delay_ms = 0
max_retries = 2
retry_base_delay_ms = 100

[languages]
priority = ["en"]
"#;

        let config: AppConfig = toml::from_str(config_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_empty_languages_rejected() {
        let config_str = r#"
[api]
base_url = "https://catalog.example.net/data"
user_agent = "test/1.0"
request_timeout_secs = 10

[pipeline]
batch_size = 5
inter_item_delay_ms = 0
max_retries = 2
retry_base_delay_ms = 100

[languages]
priority = []
"#;

        let config: AppConfig = toml::from_str(config_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NoLanguagesConfigured));
    }

    #[test]
    fn test_unknown_export_format_rejected() {
        let config_str = r#"
[api]
base_url = "https://catalog.example.net/data"
user_agent = "test/1.0"
request_timeout_secs = 10

[pipeline]
batch_size = 5
inter_item_delay_ms = 0
max_retries = 2
retry_base_delay_ms = 100

[languages]
priority = ["en"]

[export]
format = "xml"
"#;

        let config: AppConfig = toml::from_str(config_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedExportFormat { .. }));
    }
}
