//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.evinsight.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".evinsight.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Completion model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Fixed report settings.
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Delegated analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Input data file.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Where to write the dashboard (stdout when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Secrets file holding the API key.
    #[serde(default = "default_secrets_path")]
    pub secrets_path: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            output: None,
            secrets_path: default_secrets_path(),
            verbose: false,
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("cleaned_ev_data.json")
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from(".evinsight/secrets.toml")
}

/// Completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Rewrite questions before delegating them.
    #[serde(default = "default_true")]
    pub refine: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            refine: true,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

/// Fixed report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Rows in the "top stations by volume" report.
    #[serde(default = "default_report_rows")]
    pub top_n: usize,

    /// Rows in the "worst stations by rating" report.
    #[serde(default = "default_report_rows")]
    pub worst_n: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            top_n: default_report_rows(),
            worst_n: default_report_rows(),
        }
    }
}

fn default_report_rows() -> usize {
    crate::analysis::DEFAULT_REPORT_ROWS
}

/// Delegated analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum table rows sent with each question.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
        }
    }
}

fn default_max_rows() -> usize {
    500
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.general.data_path = data.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.clone());
        }
        if let Some(ref secrets) = args.secrets {
            self.general.secrets_path = secrets.clone();
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if args.refine {
            self.model.refine = true;
        } else if args.no_refine {
            self.model.refine = false;
        }

        if let Some(top_n) = args.top_n {
            self.reports.top_n = top_n;
        }
        if let Some(worst_n) = args.worst_n {
            self.reports.worst_n = worst_n;
        }
        if let Some(max_rows) = args.max_rows {
            self.analysis.max_rows = max_rows;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.data_path, PathBuf::from("cleaned_ev_data.json"));
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert!(config.model.refine);
        assert_eq!(config.reports.top_n, 10);
        assert_eq!(config.reports.worst_n, 10);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
data_path = "data/reviews.json"
verbose = true

[model]
name = "gpt-4o"
temperature = 0.2
refine = false

[reports]
top_n = 5
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.data_path, PathBuf::from("data/reviews.json"));
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.model.temperature, 0.2);
        assert!(!config.model.refine);
        assert_eq!(config.model.api_url, "https://api.openai.com/v1");
        assert_eq!(config.reports.top_n, 5);
        assert_eq!(config.reports.worst_n, 10);
        assert_eq!(config.analysis.max_rows, 500);
    }

    #[test]
    fn test_merge_only_overrides_explicit_args() {
        let mut config: Config = toml::from_str("[model]\nname = \"gpt-4o\"\nrefine = false").unwrap();

        let mut args = make_args();
        args.top_n = Some(3);
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "gpt-4o");
        assert!(!config.model.refine);
        assert_eq!(config.reports.top_n, 3);

        args.refine = true;
        args.model = Some("gpt-4o-mini".to_string());
        config.merge_with_args(&args);
        assert!(config.model.refine);
        assert_eq!(config.model.name, "gpt-4o-mini");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[reports]"));
        assert!(toml_str.contains("[analysis]"));
    }
}
