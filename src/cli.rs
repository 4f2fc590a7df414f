//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Options that also live in the config file are
//! optional here so that only explicit values override it.

use clap::Parser;
use std::path::PathBuf;

/// EV Insight - explore EV charging station reviews
///
/// Renders fixed review statistics as a dashboard and answers free-text
/// questions about the dataset with an LLM.
///
/// Examples:
///   evinsight --reports-only
///   evinsight --ask "Most reviewed station?"
///   evinsight --data stations.json --interactive
///   evinsight --insights --format json --output dashboard.json
///   evinsight --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Station review data file (JSON array of records)
    ///
    /// Defaults to cleaned_ev_data.json or the config file setting.
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .evinsight.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the dashboard to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Dashboard format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Ask a question about the dataset (repeatable)
    #[arg(short, long, value_name = "QUESTION")]
    pub ask: Vec<String>,

    /// Keep asking questions from stdin after the dashboard
    ///
    /// Type :history to show the chat history, :quit to end the session.
    #[arg(short, long)]
    pub interactive: bool,

    /// Also run the predefined LLM insights (complaints, cities, sentiment, occupancy)
    #[arg(long)]
    pub insights: bool,

    /// Refine questions with the LLM before analysing them
    #[arg(long, conflicts_with = "no_refine")]
    pub refine: bool,

    /// Send questions to the analysis engine unchanged
    #[arg(long, conflicts_with = "refine")]
    pub no_refine: bool,

    /// Completion model to use
    #[arg(short, long, env = "EVINSIGHT_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "EVINSIGHT_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// API key for the completion API
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Secrets file holding OpenAI_API_KEY
    #[arg(long, value_name = "FILE")]
    pub secrets: Option<PathBuf>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Rows in the top-stations report
    #[arg(long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Rows in the worst-stations report
    #[arg(long, value_name = "COUNT")]
    pub worst_n: Option<usize>,

    /// Maximum rows sent to the analysis engine per question
    #[arg(long, value_name = "COUNT")]
    pub max_rows: Option<usize>,

    /// Render the fixed reports only; no API key needed
    #[arg(long)]
    pub reports_only: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .evinsight.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether any LLM-backed stage was requested.
    pub fn wants_llm(&self) -> bool {
        !self.ask.is_empty() || self.interactive || self.insights
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.reports_only && self.wants_llm() {
            return Err(
                "--reports-only cannot be combined with --ask, --interactive or --insights"
                    .to_string(),
            );
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.top_n == Some(0) || self.worst_n == Some(0) {
            return Err("Report row counts must be at least 1".to_string());
        }

        if self.max_rows == Some(0) {
            return Err("Max rows must be at least 1".to_string());
        }

        if self.ask.iter().any(|q| q.trim().is_empty()) {
            return Err("Questions passed to --ask must not be empty".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
