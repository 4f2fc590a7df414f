//! EV Insight - EV charging station review explorer
//!
//! A CLI tool that renders fixed statistics over a dataset of EV charging
//! station reviews and answers free-text questions about it with an LLM.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Fatal error (data file missing or malformed, no API key, config or output failure)

mod analysis;
mod cli;
mod config;
mod credentials;
mod data;
mod error;
mod llm;
mod models;
mod report;
mod session;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use llm::{
    ClientConfig, CompletionClient, LlmAnalysisEngine, OpenAiClient, PredefinedQuestion,
    QueryRefiner,
};
use models::{DashboardMetadata, TurnOutcome};
use session::SessionContext;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config decides the default verbosity, so it is read before logging starts
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("EV Insight v{}", env!("CARGO_PKG_VERSION"));
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Effective config: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Session failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .evinsight.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to choose the data file, model and report sizes.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Load configuration from file or use defaults. Also returns the file it came from.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        None => Ok((Config::default(), None)),
    }
}

/// Run one session. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let mut session = SessionContext::new(config.general.data_path.clone(), !args.quiet);

    // Step 1: Load the data (fatal on failure)
    let table = match session.table() {
        Ok(table) => table,
        Err(e) => {
            error!("{}", e);
            eprintln!(
                "🚨 File '{}' could not be loaded: {}",
                session.data_path().display(),
                e
            );
            return Ok(1);
        }
    };

    if table.is_empty() {
        warn!("No complete station records in the data file; reports will be empty");
    }

    // Step 2: Resolve the API key, prompting on a terminal (fatal unless only the fixed reports are wanted)
    let api_key = if args.reports_only {
        None
    } else {
        match credentials::resolve_or_prompt(
            args.api_key.as_deref(),
            &config.general.secrets_path,
            std::io::stdin().is_terminal(),
        ) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("{}", e);
                eprintln!("🔑 Please provide a valid OpenAI API key: {}", e);
                eprintln!("   Use --reports-only to render the fixed reports without one.");
                return Ok(1);
            }
        }
    };

    // Step 3: Render the fixed reports
    let metadata = DashboardMetadata {
        data_path: session.data_path().display().to_string(),
        generated_at: Utc::now(),
        records_loaded: table.len(),
        model_used: api_key.as_ref().map(|_| config.model.name.clone()),
    };
    let dashboard = analysis::build_dashboard(
        &table,
        metadata,
        config.reports.top_n,
        config.reports.worst_n,
    );

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_dashboard(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_dashboard(&dashboard),
    };

    match config.general.output {
        Some(ref path) => {
            report::write_output(&rendered, path)
                .with_context(|| format!("Failed to write dashboard to {}", path.display()))?;
            println!("✅ Dashboard saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }

    let api_key = match api_key {
        Some(key) if args.wants_llm() => key,
        _ => {
            session.end();
            return Ok(0);
        }
    };

    // Step 4: Bind the analysis stages to the table
    let client: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(ClientConfig {
        api_url: config.model.api_url.clone(),
        api_key,
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?);

    let engine = LlmAnalysisEngine::new(Arc::clone(&client), &table, config.analysis.max_rows);
    let refiner = config
        .model
        .refine
        .then(|| QueryRefiner::new(Arc::clone(&client)));
    session.attach_analysis(Box::new(engine), refiner);

    // Step 5: Questions from the command line
    for question in &args.ask {
        println!("## 🤖 {}\n", question.trim());
        let turn = session.ask(question).await;
        println!("{}", report::render_turn(turn));
    }

    // Step 6: Predefined insights
    if args.insights {
        println!("## ✨ Bonus LLM Insights\n");
        if let Some(sample) = session.row_sample() {
            println!("{}", report::render_row_sample(&sample));
        }
        for question in PredefinedQuestion::ALL {
            println!("### {}\n", question.title());
            match session.ask_predefined(question).await {
                TurnOutcome::Answer(response) => {
                    println!("{}", report::render_response(&response))
                }
                TurnOutcome::Error(message) => println!("❌ Error: {}\n", message),
            }
        }
    }

    // Step 7: Interactive questions
    if args.interactive {
        run_prompt_loop(&mut session).await?;
        println!("\n{}", report::render_history(session.history()));
    }

    session.end();
    Ok(0)
}

/// Read questions from stdin until EOF or `:quit`.
async fn run_prompt_loop(session: &mut SessionContext) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("💬 Ask something about the EV stations dataset (:history, :quit)");

    loop {
        print!("\n❓ ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let line = match lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        {
            Some(line) => line,
            None => break,
        };

        match line.trim() {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":history" => println!("{}", report::render_history(session.history())),
            question => {
                let turn = session.ask(question).await;
                println!("\n{}", report::render_turn(turn));
            }
        }
    }

    Ok(())
}
