//! pdf-salvage CLI
//!
//! - `extract`: fetch a PDF and recover its text with retries and fallback
//! - `clean`: run the cleaning pipeline over a text file and show each stage
//! - `serve`: run the server-side fallback extraction endpoint
//! - `validate-config`: check an embedding provider config file

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use pdf_salvage::api::{self, ApiContext};
use pdf_salvage::config::{ConfigError, ExtractionConfig, ServerConfig};
use pdf_salvage::embedding_config::load_embedding_config;
use pdf_salvage::logging::{self, LogLevel};
use pdf_salvage::pipeline::extraction::{
    clean_with_trace, DocumentDescriptor, ExtractionError, ExtractionOrchestrator, LopdfParser,
    ProgressReporter,
};

#[derive(Parser)]
#[command(name = "pdf-salvage")]
#[command(author, version, about = "Recover readable text from PDFs, even badly encoded ones")]
struct Cli {
    /// Log level (error, warn, info, debug, trace). RUST_LOG overrides.
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a PDF by URL and print the recovered text.
    Extract {
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        /// Fallback extraction endpoint (overrides PDF_SALVAGE_PROXY_ENDPOINT).
        #[arg(long)]
        proxy_endpoint: Option<String>,
        #[arg(long)]
        max_pages: Option<usize>,
        /// Print the full report (outcome and attempt trail) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the cleaning pipeline over a text file and print the stage trace.
    Clean { input: PathBuf },

    /// Serve the fallback extraction endpoint.
    Serve {
        /// Listen address (overrides PDF_SALVAGE_BIND).
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Validate an embedding provider config (JSON file).
    ValidateConfig { input: PathBuf },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot render report: {0}")]
    Render(serde_json::Error),
    #[error("{0}")]
    Server(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log = match logging::init(cli.log_level) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Extract {
                url,
                title,
                proxy_endpoint,
                max_pages,
                json,
            } => cmd_extract(url, title, proxy_endpoint, max_pages, json).await,
            Commands::Clean { input } => cmd_clean(&input),
            Commands::Serve { bind } => cmd_serve(bind, log).await,
            Commands::ValidateConfig { input } => cmd_validate_config(&input),
        }
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn cmd_extract(
    url: String,
    title: String,
    proxy_endpoint: Option<String>,
    max_pages: Option<usize>,
    json: bool,
) -> Result<ExitCode, CliError> {
    let mut config = ExtractionConfig::from_env()?;
    if proxy_endpoint.is_some() {
        config.proxy_endpoint = proxy_endpoint;
    }
    if let Some(max_pages) = max_pages {
        config.max_pages = max_pages.max(1);
    }
    tracing::debug!(config = ?config, "Extraction config loaded");

    let orchestrator = ExtractionOrchestrator::from_config(&config, Arc::new(LopdfParser))?;
    let progress = ProgressReporter::new(|pct| tracing::debug!(progress = pct, "Progress"));
    let report = orchestrator
        .extract(&DocumentDescriptor::new(url, title), &progress)
        .await;

    if json {
        let rendered = serde_json::to_string_pretty(&report).map_err(CliError::Render)?;
        println!("{rendered}");
    } else if report.outcome.success {
        println!("{}", report.outcome.text);
    } else {
        eprintln!(
            "{}",
            report.outcome.error.as_deref().unwrap_or("Extraction failed")
        );
    }

    Ok(if report.outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_clean(input: &Path) -> Result<ExitCode, CliError> {
    let bytes = std::fs::read(input).map_err(|source| CliError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    // Extracted text is often not valid UTF-8; keep what decodes.
    let raw = String::from_utf8_lossy(&bytes);
    let trace = clean_with_trace(&raw);

    for result in &trace.stages {
        eprintln!(
            "{:<17} {:>7} chars  {}",
            result.stage.as_str(),
            result.output.chars().count(),
            if result.accepted { "accepted" } else { "rejected" }
        );
    }
    match trace.accepted {
        Some(stage) => eprintln!("-> {stage}"),
        None => eprintln!("-> fallback message"),
    }
    println!("{}", trace.text);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_serve(
    bind: Option<SocketAddr>,
    log: Arc<logging::LogControl>,
) -> Result<ExitCode, CliError> {
    let mut config = ServerConfig::from_env()?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    tracing::info!(config = ?config, "Starting fallback extraction server");

    let addr = config.bind;
    let ctx = ApiContext::new(config, log);
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
    };

    api::serve_until(ctx, addr, shutdown)
        .await
        .map_err(CliError::Server)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate_config(input: &Path) -> Result<ExitCode, CliError> {
    let validation = load_embedding_config(input)?;
    for warning in &validation.warnings {
        println!("warning: {warning}");
    }
    for error in &validation.errors {
        println!("error: {error}");
    }
    if let Some(config) = &validation.config {
        println!("ok: {config:?}");
    }

    Ok(if validation.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
