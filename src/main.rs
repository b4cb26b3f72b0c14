//! WatchTower entry point
//!
//! Three subcommands cover the whole stack: `serve` exposes a stub source
//! over TCP or stdio, `analyze` runs one bounded investigation against the
//! configured sources, and `config` validates the configuration file.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use watchtower::agent::{Analysis, AnalysisReport, WatchTowerAgent};
use watchtower::config::WatchTowerConfig;
use watchtower::llm::{ConversationEntry, OfflineAnalyst};
use watchtower::observability::{init_default_logging, init_logging, LogFormat};
use watchtower::registry::SourceRegistry;
use watchtower::server::{serve_stdio, serve_tcp};
use watchtower::sources::{LogSource, StubSource};

/// Log analysis agent over line-delimited JSON-RPC sources
#[derive(Parser)]
#[command(name = "watchtower")]
#[command(about = "Log analysis agent over line-delimited JSON-RPC sources")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "WATCHTOWER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one stub source over TCP or stdio
    Serve {
        /// Stub source to serve
        #[arg(long, value_enum)]
        source: StubKind,

        /// TCP port to listen on
        #[arg(long, conflicts_with = "stdio")]
        port: Option<u16>,

        /// Serve a single session over stdin/stdout
        #[arg(long)]
        stdio: bool,
    },
    /// Run one bounded analysis against the configured sources
    Analyze {
        /// The operator question to investigate
        query: String,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StubKind {
    Aws,
    Gcp,
}

impl StubKind {
    fn build(self) -> Box<dyn LogSource> {
        match self {
            StubKind::Aws => Box::new(StubSource::aws()),
            StubKind::Gcp => Box::new(StubSource::gcp()),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        n => {
            let level = if n == 1 { Level::DEBUG } else { Level::TRACE };
            let format = std::env::var("LOG_FORMAT").unwrap_or_default();
            init_logging(level, LogFormat::parse(&format), false);
        }
    }

    info!("Starting watchtower v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Serve {
            source,
            port,
            stdio,
        } => serve(source, port, stdio).await,
        Commands::Analyze { query } => analyze(&cli.config, &query).await,
        Commands::Config { show } => handle_config_command(&cli.config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {e}");
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<WatchTowerConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(WatchTowerConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["watchtower.toml", "config/watchtower.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(WatchTowerConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using defaults");
            Ok(WatchTowerConfig::default())
        }
    }
}

async fn serve(
    source: StubKind,
    port: Option<u16>,
    stdio: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if stdio {
        info!(source = ?source, "serving one session over stdio");
        serve_stdio(source.build()).await?;
        return Ok(());
    }

    let Some(port) = port else {
        return Err("either --port or --stdio is required".into());
    };

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, source = ?source, "listening for connections");

    let factory = move || source.build();

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = serve_tcp(listener, factory) => {
            result?;
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    Ok(())
}

async fn analyze(
    config_path: &Option<PathBuf>,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_configuration(config_path)?;

    let registry = SourceRegistry::connect(config.bindings()).await?;
    info!(sources = ?registry.source_names(), "connected to sources");

    let mut agent = WatchTowerAgent::new(registry, Arc::new(OfflineAnalyst::new()))
        .with_max_iterations(config.agent.max_iterations);

    let report = agent.analyze(query).await?;
    print_report(&report);

    agent.shutdown().await;
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    for entry in &report.transcript {
        match entry {
            ConversationEntry::User { content } => println!("question: {content}"),
            ConversationEntry::Assistant {
                content,
                function_call: Some(call),
            } => {
                println!("agent: {content}");
                println!("  calling {}", call.name);
            }
            ConversationEntry::Assistant {
                content,
                function_call: None,
            } => println!("answer: {content}"),
            ConversationEntry::FunctionOutcome { content, .. } => println!("  {content}"),
        }
    }
    if let Analysis::Incomplete { iterations } = &report.analysis {
        println!("Analysis did not conclude within {iterations} iterations.");
    }
}

fn handle_config_command(
    config_path: &Option<PathBuf>,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_configuration(config_path)?;

    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
