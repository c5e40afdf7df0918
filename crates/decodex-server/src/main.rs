//! Decodex Server - compare decoding strategies side by side
//!
//! This binary serves the comparison page and the `POST /generate` endpoint
//! backed by the bigram reference model.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use decodex_server::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    server::{run_server, DecodexServer},
};

/// Command line arguments
#[derive(Parser)]
#[command(
    name = "decodex-server",
    about = "Compare text decoding strategies side by side",
    long_about = "Runs one prompt through greedy search, beam search, top-k, top-p and temperature sampling, and reports repetition, diversity, entropy, novelty and perplexity for every output."
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server bind address, overrides the configuration file
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable compact single-line logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Start,
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "decodex-server.toml")]
        output: PathBuf,
        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show server information
    Info,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    let mut args = Args::parse();

    init_logging(&args)?;

    match args.command.take() {
        Some(Commands::Config { output, force }) => generate_config(output, force),
        Some(Commands::Validate { config }) => validate_config(config),
        Some(Commands::Info) => show_info(),
        Some(Commands::Start) | None => start_server(args).await,
    }
}

/// Initialize logging based on command line arguments
fn init_logging(args: &Args) -> ServerResult<()> {
    let log_level = args
        .log_level
        .parse::<Level>()
        .map_err(|_| ServerError::Config(format!("Invalid log level: {}", args.log_level)))?;

    let mut env_filter = EnvFilter::from_default_env();
    for target in ["decodex_server", "decodex_core", "decodex_ngram", "tower_http"] {
        let directive = format!("{}={}", target, log_level)
            .parse()
            .map_err(|e| ServerError::Config(format!("Invalid log directive: {}", e)))?;
        env_filter = env_filter.add_directive(directive);
    }

    if args.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().compact())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().pretty())
            .with(env_filter)
            .init();
    }

    Ok(())
}

/// Start the server
async fn start_server(args: Args) -> ServerResult<()> {
    info!("Starting Decodex Server v{}", decodex_server::VERSION);

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {:?}", config_path);
        ServerConfig::from_file(config_path)
            .map_err(|e| ServerError::Config(format!("Failed to load config: {}", e)))?
    } else {
        info!("Using default configuration");
        ServerConfig::default()
    };

    if let Some(bind) = &args.bind {
        config.bind = bind
            .parse()
            .map_err(|e| ServerError::Config(format!("Invalid bind address: {}", e)))?;
    }

    let server = DecodexServer::from_config(config)?;

    info!("Server configuration:");
    info!("  Bind address: {}", server.config().bind);
    info!("  Parallel strategies: {}", server.config().engine.parallel_strategies);
    info!("  Max length limit: {}", server.config().engine.max_length_limit);
    info!("  Static directory: {:?}", server.config().frontend.static_dir);

    run_server(server).await
}

/// Generate a default configuration file
fn generate_config(output: PathBuf, force: bool) -> ServerResult<()> {
    if output.exists() && !force {
        error!("Configuration file already exists: {:?}", output);
        error!("Use --force to overwrite");
        return Err(ServerError::Config(
            "Configuration file already exists".to_string(),
        ));
    }

    ServerConfig::default()
        .to_file(&output)
        .map_err(|e| ServerError::Config(format!("Failed to write config: {}", e)))?;

    info!("Generated default configuration file: {:?}", output);
    Ok(())
}

/// Validate a configuration file
fn validate_config(config_path: PathBuf) -> ServerResult<()> {
    info!("Validating configuration file: {:?}", config_path);

    let config = ServerConfig::from_file(&config_path).map_err(|e| {
        error!("Configuration validation failed: {}", e);
        ServerError::Config(format!("Invalid configuration: {}", e))
    })?;
    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        ServerError::Config(e)
    })?;

    info!("Configuration is valid");
    info!("  Bind address: {}", config.bind);
    info!("  Default max length: {}", config.engine.default_max_length);
    info!("  Corpus: {:?}", config.backend.corpus_path);
    Ok(())
}

/// Show server information
fn show_info() -> ServerResult<()> {
    println!("Decodex Server v{}", decodex_server::VERSION);
    println!("Side-by-side comparison of text decoding strategies");
    println!();
    println!("Strategies:");
    println!("  • greedy        best token at every step");
    println!("  • beam_search   several candidates, best total score");
    println!("  • top_k         sampling among the k likeliest tokens");
    println!("  • top_p         sampling from the probability nucleus");
    println!("  • temperature   scaled sampling with top-k and top-p");
    println!();
    println!("Metrics: rep_1..3, distinct_1..3, entropy, length, novelty, perplexity");
    println!();
    println!("Usage:");
    println!("  decodex-server                       # Start with default config");
    println!("  decodex-server -c config.toml        # Start with custom config");
    println!("  decodex-server config                # Generate default config");
    println!("  decodex-server validate config.toml  # Validate config file");

    Ok(())
}
