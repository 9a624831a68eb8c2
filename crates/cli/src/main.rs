//! RoleFlow CLI
//!
//! Main entry point for the roleflow command-line tool: the HTTP host plus
//! commands for asking questions and maintaining department indexes.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{AskCommand, DepartmentsCommand, RefreshCommand, ServeCommand};
use roleflow_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// RoleFlow - department-scoped document Q&A
#[derive(Parser, Debug)]
#[command(name = "roleflow")]
#[command(about = "Department-scoped retrieval and attribution", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ROLEFLOW_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ROLEFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "ROLEFLOW_JSON_LOGS")]
    json_logs: bool,

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true, env = "ROLEFLOW_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ROLEFLOW_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// Ask a question as a verified employee
    Ask(AskCommand),

    /// Rebuild department indexes
    Refresh(RefreshCommand),

    /// List departments and their index status
    Departments(DepartmentsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then the config file, then the environment
    let config = AppConfig::load_with(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("RoleFlow starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ask(_) => "ask",
        Commands::Refresh(_) => "refresh",
        Commands::Departments(_) => "departments",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Refresh(cmd) => cmd.execute(&config).await,
        Commands::Departments(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
