//! MicroAudit CLI - Command-line front end for the notes/tasks backend
//!
//! Provides commands for:
//! - Signing in and out
//! - Listing, creating and editing notes, tasks and workspaces
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use microaudit_core::config::Config;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, completions::CompletionsCommand, config::ConfigCommand,
    notes::NotesCommand, tasks::TasksCommand, workspaces::WorkspacesCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "microaudit", version, about = "Notes and tasks, synced")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in, sign out and show the current user
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Manage notes
    #[command(subcommand)]
    Notes(NotesCommand),
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Manage workspaces
    #[command(subcommand)]
    Workspaces(WorkspacesCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn init_tracing(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);
    init_tracing(cli.verbose, &config);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&config, format).await,
        Commands::Notes(cmd) => cmd.execute(&config, format).await,
        Commands::Tasks(cmd) => cmd.execute(&config, format).await,
        Commands::Workspaces(cmd) => cmd.execute(&config, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
        Commands::Completions(cmd) => cmd.execute(),
    }
}
