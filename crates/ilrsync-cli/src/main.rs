//! ilrsync CLI - Operator controls for the ilrsync pipeline
//!
//! Provides commands for:
//! - Running a sync cycle on demand
//! - Testing a remote endpoint and inspecting the staging directory
//! - Managing the archive password and feature flags
//! - Pushing funding summaries to the partner API
//! - Viewing data imports and the configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand, feature::FeatureCommand, imports::ImportsCommand,
    local::LocalCommand, push::PushCommand, remote::RemoteCommand, secret::SecretCommand,
    sync::SyncCommand, CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "ilrsync",
    version,
    about = "Remote ILR file acquisition and ingestion"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one sync cycle now
    Sync(SyncCommand),
    /// Test the remote SFTP endpoint
    #[command(subcommand)]
    Remote(RemoteCommand),
    /// Inspect the local staging directory
    #[command(subcommand)]
    Local(LocalCommand),
    /// Manage the archive decryption password
    #[command(subcommand)]
    Secret(SecretCommand),
    /// View and toggle feature flags
    #[command(subcommand)]
    Feature(FeatureCommand),
    /// Push an import's funding summary to the partner API
    Push(PushCommand),
    /// View data import records
    #[command(subcommand)]
    Imports(ImportsCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match (cli.quiet, cli.verbose) {
        (true, 0) => "error",
        (false, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext::new(cli.config.as_deref(), format, cli.quiet);

    if let Err(e) = run(cli.command, &ctx).await {
        ctx.formatter().error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Sync(cmd) => cmd.execute(ctx).await,
        Commands::Remote(cmd) => cmd.execute(ctx).await,
        Commands::Local(cmd) => cmd.execute(ctx).await,
        Commands::Secret(cmd) => cmd.execute(ctx).await,
        Commands::Feature(cmd) => cmd.execute(ctx).await,
        Commands::Push(cmd) => cmd.execute(ctx).await,
        Commands::Imports(cmd) => cmd.execute(ctx).await,
        Commands::Config(cmd) => cmd.execute(ctx).await,
    }
}
