use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use labnote_core::OwnerId;

mod commands;
mod config;
mod render;
mod shell;

use commands::RecordCommand;
use config::NotebookConfig;

/// labnote - circuit experiment notebook
#[derive(Parser)]
#[command(name = "labnote")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load settings from a TOML config file
    #[arg(long, env = "LABNOTE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Owner stamped on new records (overrides store.owner)
    #[arg(long, env = "LABNOTE_OWNER", value_name = "UUID")]
    owner: Option<OwnerId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Record(RecordCommand),

    /// Interactive session with undo and sync
    Shell,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "labnote=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = NotebookConfig::load(cli.config.as_deref(), cli.owner)
        .context("loading configuration")?;
    info!(
        backend = ?config.store.backend,
        path = %config.store.path.display(),
        "opening notebook"
    );

    let mut notebook = commands::open_notebook(&config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::load_with_banner(&mut notebook, &mut out)?;

    match cli.command {
        Command::Record(command) => command.run(&mut notebook, &config.export.dir, &mut out),
        Command::Shell => shell::run(
            &mut notebook,
            &config.export.dir,
            std::io::stdin().lock(),
            &mut out,
        ),
    }
}
