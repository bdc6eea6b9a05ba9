//! recency - command-line driver for the LRU cache

mod handler;
mod reply;
mod shell;
mod walkthrough;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recency::LruCache;
use tracing::info;

use crate::handler::CommandHandler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache capacity (number of entries)
    #[arg(short, long, default_value_t = 3, global = true)]
    capacity: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scripted tour of the cache (default)
    Walkthrough,
    /// Read commands from stdin, one per line
    Shell,
}

fn main() -> Result<()> {
    // Logs go to stderr so replies on stdout stay machine-readable
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Starting recency v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);

    match args.command.unwrap_or(Command::Walkthrough) {
        Command::Walkthrough => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            walkthrough::run(args.capacity, &mut out).context("walkthrough failed")?;
            out.flush()?;
        }
        Command::Shell => run_shell(args.capacity)?,
    }

    Ok(())
}

fn run_shell(capacity: usize) -> Result<()> {
    let cache = LruCache::new(capacity).context("failed to create cache")?;
    let mut handler = CommandHandler::new(cache);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    shell::run(&mut handler, stdin.lock(), &mut out)
}
