//! Rondo server binary
//!
//! Binds the performer listener, runs the accept loop, and drives
//! distribution sessions from a minimal line-based console standing in
//! for the external GUI layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rondo::{Rondo, TransferOutcome};
use rondoconf::RondoConfig;
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rondo", version, about = "Distribute a MIDI song to connected performers")]
struct Cli {
    /// Config file path (takes precedence over ./rondo.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address override
    #[arg(short, long)]
    bind: Option<String>,

    /// Songs directory override
    #[arg(long)]
    songs_dir: Option<PathBuf>,

    /// Scratch directory override
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        RondoConfig::load_from(cli.config.as_deref()).context("failed to load config")?;
    if let Some(bind) = cli.bind {
        config.bind.listen = bind;
    }
    if let Some(dir) = cli.songs_dir {
        config.paths.songs_dir = dir;
    }
    if let Some(dir) = cli.scratch_dir {
        config.paths.scratch_dir = dir;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rondo {} starting", env!("CARGO_PKG_VERSION"));
    info!("songs dir: {}", config.paths.songs_dir.display());

    let listener = TcpListener::bind(&config.bind.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.bind.listen))?;

    let rondo = Arc::new(Rondo::new(config));

    let acceptor = Arc::clone(&rondo);
    let accept_task = tokio::spawn(async move { acceptor.serve(listener).await });

    run_console(&rondo).await?;

    rondo.shutdown();
    accept_task.await??;
    info!("rondo shutdown complete");
    Ok(())
}

/// Minimal console standing in for the GUI layer:
/// `list`, `count`, `send <song>`, `quit`.
async fn run_console(rondo: &Arc<Rondo>) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    println!("commands: list | count | send <song> | quit");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(' ') {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };

        match cmd {
            "" => {}
            "list" => {
                let songs = rondo.list_songs();
                if songs.is_empty() {
                    println!("no songs found");
                }
                for song in songs {
                    let name = song.file_name().unwrap_or_default().to_string_lossy();
                    let duration = std::fs::read(&song)
                        .ok()
                        .and_then(|bytes| midisplit::song_duration(&bytes).ok());
                    match duration {
                        Some(d) => println!("{}  ({:.0}s)", name, d.seconds),
                        None => println!("{}", name),
                    }
                }
            }
            "count" => println!("{} client(s) connected", rondo.client_count()),
            "send" => match rondo.distribute(Path::new(arg)).await {
                Ok(result) => {
                    for (id, outcome) in &result.outcomes {
                        match outcome {
                            TransferOutcome::Delivered { bytes } => {
                                println!("{}: delivered {} bytes", id, bytes)
                            }
                            TransferOutcome::Failed { reason } => {
                                println!("{}: FAILED ({})", id, reason)
                            }
                        }
                    }
                }
                Err(e) => error!("distribute failed: {}", e),
            },
            "quit" | "exit" => break,
            other => println!("unknown command: {}", other),
        }
    }

    Ok(())
}
