//! musicstand client binary
//!
//! Connects to a Rondo server, receives this performer's parts, and stores
//! them in the output directory. Exits when the server closes the
//! connection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpStream;
use tracing::info;

#[derive(Parser)]
#[command(name = "musicstand", version, about = "Receive performer parts from a Rondo server")]
struct Cli {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:9310")]
    server: String,

    /// Directory where received parts are stored
    #[arg(short, long, default_value = "parts")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    info!(
        "musicstand {} connecting to {}",
        env!("CARGO_PKG_VERSION"),
        cli.server
    );
    let mut stream = TcpStream::connect(&cli.server)
        .await
        .with_context(|| format!("failed to connect to {}", cli.server))?;
    info!("connected, waiting for parts");

    let received = musicstand::receive_all(&mut stream, &cli.output_dir, |part| {
        info!(
            "received {} ({} bytes) -> {}",
            part.name,
            part.bytes,
            part.path.display()
        );
    })
    .await
    .context("receive failed")?;

    info!("server closed the connection after {} part(s)", received.len());
    Ok(())
}
