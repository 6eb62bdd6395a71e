//! Palette RPC Server - JSON-RPC backend for the plugin UI.
//!
//! This binary runs a discovery session against an in-memory document and
//! exposes the UI message protocol as JSON-RPC 2.0 over HTTP.

mod handler;
mod server;

use anyhow::Result;
use clap::Parser;
use palette_core::{BufferedSink, DocumentFixture, MemoryHost, PaletteConfig, Session};
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "palette-rpc")]
#[command(about = "JSON-RPC server for the Palette component browser")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Session configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Document fixture to serve (JSON); an empty document when omitted
    #[arg(long)]
    document: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides the --debug level
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Palette RPC Server");

    let config = match &args.config {
        Some(path) => PaletteConfig::from_json_file(path)?,
        None => PaletteConfig::default(),
    };
    let fixture = match &args.document {
        Some(path) => {
            info!("Serving document {}", path.display());
            DocumentFixture::from_json_file(path)?
        }
        None => {
            warn!("No document given, serving an empty document");
            DocumentFixture::default()
        }
    };

    let host = Arc::new(MemoryHost::new(fixture));
    let sink = Arc::new(BufferedSink::new());
    let session = Arc::new(Session::new(config, host.clone(), host, sink.clone())?);

    // The first page is buffered for the UI's first poll_events
    session.initialize().await;

    let (shutdown, _) = watch::channel(false);
    let state = AppState::new(session, sink, shutdown);
    let (addr, server) = server::start_server(state, &args.host, args.port).await?;

    // Print port for the UI host to read (intentional stdout for IPC)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, exiting");
        }
        _ = server => {
            info!("Session cancelled, exiting");
        }
    }

    Ok(())
}
