//! Casebrief Server
//!
//! Axum server exposing the research pipeline over HTTP, plus a one-shot CLI mode
//! that runs a single narrative in-process and prints its event stream.

mod api;

use anyhow::Context;
use casebrief_core::config::Settings;
use casebrief_core::state::RunStore;
use casebrief_core::swarm::{Coordinator, EventBus};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use api::AppState;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Parser)]
#[command(author, version, about = "Casebrief - California statutes and case law from a case narrative")]
struct Args {
    /// JSON settings file; environment variables override it
    #[arg(long, env = "CASEBRIEF_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,
    },
    /// Research one narrative without a server, printing events as JSON lines
    Run {
        /// The case narrative
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        /// Read the narrative from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
}

/// Logs go to stderr so `run` output stays machine-readable
fn init_tracing(fallback_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    init_tracing(&settings.log_level);

    let coordinator = Coordinator::from_settings(&settings, EventBus::new(), Arc::new(RunStore::new()))?;

    match args.command {
        Some(CliCommand::Run { text, file }) => {
            let narrative = match (text, file) {
                (_, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (Some(text), None) => text,
                (None, None) => anyhow::bail!("Provide a narrative or --file"),
            };
            run_once(coordinator, &narrative).await
        }
        Some(CliCommand::Serve { port, host }) => serve(coordinator, &settings, &host, port).await,
        None => serve(coordinator, &settings, DEFAULT_HOST, DEFAULT_PORT).await,
    }
}

async fn serve(coordinator: Coordinator, settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState { coordinator });
    let app = api::router(state, &settings.cors_origins);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;
    tracing::info!(%addr, "Casebrief server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_once(coordinator: Coordinator, narrative: &str) -> anyhow::Result<()> {
    let run_id = coordinator.create_run(narrative)?;
    let mut subscription = coordinator.bus().subscribe(&run_id);

    let printer = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            println!("{}", event.to_json());
        }
    });

    let outcome = coordinator.execute(&run_id).await;
    printer.await?;

    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
