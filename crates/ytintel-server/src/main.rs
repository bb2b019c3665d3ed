mod mcp;
mod wiring;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use ytintel_core::{AppConfig, FetchDepth, ToolError, VideoRequest};

use crate::mcp::{StatusInfo, ToolServer};
use crate::wiring::Services;

/// How often stale cached reports are purged while serving.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(name = "ytintel-server")]
#[command(about = "YouTube video intelligence tool server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve MCP tool calls over stdio (default).
    Serve,
    /// Produce one report and print it as JSON.
    Analyze {
        /// Video id or watch URL.
        video: String,
        #[arg(long, default_value = "full")]
        depth: FetchDepth,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Arc::new(ytintel_core::load_app_config()?);
    init_tracing(&config)?;

    let Services {
        orchestrator,
        search,
    } = wiring::build_services(&config).await?;
    let orchestrator = Arc::new(orchestrator);
    let outcome = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(Arc::clone(&orchestrator), search, &config).await,
        Commands::Analyze { video, depth } => analyze(&orchestrator, &video, depth).await,
    };

    orchestrator.governor().shutdown();
    outcome
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn serve(
    orchestrator: Arc<ytintel_pipeline::AnalysisOrchestrator>,
    search: ytintel_pipeline::SearchService,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let sweeper = orchestrator
        .cache()
        .spawn_sweeper(CACHE_SWEEP_INTERVAL, shutdown.clone());
    let server = Arc::new(ToolServer::new(
        orchestrator,
        search,
        StatusInfo::from_app_config(config),
    ));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    tracing::info!(env = %config.env, "tool server listening on stdio");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let served = server.run(stdin, tokio::io::stdout(), shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "cache sweeper panicked");
    }
    served
}

async fn analyze(
    orchestrator: &ytintel_pipeline::AnalysisOrchestrator,
    video: &str,
    depth: FetchDepth,
) -> anyhow::Result<()> {
    let request = VideoRequest::parse(video, depth)?;
    match orchestrator.produce(&request).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(report.as_ref())?);
            Ok(())
        }
        Err(err) => {
            let err = ToolError::from(err);
            eprintln!("{}", serde_json::to_string_pretty(&err)?);
            Err(err.into())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
