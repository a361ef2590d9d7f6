//! Canvas MCP server binary.
//!
//! Serves the streamable HTTP MCP endpoint on `/mcp` and runs the session
//! eviction sweeper until a shutdown signal arrives.

use canvas_mcp::session::{spawn_sweeper, SessionRegistry};
use canvas_mcp::{CanvasClient, McpDispatcher, McpService};
use clap::Parser;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "canvas-mcp", version, about = "Canvas LMS MCP Server")]
struct Cli {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    /// Listen port
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,
    /// Idle session time-to-live in seconds (must be nonzero)
    #[arg(
        long,
        env = "CANVAS_MCP_SESSION_TTL_SECS",
        default_value_t = 3600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    session_ttl_secs: u64,
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
            _ = tokio::signal::ctrl_c() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("canvas_mcp=info")),
        )
        .init();

    let cli = Cli::parse();
    let bind_addr = SocketAddr::new(cli.host, cli.port);
    let session_ttl = Duration::from_secs(cli.session_ttl_secs);

    let registry = Arc::new(SessionRegistry::new());
    let client = Arc::new(CanvasClient::new());
    let dispatcher = Arc::new(McpDispatcher::new(registry.clone(), client));
    let service = McpService::new(dispatcher);

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(registry.clone(), session_ttl, cancel.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind failed: {e}"))?;
    info!(
        ttl_secs = session_ttl.as_secs(),
        "MCP HTTP server listening on http://{bind_addr}/mcp"
    );

    let cancel_for_shutdown = cancel.clone();
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            info!("Shutdown signal received");
            cancel_for_shutdown.cancel();
        }
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("HTTP server shutting down");
                break;
            }
            res = listener.accept() => {
                let (stream, _) = res.map_err(|e| anyhow::anyhow!("accept failed: {e}"))?;
                let svc = service.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let conn = http1::Builder::new().serve_connection(
                        io,
                        TowerToHyperService::new(svc),
                    );
                    if let Err(err) = conn.await {
                        error!("http connection error: {err}");
                    }
                });
            }
        }
    }

    sweeper.await.ok();
    let remaining = registry.drain_all().await;
    for (_, transport) in &remaining {
        transport.close();
    }
    if !remaining.is_empty() {
        info!(sessions = remaining.len(), "Closed remaining sessions");
    }

    info!("Server stopped");
    Ok(())
}
