use clap::Parser;
use tasklist_mcp::{
    build_app,
    config::{Config, TransportMode},
    domain::build_registry,
    logging, transport, AppState,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// MCP task-list server over HTTP (unary, SSE, WebSocket) or stdio.
#[derive(Debug, Parser)]
#[command(name = "tasklist-mcp", version, about)]
struct Cli {
    /// Transport to serve; overrides MCP_TRANSPORT.
    #[arg(long, value_enum)]
    transport: Option<TransportMode>,

    /// HTTP port; overrides BIND_PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging();

    let config = Config::from_env()?.with_overrides(cli.transport, cli.port);
    let registry = build_registry(&config)?;
    info!(tools = registry.len(), "tool catalog ready");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let state = AppState::new(registry, config.ping_interval, shutdown.clone());

    match config.transport {
        TransportMode::Stdio => {
            info!("serving over stdio");
            transport::lines::serve_stdio(&state.dispatcher, shutdown).await;
        }
        TransportMode::Http => {
            let bind_socket = config.bind_socket()?;
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                "server starting"
            );

            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await?;
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
