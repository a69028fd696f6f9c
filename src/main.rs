use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use clap::Parser;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use visitor_tracker::{Settings, VisitorTracker, VisitorTrackerLayer};

#[derive(Parser)]
#[command(name = "visitor-tracker")]
#[command(about = "Records a hashed visitor point in InfluxDB for every request", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); environment variables still apply
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the listen host
    #[arg(long)]
    host: Option<String>,
    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    info!("Loaded configuration: {:?}", settings.tracker);

    let tracker = Arc::new(
        VisitorTracker::connect(&settings.tracker, &settings.writer)
            .context("failed to initialize visitor tracker")?,
    );
    info!(
        "📈 Writing visitor points to {} (org: {}, bucket: {})",
        settings.tracker.influxdb_url, settings.tracker.influxdb_org, settings.tracker.influxdb_bucket
    );

    let app = Router::new()
        .route("/healthz", get(health_check))
        .fallback(|| async { StatusCode::NO_CONTENT })
        .layer(VisitorTrackerLayer::new(Arc::clone(&tracker)))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 Visitor tracker listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down, flushing buffered visitor points...");
    tracker.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
