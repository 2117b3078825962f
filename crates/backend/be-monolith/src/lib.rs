use std::{net::SocketAddr, sync::Arc};

use axum::{Router, http::StatusCode, routing::get};
use be_payment_service::init_payment_service;
use be_remote_db::DatabaseManager;

pub mod telemetry;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("Invalid HTTP_ADDR {value:?}: {source}")]
    InvalidAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub database_url: String,
    pub http_addr: SocketAddr,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

impl ServerConfig {
    /// Reads `DATABASE_URL` and `HTTP_ADDR` (default `0.0.0.0:3000`).
    pub fn from_env(
        shutdown: tokio::sync::watch::Receiver<()>,
    ) -> Result<Self, ServerConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), shutdown)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        shutdown: tokio::sync::watch::Receiver<()>,
    ) -> Result<Self, ServerConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ServerConfigError::Missing("DATABASE_URL"))?;

        let addr = lookup("HTTP_ADDR")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|source| ServerConfigError::InvalidAddr {
                value: addr.clone(),
                source,
            })?;

        Ok(Self {
            database_url,
            http_addr,
            shutdown,
        })
    }
}

/// Resolves on CTRL+C, or on SIGTERM where the platform has it.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C signal handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received CTRL+C, initiating shutdown..."),
        _ = terminate => tracing::info!("Received SIGTERM, initiating shutdown..."),
    }
}

fn health_router() -> Router {
    Router::new().route("/health", get(|| async { StatusCode::OK }))
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(posthog_key) = std::env::var("POSTHOG_API_KEY")
        .ok()
        .filter(|s| !s.is_empty())
    {
        match posthog_rs::init_global(posthog_key.as_str()).await {
            Ok(()) => tracing::info!("PostHog analytics initialized"),
            Err(e) => tracing::warn!("Failed to initialize PostHog: {}", e),
        }
    } else {
        tracing::info!("POSTHOG_API_KEY not set, analytics disabled");
    }

    let db_manager = Arc::new(DatabaseManager::new(&config.database_url).await?);

    let payment_router = match init_payment_service(db_manager.clone()) {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("Failed to initialize payment service: {}", e);
            return Err(e.into());
        }
    };

    let http_router = payment_router.merge(health_router());

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await
    .inspect_err(|e| tracing::error!("HTTP server error: {}", e))?;

    Ok(())
}
