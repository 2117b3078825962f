use dotenv::dotenv;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let _sentry_guard = be_monolith::telemetry::init_sentry();
    be_monolith::telemetry::init_tracing()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    tokio::spawn(async move {
        be_monolith::shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    let config = be_monolith::ServerConfig::from_env(shutdown_rx)?;

    be_monolith::run_server(config).await
}
