use agency_reporting::{api, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Configuration failed: {}", e);
        e
    })?;
    log::debug!("Loaded {:?}", config);

    let state = AppState::initialize(&config).await?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    log::info!("Agency reporting server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutdown signal received");
}
