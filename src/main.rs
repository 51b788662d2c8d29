use tokio::net::TcpListener;
use link_summarizer::{
    api::routes::create_router,
    config::Config,
    telemetry,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    telemetry::init(config.log_format);

    let server_addr = config.server_addr;
    tracing::info!(
        %server_addr,
        llm = config.llm.as_ref().map(|l| l.model.as_str()).unwrap_or("none"),
        "starting server"
    );

    // Build the router with routes
    let app = create_router(AppState::from_config(config)?);

    let listener = TcpListener::bind(server_addr).await?;
    tracing::info!("Listening on {}", server_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}
