use anyhow::Context;
use chatrelay::relay_config::RelayConfig;
use chatrelay::server::build_router;
use chatrelay::util::{env_bind_addr, init_tracing, AppState};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    // Check for --relay-config flag
    let relay_config_arg = args
        .iter()
        .find(|a| a.starts_with("--relay-config="))
        .and_then(|a| a.strip_prefix("--relay-config="))
        .map(|s| s.to_string());

    let config = if let Some(path) = relay_config_arg {
        tracing::info!("Loading relay configuration from: {}", path);
        match RelayConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load relay config: {:#}", e);
                tracing::warn!("Continuing with relay configuration from environment");
                RelayConfig::from_env()
            }
        }
    } else {
        RelayConfig::from_env()
    };
    tracing::info!(
        endpoint = %config.endpoint,
        model = %config.model,
        max_tokens = config.max_tokens,
        "Relay configured"
    );

    let state = AppState::from_env(config);
    tracing::info!("Serving static assets from {}", state.static_dir.display());
    let app = build_router(state);

    let addr = env_bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
