mod analytics;
mod config;
mod errors;
mod feeds;
mod market;
mod models;
mod server;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("pretty_quant starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if cfg.rate_api_key.is_none() {
        tracing::warn!(
            default = cfg.default_risk_free_rate,
            "RATE_API_KEY not set, quotes will use the default risk-free rate"
        );
    }

    let port = cfg.server_port;
    let app_state = AppState::new(cfg);
    tracing::info!(
        tickers = ?app_state.config.default_tickers,
        test_fraction = app_state.config.test_fraction,
        seed = app_state.config.split_seed,
        "state initialised"
    );

    let app = server::router(app_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
