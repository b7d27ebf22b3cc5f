mod auth;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod router;
mod state;

use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use types::config::DispatchConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting ride dispatch gateway");

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
    let state = AppState::new(jwt_secret.as_bytes(), DispatchConfig::default());

    // Rebuild dispatch tasks for rides the previous process left searching.
    let resumed = state.dispatcher.recover_searching_rides()?;
    tracing::info!(resumed, "startup recovery complete");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
