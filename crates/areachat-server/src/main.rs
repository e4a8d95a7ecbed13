mod configuration;
mod error;
mod routes;
mod state;

use areachat::gateway::ChatGateway;
use areachat::providers::openai::OpenAiProvider;
use areachat::store::PostgresAreaStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = configuration::Settings::new()?;
    let addr = settings.server.socket_addr()?;
    let gateway_config = settings.chat.gateway_config();

    let provider = OpenAiProvider::new(settings.provider.into_config())?;
    let store = PostgresAreaStore::new(settings.database.into_config())?;
    let gateway = ChatGateway::new(Box::new(provider), Arc::new(store), gateway_config);
    info!(model = gateway.model(), "chat gateway ready");

    // Create app state
    let app_state = state::AppState::new(gateway);

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
