use clap::Parser;

use gateway_core::config::Config;
use gateway_core::generator::FoundationClient;
use gateway_core::http::{build_router, AppState};
use gateway_core::logging;
use gateway_core::registry::ModelRegistry;

#[tokio::main]
async fn main() {
    let config = Config::parse();
    logging::init_tracing(config.very_verbose);

    let foundation = config.foundation_url.clone().map(FoundationClient::new);
    let mut registry = ModelRegistry::new();
    if foundation.is_some() {
        registry = registry.with_foundation();
    }

    let bind_addr = config.bind_addr();
    let state = AppState::new(registry, config, foundation);
    let app = build_router(state);

    tracing::info!("listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {bind_addr}: {err}"));
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|err| panic!("server error: {err}"));
}
