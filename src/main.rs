use std::sync::Arc;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use routetable::api::rest::{AppState, create_api_router};
use routetable::config::Config;
use routetable::routes::{parser, store::RouteStore};
use routetable::service::RouteService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Initialize logging; RUST_LOG directives refine the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(config.log_level).into())
                .from_env_lossy(),
        )
        .init();
    tracing::info!("Route table server starting...");

    let service = RouteService::new(Arc::new(RouteStore::new()));

    if let Some(path) = &config.bootstrap_file {
        let table = parser::load_routing_table(path)?;
        let result = service.load(table.routes);
        tracing::info!(
            "Loaded {} route(s) from {}",
            result.accepted_count,
            path.display()
        );
        for rejected in &result.rejected {
            tracing::warn!("Skipped route #{} in {}: {}", rejected.index, path.display(), rejected.reason);
        }
    }

    let state = Arc::new(AppState::new(service));
    tracing::info!("Instance ID: {}", state.instance_id());

    let app = create_api_router(state);

    let addr = config.listen_addr;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST   http://{}/api/routes          (AddRoutes, NDJSON stream)", addr);
    tracing::info!("  GET    http://{}/api/route           (GetRoute)", addr);
    tracing::info!("  GET    http://{}/api/lookup", addr);
    tracing::info!("  GET    http://{}/api/routes/exact", addr);
    tracing::info!("  DELETE http://{}/api/routes", addr);
    tracing::info!("  GET    http://{}/api/routing-table", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
