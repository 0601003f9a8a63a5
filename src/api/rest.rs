// REST API endpoints

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{DeleteResponse, Destination, ErrorResponse, HealthResponse, LookupQuery, ndjson};
use crate::error::RouteError;
use crate::routes::{RouteRecord, RoutingTable, get_hostname};
use crate::service::{AddRoutesResult, RouteService};

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Clone)]
pub struct AppState {
    pub service: RouteService,
    instance_id: String,
    started_at: String,
}

impl AppState {
    pub fn new(service: RouteService) -> Self {
        AppState {
            service,
            instance_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/routes", post(add_routes).delete(delete_route))
        .route("/api/routes/exact", get(get_exact))
        .route("/api/route", get(get_route))
        .route("/api/lookup", get(lookup))
        .route("/api/routing-table", get(get_routing_table))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn invalid_route(e: RouteError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.kind().to_string(),
            message: e.to_string(),
        }),
    )
}

fn not_found(target: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "NotFound".to_string(),
            message: format!("No route found to {}", target),
        }),
    )
}

/// AddRoutes: the body is a stream of newline-delimited JSON routes, applied
/// as they arrive.
async fn add_routes(State(state): State<Arc<AppState>>, body: Body) -> Json<AddRoutesResult> {
    let routes = ndjson::route_stream(body.into_data_stream());
    Json(state.service.add_routes(routes).await)
}

/// GetRoute: longest-prefix match for the masked destination network
async fn get_route(
    State(state): State<Arc<AppState>>,
    Query(dest): Query<Destination>,
) -> Result<Json<RouteRecord>, ApiError> {
    match state.service.get_route(&dest.network, &dest.mask) {
        Ok(Some(route)) => Ok(Json(route)),
        Ok(None) => Err(not_found(format!("{}/{}", dest.network, dest.mask))),
        Err(e) => Err(invalid_route(e)),
    }
}

async fn get_exact(
    State(state): State<Arc<AppState>>,
    Query(dest): Query<Destination>,
) -> Result<Json<RouteRecord>, ApiError> {
    match state.service.get_exact(&dest.network, &dest.mask) {
        Ok(Some(route)) => Ok(Json(route)),
        Ok(None) => Err(not_found(format!("{}/{}", dest.network, dest.mask))),
        Err(e) => Err(invalid_route(e)),
    }
}

async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<RouteRecord>, ApiError> {
    let address: Ipv4Addr = query
        .address
        .trim()
        .parse()
        .map_err(|_| invalid_route(RouteError::InvalidAddress(query.address.clone())))?;

    state
        .service
        .lookup_address(address)
        .map(Json)
        .ok_or_else(|| not_found(address))
}

async fn delete_route(
    State(state): State<Arc<AppState>>,
    Query(dest): Query<Destination>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed = state
        .service
        .remove_route(&dest.network, &dest.mask)
        .map_err(invalid_route)?;
    if removed {
        tracing::info!("Removed route {}/{}", dest.network, dest.mask);
    }
    Ok(Json(DeleteResponse { removed }))
}

async fn get_routing_table(State(state): State<Arc<AppState>>) -> Json<RoutingTable> {
    Json(state.service.table())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.service.store();
    Json(HealthResponse {
        status: "ok",
        instance_id: state.instance_id.clone(),
        hostname: get_hostname(),
        started_at: state.started_at.clone(),
        route_count: store.len(),
        prefix_lengths: store.stats(),
    })
}
