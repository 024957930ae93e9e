//! HTTP surface: case routes, health, OpenAPI description and CORS.

pub mod cases;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use casebrief_core::swarm::Coordinator;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    pub coordinator: Coordinator,
}

pub type SharedState = Arc<AppState>;

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        let body = Json(ErrorBody {
            error,
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Casebrief API",
        version = "1.0.0",
        description = "Statute and case law research from a case narrative"
    ),
    paths(health, cases::submit_case, cases::list_cases, cases::get_case),
    components(schemas(HealthResponse, ErrorBody, cases::CaseRequest, cases::CaseSubmitted, cases::CaseStatus)),
    tags((name = "case", description = "Research runs"))
)]
struct ApiDoc;

/// Liveness check
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], spec)
}

/// CORS from configured origins; `*` allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn router(state: SharedState, cors_origins: &[String]) -> Router {
    Router::new()
        .nest("/api/case", cases::case_routes())
        .route("/api/health", get(health))
        .route("/api/openapi.json", get(serve_openapi))
        .with_state(state)
        .layer(cors_layer(cors_origins))
}

/// State over the real clients; tests never execute runs against it
#[cfg(test)]
pub(crate) fn test_state() -> SharedState {
    use casebrief_core::{config::Settings, state::RunStore, swarm::EventBus};

    let coordinator = Coordinator::from_settings(&Settings::default(), EventBus::new(), Arc::new(RunStore::new()))
        .expect("coordinator from default settings");
    Arc::new(AppState { coordinator })
}
