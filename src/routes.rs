use crate::errors::ProviderFailure;
use crate::handlers::{self, AppState};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Every route the service exposes, without rate limiting.
///
/// The per-IP limiter needs the peer address, so `main` layers it on top.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Discovery
        .route("/api/info", get(handlers::capabilities))
        .route("/api/email/info", get(handlers::email_info))
        .route("/api/openplugin/manifest", get(handlers::openplugin_manifest))
        .route("/api/openplugin/openapi.yaml", get(handlers::openapi_spec))
        .route("/docs", get(handlers::swagger_ui))
        // Provider actions
        .route("/api/email/send", post(handlers::send_email))
        .route("/api/llm/generate", post(handlers::generate_text))
        .route("/api/crm/records", post(handlers::create_record))
        .route(
            "/api/crm/records/:object_type/:record_id",
            patch(handlers::update_record),
        )
        .route("/api/search", post(handlers::search))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
        .layer(middleware::map_response(oversized_body_envelope));

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Rewrites the body limit's bare 413 into the usual failure envelope.
async fn oversized_body_envelope(response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    tracing::warn!("Rejected request body larger than {} bytes", MAX_BODY_BYTES);
    ProviderFailure::validation(format!(
        "Request body exceeds the {} byte limit",
        MAX_BODY_BYTES
    ))
    .into_response()
}
