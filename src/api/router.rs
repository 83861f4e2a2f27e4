//! Router construction.

use crate::api::auth::require_master_key;
use crate::api::handlers::{
    chat_completions, create_image_generation, health, list_models, metrics_handler,
    stream_task_progress, AppState,
};
use crate::api::openapi::ApiDoc;
use crate::core::middleware::{request_id_middleware, MetricsMiddleware};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the application router with all endpoints and middleware.
///
/// `/v1` routes require the master key (when one is configured) and are
/// tracked in metrics. `/health`, `/metrics` and the API docs are open.
pub fn build_router(state: Arc<AppState>) -> Router {
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let api_routes = Router::new()
        .route("/v1/images/generations", post(create_image_generation))
        .route("/v1/tasks/:task_id/stream", get(stream_task_progress))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_master_key,
        ))
        .route_layer(middleware::from_fn(MetricsMiddleware::track_metrics));

    Router::new()
        .merge(api_routes)
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(swagger_ui)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
