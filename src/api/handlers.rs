//! HTTP request handlers.
//!
//! Endpoint handlers for video generation, task progress streaming, chat
//! completions, model listing, health and metrics. Authentication is applied
//! as a route layer in [`crate::api::router`].

use crate::api::models::*;
use crate::api::streaming::create_sse_response;
use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result};
use crate::services::VideoService;
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub video_service: VideoService,
}

impl AppState {
    pub fn new(config: AppConfig, video_service: VideoService) -> Self {
        Self {
            config,
            video_service,
        }
    }
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Submit a video generation task.
///
/// Returns the upstream task id immediately; progress is available from
/// `/v1/tasks/{task_id}/stream`.
#[utoipa::path(
    post,
    path = "/v1/images/generations",
    tag = "video",
    request_body = VideoGenerationRequest,
    responses(
        (status = 200, description = "Task submitted", body = TaskSubmission),
        (status = 400, description = "Invalid request or unsupported model", body = ApiErrorResponse),
        (status = 401, description = "Missing bearer token", body = ApiErrorResponse),
        (status = 403, description = "Invalid API key", body = ApiErrorResponse),
        (status = 502, description = "Upstream rejected the submission", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_image_generation(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VideoGenerationRequest>, JsonRejection>,
) -> Result<Json<TaskSubmission>> {
    let request = json_body(payload)?;
    let submission = state.video_service.submit_video_task(&request).await?;
    Ok(Json(submission))
}

/// Stream task progress as Server-Sent Events.
///
/// Emits `processing` events until the task completes or fails, then a
/// single `data: [DONE]` line. Task failures arrive as events inside the
/// 200 stream.
#[utoipa::path(
    get,
    path = "/v1/tasks/{task_id}/stream",
    tag = "video",
    params(
        ("task_id" = u64, Path, description = "Upstream task id returned at submission")
    ),
    responses(
        (status = 200, description = "Progress event stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Malformed task id", body = ApiErrorResponse),
        (status = 401, description = "Missing bearer token", body = ApiErrorResponse),
        (status = 403, description = "Invalid API key", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn stream_task_progress(
    State(state): State<Arc<AppState>>,
    task_id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<Response> {
    let Path(task_id) = task_id.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let frames = state.video_service.stream_task_progress(task_id);
    Ok(create_sse_response(frames, task_id))
}

/// Chat completion backed by video generation.
///
/// Always blocks until the video is ready; `stream` is ignored.
#[utoipa::path(
    post,
    path = "/v1/chat/completions",
    tag = "completions",
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "Completion with a link to the video", body = ChatCompletionResponse),
        (status = 400, description = "No user message or unsupported model", body = ApiErrorResponse),
        (status = 401, description = "Missing bearer token", body = ApiErrorResponse),
        (status = 403, description = "Invalid API key", body = ApiErrorResponse),
        (status = 502, description = "Upstream submission or task failed", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, payload))]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Json<ChatCompletionResponse>> {
    let request = json_body(payload)?;
    let response = state.video_service.complete_chat(&request).await?;
    Ok(Json(response))
}

/// List available models.
#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "models",
    responses(
        (status = 200, description = "Configured models", body = ModelList),
        (status = 401, description = "Missing bearer token", body = ApiErrorResponse),
        (status = 403, description = "Invalid API key", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(state.video_service.list_models())
}

/// Health check.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let client = state.video_service.client();
    tracing::debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        credentials: client.credential_count(),
        models: client.model_names().count(),
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}
