//! API layer for the MindVideo proxy.
//!
//! This module contains the HTTP handlers, request/response models,
//! authentication, SSE encoding and the router.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod router;
pub mod streaming;

// Re-export commonly used types
pub use handlers::{
    chat_completions, create_image_generation, health, list_models, metrics_handler,
    stream_task_progress, AppState,
};
pub use models::{
    ChatCompletionRequest, ChatCompletionResponse, HealthResponse, ModelList, TaskSubmission,
    VideoGenerationRequest,
};
pub use openapi::ApiDoc;
pub use router::build_router;
