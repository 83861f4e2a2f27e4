//! MindVideo Proxy - an OpenAI-compatible facade for MindVideo video generation
//!
//! This library exposes an OpenAI-style HTTP API and translates each request
//! into calls against the mindvideo.ai v2 API:
//!
//! - **Video generation**: `POST /v1/images/generations` submits a job and returns its task id
//! - **Progress streaming**: `GET /v1/tasks/{task_id}/stream` relays progress as Server-Sent Events
//! - **Chat completions**: `POST /v1/chat/completions` blocks until the video is ready
//! - **Credential rotation**: upstream tokens are used in strict round-robin order
//! - **Request signing**: every upstream call carries a fresh `i-sign` header
//! - **Metrics & Monitoring**: Prometheus metrics for observability
//!
//! # Architecture
//!
//! The codebase is organized into three main layers:
//!
//! - [`core`]: Core functionality (config, errors, logging, metrics, middleware)
//! - [`api`]: HTTP handlers, authentication, SSE encoding and request/response models
//! - [`services`]: Signing, credential rotation, upstream client and task tracking
//!
//! # Configuration
//!
//! The server requires at least one upstream credential:
//! - `MINDVIDEO_AUTH_TOKEN_1`, `MINDVIDEO_AUTH_TOKEN_2`, ...
//!
//! Optional environment variables:
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8088)
//! - `API_MASTER_KEY`: Caller bearer key (default `1`, which disables auth)
//! - `POLLING_INTERVAL` / `POLLING_TIMEOUT`: Task polling pacing in seconds (default: 5 / 480)
//! - `MODEL_MAPPING`: JSON object of model name to upstream bot id

pub mod api;
pub mod core;
pub mod services;

// Re-export commonly used types for convenience
pub use api::{build_router, ApiDoc, AppState, ChatCompletionRequest, ChatCompletionResponse};
pub use core::{AppConfig, AppError, Result};
pub use services::{UpstreamClient, VideoService};
