//! API request and response models.
//!
//! This module defines all data structures used in the API: video generation
//! requests, chat completion requests/responses, model listings and errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use utoipa::ToSchema;

/// Default frame size for generated videos (portrait).
pub const DEFAULT_VIDEO_SIZE: &str = "720x1280";

/// Image/video generation request (`POST /v1/images/generations`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "prompt": "a cat playing piano",
    "model": "sora-2-free",
    "size": "720x1280"
}))]
pub struct VideoGenerationRequest {
    /// Text description of the video
    #[serde(default)]
    pub prompt: Option<String>,

    /// Model name; defaults to the configured default model
    #[serde(default)]
    pub model: Option<String>,

    /// Frame size such as `720x1280`
    #[serde(default)]
    pub size: Option<String>,

    /// Accepted for OpenAI compatibility; only one video is produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// Accepted for OpenAI compatibility; results are always URLs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

/// Immediate response to a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"task_id": 123456}))]
pub struct TaskSubmission {
    /// Upstream task id, used with `/v1/tasks/{task_id}/stream`
    pub task_id: u64,
}

/// Result of a blocking generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoGenerationResult {
    pub created: i64,
    pub data: Vec<VideoData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoData {
    pub url: String,
}

/// Chat completion request following OpenAI API format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "model": "sora-2-free",
    "messages": [
        {"role": "user", "content": "A timelapse of a city at night"}
    ]
}))]
pub struct ChatCompletionRequest {
    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,

    /// Conversation messages
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Ignored: chat requests always block until the video is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Additional OpenAI parameters, accepted and ignored
    #[serde(flatten)]
    #[schema(additional_properties)]
    pub extra: HashMap<String, Value>,
}

impl ChatCompletionRequest {
    /// Text of the last `user` message, if it has any.
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(Message::text)
            .filter(|text| !text.trim().is_empty())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"role": "user", "content": "Hello!"}))]
pub struct Message {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Either a string or an array of content parts
    #[serde(default)]
    #[schema(value_type = Object)]
    pub content: Value,
}

impl Message {
    /// Flatten the content into plain text; text parts are joined by newlines.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}

/// Assistant message in a response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "chatcmpl-abc123",
    "object": "chat.completion",
    "created": 1677858242,
    "model": "sora-2-free",
    "choices": [{
        "index": 0,
        "message": {"role": "assistant", "content": "Video generated: [click to view](https://cdn.example/v.mp4)"},
        "finish_reason": "stop"
    }],
    "usage": {"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0}
}))]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

/// A single choice in the response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// Token usage statistics (always zero for video generation).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Model information.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"id": "sora-2-free", "object": "model", "created": 1677610602, "owned_by": "mindvideo"}))]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

/// List of available models.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Number of upstream credentials in rotation
    pub credentials: usize,
    /// Number of models exposed
    pub models: usize,
}

/// Error response for API errors.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": {
        "message": "Unsupported model: 'foo'",
        "type": "invalid_request_error",
        "code": 400
    }
}))]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail in API error responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: u16,
}
