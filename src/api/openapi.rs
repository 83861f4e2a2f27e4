//! OpenAPI document for the `/v1` endpoints.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::create_image_generation,
        crate::api::handlers::stream_task_progress,
        crate::api::handlers::chat_completions,
        crate::api::handlers::list_models,
    ),
    components(
        schemas(
            crate::api::models::VideoGenerationRequest,
            crate::api::models::TaskSubmission,
            crate::api::models::VideoGenerationResult,
            crate::api::models::VideoData,
            crate::api::models::ChatCompletionRequest,
            crate::api::models::ChatCompletionResponse,
            crate::api::models::Message,
            crate::api::models::AssistantMessage,
            crate::api::models::Choice,
            crate::api::models::Usage,
            crate::api::models::ModelList,
            crate::api::models::ModelInfo,
            crate::api::models::ApiErrorResponse,
            crate::api::models::ApiErrorDetail,
        )
    ),
    tags(
        (name = "video", description = "Video generation and task progress"),
        (name = "completions", description = "OpenAI-compatible chat completions"),
        (name = "models", description = "OpenAI-compatible model listing")
    ),
    info(
        title = "MindVideo Proxy API",
        version = "1.0.0",
        description = "OpenAI-compatible facade over the MindVideo video generation service."
    ),
    servers(
        (url = "http://127.0.0.1:8088", description = "Local development server")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}
