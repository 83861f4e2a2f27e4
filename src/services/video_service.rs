//! OpenAI-shaped operations on top of the upstream client and task tracker.

use crate::api::models::{
    AssistantMessage, ChatCompletionRequest, ChatCompletionResponse, Choice, ModelInfo, ModelList,
    TaskSubmission, Usage, VideoData, VideoGenerationRequest, VideoGenerationResult,
    DEFAULT_VIDEO_SIZE,
};
use crate::core::error::{AppError, Result};
use crate::core::logging::get_request_id;
use crate::services::task_tracker::{track_task, ProgressEvent, ProgressFrame, TrackerSettings};
use crate::services::upstream::UpstreamClient;
use futures::{Stream, StreamExt};
use std::sync::Arc;

const MODEL_OWNER: &str = "mindvideo";

/// Adapter between the OpenAI-compatible surface and MindVideo.
#[derive(Clone)]
pub struct VideoService {
    client: Arc<UpstreamClient>,
    settings: TrackerSettings,
    default_model: String,
}

impl VideoService {
    pub fn new(
        client: Arc<UpstreamClient>,
        settings: TrackerSettings,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            settings,
            default_model: default_model.into(),
        }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    fn model_or_default<'a>(&'a self, model: Option<&'a str>) -> &'a str {
        model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
    }

    /// Validate a generation request and submit it; returns immediately.
    pub async fn submit_video_task(&self, request: &VideoGenerationRequest) -> Result<TaskSubmission> {
        let prompt = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::BadRequest("Parameter 'prompt' is required".to_string()))?;
        let model = self.model_or_default(request.model.as_deref());
        let size = request
            .size
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_VIDEO_SIZE);

        let task_id = self.client.submit(prompt, model, size).await?;
        Ok(TaskSubmission { task_id })
    }

    /// Progress frames for an already submitted task.
    pub fn stream_task_progress(
        &self,
        task_id: u64,
    ) -> impl Stream<Item = ProgressFrame> + Send + 'static {
        tracing::info!(request_id = %get_request_id(), task_id, "Streaming task progress");
        track_task(self.client.clone(), task_id, self.settings)
    }

    /// Submit and block until the video is ready.
    ///
    /// Intermediate progress is discarded; a failed or timed-out task becomes
    /// [`AppError::UpstreamTask`].
    pub async fn generate_video(
        &self,
        prompt: &str,
        model: &str,
        size: &str,
    ) -> Result<VideoGenerationResult> {
        let task_id = self.client.submit(prompt, model, size).await?;
        let url = wait_for_completion(self.stream_task_progress(task_id)).await?;
        Ok(VideoGenerationResult {
            created: chrono::Utc::now().timestamp(),
            data: vec![VideoData { url }],
        })
    }

    /// Chat completion backed by a blocking video generation.
    ///
    /// The prompt is the text of the last user message; `stream` is ignored.
    pub async fn complete_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        if request.messages.is_empty() {
            return Err(AppError::BadRequest(
                "Parameter 'messages' is required".to_string(),
            ));
        }
        let prompt = request.last_user_text().ok_or_else(|| {
            AppError::BadRequest("No user message found in 'messages'".to_string())
        })?;
        let model = self.model_or_default(request.model.as_deref()).to_string();

        tracing::info!(
            request_id = %get_request_id(),
            model = %model,
            prompt_len = prompt.len(),
            "Chat completion requested"
        );

        let result = self.generate_video(&prompt, &model, DEFAULT_VIDEO_SIZE).await?;
        let url = result
            .data
            .into_iter()
            .next()
            .map(|video| video.url)
            .ok_or_else(|| AppError::Internal("generation returned no video".to_string()))?;

        Ok(ChatCompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model,
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: chat_content(&url),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage::default(),
        })
    }

    /// Every configured model, sorted by id.
    pub fn list_models(&self) -> ModelList {
        let created = chrono::Utc::now().timestamp();
        ModelList {
            object: "list".to_string(),
            data: self
                .client
                .model_names()
                .map(|id| ModelInfo {
                    id: id.to_string(),
                    object: "model".to_string(),
                    created,
                    owned_by: MODEL_OWNER.to_string(),
                })
                .collect(),
        }
    }
}

/// Assistant message body linking to the finished video.
pub fn chat_content(url: &str) -> String {
    format!("Video generated: [click to view]({})", url)
}

/// Drain a progress stream down to its terminal event.
pub async fn wait_for_completion<S>(frames: S) -> Result<String>
where
    S: Stream<Item = ProgressFrame>,
{
    let mut frames = std::pin::pin!(frames);
    while let Some(frame) = frames.next().await {
        match frame {
            ProgressFrame::Event(ProgressEvent::Processing { .. }) => continue,
            ProgressFrame::Event(ProgressEvent::Completed { url }) => return Ok(url),
            ProgressFrame::Event(ProgressEvent::Failed { error }) => {
                return Err(AppError::UpstreamTask(error))
            }
            ProgressFrame::Done => break,
        }
    }
    Err(AppError::UpstreamTask(
        "progress stream ended without a result".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credential_rotator::CredentialRotator;
    use crate::services::signer::Signer;
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn service() -> VideoService {
        let client = UpstreamClient::from_parts(
            reqwest::Client::new(),
            "http://127.0.0.1:9/api/v2",
            CredentialRotator::new(vec!["t".into()]).unwrap(),
            Signer::new("k"),
            BTreeMap::from([("sora-2-free".to_string(), 153), ("alpha".to_string(), 7)]),
        );
        VideoService::new(
            Arc::new(client),
            TrackerSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::from_millis(50),
            },
            "sora-2-free",
        )
    }

    fn processing(progress: u8) -> ProgressFrame {
        ProgressFrame::Event(ProgressEvent::Processing {
            progress,
            remark: "Processing...".into(),
        })
    }

    #[tokio::test]
    async fn test_wait_for_completion_returns_url() {
        let frames = futures::stream::iter(vec![
            processing(10),
            processing(80),
            ProgressFrame::Event(ProgressEvent::Completed {
                url: "https://cdn/v.mp4".into(),
            }),
            ProgressFrame::Done,
        ]);
        assert_eq!(wait_for_completion(frames).await.unwrap(), "https://cdn/v.mp4");
    }

    #[tokio::test]
    async fn test_wait_for_completion_surfaces_failure() {
        let frames = futures::stream::iter(vec![
            processing(10),
            ProgressFrame::Event(ProgressEvent::Failed {
                error: "content policy violation".into(),
            }),
            ProgressFrame::Done,
        ]);
        let err = wait_for_completion(frames).await.unwrap_err();
        assert_matches!(err, AppError::UpstreamTask(ref msg) if msg == "content policy violation");
    }

    #[tokio::test]
    async fn test_wait_for_completion_without_terminal() {
        let frames = futures::stream::iter(vec![processing(5), ProgressFrame::Done]);
        assert_matches!(
            wait_for_completion(frames).await,
            Err(AppError::UpstreamTask(_))
        );
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() {
        let request = VideoGenerationRequest {
            prompt: Some("   ".into()),
            ..Default::default()
        };
        let err = service().submit_video_task(&request).await.unwrap_err();
        assert_matches!(err, AppError::BadRequest(ref msg) if msg == "Parameter 'prompt' is required");
    }

    #[tokio::test]
    async fn test_unknown_model_is_bad_request() {
        let request = VideoGenerationRequest {
            prompt: Some("a cat".into()),
            model: Some("foo".into()),
            ..Default::default()
        };
        let err = service().submit_video_task(&request).await.unwrap_err();
        assert_matches!(err, AppError::BadRequest(ref msg) if msg == "Unsupported model: 'foo'");
    }

    #[tokio::test]
    async fn test_chat_requires_messages() {
        let err = service()
            .complete_chat(&ChatCompletionRequest::default())
            .await
            .unwrap_err();
        assert_matches!(err, AppError::BadRequest(_));
    }

    #[tokio::test]
    async fn test_chat_requires_user_message() {
        let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"role": "system", "content": "be brief"}]
        }))
        .unwrap();
        let err = service().complete_chat(&request).await.unwrap_err();
        assert_matches!(err, AppError::BadRequest(ref msg) if msg.contains("user"));
    }

    #[test]
    fn test_list_models_sorted() {
        let models = service().list_models();
        assert_eq!(models.object, "list");
        let ids: Vec<_> = models.data.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "sora-2-free"]);
        assert!(models.data.iter().all(|m| m.owned_by == "mindvideo" && m.object == "model"));
    }

    #[test]
    fn test_default_model_fallback() {
        let svc = service();
        assert_eq!(svc.model_or_default(None), "sora-2-free");
        assert_eq!(svc.model_or_default(Some("")), "sora-2-free");
        assert_eq!(svc.model_or_default(Some("alpha")), "alpha");
    }

    #[test]
    fn test_chat_content_links_video() {
        assert_eq!(
            chat_content("https://cdn/v.mp4"),
            "Video generated: [click to view](https://cdn/v.mp4)"
        );
    }
}
