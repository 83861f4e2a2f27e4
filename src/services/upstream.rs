//! HTTP client for the mindvideo.ai v2 API.
//!
//! Two operations are supported: submitting a creation job and polling its
//! progress. Every call consumes exactly one credential from the
//! [`CredentialRotator`] and one freshly generated `i-sign` value.

use crate::core::config::AppConfig;
use crate::core::error::AppError;
use crate::core::logging::get_request_id;
use crate::core::metrics::record_upstream_call;
use crate::services::credential_rotator::{CredentialRotator, EmptyCredentialPool};
use crate::services::signer::Signer;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

const ACCEPT: &str = "application/json, text/plain, */*";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const CLIENT_LANG: &str = "zh-CN";
const CLIENT_VERSION: &str = "1.0.8";
const ORIGIN: &str = "https://www.mindvideo.ai";
const REFERER: &str = "https://www.mindvideo.ai/";

/// Creation type for text-to-video jobs.
const CREATION_TYPE_VIDEO: u8 = 1;
/// Clip length requested for every job.
pub const VIDEO_SECONDS: u32 = 15;

/// Maximum number of body characters kept in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

/// Errors raised while talking to the upstream API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The caller asked for a model that has no bot id mapping
    #[error("Unsupported model: '{0}'")]
    UnsupportedModel(String),

    /// Connection, TLS or timeout failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP status
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not the JSON shape we expect
    #[error("could not decode upstream response: {0}")]
    Decode(String),

    /// Upstream answered with a non-zero `code` or without a job id
    #[error("{message}")]
    Rejected { message: String },
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::UnsupportedModel(_) => AppError::BadRequest(err.to_string()),
            other => AppError::UpstreamSubmission(other.to_string()),
        }
    }
}

/// Body of `POST /creations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreationPayload {
    #[serde(rename = "type")]
    pub kind: u8,
    pub bot_id: u64,
    pub options: CreationOptions,
    pub is_public: bool,
    pub copy_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreationOptions {
    pub prompt: String,
    pub size: String,
    pub seconds: u32,
    pub history_images: Vec<String>,
}

/// Body of `GET /creations/task_progress`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<TaskSnapshot>>,
}

impl PollResponse {
    /// The record for the polled task: the first element of `data`.
    pub fn first_task(&self) -> Option<&TaskSnapshot> {
        self.data.as_ref().and_then(|tasks| tasks.first())
    }
}

/// Status of one upstream task as reported by a poll.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSnapshot {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub task_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub task_progress: u8,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub task_remark: Option<String>,
    #[serde(default, deserialize_with = "deserialize_results")]
    pub results: Option<Vec<TaskResult>>,
}

impl TaskSnapshot {
    /// `results[0].result_url`, if present and non-empty.
    pub fn result_url(&self) -> Option<&str> {
        self.results
            .as_ref()
            .and_then(|results| results.first())
            .and_then(|result| result.result_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub result_url: Option<String>,
}

/// Accept a string, or render a number or bool as one; anything else is absent.
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Keep the position of every result entry; malformed entries carry no URL.
fn deserialize_results<'de, D>(deserializer: D) -> Result<Option<Vec<TaskResult>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Array(entries)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .iter()
            .map(|entry| TaskResult {
                result_url: entry
                    .get("result_url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect(),
    ))
}

/// Accept progress as an integer, a float or a numeric string; clamp to 0..=100.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let progress = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(progress.clamp(0.0, 100.0) as u8)
}

/// Client for the two upstream operations.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    rotator: CredentialRotator,
    signer: Signer,
    models: BTreeMap<String, u64>,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, config: &AppConfig) -> Result<Self, EmptyCredentialPool> {
        Ok(Self::from_parts(
            http,
            config.upstream.base_url.clone(),
            CredentialRotator::new(config.upstream.auth_tokens.clone())?,
            Signer::new(config.upstream.sign_app_key.clone()),
            config.model_mapping.clone(),
        ))
    }

    pub fn from_parts(
        http: reqwest::Client,
        base_url: impl Into<String>,
        rotator: CredentialRotator,
        signer: Signer,
        models: BTreeMap<String, u64>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rotator,
            signer,
            models,
        }
    }

    /// Caller-facing model names, sorted.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn credential_count(&self) -> usize {
        self.rotator.len()
    }

    /// Map a caller-facing model name to the upstream bot id.
    pub fn resolve_model(&self, model_name: &str) -> Result<u64, UpstreamError> {
        self.models
            .get(model_name)
            .copied()
            .ok_or_else(|| UpstreamError::UnsupportedModel(model_name.to_string()))
    }

    /// Build the job payload; fails before any network activity on an unknown model.
    pub fn build_payload(
        &self,
        prompt: &str,
        model_name: &str,
        size: &str,
    ) -> Result<CreationPayload, UpstreamError> {
        Ok(CreationPayload {
            kind: CREATION_TYPE_VIDEO,
            bot_id: self.resolve_model(model_name)?,
            options: CreationOptions {
                prompt: prompt.to_string(),
                size: size.to_string(),
                seconds: VIDEO_SECONDS,
                history_images: Vec::new(),
            },
            is_public: true,
            copy_protection: false,
        })
    }

    /// Attach the per-call header contract to a request.
    fn with_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Accept", ACCEPT)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Content-Type", "application/json")
            .header("authorization", format!("Bearer {}", self.rotator.next()))
            .header("i-lang", CLIENT_LANG)
            .header("i-sign", self.signer.generate())
            .header("i-version", CLIENT_VERSION)
            .header("origin", ORIGIN)
            .header("referer", REFERER)
    }

    /// Submit a generation job and return the upstream task id.
    pub async fn submit(
        &self,
        prompt: &str,
        model_name: &str,
        size: &str,
    ) -> Result<u64, UpstreamError> {
        let payload = self.build_payload(prompt, model_name, size)?;
        let url = format!("{}/creations", self.base_url);

        tracing::info!(
            request_id = %get_request_id(),
            url = %url,
            model = %model_name,
            bot_id = payload.bot_id,
            size = %size,
            "Submitting video generation task"
        );

        let result = self.send_submit(&url, &payload).await;
        record_upstream_call("submit", result.is_ok());

        match &result {
            Ok(task_id) => tracing::info!(task_id, "Task submitted"),
            Err(e) => tracing::error!(error = %e, "Task submission failed"),
        }
        result
    }

    async fn send_submit(&self, url: &str, payload: &CreationPayload) -> Result<u64, UpstreamError> {
        let response = self
            .with_headers(self.http.post(url))
            .json(payload)
            .send()
            .await?;
        let body = read_success_body(response).await?;

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Decode(format!("{}; body: {}", e, preview(&body))))?;
        tracing::debug!(response = %value, "Submission response");

        let code = value.get("code").and_then(Value::as_i64);
        let task_id = value.pointer("/data/id").and_then(|id| {
            id.as_u64()
                .or_else(|| id.as_str().and_then(|s| s.parse().ok()))
        });

        match (code, task_id) {
            (Some(0), Some(task_id)) => Ok(task_id),
            _ => Err(UpstreamError::Rejected {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Unknown error")
                    .to_string(),
            }),
        }
    }

    /// Fetch the current status record for a task.
    ///
    /// Errors here are soft: the polling loop treats them as transient.
    pub async fn poll(&self, task_id: u64) -> Result<PollResponse, UpstreamError> {
        let url = format!("{}/creations/task_progress", self.base_url);
        tracing::debug!(task_id, "Polling task status");

        let result = self.send_poll(&url, task_id).await;
        record_upstream_call("poll", result.is_ok());
        result
    }

    async fn send_poll(&self, url: &str, task_id: u64) -> Result<PollResponse, UpstreamError> {
        let response = self
            .with_headers(self.http.get(url))
            .query(&[("ids[]", task_id)])
            .send()
            .await?;
        let body = read_success_body(response).await?;

        let parsed: PollResponse = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Decode(format!("{}; body: {}", e, preview(&body))))?;
        tracing::debug!(task_id, body = %preview(&body), "Poll response");
        Ok(parsed)
    }
}

/// Read the body, turning non-2xx statuses into [`UpstreamError::Status`].
async fn read_success_body(response: reqwest::Response) -> Result<String, UpstreamError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: preview(&body),
        });
    }
    Ok(body)
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;

    fn client() -> UpstreamClient {
        UpstreamClient::from_parts(
            reqwest::Client::new(),
            "http://127.0.0.1:9/api/v2/",
            CredentialRotator::new(vec!["t1".into()]).unwrap(),
            Signer::new("key"),
            BTreeMap::from([("sora-2-free".to_string(), 153)]),
        )
    }

    #[test]
    fn test_build_payload_shape() {
        let payload = client().build_payload("a cat", "sora-2-free", "720x1280").unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": 1,
                "bot_id": 153,
                "options": {
                    "prompt": "a cat",
                    "size": "720x1280",
                    "seconds": 15,
                    "history_images": []
                },
                "is_public": true,
                "copy_protection": false
            })
        );
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let err = client().build_payload("a cat", "foo", "720x1280").unwrap_err();
        assert_matches!(err, UpstreamError::UnsupportedModel(ref m) if m == "foo");
        assert_eq!(err.to_string(), "Unsupported model: 'foo'");
    }

    #[tokio::test]
    async fn test_submit_unknown_model_makes_no_call() {
        // The base URL points at a closed port; reaching the network would
        // produce a Transport error instead.
        let err = client().submit("a cat", "foo", "720x1280").await.unwrap_err();
        assert_matches!(err, UpstreamError::UnsupportedModel(_));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        assert_eq!(client().base_url, "http://127.0.0.1:9/api/v2");
    }

    #[test]
    fn test_upstream_error_to_app_error() {
        let err: AppError = UpstreamError::UnsupportedModel("foo".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: AppError = UpstreamError::Rejected {
            message: "quota exceeded".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_poll_response_parsing() {
        let response: PollResponse = serde_json::from_value(serde_json::json!({
            "code": 0,
            "data": [{
                "task_status": "processing",
                "task_progress": "42",
                "task_remark": "Rendering",
                "results": [{"result_url": "https://cdn.example/v.mp4"}]
            }]
        }))
        .unwrap();

        let task = response.first_task().unwrap();
        assert_eq!(task.task_status.as_deref(), Some("processing"));
        assert_eq!(task.task_progress, 42);
        assert_eq!(task.result_url(), Some("https://cdn.example/v.mp4"));
    }

    #[test]
    fn test_progress_variants() {
        let parse = |v: Value| -> u8 {
            serde_json::from_value::<TaskSnapshot>(serde_json::json!({ "task_progress": v }))
                .unwrap()
                .task_progress
        };
        assert_eq!(parse(serde_json::json!(100)), 100);
        assert_eq!(parse(serde_json::json!(57.9)), 57);
        assert_eq!(parse(serde_json::json!(" 12 ")), 12);
        assert_eq!(parse(serde_json::json!(150)), 100);
        assert_eq!(parse(serde_json::json!(-3)), 0);
        assert_eq!(parse(Value::Null), 0);
        assert_eq!(parse(serde_json::json!("n/a")), 0);
    }

    #[test]
    fn test_empty_result_url_is_ignored() {
        let task: TaskSnapshot = serde_json::from_value(serde_json::json!({
            "results": [{"result_url": ""}]
        }))
        .unwrap();
        assert_eq!(task.result_url(), None);

        let task: TaskSnapshot =
            serde_json::from_value(serde_json::json!({ "results": null })).unwrap();
        assert_eq!(task.result_url(), None);
    }

    #[test]
    fn test_mistyped_fields_do_not_fail_the_record() {
        let response: PollResponse = serde_json::from_value(serde_json::json!({
            "code": 0,
            "data": [{
                "task_status": 3,
                "task_progress": 20,
                "task_remark": {"zh": "失败"},
                "results": [null, {"result_url": 7}]
            }]
        }))
        .unwrap();
        let task = response.first_task().unwrap();
        assert_eq!(task.task_status.as_deref(), Some("3"));
        assert_eq!(task.task_remark, None);
        assert_eq!(task.results.as_ref().map(Vec::len), Some(2));
        assert_eq!(task.result_url(), None);

        let task: TaskSnapshot = serde_json::from_value(serde_json::json!({
            "task_status": "failed",
            "task_remark": "content policy violation",
            "results": {"result_url": "https://cdn/v.mp4"}
        }))
        .unwrap();
        assert_eq!(task.task_status.as_deref(), Some("failed"));
        assert!(task.results.is_none());
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), ERROR_BODY_PREVIEW);
    }
}
