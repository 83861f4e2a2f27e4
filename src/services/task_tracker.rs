//! Task progress tracking.
//!
//! Turns repeated upstream polls into a normalized stream of progress frames.
//! Every stream produced by [`track_task`] ends with exactly one terminal event
//! (`completed` or `failed`) followed by exactly one [`ProgressFrame::Done`],
//! whichever way the polling loop exits.
//!
//! The loop runs in its own tokio task and talks to the consumer over a bounded
//! channel. The consumer-side wrapper owns the finalization: if the polling task
//! disappears without a terminal event (panic, abort) a `failed` event is
//! synthesized, and the sentinel is always appended last. Dropping the stream
//! aborts the polling task.

use crate::core::config::PollingConfig;
use crate::core::logging::{get_request_id, REQUEST_ID};
use crate::core::metrics::record_task_outcome;
use crate::services::upstream::{PollResponse, UpstreamClient, UpstreamError};
use futures::Stream;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Data of the end-of-stream frame.
pub const DONE_SENTINEL: &str = "[DONE]";

const DEFAULT_REMARK: &str = "Processing...";
const DEFAULT_FAILURE: &str = "Unknown error";
const EVENT_BUFFER: usize = 16;

/// Anything that can fetch a task's status record.
pub trait TaskPoller: Send + Sync + 'static {
    fn poll_task(
        &self,
        task_id: u64,
    ) -> impl Future<Output = Result<PollResponse, UpstreamError>> + Send;
}

impl TaskPoller for UpstreamClient {
    fn poll_task(
        &self,
        task_id: u64,
    ) -> impl Future<Output = Result<PollResponse, UpstreamError>> + Send {
        self.poll(task_id)
    }
}

/// Normalized progress event, serialized as `{"status": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProgressEvent {
    Processing { progress: u8, remark: String },
    Completed { url: String },
    Failed { error: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Processing { .. })
    }
}

/// One item of a progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressFrame {
    Event(ProgressEvent),
    Done,
}

impl ProgressFrame {
    /// The SSE `data:` payload for this frame.
    pub fn data(&self) -> String {
        match self {
            // Plain enum of strings and integers; serialization cannot fail.
            ProgressFrame::Event(event) => serde_json::to_string(event).unwrap_or_default(),
            ProgressFrame::Done => DONE_SENTINEL.to_string(),
        }
    }
}

/// Result of a single poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No usable record this tick; keep polling
    Transient(String),
    Processing { progress: u8, remark: String },
    Completed { url: String },
    Failed { error: String },
}

/// Classify a poll result.
///
/// A result URL plus either `progress == 100` or `status == "completed"` wins
/// over everything else, including a `failed` status.
pub fn classify(result: Result<PollResponse, UpstreamError>) -> PollOutcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => return PollOutcome::Transient(err.to_string()),
    };

    if response.code != Some(0) {
        return PollOutcome::Transient(format!(
            "upstream code {:?}: {}",
            response.code,
            response.message.as_deref().unwrap_or("no message")
        ));
    }
    let Some(task) = response.first_task() else {
        return PollOutcome::Transient("no task record in response".to_string());
    };

    let status = task.task_status.as_deref().unwrap_or_default();
    if let Some(url) = task.result_url() {
        if task.task_progress == 100 || status == "completed" {
            return PollOutcome::Completed {
                url: url.to_string(),
            };
        }
    }

    if status == "failed" {
        return PollOutcome::Failed {
            error: task
                .task_remark
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE.to_string()),
        };
    }

    PollOutcome::Processing {
        progress: task.task_progress,
        remark: task
            .task_remark
            .clone()
            .unwrap_or_else(|| DEFAULT_REMARK.to_string()),
    }
}

/// Pacing and budget for one tracking loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Sleep before every poll
    pub interval: Duration,
    /// Wall-clock budget measured from loop entry
    pub timeout: Duration,
}

impl From<&PollingConfig> for TrackerSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("Polling task status timed out after {:?}", timeout)
}

/// Aborts the polling task when the consumer goes away.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Start tracking `task_id` and return its progress stream.
///
/// Must be called from within a tokio runtime.
pub fn track_task<P: TaskPoller>(
    poller: Arc<P>,
    task_id: u64,
    settings: TrackerSettings,
) -> impl Stream<Item = ProgressFrame> + Send + 'static {
    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    // Carry the caller's request id into the polling task's logs.
    let poll_task = AbortOnDrop(tokio::spawn(REQUEST_ID.scope(
        get_request_id(),
        poll_until_terminal(poller, task_id, settings, tx),
    )));

    async_stream::stream! {
        let _poll_task = poll_task;
        let mut terminal_seen = false;

        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield ProgressFrame::Event(event);
            if terminal {
                terminal_seen = true;
                break;
            }
        }

        if !terminal_seen {
            tracing::error!(task_id, "Polling stopped without reaching a terminal state");
            record_task_outcome("failed");
            yield ProgressFrame::Event(ProgressEvent::Failed {
                error: "Task tracking stopped unexpectedly".to_string(),
            });
        }

        tracing::info!(task_id, "Progress stream finished");
        yield ProgressFrame::Done;
    }
}

async fn poll_until_terminal<P: TaskPoller>(
    poller: Arc<P>,
    task_id: u64,
    settings: TrackerSettings,
    tx: mpsc::Sender<ProgressEvent>,
) {
    let started = Instant::now();
    let mut attempts: u32 = 0;

    let terminal = loop {
        if started.elapsed() >= settings.timeout {
            tracing::warn!(task_id, attempts, "Polling timed out");
            record_task_outcome("timeout");
            break ProgressEvent::Failed {
                error: timeout_message(settings.timeout),
            };
        }

        tokio::time::sleep(settings.interval).await;
        attempts += 1;
        tracing::debug!(request_id = %get_request_id(), task_id, attempts, "Polling task");

        match classify(poller.poll_task(task_id).await) {
            PollOutcome::Transient(reason) => {
                tracing::warn!(task_id, attempts, reason = %reason, "Transient poll failure");
            }
            PollOutcome::Processing { progress, remark } => {
                tracing::debug!(task_id, progress, remark = %remark, "Task in progress");
                let event = ProgressEvent::Processing { progress, remark };
                if tx.send(event).await.is_err() {
                    tracing::debug!(task_id, "Progress consumer went away; stop polling");
                    return;
                }
            }
            PollOutcome::Completed { url } => {
                tracing::info!(task_id, attempts, url = %url, "Task completed");
                record_task_outcome("completed");
                break ProgressEvent::Completed { url };
            }
            PollOutcome::Failed { error } => {
                tracing::warn!(task_id, attempts, error = %error, "Task failed upstream");
                record_task_outcome("failed");
                break ProgressEvent::Failed { error };
            }
        }
    };

    // The consumer may already be gone; nothing left to deliver to.
    let _ = tx.send(terminal).await;
}
