//! Server-Sent Events encoding of task progress.
//!
//! Each [`ProgressFrame`] becomes one `data:` event; the final frame carries
//! the `[DONE]` sentinel.

use crate::core::metrics::get_metrics;
use crate::services::task_tracker::ProgressFrame;
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;

/// Map progress frames to SSE events.
pub fn progress_events<S>(frames: S) -> impl Stream<Item = Result<Event, Infallible>> + Send
where
    S: Stream<Item = ProgressFrame> + Send,
{
    frames.map(|frame| {
        if let ProgressFrame::Event(event) = &frame {
            tracing::debug!(?event, "Sending progress event");
        }
        Ok(Event::default().data(frame.data()))
    })
}

/// Build the streaming response for a progress stream.
///
/// Proxies are told not to buffer so events reach the caller as they happen.
pub fn create_sse_response<S>(frames: S, task_id: u64) -> Response
where
    S: Stream<Item = ProgressFrame> + Send + 'static,
{
    get_metrics()
        .active_requests
        .with_label_values(&["/v1/tasks/:task_id/stream"])
        .inc();
    let guard = ActiveStreamGuard { task_id };

    let events = progress_events(frames).map(move |event| {
        let _guard = &guard;
        event
    });

    let mut response = Sse::new(events).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Tracks an open progress stream for the active-requests gauge.
struct ActiveStreamGuard {
    task_id: u64,
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        tracing::debug!(task_id = self.task_id, "Progress stream closed");
        get_metrics()
            .active_requests
            .with_label_values(&["/v1/tasks/:task_id/stream"])
            .dec();
    }
}
