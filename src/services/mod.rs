//! Business logic services for the MindVideo proxy.
//!
//! Request signing, credential rotation, the upstream client, task progress
//! tracking and the OpenAI-facing adapter built on top of them.

pub mod credential_rotator;
pub mod signer;
pub mod task_tracker;
pub mod upstream;
pub mod video_service;

// Re-export commonly used types
pub use credential_rotator::CredentialRotator;
pub use signer::Signer;
pub use task_tracker::{track_task, ProgressEvent, ProgressFrame, TaskPoller, TrackerSettings};
pub use upstream::{UpstreamClient, UpstreamError};
pub use video_service::VideoService;
