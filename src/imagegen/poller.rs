use super::validation::is_trusted_image_url;
use crate::{
    error::GenerationError,
    models::{GenerationStatus, OperationStatus},
};
use std::time::Duration;

/// Delay multiplier applied after a failed poll request.
pub const FAILURE_BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Debug)]
pub enum PollDecision {
    /// Terminal success with a validated URL.
    Complete(String),
    /// Terminal failure, no further polling.
    Fail(GenerationError),
    /// Not terminal; poll again after the delay.
    Wait(Duration),
}

pub fn failure_backoff(poll_interval: Duration) -> Duration {
    poll_interval * FAILURE_BACKOFF_MULTIPLIER
}

/// Decide what to do with one polling response body.
pub fn decide(body: &str, endpoint: &str, poll_interval: Duration) -> PollDecision {
    let status = match serde_json::from_str::<OperationStatus>(body) {
        Ok(status) => status.into_status(),
        Err(e) => {
            return PollDecision::Fail(GenerationError::ProtocolError(format!(
                "malformed status response: {}",
                e
            )))
        }
    };

    match status {
        GenerationStatus::Succeeded { url: Some(url) } => {
            if is_trusted_image_url(&url, endpoint) {
                PollDecision::Complete(url)
            } else {
                PollDecision::Fail(GenerationError::ProtocolError(format!(
                    "invalid image URL: {}",
                    url
                )))
            }
        }
        GenerationStatus::Succeeded { url: None } => PollDecision::Fail(
            GenerationError::ProtocolError("succeeded without an image URL".into()),
        ),
        GenerationStatus::Failed { message } | GenerationStatus::Canceled { message } => {
            PollDecision::Fail(GenerationError::GenerationFailedError(message))
        }
        GenerationStatus::Pending(_) => PollDecision::Wait(poll_interval),
    }
}
