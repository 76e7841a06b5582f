//! Blocking HTTP clients for the three upstream producers. Callers on the
//! async side wrap them in `spawn_blocking`.

pub mod gemini;
pub mod github;
pub mod youtube;

pub use gemini::{GeminiClient, GeminiConfig};
pub use github::{GitHubClient, create_github_client};
pub use youtube::{YouTubeClient, create_youtube_client};

use std::time::Duration;

use crate::error::ServiceError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

/// Turn a ureq failure into a service error, keeping the body of non-2xx
/// responses so upstream messages reach the caller.
pub(crate) fn map_ureq_error(service: &str, err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(body);
            ServiceError::ApiError(format!("{service} returned status {code}: {message}"))
        }
        ureq::Error::Transport(transport) => {
            ServiceError::NetworkError(format!("Failed to reach {service}: {transport}"))
        }
    }
}
