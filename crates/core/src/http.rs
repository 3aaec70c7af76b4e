use crate::RagError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub(crate) fn client(timeout: Duration) -> Result<Client, RagError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(RagError::from)
}

/// Maps a non-success response onto the error taxonomy. Successful responses
/// are handed back untouched.
pub(crate) async fn check_status(service: &str, response: Response) -> Result<Response, RagError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let details = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", truncate(body.trim(), 300))
    };

    tracing::debug!(service, %status, "upstream returned an error status");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RagError::Auth {
            service: service.to_string(),
            details,
        },
        StatusCode::TOO_MANY_REQUESTS => RagError::RateLimited {
            service: service.to_string(),
        },
        _ => RagError::service(service, details),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
