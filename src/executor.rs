//! Sending a built request under a deadline
//!
//! The deadline covers the whole exchange: connect, send, and reading the body. When it
//! fires the in-flight future is dropped, which closes the connection instead of leaving
//! it running in the background.

use crate::error::Error;
use crate::types::{HttpResponse, Outcome};
use std::time::{Duration, Instant};

/// Execute `request` on `client`, giving up after `timeout`
///
/// Any status code counts as [`Outcome::Success`]; only a missing or unreadable answer
/// is a failure.
pub async fn execute(
    client: &reqwest::Client,
    request: reqwest::Request,
    timeout: Duration,
) -> Outcome {
    let url = request.url().to_string();
    let started = Instant::now();

    let exchange = async {
        let response = client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok((status, body))) => {
            let elapsed = started.elapsed();
            tracing::debug!(
                url = %url,
                status,
                elapsed_ms = elapsed.as_millis() as u64,
                "request completed"
            );
            Outcome::Success(HttpResponse {
                status,
                body,
                elapsed,
            })
        }
        Ok(Err(e)) => {
            if e.is_timeout() {
                tracing::warn!(url = %url, error = %e, "request timed out in transport");
            } else if e.is_connect() {
                tracing::warn!(url = %url, error = %e, "connection failed");
            } else {
                tracing::warn!(url = %url, error = %e, "request failed");
            }
            Outcome::Failure(Error::Network(e))
        }
        Err(_) => {
            let timeout_ms = timeout.as_millis() as u64;
            tracing::warn!(url = %url, timeout_ms, "request timed out");
            Outcome::Failure(Error::Timeout { timeout_ms, url })
        }
    }
}
