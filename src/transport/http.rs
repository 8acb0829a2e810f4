//! HTTPS client for the RunPod-style serverless API.
//!
//! Wraps `POST /run`, `GET /status/{id}` and `POST /runsync` under
//! `{api_base}/{endpoint_id}` using [`reqwest`] with bearer auth.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::types::{JobInput, StatusResponse, SubmitResponse};
use super::JobQueue;
use crate::config::ClientConfig;
use crate::error::{ErrorCode, JobError, Result};
use crate::types::GenerationRequest;

/// Connect timeout for every request. `runsync` also carries the caller's
/// timeout; status reads are bounded by the polling loop's deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for one serverless endpoint.
#[derive(Debug, Clone)]
pub struct RunpodTransport {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: String,
}

impl RunpodTransport {
    /// Creates a transport for the endpoint described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                JobError::with_source(ErrorCode::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a transport reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            endpoint_url: config.endpoint_url(),
            api_key: config.api_key.clone(),
        }
    }

    /// Full URL of an endpoint operation.
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint_url, path)
    }

    // ---- private helpers ----

    /// Returns the response unchanged on a 2xx status, otherwise a
    /// TRANSPORT_ERROR carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobError::http_status(status.as_u16(), truncate(&body)));
        }
        Ok(response)
    }

    /// Parses a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await.map_err(request_error)?;
        parse_body(&body)
    }
}

#[async_trait]
impl JobQueue for RunpodTransport {
    async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let response = self
            .client
            .post(self.url("run"))
            .bearer_auth(&self.api_key)
            .json(&JobInput { input: request })
            .send()
            .await
            .map_err(request_error)?;

        let body: SubmitResponse = Self::parse_response(response).await?;
        let job_id = body
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| JobError::protocol("Submit response did not include a job id"))?;

        tracing::debug!(job_id = %job_id, status = ?body.status, "Job accepted by queue");
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<StatusResponse> {
        let response = self
            .client
            .get(self.url(&format!("status/{}", job_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_error)?;

        Self::parse_response(response).await
    }

    async fn run_sync(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<StatusResponse> {
        // The deadline covers both the send and the body read.
        let deadline_error = |e: reqwest::Error| {
            if e.is_timeout() {
                JobError::with_source(
                    ErrorCode::TimedOut,
                    format!(
                        "Synchronous run timed out after {:.0} seconds",
                        timeout.as_secs_f64()
                    ),
                    e,
                )
            } else {
                request_error(e)
            }
        };

        let response = self
            .client
            .post(self.url("runsync"))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&JobInput { input: request })
            .send()
            .await
            .map_err(deadline_error)?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await.map_err(deadline_error)?;
        parse_body(&body)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        JobError::with_source(
            ErrorCode::Transport,
            format!("Malformed JSON from job queue: {}", truncate(body)),
            e,
        )
    })
}

/// Maps a failed send or body read to TRANSPORT_ERROR.
fn request_error(e: reqwest::Error) -> JobError {
    let reason = if e.is_connect() {
        "Could not connect to job queue"
    } else if e.is_timeout() {
        "Request to job queue timed out"
    } else {
        "Request to job queue failed"
    };
    JobError::with_source(ErrorCode::Transport, reason, e)
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::resolve_with(Some("key".into()), Some("ep42".into()), |_| None)
            .unwrap()
            .with_api_base("http://127.0.0.1:9/v2/")
    }

    #[test]
    fn urls_are_scoped_to_endpoint() {
        let transport = RunpodTransport::new(&config()).unwrap();
        assert_eq!(transport.url("run"), "http://127.0.0.1:9/v2/ep42/run");
        assert_eq!(
            transport.url("status/abc123"),
            "http://127.0.0.1:9/v2/ep42/status/abc123"
        );
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY * 2);
        let out = truncate(&body);
        assert_eq!(out.len(), MAX_ERROR_BODY + 3);
        assert!(out.ends_with("..."));
        assert_eq!(truncate("  short  "), "short");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let out = truncate(&body);
        assert!(out.ends_with("..."));
    }

    #[tokio::test]
    async fn unreachable_queue_is_transport_error() {
        // Port 9 (discard) is closed on test hosts.
        let transport = RunpodTransport::new(&config()).unwrap();
        let err = transport.status("abc123").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Transport);
    }
}
