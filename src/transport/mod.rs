//! Client side of the serverless job-queue API.
//!
//! [`JobQueue`] is the seam between the polling lifecycle and the network.
//! [`RunpodTransport`] implements it over HTTPS; tests drive the lifecycle
//! with scripted in-memory queues.

mod http;
mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::GenerationRequest;

pub use http::RunpodTransport;
pub use types::{JobInput, StatusResponse, SubmitResponse};

/// Operations offered by the remote job queue. No call retries.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job and returns its id.
    async fn submit(&self, request: &GenerationRequest) -> Result<String>;

    /// Fetches the current status of a job.
    async fn status(&self, job_id: &str) -> Result<StatusResponse>;

    /// Runs a job and waits for it in a single call bounded by `timeout`.
    async fn run_sync(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<StatusResponse>;
}
