//! Wire types for the serverless job-queue API.

use serde::{Deserialize, Serialize};

/// Request envelope: every call wraps its payload in `{"input": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput<T> {
    pub input: T,
}

/// Response to `POST /run`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    /// Queue-assigned job identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// Initial status, usually `IN_QUEUE`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Response to `GET /status/{id}` and `POST /runsync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub id: Option<String>,

    /// Raw status string as reported by the queue.
    pub status: String,

    /// Handler output, present once the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Queue-level failure reason for FAILED jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
