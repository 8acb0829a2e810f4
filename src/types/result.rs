//! Result contract shared by the worker handler and the polling client.
//!
//! The handler returns either an [`EncodedResult`] or an [`ErrorPayload`];
//! both travel inside an otherwise successful queue response. The client
//! reads them back through the lenient [`JobOutput`] view.

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::error::{ErrorCode, JobError, Result};
use crate::materialize::encode_audio;

/// A generated song, produced exactly once per successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Encoded audio file contents.
    pub audio_bytes: Vec<u8>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Codec of `audio_bytes`.
    pub format: AudioFormat,
    /// Audio duration in milliseconds.
    pub duration_ms: u64,
    /// True when `duration_ms` is the requested bound rather than a measurement.
    pub duration_estimated: bool,
    /// Length of `audio_bytes`.
    pub size_bytes: u64,
}

impl GenerationResult {
    /// Creates a result; `size_bytes` is taken from the buffer.
    pub fn new(
        audio_bytes: Vec<u8>,
        format: AudioFormat,
        sample_rate: u32,
        duration_ms: u64,
        duration_estimated: bool,
    ) -> Self {
        let size_bytes = audio_bytes.len() as u64;
        Self {
            audio_bytes,
            sample_rate,
            format,
            duration_ms,
            duration_estimated,
            size_bytes,
        }
    }

    /// Encodes the audio for transport.
    pub fn encode(&self) -> EncodedResult {
        EncodedResult {
            audio_base64: encode_audio(&self.audio_bytes),
            duration_ms: self.duration_ms,
            sample_rate: self.sample_rate,
            format: self.format,
            size_bytes: self.size_bytes,
            duration_estimated: self.duration_estimated,
        }
    }
}

/// Wire form of a successful handler result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedResult {
    pub audio_base64: String,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub format: AudioFormat,
    pub size_bytes: u64,
    #[serde(default)]
    pub duration_estimated: bool,
}

/// Structured failure returned by the worker instead of crashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable failure message.
    pub error: String,

    /// Error code string, e.g. `VALIDATION_ERROR` or `WORKER_PANIC`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Stack context captured at the handler boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl ErrorPayload {
    /// Converts a handler-side error into its wire form.
    pub fn from_error(err: &JobError) -> Self {
        let traceback = match (&err.trace, err.source.is_some()) {
            (Some(trace), _) => Some(trace.clone()),
            (None, true) => Some(err.chain()),
            (None, false) => None,
        };

        Self {
            error: err.message.clone(),
            kind: Some(err.code.as_str().to_string()),
            traceback,
        }
    }

    /// Converts a reported failure into the client's DOMAIN_ERROR.
    pub fn into_domain_error(self) -> JobError {
        let message = match &self.kind {
            Some(kind) => format!("{} ({})", self.error, kind),
            None => self.error,
        };
        let err = JobError::domain(message);
        match self.traceback {
            Some(trace) => err.with_trace(trace),
            None => err,
        }
    }
}

/// What the handler entry point returns for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerResponse {
    /// Validation, initialization or generation failed.
    Failure(ErrorPayload),
    /// Generation succeeded.
    Success(EncodedResult),
}

impl HandlerResponse {
    /// Returns true if the response carries an error.
    pub fn is_error(&self) -> bool {
        matches!(self, HandlerResponse::Failure(_))
    }
}

/// Client-side view of a completed job's output.
///
/// Every field is optional so that a partial output still reaches the
/// materializer, which decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub audio_base64: Option<String>,
    pub duration_ms: Option<u64>,
    pub sample_rate: Option<u32>,
    pub format: Option<String>,
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub duration_estimated: bool,
}

impl JobOutput {
    /// Reads the `output` object of a COMPLETED response.
    ///
    /// An `error` field inside the output is a DOMAIN_ERROR: the worker ran
    /// but generation failed. A missing output yields an empty view.
    pub fn from_completed(output: Option<serde_json::Value>) -> Result<Self> {
        let Some(value) = output else {
            return Ok(Self::default());
        };

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let payload = serde_json::from_value::<ErrorPayload>(value.clone()).unwrap_or_else(|_| {
                ErrorPayload {
                    error: error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string()),
                    kind: None,
                    traceback: None,
                }
            });
            return Err(payload.into_domain_error());
        }

        serde_json::from_value(value)
            .map_err(|e| JobError::with_source(ErrorCode::Protocol, "Malformed job output", e))
    }
}

impl From<EncodedResult> for JobOutput {
    fn from(result: EncodedResult) -> Self {
        Self {
            audio_base64: Some(result.audio_base64),
            duration_ms: Some(result.duration_ms),
            sample_rate: Some(result.sample_rate),
            format: Some(result.format.to_string()),
            size_bytes: Some(result.size_bytes),
            duration_estimated: result.duration_estimated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_encodes_size_and_payload() {
        let result = GenerationResult::new(vec![1, 2, 3], AudioFormat::Mp3, 48000, 60000, true);
        assert_eq!(result.size_bytes, 3);

        let encoded = result.encode();
        assert_eq!(encoded.audio_base64, "AQID");
        assert_eq!(encoded.size_bytes, 3);

        let value = serde_json::to_value(&encoded).unwrap();
        assert_eq!(value["format"], "mp3");
        assert_eq!(value["duration_estimated"], true);
    }

    #[test]
    fn handler_response_shapes() {
        let failure = HandlerResponse::Failure(ErrorPayload {
            error: "boom".into(),
            kind: Some("GENERATION_FAILED".into()),
            traceback: None,
        });
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value, json!({"error": "boom", "kind": "GENERATION_FAILED"}));

        let parsed: HandlerResponse = serde_json::from_value(json!({"error": "bad"})).unwrap();
        assert!(parsed.is_error());

        let success: HandlerResponse = serde_json::from_value(json!({
            "audio_base64": "AQID",
            "duration_ms": 1000,
            "sample_rate": 48000,
            "format": "mp3",
            "size_bytes": 3
        }))
        .unwrap();
        assert!(!success.is_error());
    }

    #[test]
    fn error_payload_from_error_keeps_kind_and_trace() {
        let err = JobError::generation_failed("CUDA out of memory").with_trace("at generate()");
        let payload = ErrorPayload::from_error(&err);
        assert_eq!(payload.kind.as_deref(), Some("GENERATION_FAILED"));
        assert_eq!(payload.traceback.as_deref(), Some("at generate()"));
        assert!(payload.error.contains("CUDA out of memory"));
    }

    #[test]
    fn output_with_error_is_domain_error() {
        let err = JobOutput::from_completed(Some(json!({
            "error": "max_audio_length_ms cannot exceed 240000",
            "traceback": "Traceback ..."
        })))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Domain);
        assert!(err.message.contains("240000"));
        assert_eq!(err.trace.as_deref(), Some("Traceback ..."));
    }

    #[test]
    fn output_with_non_string_error_is_domain_error() {
        let err = JobOutput::from_completed(Some(json!({"error": {"code": 7}}))).unwrap_err();
        assert_eq!(err.code, ErrorCode::Domain);
        assert!(err.message.contains("7"));
    }

    #[test]
    fn missing_output_is_empty() {
        let output = JobOutput::from_completed(None).unwrap();
        assert!(output.audio_base64.is_none());
    }

    #[test]
    fn non_object_output_is_protocol_error() {
        let err = JobOutput::from_completed(Some(json!("just a string"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::Protocol);
    }

    #[test]
    fn output_fields_parse() {
        let output = JobOutput::from_completed(Some(json!({
            "audio_base64": "AQID",
            "duration_ms": 60000,
            "sample_rate": 48000,
            "format": "mp3",
            "size_bytes": 3
        })))
        .unwrap();
        assert_eq!(output.audio_base64.as_deref(), Some("AQID"));
        assert_eq!(output.sample_rate, Some(48000));
        assert!(!output.duration_estimated);
    }
}
