//! Error types for heartmula-jobs.
//!
//! Every failure in the client and the worker carries an [`ErrorCode`] so
//! callers can tell "the job never finished" apart from "the job finished
//! but generation failed", and so the worker can report a stable `kind`
//! inside its structured error payload.

use std::fmt;

/// Error codes shared by the client and the worker handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Credential or endpoint identifier missing, or configuration invalid.
    /// Trigger: neither an explicit value nor the environment variable is set.
    Configuration,

    /// HTTP exchange with the job queue failed.
    /// Trigger: network error, non-2xx status, or a body that is not JSON.
    Transport,

    /// The queue answered with a shape or value we do not understand.
    /// Trigger: missing job id, unrecognized status string, bad base64.
    Protocol,

    /// The observation budget ran out before the job reached a terminal state.
    /// Trigger: polling timeout, synchronous call timeout, remote TIMED_OUT.
    TimedOut,

    /// The worker ran but reported a generation failure in its output.
    /// Trigger: COMPLETED response whose output carries an `error` field.
    Domain,

    /// Request parameters are outside accepted bounds.
    /// Trigger: empty lyrics, length outside 10-240s, non-positive temperature.
    Validation,

    /// The queue recorded the job as FAILED or CANCELLED.
    /// Trigger: worker crash or a cancellation issued outside this client.
    JobFailed,

    /// The caller aborted the operation.
    /// Trigger: Ctrl-C or a cancelled token while waiting.
    Cancelled,

    /// Materialized audio could not be written to its destination.
    /// Trigger: missing directory, permissions, disk full.
    OutputWriteFailed,

    /// Model weights are not present under the configured path.
    /// Trigger: MODEL_PATH points at an empty or partial checkpoint directory.
    ModelNotFound,

    /// The generation capability could not be initialized.
    /// Trigger: generator command missing or not executable.
    ModelLoadFailed,

    /// The generation capability failed while producing audio.
    /// Trigger: generator exited non-zero, produced no file, OOM.
    GenerationFailed,

    /// Generation panicked inside the worker.
    /// Trigger: a bug in the handler or the capability adapter.
    WorkerPanic,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Configuration => "CONFIGURATION_ERROR",
            ErrorCode::Transport => "TRANSPORT_ERROR",
            ErrorCode::Protocol => "PROTOCOL_ERROR",
            ErrorCode::TimedOut => "TIMED_OUT",
            ErrorCode::Domain => "DOMAIN_ERROR",
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::JobFailed => "JOB_FAILED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::OutputWriteFailed => "OUTPUT_WRITE_FAILED",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::WorkerPanic => "WORKER_PANIC",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::Configuration => "Required configuration is missing or invalid",
            ErrorCode::Transport => "Request to the job queue failed",
            ErrorCode::Protocol => "Job queue returned an unexpected response",
            ErrorCode::TimedOut => "Job did not finish within the observation budget",
            ErrorCode::Domain => "Worker ran but generation failed",
            ErrorCode::Validation => "Generation parameters are outside accepted bounds",
            ErrorCode::JobFailed => "Job queue reported the job as failed",
            ErrorCode::Cancelled => "Operation was cancelled by the caller",
            ErrorCode::OutputWriteFailed => "Generated audio could not be written",
            ErrorCode::ModelNotFound => "Model weights not found at the configured path",
            ErrorCode::ModelLoadFailed => "Generation capability failed to initialize",
            ErrorCode::GenerationFailed => "Generation capability failed to produce audio",
            ErrorCode::WorkerPanic => "Worker panicked while handling the job",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::Configuration => {
                "Set RUNPOD_API_KEY and RUNPOD_ENDPOINT_ID, or pass --api-key and --endpoint-id"
            }
            ErrorCode::Transport => {
                "Check network access and that the endpoint id and API key are correct"
            }
            ErrorCode::Protocol => {
                "Check that the endpoint runs a compatible worker and that RUNPOD_API_BASE is correct"
            }
            ErrorCode::TimedOut => {
                "The remote job may still finish; raise --timeout or check the job in the console"
            }
            ErrorCode::Domain => {
                "Inspect the worker error and traceback; adjust parameters and resubmit"
            }
            ErrorCode::Validation => {
                "Provide non-empty lyrics and a max length between 10000 and 240000 ms, \
                 with temperature > 0, topk >= 1 and cfg_scale >= 0"
            }
            ErrorCode::JobFailed => "Check the worker logs for a crash and resubmit the job",
            ErrorCode::Cancelled => "Resubmit when ready; the remote job was not cancelled",
            ErrorCode::OutputWriteFailed => {
                "Check that the output directory exists, is writable and has free space"
            }
            ErrorCode::ModelNotFound => {
                "Upload HeartMuLa-oss-3B, HeartCodec-oss and tokenizer.json under MODEL_PATH"
            }
            ErrorCode::ModelLoadFailed => {
                "Check HEARTMULA_GENERATOR_CMD points at an installed generator and GPU memory is free"
            }
            ErrorCode::GenerationFailed => {
                "Retry the job; if it keeps failing, reduce max_audio_length_ms"
            }
            ErrorCode::WorkerPanic => "Report the traceback; this is a worker bug",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for client and worker operations.
#[derive(Debug)]
pub struct JobError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Diagnostic trace reported by the worker, if any.
    pub trace: Option<String>,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl JobError {
    /// Creates a new JobError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trace: None,
            source: None,
        }
    }

    /// Creates a new JobError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            trace: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attaches a diagnostic trace.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Creates a CONFIGURATION_ERROR for a value that was not supplied.
    pub fn missing_config(what: &str, env_var: &str) -> Self {
        Self::new(
            ErrorCode::Configuration,
            format!("{} required. Set {} or pass it explicitly", what, env_var),
        )
    }

    /// Creates a CONFIGURATION_ERROR.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, reason)
    }

    /// Creates a TRANSPORT_ERROR for a non-2xx response.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Transport,
            format!("Job queue returned HTTP {}: {}", status, body.into()),
        )
    }

    /// Creates a PROTOCOL_ERROR.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Protocol, reason)
    }

    /// Creates a PROTOCOL_ERROR for a status string outside the known set.
    pub fn unknown_status(status: &str) -> Self {
        Self::new(ErrorCode::Protocol, format!("Unknown status: {}", status))
    }

    /// Creates a TIMED_OUT error for a job that was abandoned by the poller.
    pub fn timed_out(job_id: &str, timeout_secs: f64) -> Self {
        Self::new(
            ErrorCode::TimedOut,
            format!("Job {} timed out after {:.0} seconds", job_id, timeout_secs),
        )
    }

    /// Creates a DOMAIN_ERROR from the worker's reported failure.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Domain,
            format!("Generation error: {}", message.into()),
        )
    }

    /// Creates a VALIDATION_ERROR.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, reason)
    }

    /// Creates a JOB_FAILED error.
    pub fn job_failed(job_id: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::JobFailed,
            format!("Job {} failed: {}", job_id, reason.into()),
        )
    }

    /// Creates a CANCELLED error.
    pub fn cancelled(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, format!("Cancelled: {}", what.into()))
    }

    /// Creates an OUTPUT_WRITE_FAILED error.
    pub fn output_write_failed(
        path: &std::path::Path,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(
            ErrorCode::OutputWriteFailed,
            format!("Failed to write {}", path.display()),
            source,
        )
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a GENERATION_FAILED error.
    pub fn generation_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GenerationFailed,
            format!("Generation failed: {}", reason.into()),
        )
    }

    /// Creates a WORKER_PANIC error.
    pub fn worker_panic(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::WorkerPanic, message)
    }

    /// Formats the message followed by every chained source, one per line.
    pub fn chain(&self) -> String {
        let mut out = self.message.clone();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using JobError.
pub type Result<T> = std::result::Result<T, JobError>;
