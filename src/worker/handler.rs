//! Per-job handler entry point.
//!
//! [`Worker::handle`] never fails: every error, including a panic inside
//! generation, comes back as a structured [`ErrorPayload`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use once_cell::sync::OnceCell;
use serde_json::Value;

use super::generator::{GeneratorLoader, MusicGenerator};
use crate::audio::measure_duration_ms;
use crate::error::{ErrorCode, JobError, Result};
use crate::types::{
    EncodedResult, ErrorPayload, GenerationRequest, GenerationResult, HandlerResponse,
};

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Records the location and backtrace of a panic for the handler boundary.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "<unknown>".to_string());
            let trace = format!("panicked at {}\n{}", location, Backtrace::force_capture());
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Owns the generation capability for the life of the worker process.
pub struct Worker<L> {
    loader: L,
    generator: OnceCell<Box<dyn MusicGenerator>>,
}

impl<L: GeneratorLoader> Worker<L> {
    pub fn new(loader: L) -> Self {
        install_panic_hook();
        Self {
            loader,
            generator: OnceCell::new(),
        }
    }

    /// Returns true once the capability has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.generator.get().is_some()
    }

    /// Handles one job event of the form `{"input": {...}}`.
    pub fn handle(&self, event: Value) -> HandlerResponse {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(event)));

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(panic_error(payload)),
        };

        match result {
            Ok(encoded) => {
                tracing::info!(
                    size_bytes = encoded.size_bytes,
                    duration_ms = encoded.duration_ms,
                    "Job succeeded"
                );
                HandlerResponse::Success(encoded)
            }
            Err(e) => {
                tracing::error!(code = %e.code, error = %e.message, "Job failed");
                HandlerResponse::Failure(ErrorPayload::from_error(&e))
            }
        }
    }

    fn process(&self, event: Value) -> Result<EncodedResult> {
        let request = parse_input(event)?;
        request.validate()?;

        let generator = self.generator()?;
        let result = run_generation(generator, &request)?;

        Ok(result.encode())
    }

    /// Loads the capability on first use.
    ///
    /// A failed load is not cached; the next job tries again.
    fn generator(&self) -> Result<&dyn MusicGenerator> {
        self.generator
            .get_or_try_init(|| -> Result<Box<dyn MusicGenerator>> {
                tracing::info!("Loading generation capability");
                let generator = self.loader.load()?;
                tracing::info!("Generation capability ready");
                Ok(generator)
            })
            .map(|g| g.as_ref())
    }
}

/// Extracts and deserializes the `input` object of a job event.
fn parse_input(event: Value) -> Result<GenerationRequest> {
    let input = match event {
        Value::Object(mut map) => map.remove("input").unwrap_or(Value::Null),
        _ => Value::Null,
    };

    // A missing input behaves like an empty one: lyrics are reported missing.
    let input = match input {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => input,
        other => {
            return Err(JobError::validation(format!(
                "'input' must be an object, got {}",
                type_name(&other)
            )))
        }
    };

    serde_json::from_value(input).map_err(|e| {
        JobError::with_source(
            ErrorCode::Validation,
            format!("Invalid input: {}", e),
            e,
        )
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Runs one generation into a scoped temp file and reads the result.
fn run_generation(
    generator: &dyn MusicGenerator,
    request: &GenerationRequest,
) -> Result<GenerationResult> {
    let format = generator.format();

    // Removed on every exit path when `output` drops.
    let output = tempfile::Builder::new()
        .prefix("heartmula-")
        .suffix(format.suffix())
        .tempfile()
        .map_err(|e| {
            JobError::with_source(ErrorCode::GenerationFailed, "Failed to create output file", e)
        })?;

    generator.generate(request, output.path())?;

    let audio = std::fs::read(output.path()).map_err(|e| {
        JobError::with_source(
            ErrorCode::GenerationFailed,
            "Failed to read generated audio",
            e,
        )
    })?;
    if audio.is_empty() {
        return Err(JobError::generation_failed("generator produced no audio"));
    }

    let (duration_ms, sample_rate, estimated) = match measure_duration_ms(&audio, format) {
        Some(m) => (m.duration_ms, m.sample_rate, false),
        None => {
            tracing::warn!(
                format = %format,
                requested_ms = request.max_audio_length_ms,
                "Cannot measure duration; reporting the requested length"
            );
            (
                request.max_audio_length_ms as u64,
                generator.sample_rate(),
                true,
            )
        }
    };

    Ok(GenerationResult::new(
        audio,
        format,
        sample_rate,
        duration_ms,
        estimated,
    ))
}

/// Converts a caught panic into WORKER_PANIC.
fn panic_error(payload: Box<dyn Any + Send>) -> JobError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };

    let err = JobError::worker_panic(format!("Worker panicked: {}", message));
    match PANIC_TRACE.with(|slot| slot.borrow_mut().take()) {
        Some(trace) => err.with_trace(trace),
        None => err,
    }
}
