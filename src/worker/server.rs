//! Line-oriented job server over stdin/stdout.
//!
//! Each input line is one job event (`{"id": ..., "input": {...}}`); each
//! output line is `{"id": ..., "output": <handler response>}`. Jobs are
//! handled one at a time. Logs go to stderr so stdout stays parseable.

use std::io::{self, BufRead, Write};

use serde::Serialize;
use serde_json::Value;

use super::generator::GeneratorLoader;
use super::handler::Worker;
use crate::error::{ErrorCode, JobError, Result};
use crate::types::{ErrorPayload, HandlerResponse};

/// One output line.
#[derive(Debug, Serialize)]
struct ResponseLine {
    id: Value,
    output: HandlerResponse,
}

/// Counters reported when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub handled: usize,
    pub failed: usize,
}

/// Serves jobs from stdin until end of input.
pub fn run_server<L: GeneratorLoader>(worker: &Worker<L>) -> Result<ServeStats> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(worker, stdin.lock(), stdout.lock())
}

/// Serves jobs read from `reader`, writing responses to `writer`.
///
/// A line that is not UTF-8 JSON gets a VALIDATION_ERROR response and the
/// loop moves on. Only end of input or a failed read or write stops it.
pub fn serve<L, R, W>(worker: &Worker<L>, mut reader: R, mut writer: W) -> Result<ServeStats>
where
    L: GeneratorLoader,
    R: BufRead,
    W: Write,
{
    let mut stats = ServeStats::default();
    let mut buf = Vec::new();
    tracing::info!("Worker ready, waiting for jobs on stdin");

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
            tracing::error!(error = %e, "Error reading stdin");
            JobError::with_source(ErrorCode::Transport, "Failed to read job input", e)
        })?;
        if read == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            // Skip empty lines
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => process_line(worker, line),
            Err(e) => invalid_line(format!("Job line is not valid UTF-8: {}", e)),
        };

        stats.handled += 1;
        if response.output.is_error() {
            stats.failed += 1;
        }

        let json = serde_json::to_string(&response).map_err(|e| {
            JobError::with_source(ErrorCode::Protocol, "Failed to encode response", e)
        })?;
        writeln!(writer, "{}", json)
            .and_then(|_| writer.flush())
            .map_err(|e| JobError::with_source(ErrorCode::Transport, "Failed to write response", e))?;
    }

    tracing::info!(handled = stats.handled, failed = stats.failed, "Worker stopped");
    Ok(stats)
}

/// Handles a single input line.
fn process_line<L: GeneratorLoader>(worker: &Worker<L>, line: &str) -> ResponseLine {
    let event: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return invalid_line(format!("Invalid JSON: {}", e)),
    };

    let id = event.get("id").cloned().unwrap_or(Value::Null);
    tracing::info!(job_id = %id, "Handling job");

    ResponseLine {
        id,
        output: worker.handle(event),
    }
}

/// Response for a line that never became a job event.
fn invalid_line(reason: String) -> ResponseLine {
    tracing::warn!(error = %reason, "Rejecting input line");
    let err = JobError::validation(reason);
    ResponseLine {
        id: Value::Null,
        output: HandlerResponse::Failure(ErrorPayload::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationRequest;
    use crate::worker::MusicGenerator;
    use std::io::Cursor;
    use std::path::Path;

    struct EchoGenerator;

    impl MusicGenerator for EchoGenerator {
        fn generate(&self, request: &GenerationRequest, save_path: &Path) -> Result<()> {
            std::fs::write(save_path, request.lyrics.as_bytes()).map_err(|e| {
                JobError::with_source(ErrorCode::GenerationFailed, "write failed", e)
            })
        }
    }

    struct EchoLoader;

    impl GeneratorLoader for EchoLoader {
        fn load(&self) -> Result<Box<dyn MusicGenerator>> {
            Ok(Box::new(EchoGenerator))
        }
    }

    fn run(input: impl AsRef<[u8]>) -> (ServeStats, Vec<Value>) {
        let worker = Worker::new(EchoLoader);
        let mut out = Vec::new();
        let stats = serve(&worker, Cursor::new(input.as_ref().to_vec()), &mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (stats, lines)
    }

    #[test]
    fn one_response_per_job_line() {
        let input = concat!(
            r#"{"id": "job-1", "input": {"lyrics": "abc"}}"#,
            "\n\n",
            r#"{"id": "job-2", "input": {"lyrics": "abc", "max_audio_length_ms": 1}}"#,
            "\n",
        );
        let (stats, lines) = run(input);

        assert_eq!(stats, ServeStats { handled: 2, failed: 1 });
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "job-1");
        assert_eq!(lines[0]["output"]["audio_base64"], "YWJj");
        assert_eq!(lines[0]["output"]["size_bytes"], 3);
        assert_eq!(lines[1]["id"], "job-2");
        assert_eq!(lines[1]["output"]["kind"], "VALIDATION_ERROR");
    }

    #[test]
    fn invalid_json_gets_error_line() {
        let (stats, lines) = run("not json\n");
        assert_eq!(stats.failed, 1);
        assert!(lines[0]["id"].is_null());
        assert!(lines[0]["output"]["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON"));
    }

    #[test]
    fn empty_input_handles_nothing() {
        let (stats, lines) = run("");
        assert_eq!(stats, ServeStats::default());
        assert!(lines.is_empty());
    }

    #[test]
    fn non_utf8_line_does_not_stop_the_server() {
        let input = b"\xff\xfe not utf8\n{\"id\":\"job-2\",\"input\":{\"lyrics\":\"abc\"}}\n";
        let (stats, lines) = run(input);

        assert_eq!(stats, ServeStats { handled: 2, failed: 1 });
        assert_eq!(lines.len(), 2);
        assert!(lines[0]["id"].is_null());
        assert_eq!(lines[0]["output"]["kind"], "VALIDATION_ERROR");
        assert_eq!(lines[1]["id"], "job-2");
        assert_eq!(lines[1]["output"]["audio_base64"], "YWJj");
    }

    #[test]
    fn last_line_without_newline_is_served() {
        let (stats, lines) = run(r#"{"id": "job-1", "input": {"lyrics": "abc"}}"#);
        assert_eq!(stats.handled, 1);
        assert_eq!(lines[0]["id"], "job-1");
    }

    #[test]
    fn read_failure_is_an_error() {
        struct Broken;

        impl std::io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
            }
        }

        let worker = Worker::new(EchoLoader);
        let err = serve(&worker, std::io::BufReader::new(Broken), Vec::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Transport);
    }
}
