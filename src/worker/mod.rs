//! Worker side: the handler that runs on GPU nodes.
//!
//! - [`Worker`]: validates a job, generates, encodes the result
//! - [`CommandLoader`]/[`CommandGenerator`]: default generation capability
//! - [`run_server`]: line-oriented job loop over stdin/stdout

mod generator;
mod handler;
mod server;

use std::path::Path;

use serde_json::{json, Value};

use crate::materialize::{decode_and_save, SavedAudio};
use crate::types::{HandlerResponse, JobOutput};

pub use generator::{
    missing_weights, CommandGenerator, CommandLoader, GeneratorLoader, MusicGenerator,
    HEARTCODEC_DIR, HEARTMULA_DIR, TOKENIZER_FILE,
};
pub use handler::Worker;
pub use server::{run_server, serve, ServeStats};

/// Lyrics used by the local smoke test.
pub const TEST_LYRICS: &str = "[Verse]
Hello world, this is a test
Of the music generation
Creating songs with AI
Making melodies fly high

[Chorus]
Music in the cloud
Singing out loud
RunPod generation
A new creation";

/// The job event used by `--test-job`.
pub fn test_job_event() -> Value {
    json!({
        "input": {
            "lyrics": TEST_LYRICS,
            "tags": "pop,electronic,upbeat",
            "max_audio_length_ms": 60000
        }
    })
}

/// Runs the smoke-test job through `worker` and saves the audio to `output`.
pub fn run_test_job<L: GeneratorLoader>(
    worker: &Worker<L>,
    output: &Path,
) -> crate::error::Result<SavedAudio> {
    match worker.handle(test_job_event()) {
        HandlerResponse::Failure(payload) => Err(payload.into_domain_error()),
        HandlerResponse::Success(encoded) => decode_and_save(&JobOutput::from(encoded), output),
    }
}
