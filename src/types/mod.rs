//! Core types shared by the client and the worker.
//!
//! - [`GenerationRequest`]: validated generation parameters
//! - [`Job`]: client-side handle for one remote job
//! - [`GenerationResult`]: a generated song and its wire encodings

mod job;
mod request;
mod result;

// Re-export all types at the module level
pub use job::{Job, JobStatus};
pub use request::{
    parse_tags, GenerationRequest, DEFAULT_AUDIO_LENGTH_MS, DEFAULT_CFG_SCALE, DEFAULT_TAGS,
    DEFAULT_TEMPERATURE, DEFAULT_TOPK, MAX_AUDIO_LENGTH_MS, MIN_AUDIO_LENGTH_MS,
};
pub use result::{EncodedResult, ErrorPayload, GenerationResult, HandlerResponse, JobOutput};
