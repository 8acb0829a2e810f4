//! heartmula-jobs: run HeartMuLa song generation on serverless GPU workers.
//!
//! The client submits a [`GenerationRequest`] to a RunPod-style job queue,
//! polls until the job is terminal and writes the returned audio to disk.
//! The worker validates each job, runs the generator once per request and
//! returns either an encoded result or a structured error.
//!
//! # Modules
//!
//! - [`transport`]: job-queue API (`JobQueue`, `RunpodTransport`)
//! - [`lifecycle`]: submit/poll state machine (`JobRunner`)
//! - [`materialize`]: base64 payload to file (`decode_and_save`)
//! - [`worker`]: handler, generation capability, job server
//! - [`types`]: requests, job handles, results
//! - [`config`]: client and worker configuration
//! - [`error`]: error types and codes (`JobError`, `ErrorCode`)
//!
//! # Example
//!
//! ```rust,ignore
//! use heartmula_jobs::{ClientConfig, GenerationRequest, JobRunner, PollOptions, RunpodTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ClientConfig::resolve(None, None)?;
//! let runner = JobRunner::new(RunpodTransport::new(&config)?, PollOptions::from(&config));
//!
//! let request = GenerationRequest::new("[verse]\nHello world").with_tags(["pop", "upbeat"]);
//! let done = runner.run(&request, &CancellationToken::new()).await?;
//! heartmula_jobs::materialize::decode_and_save(&done.output, "song.mp3".as_ref())?;
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod materialize;
pub mod transport;
pub mod types;
pub mod worker;

// Re-export commonly used types at crate root for convenience
pub use config::{ClientConfig, WorkerConfig};
pub use error::{ErrorCode, JobError, Result};
pub use lifecycle::{JobCompletion, JobRunner, PollOptions};
pub use transport::{JobQueue, RunpodTransport};
pub use types::{GenerationRequest, Job, JobStatus};
