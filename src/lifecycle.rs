//! Job lifecycle: submit, poll until terminal, classify the outcome.
//!
//! The remote queue owns the job; this module only observes it. Polling runs
//! on a fixed interval until the queue reports a terminal status or the
//! observation budget runs out. A timed-out job is abandoned, not cancelled
//! remotely.
//!
//! Every network call and every sleep races the caller's
//! [`CancellationToken`], so Ctrl-C ends the wait promptly.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use crate::error::{ErrorCode, JobError, Result};
use crate::transport::{JobQueue, StatusResponse};
use crate::types::{GenerationRequest, Job, JobOutput, JobStatus};

/// Polling cadence and observation budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Time between status polls.
    pub interval: Duration,
    /// Wall-clock budget measured from submission.
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<&ClientConfig> for PollOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.timeout,
        }
    }
}

/// A job that finished with a usable output.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    /// Queue-assigned id, if the queue reported one.
    pub job_id: String,
    /// Output of the worker handler.
    pub output: JobOutput,
    /// Status observations made before completion.
    pub polls: u32,
}

/// Drives jobs through a [`JobQueue`].
#[derive(Debug)]
pub struct JobRunner<Q> {
    queue: Q,
    options: PollOptions,
}

impl<Q: JobQueue> JobRunner<Q> {
    /// Creates a runner over `queue`.
    pub fn new(queue: Q, options: PollOptions) -> Self {
        Self { queue, options }
    }

    /// Returns the underlying queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Validates `request` and enqueues it.
    ///
    /// A request that fails validation never reaches the queue.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Job> {
        request.validate()?;

        let job_id = cancellable(cancel, "job submission", self.queue.submit(request)).await?;
        tracing::info!(job_id = %job_id, "Job submitted");

        Ok(Job::new(job_id))
    }

    /// Fetches one status observation and records it on `job`.
    ///
    /// Returns the raw response together with the mapped status. A status
    /// string outside the known set is a PROTOCOL_ERROR.
    pub async fn poll(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Result<(JobStatus, StatusResponse)> {
        let response = cancellable(cancel, "status poll", self.queue.status(&job.id)).await?;

        let status = JobStatus::from_remote(&response.status)
            .ok_or_else(|| JobError::unknown_status(&response.status))?;

        let previous = job.status;
        if job.observe(status) {
            tracing::info!(
                job_id = %job.id,
                status = %status,
                elapsed_s = job.elapsed().as_secs(),
                "Job status"
            );
        } else {
            tracing::warn!(
                job_id = %job.id,
                observed = %status,
                current = %previous,
                "Ignoring out-of-order status"
            );
        }

        Ok((status, response))
    }

    /// Polls `job` until it reaches a terminal status.
    ///
    /// Fails with TIMED_OUT once the elapsed time since submission reaches
    /// the timeout. Neither a sleep nor an in-flight status request runs
    /// past that deadline.
    pub async fn wait(&self, job: &mut Job, cancel: &CancellationToken) -> Result<JobOutput> {
        loop {
            let remaining = self.options.timeout.saturating_sub(job.elapsed());
            let polled = tokio::time::timeout(remaining, self.poll(job, cancel)).await;
            let (status, response) = match polled {
                Ok(result) => result?,
                Err(_) => return Err(self.give_up(job)),
            };

            if status.is_terminal() {
                return classify(&job.id, status, response);
            }

            let elapsed = job.elapsed();
            if elapsed >= self.options.timeout {
                return Err(self.give_up(job));
            }

            let delay = self.options.interval.min(self.options.timeout - elapsed);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(job_id = %job.id, "Wait cancelled");
                    return Err(JobError::cancelled(format!("waiting for job {}", job.id)));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Marks `job` abandoned and builds its TIMED_OUT error.
    fn give_up(&self, job: &mut Job) -> JobError {
        job.set_timed_out();
        tracing::warn!(
            job_id = %job.id,
            polls = job.polls,
            "Giving up on job; it may still complete remotely"
        );
        JobError::timed_out(&job.id, self.options.timeout.as_secs_f64())
    }

    /// Submits `request` and waits for its output.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<JobCompletion> {
        let mut job = self.submit(request, cancel).await?;
        let output = self.wait(&mut job, cancel).await?;

        Ok(JobCompletion {
            job_id: job.id,
            output,
            polls: job.polls,
        })
    }

    /// Runs `request` in a single blocking call.
    ///
    /// Classification matches [`JobRunner::run`]. If the queue answers
    /// before the job finished, the job id is reported in a PROTOCOL_ERROR
    /// so the caller can follow it up.
    pub async fn run_sync(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<JobCompletion> {
        request.validate()?;

        let response = cancellable(
            cancel,
            "synchronous run",
            self.queue.run_sync(request, self.options.timeout),
        )
        .await?;

        let job_id = response.id.clone().unwrap_or_default();
        let status = JobStatus::from_remote(&response.status)
            .ok_or_else(|| JobError::unknown_status(&response.status))?;

        if !status.is_terminal() {
            return Err(JobError::protocol(format!(
                "Synchronous run returned before completion (job {} is {}); poll it by id",
                job_id, response.status
            )));
        }

        tracing::info!(job_id = %job_id, status = %status, "Synchronous run finished");
        let output = classify(&job_id, status, response)?;

        Ok(JobCompletion {
            job_id,
            output,
            polls: 1,
        })
    }
}

/// Maps a terminal response to the job's output or error.
fn classify(job_id: &str, status: JobStatus, response: StatusResponse) -> Result<JobOutput> {
    match status {
        JobStatus::Completed => JobOutput::from_completed(response.output),
        JobStatus::Failed => {
            let reason = response.error.unwrap_or_else(|| {
                if response.status == "CANCELLED" {
                    "cancelled on the queue".to_string()
                } else {
                    "no reason reported".to_string()
                }
            });
            Err(JobError::job_failed(job_id, reason))
        }
        JobStatus::TimedOut => {
            let detail = response
                .error
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            Err(JobError::new(
                ErrorCode::TimedOut,
                format!("Job {} timed out on the queue{}", job_id, detail),
            ))
        }
        JobStatus::Unknown | JobStatus::Queued | JobStatus::Running => Err(JobError::protocol(
            format!("Job {} is not finished ({})", job_id, status),
        )),
    }
}

/// Races `fut` against cancellation.
async fn cancellable<T, F>(cancel: &CancellationToken, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(JobError::cancelled(what.to_string())),
        result = fut => result,
    }
}
