//! Job handle for tracking one remote generation job.
//!
//! The remote queue is the source of truth for a job's status; the client
//! only records what it has observed while polling. Observations are kept
//! monotonic: a job never moves back to an earlier state and never leaves a
//! terminal one.

use std::time::{Duration, SystemTime};

use tokio::time::Instant;

/// Status of a remote generation job, as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    /// Submitted, not yet observed.
    #[default]
    Unknown,
    /// Waiting in the remote queue for a worker.
    Queued,
    /// A worker is executing the job.
    Running,
    /// The worker returned a result (which may still carry an error).
    Completed,
    /// The queue recorded the job as failed.
    Failed,
    /// The job ran out of time, remotely or in the client's observation budget.
    TimedOut,
}

impl JobStatus {
    /// Maps a status string reported by the queue.
    ///
    /// Returns `None` for strings outside the known set. A remote
    /// `CANCELLED` maps to [`JobStatus::Failed`].
    pub fn from_remote(s: &str) -> Option<Self> {
        match s {
            "IN_QUEUE" | "QUEUED" => Some(JobStatus::Queued),
            "IN_PROGRESS" | "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" | "CANCELLED" => Some(JobStatus::Failed),
            "TIMED_OUT" => Some(JobStatus::TimedOut),
            _ => None,
        }
    }

    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "UNKNOWN",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::TimedOut => "TIMED_OUT",
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// Position in the ordering UNKNOWN < QUEUED < RUNNING < terminal.
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Unknown => 0,
            JobStatus::Queued => 1,
            JobStatus::Running => 2,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut => 3,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job submitted to the remote queue, owned by the polling client.
#[derive(Debug, Clone)]
pub struct Job {
    /// Opaque identifier assigned by the queue.
    pub id: String,

    /// Latest observed status.
    pub status: JobStatus,

    /// Wall-clock submission time.
    pub created_at: SystemTime,

    /// Number of status observations made so far.
    pub polls: u32,

    /// Monotonic submission instant; drives the timeout.
    submitted_at: Instant,
}

impl Job {
    /// Creates a handle for a freshly submitted job.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Unknown,
            created_at: SystemTime::now(),
            polls: 0,
            submitted_at: Instant::now(),
        }
    }

    /// Time elapsed since submission.
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// Records a status observation.
    ///
    /// Returns false when the observation was ignored: the job is already
    /// terminal, or the observation would move it backwards.
    pub fn observe(&mut self, status: JobStatus) -> bool {
        self.polls += 1;

        if self.status.is_terminal() || status.rank() < self.status.rank() {
            return false;
        }

        self.status = status;
        true
    }

    /// Marks the job as abandoned by the client's timeout.
    pub fn set_timed_out(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::TimedOut;
        }
    }
}
