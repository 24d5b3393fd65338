//! Status polling for a single generation job.
//!
//! One request is in flight at a time. The loop waits 2s between checks while
//! the job is processing, backs off by 1.5x (up to 5s) while it is still
//! starting, and doubles the delay (up to 10s) after a failed check. Failed
//! checks count toward the attempt budget.

use std::time::Duration;

use patch_config::PollingConfig;
use patch_io::JobApi;
use patch_model::{JobOutput, JobStatus};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub processing_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub error_max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            processing_delay: Duration::from_millis(config.processing_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            error_max_delay: Duration::from_millis(config.error_max_delay_ms),
        }
    }
}

impl PollPolicy {
    /// Delay before the next check after observing `status`. A backoff
    /// factor that yields no representable duration falls back to the cap.
    pub fn next_delay(&self, previous: Duration, status: JobStatus) -> Duration {
        if status == JobStatus::Processing {
            return self.processing_delay;
        }
        Duration::try_from_secs_f64(previous.as_secs_f64() * self.backoff_factor)
            .map_or(self.max_delay, |next| next.min(self.max_delay))
    }

    /// Delay before the next check after a failed one.
    pub fn error_delay(&self, previous: Duration) -> Duration {
        previous.saturating_mul(2).min(self.error_max_delay)
    }
}

/// Waits between status checks.
pub trait Delay {
    /// Wait for `duration` or until `cancel` trips. Returns true if cancelled.
    fn wait(&mut self, duration: Duration, cancel: &CancelToken) -> bool;
}

/// Real-time delay that wakes as soon as the token is cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenDelay;

impl Delay for TokenDelay {
    fn wait(&mut self, duration: Duration, cancel: &CancelToken) -> bool {
        cancel.wait_timeout(duration)
    }
}

/// A job that finished with at least one result.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: String,
    /// Status checks issued, failed ones included.
    pub attempts: u32,
    pub outputs: Vec<JobOutput>,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The service reported `failed` or `canceled`. Resubmitting may help.
    #[error("{}", .detail.as_deref().unwrap_or("generation failed"))]
    Failed {
        job_id: String,
        status: JobStatus,
        detail: Option<String>,
    },
    /// Budget exhausted without a terminal status. The job may still finish.
    #[error(
        "job {job_id} did not finish after {attempts} status checks; it may still be processing in the background"
    )]
    TimedOut { job_id: String, attempts: u32 },
    #[error("polling for job {job_id} was cancelled")]
    Cancelled { job_id: String, attempts: u32 },
}

/// Poll `job_id` until it succeeds with output, fails, runs out of attempts or
/// is cancelled.
///
/// `on_progress` receives the full result list each time it grows; it never
/// fires twice for the same length.
pub fn poll_job<A, D, F>(
    api: &A,
    job_id: &str,
    policy: &PollPolicy,
    delay: &mut D,
    cancel: &CancelToken,
    mut on_progress: F,
) -> Result<JobOutcome, PollError>
where
    A: JobApi + ?Sized,
    D: Delay + ?Sized,
    F: FnMut(&[JobOutput]),
{
    let mut wait = policy.initial_delay;
    let mut seen = 0usize;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled(job_id, attempt - 1));
        }

        match api.job_status(job_id) {
            Ok(job) => {
                debug!(
                    job = job_id,
                    attempt,
                    status = job.status.as_str(),
                    outputs = job.output.len(),
                    "job status"
                );

                if job.status.is_failure() {
                    info!(
                    job = job_id,
                    status = job.status.as_str(),
                    detail = ?job.error,
                    "job did not succeed"
                );
                    return Err(PollError::Failed {
                        job_id: job_id.to_string(),
                        status: job.status,
                        detail: job.error,
                    });
                }

                if job.output.len() > seen {
                    seen = job.output.len();
                    on_progress(&job.output);
                }

                if job.status == JobStatus::Succeeded && !job.output.is_empty() {
                    info!(job = job_id, attempt, outputs = job.output.len(), "job succeeded");
                    return Ok(JobOutcome {
                        job_id: job_id.to_string(),
                        attempts: attempt,
                        outputs: job.output,
                    });
                }

                wait = policy.next_delay(wait, job.status);
            }
            Err(error) => {
                wait = policy.error_delay(wait);
                warn!(
                    job = job_id,
                    attempt,
                    %error,
                    retry_in_ms = wait.as_millis() as u64,
                    "status check failed"
                );
            }
        }

        if attempt < policy.max_attempts && delay.wait(wait, cancel) {
            return Err(cancelled(job_id, attempt));
        }
    }

    warn!(job = job_id, attempts = policy.max_attempts, "gave up polling");
    Err(PollError::TimedOut {
        job_id: job_id.to_string(),
        attempts: policy.max_attempts,
    })
}

fn cancelled(job_id: &str, attempts: u32) -> PollError {
    debug!(job = job_id, attempts, "polling cancelled");
    PollError::Cancelled {
        job_id: job_id.to_string(),
        attempts,
    }
}
