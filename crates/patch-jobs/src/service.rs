//! Non-blocking job runner for hosts with their own event loop.
//!
//! Each submitted job runs on a worker thread that creates it, polls it and
//! fetches its result metadata. The host calls [`JobService::poll`] from its
//! loop to collect events. Submitting a new job cancels the one in flight.

use std::{
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender, TryRecvError},
    },
    thread::{self, JoinHandle},
};

use patch_io::{ApiError, JobApi, JobRequest};
use patch_model::{JobOutput, RemotePatchRecord};
use tracing::{debug, warn};

use crate::{
    cancel::CancelToken,
    poll::{PollError, PollPolicy, TokenDelay, poll_job},
};

/// One finished result: the rendered image and the patches that make it up,
/// still in the model's convention. Apply them with `Canvas::apply_results`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedResult {
    pub output: JobOutput,
    pub records: Vec<RemotePatchRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("worker exited without reporting a result")]
    Disconnected,
}

#[derive(Debug)]
pub enum JobEvent {
    Created {
        request_id: u64,
        job_id: String,
    },
    /// The result list grew.
    Progress {
        request_id: u64,
        job_id: String,
        outputs: Vec<JobOutput>,
    },
    Completed {
        request_id: u64,
        job_id: String,
        attempts: u32,
        results: Vec<GeneratedResult>,
    },
    Failed {
        request_id: u64,
        error: JobError,
    },
}

impl JobEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            JobEvent::Created { request_id, .. }
            | JobEvent::Progress { request_id, .. }
            | JobEvent::Completed { request_id, .. }
            | JobEvent::Failed { request_id, .. } => *request_id,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed { .. })
    }
}

struct PendingJob {
    request_id: u64,
    receiver: Receiver<JobEvent>,
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl PendingJob {
    fn reap(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

pub struct JobService<A: JobApi + 'static> {
    api: Arc<A>,
    policy: PollPolicy,
    pending: Vec<PendingJob>,
}

impl<A: JobApi + 'static> JobService<A> {
    pub fn new(api: Arc<A>, policy: PollPolicy) -> Self {
        Self {
            api,
            policy,
            pending: Vec::new(),
        }
    }

    /// Start a job. Any job still in flight is cancelled and its remaining
    /// events are dropped.
    pub fn submit(&mut self, request_id: u64, request: JobRequest) {
        for superseded in self.pending.drain(..) {
            debug!(request_id = superseded.request_id, "superseding in-flight job");
            superseded.cancel.cancel();
        }

        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let api = Arc::clone(&self.api);
        let policy = self.policy.clone();
        let token = cancel.clone();

        let join = thread::spawn(move || {
            let result = run_job(api.as_ref(), request_id, &request, &policy, &token, &tx);
            let event = match result {
                Ok(event) => event,
                Err(error) => JobEvent::Failed { request_id, error },
            };
            let _ = tx.send(event);
        });

        self.pending.push(PendingJob {
            request_id,
            receiver: rx,
            cancel,
            join: Some(join),
        });
    }

    /// Cancel a job by id and forget it, so any later events are ignored.
    pub fn cancel(&mut self, request_id: u64) {
        self.pending.retain(|p| {
            if p.request_id == request_id {
                p.cancel.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Collect all events that are ready.
    pub fn poll(&mut self) -> Vec<JobEvent> {
        let mut ready = Vec::new();
        let mut still = Vec::new();

        for mut pending in self.pending.drain(..) {
            let mut finished = false;
            loop {
                match pending.receiver.try_recv() {
                    Ok(event) => {
                        finished = event.is_terminal();
                        ready.push(event);
                        if finished {
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        ready.push(JobEvent::Failed {
                            request_id: pending.request_id,
                            error: JobError::Disconnected,
                        });
                        finished = true;
                        break;
                    }
                }
            }

            if finished {
                pending.reap();
            } else {
                still.push(pending);
            }
        }

        self.pending = still;
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl<A: JobApi + 'static> Drop for JobService<A> {
    fn drop(&mut self) {
        for pending in &self.pending {
            pending.cancel.cancel();
        }
    }
}

fn run_job<A: JobApi + ?Sized>(
    api: &A,
    request_id: u64,
    request: &JobRequest,
    policy: &PollPolicy,
    cancel: &CancelToken,
    tx: &Sender<JobEvent>,
) -> Result<JobEvent, JobError> {
    let job = api.create_job(request)?;
    let job_id = job.id.clone();
    let _ = tx.send(JobEvent::Created {
        request_id,
        job_id: job_id.clone(),
    });

    let outcome = poll_job(api, &job_id, policy, &mut TokenDelay, cancel, |outputs| {
        let _ = tx.send(JobEvent::Progress {
            request_id,
            job_id: job_id.clone(),
            outputs: outputs.to_vec(),
        });
    })?;

    let mut results = Vec::with_capacity(outcome.outputs.len());
    let mut last_error = None;
    for output in outcome.outputs {
        match api.fetch_metadata(&output) {
            Ok(records) => results.push(GeneratedResult { output, records }),
            Err(error) => {
                warn!(
                    job = %job_id,
                    metadata = output.metadata(),
                    %error,
                    "skipping result with unreadable metadata"
                );
                last_error = Some(error);
            }
        }
    }

    if results.is_empty() {
        if let Some(error) = last_error {
            return Err(error.into());
        }
    }

    Ok(JobEvent::Completed {
        request_id,
        job_id,
        attempts: outcome.attempts,
        results,
    })
}
