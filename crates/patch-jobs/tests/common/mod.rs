#![allow(dead_code)]

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use patch_io::{ApiError, JobApi, JobRequest};
use patch_jobs::{CancelToken, Delay};
use patch_model::{
    GenerationJob, JobOutput, JobStatus, RecordId, RemoteAttributes, RemotePatchRecord,
};

pub enum Step {
    Status(JobStatus, Vec<JobOutput>),
    Failed(&'static str),
    Error,
}

pub fn processing() -> Step {
    Step::Status(JobStatus::Processing, Vec::new())
}

pub fn succeeded() -> Step {
    Step::Status(JobStatus::Succeeded, vec![JobOutput::new("img1", "json1")])
}

/// Plays back a script of status responses. Once the script runs out the
/// last step repeats.
pub struct ScriptedApi {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub status_calls: Mutex<u32>,
    pub metadata: Mutex<Option<Result<Vec<RemotePatchRecord>, ()>>>,
}

impl ScriptedApi {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            status_calls: Mutex::new(0),
            metadata: Mutex::new(Some(Ok(vec![record()]))),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.status_calls.lock().unwrap()
    }

    fn next_step(&self) -> Result<GenerationJob, ApiError> {
        let mut steps = self.steps.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        let step = match steps.pop_front() {
            Some(step) => {
                *last = Some(clone_step(&step));
                step
            }
            None => clone_step(last.as_ref().expect("empty script")),
        };
        match step {
            Step::Status(status, output) => {
                Ok(GenerationJob::new("job-1", status).with_output(output))
            }
            Step::Failed(detail) => {
                Ok(GenerationJob::new("job-1", JobStatus::Failed).with_error(detail))
            }
            Step::Error => Err(ApiError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
        }
    }
}

fn clone_step(step: &Step) -> Step {
    match step {
        Step::Status(status, output) => Step::Status(*status, output.clone()),
        Step::Failed(detail) => Step::Failed(*detail),
        Step::Error => Step::Error,
    }
}

pub fn record() -> RemotePatchRecord {
    RemotePatchRecord {
        id: RecordId::Number(1),
        patch_index: 3,
        x: 0.1,
        y: 0.2,
        attributes: RemoteAttributes {
            rotation: Some(1.0),
            ..Default::default()
        },
        order: 0,
    }
}

impl JobApi for ScriptedApi {
    fn create_job(&self, request: &JobRequest) -> Result<GenerationJob, ApiError> {
        if !request.has_input() {
            return Err(ApiError::EmptyRequest);
        }
        Ok(GenerationJob::new("job-1", JobStatus::Starting))
    }

    fn job_status(&self, id: &str) -> Result<GenerationJob, ApiError> {
        assert_eq!(id, "job-1");
        *self.status_calls.lock().unwrap() += 1;
        self.next_step()
    }

    fn fetch_metadata(&self, _output: &JobOutput) -> Result<Vec<RemotePatchRecord>, ApiError> {
        match self.metadata.lock().unwrap().clone() {
            Some(Ok(records)) => Ok(records),
            _ => Err(ApiError::Status {
                status: 404,
                body: "missing".into(),
            }),
        }
    }
}

/// Records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingDelay {
    pub waits: Vec<Duration>,
    /// Cancel the token once this many waits have been requested.
    pub cancel_after: Option<usize>,
}

impl RecordingDelay {
    pub fn millis(&self) -> Vec<u128> {
        self.waits.iter().map(|d| d.as_millis()).collect()
    }
}

impl Delay for RecordingDelay {
    fn wait(&mut self, duration: Duration, cancel: &CancelToken) -> bool {
        self.waits.push(duration);
        if self.cancel_after == Some(self.waits.len()) {
            cancel.cancel();
        }
        cancel.is_cancelled()
    }
}
