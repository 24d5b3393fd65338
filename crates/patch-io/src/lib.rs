//! Client for the hosted generation model.
//!
//! [`JobApi`] is the seam the job poller and service are written against;
//! [`ModelClient`] implements it over HTTP.

#![allow(clippy::all)]

use patch_model::{GenerationJob, JobOutput, MetadataError, RemotePatchRecord};
use serde::Serialize;

mod client;

pub use client::{ModelClient, NO_CACHE_HEADERS};

/// Inputs for a new generation job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Reference image URL, used instead of or alongside the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Starting layout in the model's convention.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub initial_patches: Vec<RemotePatchRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

impl JobRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn has_input(&self) -> bool {
        self.prompt.as_deref().is_some_and(|p| !p.trim().is_empty()) || self.image.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("blocked: {0}")]
    Blocked(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("job request needs a prompt or a reference image")]
    EmptyRequest,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Operations the generation service offers.
pub trait JobApi: Send + Sync {
    /// Submit a job; the returned snapshot carries its id and initial status.
    fn create_job(&self, request: &JobRequest) -> Result<GenerationJob, ApiError>;

    /// Current state of a job. Implementations must bypass HTTP caches.
    fn job_status(&self, id: &str) -> Result<GenerationJob, ApiError>;

    /// Fetch and parse the metadata artifact of one result.
    fn fetch_metadata(&self, output: &JobOutput) -> Result<Vec<RemotePatchRecord>, ApiError>;
}

impl<T: JobApi + ?Sized> JobApi for std::sync::Arc<T> {
    fn create_job(&self, request: &JobRequest) -> Result<GenerationJob, ApiError> {
        (**self).create_job(request)
    }

    fn job_status(&self, id: &str) -> Result<GenerationJob, ApiError> {
        (**self).job_status(id)
    }

    fn fetch_metadata(&self, output: &JobOutput) -> Result<Vec<RemotePatchRecord>, ApiError> {
        (**self).fetch_metadata(output)
    }
}
