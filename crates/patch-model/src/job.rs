use serde::{Deserialize, Serialize};

/// Lifecycle of a remote generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Any status string this client does not know. Treated as still pending.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Terminal states that carry no usable output.
    pub fn is_failure(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Unknown => "unknown",
        }
    }
}

/// One result produced by a job: a rendered image and the metadata artifact
/// describing the patches in it. Serialized as a two element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput(pub String, pub String);

impl JobOutput {
    pub fn new(image: impl Into<String>, metadata: impl Into<String>) -> Self {
        Self(image.into(), metadata.into())
    }

    pub fn image(&self) -> &str {
        &self.0
    }

    pub fn metadata(&self) -> &str {
        &self.1
    }
}

/// Snapshot of a job as reported by the model service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "nullable_outputs")]
    pub output: Vec<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationJob {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            output: Vec::new(),
            error: None,
        }
    }

    pub fn with_output(mut self, output: Vec<JobOutput>) -> Self {
        self.output = output;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// The service sends `"output": null` until the first result exists.
fn nullable_outputs<'de, D>(deserializer: D) -> Result<Vec<JobOutput>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<JobOutput>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_payload() {
        let job: GenerationJob = serde_json::from_str(
            r#"{"id":"abc","status":"succeeded","output":[["img1","json1"]],"error":null}"#,
        )
        .expect("parse job");
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.output, vec![JobOutput::new("img1", "json1")]);
        assert!(job.error.is_none());
    }

    #[test]
    fn null_output_and_unknown_status() {
        let job: GenerationJob =
            serde_json::from_str(r#"{"id":"abc","status":"queued","output":null}"#)
                .expect("parse job");
        assert_eq!(job.status, JobStatus::Unknown);
        assert!(!job.status.is_terminal());
        assert!(job.output.is_empty());
    }

    #[test]
    fn failure_states() {
        assert!(JobStatus::Failed.is_failure());
        assert!(JobStatus::Canceled.is_failure());
        assert!(!JobStatus::Succeeded.is_failure());
        assert!(JobStatus::Succeeded.is_terminal());
    }
}
