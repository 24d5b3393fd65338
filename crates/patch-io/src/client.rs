use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use patch_config::ApiConfig;
use patch_model::{GenerationJob, JobOutput, RemotePatchRecord, parse_metadata};
use reqwest::{
    Url,
    blocking::{Client, RequestBuilder},
    header,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::{ApiError, JobApi, JobRequest};

/// Headers attached to every read. The status endpoint (or something between
/// us and it) has served stale snapshots without them.
pub const NO_CACHE_HEADERS: [(&str, &str); 3] = [
    ("cache-control", "no-cache, no-store, must-revalidate"),
    ("pragma", "no-cache"),
    ("expires", "0"),
];

const CACHE_BUST_PARAM: &str = "_";

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: &'a JobRequest,
}

/// Blocking HTTP client for the prediction API.
pub struct ModelClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
    model_version: Option<String>,
    nonce: AtomicU64,
}

impl ModelClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))?;
        check_scheme(&base_url)?;

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
            model_version: config.model_version.clone(),
            nonce: AtomicU64::new(0),
        })
    }

    pub fn predictions_url(&self) -> Result<Url, ApiError> {
        self.join("predictions")
    }

    /// Status URL for `id` with a fresh cache-busting query parameter. The id
    /// is always encoded as a single path segment.
    pub fn status_url(&self, id: &str) -> Result<Url, ApiError> {
        if matches!(id, "" | "." | "..") {
            return Err(ApiError::InvalidUrl(format!("job id `{id}`")));
        }
        let mut url = self.predictions_url()?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl("base url cannot take a job id".to_string()))?
            .pop_if_empty()
            .push(id);
        url.query_pairs_mut()
            .append_pair(CACHE_BUST_PARAM, &self.next_nonce().to_string());
        Ok(url)
    }

    /// Resolve an artifact reference: absolute URLs are used as given,
    /// anything else is taken relative to the API base.
    pub fn artifact_url(&self, reference: &str) -> Result<Url, ApiError> {
        let url = match Url::parse(reference) {
            Ok(url) => url,
            Err(_) => self.join(reference.trim_start_matches('/'))?,
        };
        check_scheme(&url)?;
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    fn next_nonce(&self) -> u128 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        now + self.nonce.fetch_add(1, Ordering::Relaxed) as u128
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn no_cache(req: RequestBuilder) -> RequestBuilder {
        NO_CACHE_HEADERS
            .iter()
            .fold(req, |req, (name, value)| req.header(*name, *value))
    }

    fn send_text(req: RequestBuilder) -> Result<String, ApiError> {
        let resp = req.send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl JobApi for ModelClient {
    fn create_job(&self, request: &JobRequest) -> Result<GenerationJob, ApiError> {
        if !request.has_input() {
            return Err(ApiError::EmptyRequest);
        }
        let url = self.predictions_url()?;
        let body = CreateBody {
            version: self.model_version.as_deref(),
            input: request,
        };
        debug!(%url, patches = request.initial_patches.len(), "creating generation job");
        let req = self
            .authorize(self.http.post(url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        let job: GenerationJob = serde_json::from_str(&Self::send_text(req)?)?;
        debug!(job = %job.id, status = job.status.as_str(), "job created");
        Ok(job)
    }

    fn job_status(&self, id: &str) -> Result<GenerationJob, ApiError> {
        let url = self.status_url(id)?;
        trace!(%url, "querying job status");
        let req = Self::no_cache(self.authorize(self.http.get(url)));
        let job: GenerationJob = serde_json::from_str(&Self::send_text(req)?)?;
        Ok(job)
    }

    fn fetch_metadata(&self, output: &JobOutput) -> Result<Vec<RemotePatchRecord>, ApiError> {
        let url = self.artifact_url(output.metadata())?;
        debug!(%url, "fetching result metadata");
        let req = Self::no_cache(self.authorize(self.http.get(url)));
        Ok(parse_metadata(&Self::send_text(req)?)?)
    }
}

fn check_scheme(url: &Url) -> Result<(), ApiError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::Blocked(format!("unsupported scheme `{other}`"))),
    }
}
