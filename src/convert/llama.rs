//! LlamaParse cloud parsing client.
//!
//! A conversion is three calls: upload the PDF to create a job, poll the job
//! until it reaches a terminal status, then read its markdown result.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Response;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use super::Converter;
use super::error::ConvertError;
use crate::download::{DownloadError, HttpClient, check_status};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "LLAMA_CLOUD_API_KEY";

/// Public LlamaParse endpoint.
pub const DEFAULT_LLAMA_PARSE_BASE_URL: &str = "https://api.cloud.llamaindex.ai";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct JobStatus {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MarkdownResult {
    markdown: String,
}

/// [`Converter`] backed by the LlamaParse API.
#[derive(Clone)]
pub struct LlamaParseConverter {
    http: HttpClient,
    base_url: Url,
    api_key: String,
    poll_interval: Duration,
    poll_deadline: Duration,
}

impl fmt::Debug for LlamaParseConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlamaParseConverter")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("poll_deadline", &self.poll_deadline)
            .finish_non_exhaustive()
    }
}

impl LlamaParseConverter {
    /// Converter talking to the service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::MissingApiKey`] for a blank key and
    /// [`ConvertError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Result<Self, ConvertError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConvertError::MissingApiKey {
                variable: API_KEY_VAR,
            });
        }
        let http = HttpClient::with_timeouts(CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS, None)?;
        Ok(Self {
            http,
            base_url,
            api_key,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_deadline: DEFAULT_POLL_DEADLINE,
        })
    }

    /// Converter using the key from `LLAMA_CLOUD_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::MissingApiKey`] when the variable is unset or blank.
    pub fn from_env(base_url: Url) -> Result<Self, ConvertError> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| ConvertError::MissingApiKey {
            variable: API_KEY_VAR,
        })?;
        Self::new(base_url, api_key)
    }

    /// Overrides how often and how long a job is polled.
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, deadline: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_deadline = deadline;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ConvertError> {
        self.base_url
            .join(path)
            .map_err(|_| DownloadError::invalid_url(format!("{}{path}", self.base_url)).into())
    }

    async fn upload(&self, document: &Path) -> Result<String, ConvertError> {
        let url = self.endpoint("api/parsing/upload")?;
        let bytes = tokio::fs::read(document)
            .await
            .map_err(|source| ConvertError::Read {
                path: document.to_path_buf(),
                source,
            })?;
        let file_name = document
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| DownloadError::network(url.as_str(), e))?;
        let form = Form::new()
            .part("file", part)
            .text("language", "en");

        let response = self
            .http
            .inner()
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;
        let job: JobStatus = read_json(&url, response).await?;
        debug!(job_id = %job.id, status = %job.status, "parsing job created");
        Ok(job.id)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<(), ConvertError> {
        let url = self.endpoint(&format!("api/parsing/job/{job_id}"))?;
        let started = Instant::now();
        loop {
            let job: JobStatus = self.get_json(&url).await?;
            match job.status.as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" => {
                    return Err(ConvertError::JobFailed {
                        job_id: job_id.to_string(),
                        status: job.status.clone(),
                    });
                }
                status => debug!(job_id, status, "parsing job not finished"),
            }
            if started.elapsed() >= self.poll_deadline {
                return Err(ConvertError::JobTimedOut {
                    job_id: job_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ConvertError> {
        let response = self
            .http
            .inner()
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;
        read_json(url, response).await
    }
}

async fn read_json<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, ConvertError> {
    let response = check_status(url, response)?;
    response
        .json::<T>()
        .await
        .map_err(|e| ConvertError::unexpected_response(url.as_str(), e.to_string()))
}

#[async_trait]
impl Converter for LlamaParseConverter {
    fn name(&self) -> &str {
        "llamaparse"
    }

    #[instrument(skip(self, document), fields(document = %document.display()))]
    async fn convert(&self, document: &Path) -> Result<String, ConvertError> {
        let job_id = self.upload(document).await?;
        self.wait_for_job(&job_id).await?;
        let url = self.endpoint(&format!("api/parsing/job/{job_id}/result/markdown"))?;
        let result: MarkdownResult = self.get_json(&url).await?;
        info!(job_id = %job_id, chars = result.markdown.len(), "document parsed");
        Ok(result.markdown)
    }
}
