use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::types::{AudioResponse, CreateMasteringRequest, MasteringResponse, server_message};
use crate::error::{MasteringError, Result};
use crate::state_machine::{Audio, MasteringJob};

pub const API_URL: &str = "https://api.aimastering.com";
pub const DEFAULT_MODE: &str = "default";

const FALLBACK_MIME: &str = "audio/wav";

/// Authenticated HTTP client for the remote mastering API.
pub struct MasteringClient {
    api_key: String,
    client: Client,
    base_url: Url,
    mode: String,
}

impl MasteringClient {
    pub fn new(api_key: impl Into<String>) -> std::result::Result<Self, ApiError> {
        Self::with_base_url(api_key, API_URL)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
    ) -> std::result::Result<Self, ApiError> {
        Self::with_timeouts(
            api_key,
            base_url,
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
    }

    pub fn with_timeouts(
        api_key: impl Into<String>,
        base_url: &str,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> std::result::Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            client,
            base_url,
            mode: DEFAULT_MODE.to_string(),
        })
    }

    /// Mastering mode sent with every job creation.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Upload the audio behind `source` (a path or `file://` reference) as `file_name`.
    pub async fn upload(&self, source: &str, file_name: &str) -> Result<Audio> {
        let upload = async {
            let path = source.strip_prefix("file://").unwrap_or(source);
            let bytes = tokio::fs::read(Path::new(path))
                .await
                .map_err(|e| ApiError::Source {
                    source_ref: source.to_string(),
                    reason: e.to_string(),
                })?;
            let mime = mime_guess::from_path(file_name)
                .first_raw()
                .unwrap_or(FALLBACK_MIME);
            debug!(source, file_name, mime, size = bytes.len(), "uploading audio");

            let part = file_part(bytes, source, file_name, mime)?;
            let form = Form::new().part("file", part);
            let url = self.endpoint(&["audios"])?;
            self.execute::<AudioResponse>(self.client.post(url).multipart(form))
                .await
        };

        upload
            .await
            .map(|resp| resp.into_audio(file_name))
            .map_err(|e| MasteringError::Upload {
                message: e.diagnostic(),
            })
    }

    /// Create a mastering job seeded by `audio_id`.
    pub async fn create_job(&self, audio_id: &str) -> Result<MasteringJob> {
        if audio_id.trim().is_empty() {
            return Err(MasteringError::Validation(
                "audio id must not be empty".into(),
            ));
        }
        debug!(audio_id, mode = %self.mode, "creating mastering job");

        let create = async {
            let body = CreateMasteringRequest {
                input_audio_id: audio_id.to_string(),
                mode: self.mode.clone(),
            };
            let url = self.endpoint(&["masterings"])?;
            self.execute::<MasteringResponse>(self.client.post(url).json(&body))
                .await
        };

        create
            .await
            .map(MasteringResponse::into_job)
            .map_err(|e| MasteringError::JobCreation {
                message: e.diagnostic(),
            })
    }

    /// Fetch the full current snapshot of a job.
    pub async fn get_status(&self, job_id: &str) -> Result<MasteringJob> {
        if job_id.trim().is_empty() {
            return Err(MasteringError::Validation("job id must not be empty".into()));
        }

        let lookup = async {
            let url = self.endpoint(&["masterings", job_id])?;
            self.execute::<MasteringResponse>(self.client.get(url)).await
        };

        lookup
            .await
            .map(MasteringResponse::into_job)
            .map_err(|e| MasteringError::JobLookup {
                job_id: job_id.to_string(),
                message: e.diagnostic(),
            })
    }

    /// Check that the audio asset is retrievable and return its download URL.
    pub async fn download_reference(&self, audio_id: &str) -> Result<String> {
        if audio_id.trim().is_empty() {
            return Err(MasteringError::Validation(
                "audio id must not be empty".into(),
            ));
        }

        let probe = async {
            let url = self.endpoint(&["audios", audio_id, "download"])?;
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status.as_u16(), &body));
            }
            Ok::<_, ApiError>(url.to_string())
        };

        probe.await.map_err(|e| MasteringError::Download {
            message: e.diagnostic(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, ApiError> {
        let response = request.bearer_auth(&self.api_key).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "mastering API responded");

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn file_part(
    bytes: Vec<u8>,
    source: &str,
    file_name: &str,
    mime: &str,
) -> std::result::Result<Part, ApiError> {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .map_err(|e| ApiError::Source {
            source_ref: source.to_string(),
            reason: format!("unusable content type {mime}: {e}"),
        })
}

fn status_error(status: u16, body: &str) -> ApiError {
    ApiError::Status {
        status,
        message: server_message(body)
            .unwrap_or_else(|| format!("request failed with status {status}")),
    }
}
