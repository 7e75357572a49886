//! Stable interface over the mastering transport.
//!
//! Use cases and the tracker depend on [`JobRepository`], never on the HTTP
//! client directly, so tests can swap in a scripted repository.

use async_trait::async_trait;

use crate::api::MasteringClient;
use crate::error::Result;
use crate::state_machine::{Audio, MasteringJob};

/// Remote operations on audio assets and mastering jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Upload the audio behind `source`. Creates a remote asset on every call.
    async fn upload(&self, source: &str, file_name: &str) -> Result<Audio>;

    /// Create a mastering job. Creates a remote job on every call.
    async fn create_job(&self, audio_id: &str) -> Result<MasteringJob>;

    /// Fetch the full current snapshot of a job.
    async fn get_status(&self, job_id: &str) -> Result<MasteringJob>;

    /// Resolve a download URL for an audio asset.
    async fn download_reference(&self, audio_id: &str) -> Result<String>;
}

/// [`JobRepository`] backed by [`MasteringClient`]. Forwards every call unchanged.
pub struct HttpJobRepository {
    client: MasteringClient,
}

impl HttpJobRepository {
    pub fn new(client: MasteringClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn upload(&self, source: &str, file_name: &str) -> Result<Audio> {
        self.client.upload(source, file_name).await
    }

    async fn create_job(&self, audio_id: &str) -> Result<MasteringJob> {
        self.client.create_job(audio_id).await
    }

    async fn get_status(&self, job_id: &str) -> Result<MasteringJob> {
        self.client.get_status(job_id).await
    }

    async fn download_reference(&self, audio_id: &str) -> Result<String> {
        self.client.download_reference(audio_id).await
    }
}
