//! Input-validated entry points in front of the [`JobRepository`].
//!
//! Each use case rejects empty (or whitespace-only) identifiers with
//! [`MasteringError::Validation`] before any network call, then delegates.
//! None of them retry or swallow repository errors.

use std::sync::Arc;

use tracing::debug;

use crate::error::{MasteringError, Result};
use crate::repository::JobRepository;
use crate::state_machine::{Audio, MasteringJob};

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        debug!(field = what, "rejecting empty input");
        return Err(MasteringError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

pub struct UploadAudio {
    repo: Arc<dyn JobRepository>,
}

impl UploadAudio {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, source: &str, file_name: &str) -> Result<Audio> {
        require(source, "source reference")?;
        require(file_name, "file name")?;
        self.repo.upload(source, file_name).await
    }
}

pub struct CreateMastering {
    repo: Arc<dyn JobRepository>,
}

impl CreateMastering {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, audio_id: &str) -> Result<MasteringJob> {
        require(audio_id, "audio id")?;
        self.repo.create_job(audio_id).await
    }
}

pub struct GetMasteringStatus {
    repo: Arc<dyn JobRepository>,
}

impl GetMasteringStatus {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, job_id: &str) -> Result<MasteringJob> {
        require(job_id, "job id")?;
        self.repo.get_status(job_id).await
    }
}

pub struct DownloadAudio {
    repo: Arc<dyn JobRepository>,
}

impl DownloadAudio {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, audio_id: &str) -> Result<String> {
        require(audio_id, "audio id")?;
        self.repo.download_reference(audio_id).await
    }
}

/// All use cases wired to one repository.
pub struct UseCases {
    pub upload: UploadAudio,
    pub create: CreateMastering,
    pub status: GetMasteringStatus,
    pub download: DownloadAudio,
}

impl UseCases {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self {
            upload: UploadAudio::new(repo.clone()),
            create: CreateMastering::new(repo.clone()),
            status: GetMasteringStatus::new(repo.clone()),
            download: DownloadAudio::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{ScriptedRepository, lookup_error, snapshot};
    use crate::state_machine::JobStatus;

    fn setup() -> (Arc<ScriptedRepository>, UseCases) {
        let repo = Arc::new(ScriptedRepository::new());
        let cases = UseCases::new(repo.clone());
        (repo, cases)
    }

    #[tokio::test]
    async fn upload_requires_source_and_file_name() {
        let (repo, cases) = setup();

        let err = cases.upload.execute("", "a.wav").await.unwrap_err();
        assert_eq!(err, MasteringError::Validation("source reference must not be empty".into()));

        let err = cases.upload.execute("file://a.wav", "  ").await.unwrap_err();
        assert_eq!(err, MasteringError::Validation("file name must not be empty".into()));

        assert_eq!(repo.calls().total(), 0);
    }

    #[tokio::test]
    async fn upload_delegates_when_valid() {
        let (repo, cases) = setup();
        let audio = cases.upload.execute("file://a.wav", "a.wav").await.unwrap();
        assert_eq!(audio.id, "a1");
        assert_eq!(repo.calls().upload, 1);
    }

    #[tokio::test]
    async fn create_requires_audio_id() {
        let (repo, cases) = setup();
        let err = cases.create.execute("").await.unwrap_err();
        assert!(matches!(err, MasteringError::Validation(_)));
        assert_eq!(repo.calls().create, 0);
    }

    #[tokio::test]
    async fn status_requires_job_id_and_propagates_errors_unchanged() {
        let (repo, cases) = setup();
        assert!(matches!(
            cases.status.execute("").await,
            Err(MasteringError::Validation(_))
        ));
        assert_eq!(repo.calls().total(), 0);

        repo.push_status("j1", Err(lookup_error("j1", "boom")));
        let err = cases.status.execute("j1").await.unwrap_err();
        assert_eq!(err, lookup_error("j1", "boom"));

        repo.push_status("j1", Ok(snapshot("j1", JobStatus::Processing, 0.4)));
        let job = cases.status.execute("j1").await.unwrap();
        assert_eq!(job.progression, 0.4);
        assert_eq!(repo.calls().status_for("j1"), 2);
    }

    #[tokio::test]
    async fn download_requires_audio_id() {
        let (repo, cases) = setup();
        assert!(cases.download.execute(" ").await.is_err());
        assert_eq!(repo.calls().download, 0);
        let url = cases.download.execute("o1").await.unwrap();
        assert!(url.ends_with("/audios/o1/download"));
    }
}
