use thiserror::Error;

/// Errors surfaced by the mastering use cases and the job tracker.
///
/// Remote failures carry only an opaque diagnostic string so the enum stays
/// `Clone` and can be fanned out to every subscriber of the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MasteringError {
    /// Bad caller input. Never reaches the network.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("upload failed: {message}")]
    Upload { message: String },

    #[error("could not create mastering job: {message}")]
    JobCreation { message: String },

    #[error("could not look up mastering job {job_id}: {message}")]
    JobLookup { job_id: String, message: String },

    #[error("download unavailable: {message}")]
    Download { message: String },

    /// The job id is not held by the tracker.
    #[error("job is not tracked: {0}")]
    Tracking(String),
}

impl MasteringError {
    /// True for failures that originate on the remote side or in transit.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MasteringError::Upload { .. }
                | MasteringError::JobCreation { .. }
                | MasteringError::JobLookup { .. }
                | MasteringError::Download { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MasteringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_lookup_display_includes_job_id() {
        let err = MasteringError::JobLookup {
            job_id: "j2".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not look up mastering job j2: connection refused"
        );
    }

    #[test]
    fn validation_is_not_transport() {
        assert!(!MasteringError::Validation("empty".into()).is_transport());
        assert!(!MasteringError::Tracking("j9".into()).is_transport());
        assert!(
            MasteringError::Upload {
                message: "boom".into()
            }
            .is_transport()
        );
    }

    #[test]
    fn error_is_send_sync_clone() {
        fn assert_bounds<T: Send + Sync + Clone + 'static>() {}
        assert_bounds::<MasteringError>();
    }
}
