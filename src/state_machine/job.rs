use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded binary asset, referenced by its server-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    pub id: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

/// Remote lifecycle status of a mastering job.
///
/// `Waiting` and `Processing` are live; `Succeeded` and `Failed` are terminal
/// and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A server-tracked unit of mastering work.
///
/// Instances are only ever replaced wholesale by a fresh snapshot; no field is
/// patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteringJob {
    pub id: String,
    pub input_audio_id: String,
    /// Only meaningful once `status` is `Succeeded`; see [`MasteringJob::output_audio_id`].
    pub output_audio_id: Option<String>,
    pub status: JobStatus,
    /// Always within `[0.0, 1.0]`.
    pub progression: f64,
    pub created_at: DateTime<Utc>,
}

impl MasteringJob {
    /// Build a snapshot, clamping `progression` into `[0.0, 1.0]`.
    pub fn new(
        id: impl Into<String>,
        input_audio_id: impl Into<String>,
        output_audio_id: Option<String>,
        status: JobStatus,
        progression: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            input_audio_id: input_audio_id.into(),
            output_audio_id,
            status,
            progression: clamp_progression(progression),
            created_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The resulting audio id, usable only when the job succeeded.
    pub fn output_audio_id(&self) -> Option<&str> {
        match self.status {
            JobStatus::Succeeded => self.output_audio_id.as_deref(),
            _ => None,
        }
    }

    /// Progression as a whole percentage, for display.
    pub fn percent(&self) -> u64 {
        (self.progression * 100.0).round() as u64
    }
}

/// Force a remote progression value into `[0.0, 1.0]`. Non-finite input reads as 0.
pub fn clamp_progression(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus, output: Option<&str>) -> MasteringJob {
        MasteringJob::new("j1", "a1", output.map(String::from), status, 0.5, Utc::now())
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Waiting.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn progression_is_clamped() {
        assert_eq!(clamp_progression(1.7), 1.0);
        assert_eq!(clamp_progression(-0.2), 0.0);
        assert_eq!(clamp_progression(f64::NAN), 0.0);
        assert_eq!(clamp_progression(f64::INFINITY), 0.0);
        assert_eq!(clamp_progression(0.4), 0.4);

        let j = MasteringJob::new("j", "a", None, JobStatus::Processing, 3.0, Utc::now());
        assert_eq!(j.progression, 1.0);
    }

    #[test]
    fn output_audio_only_usable_when_succeeded() {
        assert_eq!(job(JobStatus::Succeeded, Some("o1")).output_audio_id(), Some("o1"));
        assert_eq!(job(JobStatus::Failed, Some("o1")).output_audio_id(), None);
        assert_eq!(job(JobStatus::Processing, Some("o1")).output_audio_id(), None);
        assert_eq!(job(JobStatus::Succeeded, None).output_audio_id(), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, r#""processing""#);
        let parsed: JobStatus = serde_json::from_str(r#""succeeded""#).unwrap();
        assert_eq!(parsed, JobStatus::Succeeded);
        assert_eq!(JobStatus::Waiting.to_string(), "waiting");
    }

    #[test]
    fn percent_rounds() {
        let j = MasteringJob::new("j", "a", None, JobStatus::Processing, 0.426, Utc::now());
        assert_eq!(j.percent(), 43);
    }
}
