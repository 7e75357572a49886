use serde::{Deserialize, Serialize};

use super::job::{JobStatus, MasteringJob};

/// How progression regressions reported by the remote service are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPolicy {
    /// Expose whatever the service reported.
    #[default]
    Verbatim,
    /// While a job is live, never expose less than the highest fraction seen so far.
    Monotonic,
}

/// Why a fetched snapshot was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The tracked record is terminal and the snapshot would un-terminate it.
    AlreadyTerminal {
        current: JobStatus,
        incoming: JobStatus,
    },
    /// The snapshot describes another job.
    IdMismatch,
}

/// The result of reconciling a fetched snapshot against the tracked record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Replace the tracked record with this snapshot.
    Apply(MasteringJob),
    /// Keep the tracked record as it is.
    Ignore(IgnoreReason),
}

impl Transition {
    /// True when the applied snapshot puts the job in a terminal state.
    pub fn settles(&self) -> bool {
        matches!(self, Transition::Apply(job) if job.is_terminal())
    }
}

/// Decides how fresh snapshots move a tracked job through
/// `waiting → processing → {succeeded | failed}`.
pub struct StateMachine;

impl StateMachine {
    /// Reconcile `incoming` against `current`.
    ///
    /// - Snapshots are full replacements, never field merges.
    /// - Once `current` is terminal, only another terminal snapshot may replace
    ///   it (last terminal observation wins).
    /// - Backwards moves between live states are tolerated and applied.
    pub fn reconcile(
        current: &MasteringJob,
        incoming: MasteringJob,
        policy: ProgressPolicy,
    ) -> Transition {
        if incoming.id != current.id {
            return Transition::Ignore(IgnoreReason::IdMismatch);
        }

        if current.is_terminal() && !incoming.is_terminal() {
            return Transition::Ignore(IgnoreReason::AlreadyTerminal {
                current: current.status,
                incoming: incoming.status,
            });
        }

        let mut next = incoming;
        if policy == ProgressPolicy::Monotonic
            && !next.is_terminal()
            && next.progression < current.progression
        {
            next.progression = current.progression;
        }

        Transition::Apply(next)
    }

    /// True when moving `from → to` goes backwards in the lifecycle.
    pub fn is_regression(from: JobStatus, to: JobStatus) -> bool {
        rank(to) < rank(from)
    }
}

fn rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Waiting => 0,
        JobStatus::Processing => 1,
        JobStatus::Succeeded | JobStatus::Failed => 2,
    }
}
