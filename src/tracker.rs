//! Mastering job lifecycle manager.
//!
//! [`JobTracker`] owns every job it was handed, runs one polling task per live
//! job and publishes [`JobEvent`]s to subscribers:
//!
//! 1. `submit_and_track` uploads, creates the job and starts polling it.
//! 2. Each tick issues at most one status query per job. A tick that lands
//!    while a query for that job is still in flight is skipped, never queued.
//! 3. Fetched snapshots replace the tracked record wholesale, subject to
//!    [`StateMachine::reconcile`]; terminal states are absorbing.
//! 4. A terminal snapshot, a failed poll (after the configured number of
//!    consecutive retries), `stop`, `discard` or `stop_all` cancels the job's
//!    polling task through its [`CancellationToken`].
//!
//! Responses that arrive after their job was cancelled are dropped without
//! touching state.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MasteringError, Result};
use crate::repository::JobRepository;
use crate::state_machine::{MasteringJob, ProgressPolicy, StateMachine, Transition};
use crate::usecases::UseCases;

/// Tuning for a [`JobTracker`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between status queries for one job.
    pub poll_interval: Duration,
    /// Consecutive failed polls tolerated before a job stops polling.
    pub max_poll_retries: u32,
    pub progress_policy: ProgressPolicy,
    /// Buffered events per subscriber before the slowest one starts lagging.
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_retries: 0,
            progress_policy: ProgressPolicy::Verbatim,
            event_capacity: 256,
        }
    }
}

impl TrackerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_retries(mut self, retries: u32) -> Self {
        self.max_poll_retries = retries;
        self
    }

    pub fn with_progress_policy(mut self, policy: ProgressPolicy) -> Self {
        self.progress_policy = policy;
        self
    }
}

/// Something that happened to a tracked job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The job entered the tracker.
    Tracked(MasteringJob),
    /// A fresh snapshot replaced the tracked record.
    Updated(MasteringJob),
    /// Polling for the job stopped because status queries kept failing.
    PollFailed { job_id: String, error: MasteringError },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Tracked(job) | JobEvent::Updated(job) => &job.id,
            JobEvent::PollFailed { job_id, .. } => job_id,
        }
    }
}

struct PollHandle {
    generation: u64,
    token: CancellationToken,
}

struct TrackedJob {
    snapshot: MasteringJob,
    seq: u64,
    poll: Option<PollHandle>,
}

impl TrackedJob {
    fn cancel_poll(&mut self) -> bool {
        match self.poll.take() {
            Some(poll) => {
                poll.token.cancel();
                true
            }
            None => false,
        }
    }

    fn polls_with(&self, generation: u64) -> bool {
        self.poll.as_ref().is_some_and(|p| p.generation == generation)
    }
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<String, TrackedJob>,
    /// Outstanding status query per job id, keyed to the ticket of whoever
    /// issued it. Survives `discard` so a re-tracked id waits for the old query.
    queries: HashMap<String, u64>,
}

impl JobTable {
    fn claim(&mut self, job_id: &str, ticket: u64) -> bool {
        match self.queries.entry(job_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ticket);
                true
            }
        }
    }

    fn release(&mut self, job_id: &str, ticket: u64) {
        if self.queries.get(job_id) == Some(&ticket) {
            self.queries.remove(job_id);
        }
    }
}

struct Shared {
    usecases: UseCases,
    config: TrackerConfig,
    jobs: Mutex<JobTable>,
    events: broadcast::Sender<JobEvent>,
    next_seq: AtomicU64,
    next_generation: AtomicU64,
    next_ticket: AtomicU64,
}

enum Tick {
    Query(u64),
    Skip,
    Stop,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: JobEvent) {
        debug!(job_id = event.job_id(), "publishing job event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Reconcile a fetched snapshot into `entry`, notifying subscribers on change.
    /// Returns true once the job is terminal.
    fn apply(&self, entry: &mut TrackedJob, incoming: MasteringJob) -> bool {
        let previous = entry.snapshot.status;
        let transition = StateMachine::reconcile(&entry.snapshot, incoming, self.config.progress_policy);
        let settles = transition.settles();
        match transition {
            Transition::Apply(next) => {
                if StateMachine::is_regression(previous, next.status) {
                    debug!(job_id = %next.id, from = %previous, to = %next.status, "remote status moved backwards");
                }
                entry.snapshot = next.clone();
                self.emit(JobEvent::Updated(next));
            }
            Transition::Ignore(reason) => {
                warn!(job_id = %entry.snapshot.id, ?reason, "ignoring status snapshot");
            }
        }

        if settles {
            info!(job_id = %entry.snapshot.id, status = %entry.snapshot.status, "job settled");
        }
        if entry.snapshot.is_terminal() {
            if entry.cancel_poll() {
                debug!(job_id = %entry.snapshot.id, "polling stopped");
            }
            true
        } else {
            false
        }
    }

    fn begin_tick(&self, job_id: &str, generation: u64) -> Tick {
        let mut table = self.lock();
        let Some(entry) = table.jobs.get(job_id) else {
            return Tick::Stop;
        };
        if !entry.polls_with(generation) || entry.snapshot.is_terminal() {
            return Tick::Stop;
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        if !table.claim(job_id, ticket) {
            debug!(job_id, "status query still in flight, skipping tick");
            return Tick::Skip;
        }
        Tick::Query(ticket)
    }

    /// Apply one poll result. Returns false when the polling task should exit.
    fn finish_tick(
        &self,
        job_id: &str,
        generation: u64,
        ticket: u64,
        result: Result<MasteringJob>,
        failures: &mut u32,
    ) -> bool {
        let mut table = self.lock();
        table.release(job_id, ticket);
        let Some(entry) = table.jobs.get_mut(job_id) else {
            debug!(job_id, "job discarded while polling, dropping response");
            return false;
        };
        if !entry.polls_with(generation) {
            debug!(job_id, "polling cancelled while query was in flight, dropping response");
            return false;
        }

        match result {
            Ok(snapshot) => {
                *failures = 0;
                !self.apply(entry, snapshot)
            }
            Err(error) => {
                *failures += 1;
                // Only remote or transit failures can clear up on a later tick.
                if error.is_transport() && *failures <= self.config.max_poll_retries {
                    warn!(job_id, attempt = *failures, max = self.config.max_poll_retries, %error, "status poll failed, will retry");
                    return true;
                }
                warn!(job_id, %error, "status poll failed, polling stopped");
                entry.cancel_poll();
                self.emit(JobEvent::PollFailed {
                    job_id: job_id.to_string(),
                    error,
                });
                false
            }
        }
    }

    fn spawn_poller(self: &Arc<Self>, job_id: &str) -> PollHandle {
        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(poll_job(
            Arc::clone(self),
            job_id.to_string(),
            generation,
            token.clone(),
        ));
        debug!(job_id, generation, "polling started");
        PollHandle { generation, token }
    }
}

/// Releases a claimed status query if it is abandoned midway.
struct InFlight<'a> {
    shared: &'a Shared,
    job_id: &'a str,
    ticket: u64,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.lock().release(self.job_id, self.ticket);
        }
    }
}

async fn poll_job(shared: Arc<Shared>, job_id: String, generation: u64, token: CancellationToken) {
    let period = shared.config.poll_interval.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures = 0u32;
    let mut last_done: Option<Instant> = None;

    loop {
        let due = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            due = ticker.tick() => due,
        };

        // The interval hands back a missed deadline as soon as it is polled again.
        if last_done.is_some_and(|done| due < done) {
            debug!(job_id = %job_id, "tick came due during the previous query, skipping");
            continue;
        }

        let ticket = match shared.begin_tick(&job_id, generation) {
            Tick::Query(ticket) => ticket,
            Tick::Skip => continue,
            Tick::Stop => break,
        };

        let mut guard = InFlight {
            shared: &shared,
            job_id: &job_id,
            ticket,
            settled: false,
        };
        let result = shared.usecases.status.execute(&job_id).await;
        guard.settled = true;
        last_done = Some(Instant::now());
        if !shared.finish_tick(&job_id, generation, ticket, result, &mut failures) {
            break;
        }
    }

    debug!(job_id = %job_id, generation, "polling task exited");
}

/// Detaches a callback registered with [`JobTracker::on_event`] when dropped.
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Tracks mastering jobs until they settle. Dropping the tracker stops all polling.
pub struct JobTracker {
    shared: Arc<Shared>,
}

impl JobTracker {
    pub fn new(repo: Arc<dyn JobRepository>, config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                usecases: UseCases::new(repo),
                config,
                jobs: Mutex::new(JobTable::default()),
                events,
                next_seq: AtomicU64::new(0),
                next_generation: AtomicU64::new(0),
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Upload `source`, create a mastering job for it and start tracking the job.
    ///
    /// Validation, upload and creation errors are returned here; later polling
    /// errors only reach subscribers.
    pub async fn submit_and_track(&self, source: &str, file_name: &str) -> Result<String> {
        let audio = self.shared.usecases.upload.execute(source, file_name).await?;
        info!(audio_id = %audio.id, file_name, "audio uploaded");
        let job = self.shared.usecases.create.execute(&audio.id).await?;
        let job_id = job.id.clone();
        info!(job_id = %job_id, audio_id = %audio.id, "mastering job created");
        self.track(job)?;
        Ok(job_id)
    }

    /// Start tracking a job obtained elsewhere.
    ///
    /// An already tracked id is reconciled against `job` and resumes polling
    /// if it is live and was stopped.
    pub fn track(&self, job: MasteringJob) -> Result<()> {
        if job.id.trim().is_empty() {
            return Err(MasteringError::Validation("job id must not be empty".into()));
        }

        let shared = &self.shared;
        let mut table = shared.lock();
        match table.jobs.entry(job.id.clone()) {
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let settled = shared.apply(entry, job);
                if !settled && entry.poll.is_none() {
                    entry.poll = Some(shared.spawn_poller(&entry.snapshot.id));
                }
            }
            Entry::Vacant(slot) => {
                let poll = (!job.is_terminal()).then(|| shared.spawn_poller(&job.id));
                info!(job_id = %job.id, status = %job.status, polling = poll.is_some(), "tracking job");
                shared.emit(JobEvent::Tracked(job.clone()));
                slot.insert(TrackedJob {
                    snapshot: job,
                    seq: shared.next_seq.fetch_add(1, Ordering::Relaxed),
                    poll,
                });
            }
        }
        Ok(())
    }

    /// Snapshots of every held job, newest first.
    pub fn get_tracked_jobs(&self) -> Vec<MasteringJob> {
        let table = self.shared.lock();
        let mut entries: Vec<&TrackedJob> = table.jobs.values().collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries.into_iter().map(|e| e.snapshot.clone()).collect()
    }

    pub fn get(&self, job_id: &str) -> Result<MasteringJob> {
        self.shared
            .lock()
            .jobs
            .get(job_id)
            .map(|e| e.snapshot.clone())
            .ok_or_else(|| MasteringError::Tracking(job_id.to_string()))
    }

    /// Whether a polling task is live for the job.
    pub fn is_polling(&self, job_id: &str) -> bool {
        self.shared
            .lock()
            .jobs
            .get(job_id)
            .is_some_and(|e| e.poll.is_some())
    }

    pub fn active_count(&self) -> usize {
        self.shared
            .lock()
            .jobs
            .values()
            .filter(|e| e.poll.is_some())
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Invoke `on_event` for every event until the returned handle is dropped.
    pub fn on_event<F>(&self, on_event: F) -> Subscription
    where
        F: Fn(JobEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => on_event(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "job event subscriber lagged, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });
        Subscription { token }
    }

    /// Stop polling a job. The snapshot stays readable. Unknown ids are ignored.
    pub fn stop(&self, job_id: &str) {
        if let Some(entry) = self.shared.lock().jobs.get_mut(job_id)
            && entry.cancel_poll()
        {
            info!(job_id, "polling stopped by caller");
        }
    }

    /// Stop polling a job and forget it. Unknown ids are ignored.
    pub fn discard(&self, job_id: &str) {
        if let Some(mut entry) = self.shared.lock().jobs.remove(job_id) {
            entry.cancel_poll();
            info!(job_id, "job discarded");
        }
    }

    /// Cancel every polling task.
    pub fn stop_all(&self) {
        let mut table = self.shared.lock();
        let stopped = table
            .jobs
            .values_mut()
            .map(|e| e.cancel_poll())
            .filter(|&cancelled| cancelled)
            .count();
        if stopped > 0 {
            info!(stopped, "all polling stopped");
        }
    }

    /// Query a tracked job's status right now and apply the result.
    ///
    /// Errors are returned to the caller and do not stop polling. When a poll
    /// for the job is already in flight no request is made and the current
    /// snapshot is returned.
    pub async fn refresh(&self, job_id: &str) -> Result<MasteringJob> {
        let shared = &self.shared;
        let ticket = shared.next_ticket.fetch_add(1, Ordering::Relaxed);
        {
            let mut table = shared.lock();
            let current = table
                .jobs
                .get(job_id)
                .map(|e| e.snapshot.clone())
                .ok_or_else(|| MasteringError::Tracking(job_id.to_string()))?;
            if !table.claim(job_id, ticket) {
                return Ok(current);
            }
        }

        let mut guard = InFlight {
            shared,
            job_id,
            ticket,
            settled: false,
        };
        let result = shared.usecases.status.execute(job_id).await;
        guard.settled = true;

        let mut table = shared.lock();
        table.release(job_id, ticket);
        let entry = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| MasteringError::Tracking(job_id.to_string()))?;
        shared.apply(entry, result?);
        Ok(entry.snapshot.clone())
    }

    /// Download URL for a tracked job's mastered output.
    pub async fn download_reference(&self, job_id: &str) -> Result<String> {
        let job = self.get(job_id)?;
        let Some(output) = job.output_audio_id() else {
            return Err(MasteringError::Download {
                message: format!("output audio for job {job_id} is not ready yet ({})", job.status),
            });
        };
        self.shared.usecases.download.execute(output).await
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.stop_all();
    }
}
