//! Job scheduler: admission, priority dispatch, retries, timeouts,
//! cancellation and crash recovery.
//!
//! One logical FIFO per priority class. The dispatcher hands jobs to the
//! worker pool over a bounded channel whenever a slot is free, skipping
//! (but not reordering) jobs whose principal is at its concurrency cap.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use clipforge_blob::BlobStore;
use clipforge_models::{
    ErrorKind, Job, JobError, JobId, JobStatus, PrincipalId, PriorityClass,
};
use clipforge_store::{Store, StoreError};

use crate::backoff::RetryPolicy;
use crate::cancel::{CancelFlag, CancelReason};
use crate::error::{QueueError, QueueResult};
use crate::events::EventBus;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Max concurrent RUNNING jobs in this process
    pub worker_concurrency: usize,
    /// Max concurrent RUNNING jobs per principal
    pub per_principal_concurrency: usize,
    /// Max processing attempts per job
    pub max_attempts: u32,
    /// Retry backoff policy
    pub retry: RetryPolicy,
    /// Global per-job deadline
    pub job_deadline: Duration,
    /// Worker lease TTL
    pub lease_ttl: Duration,
    /// Dispatcher tick interval
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            per_principal_concurrency: 2,
            max_attempts: 3,
            retry: RetryPolicy::default(),
            job_deadline: Duration::from_secs(1800),
            lease_ttl: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_concurrency: env_parse("WORKER_CONCURRENCY", defaults.worker_concurrency),
            per_principal_concurrency: env_parse(
                "PER_PRINCIPAL_CONCURRENCY",
                defaults.per_principal_concurrency,
            ),
            max_attempts: env_parse("MAX_ATTEMPTS", defaults.max_attempts),
            retry: RetryPolicy {
                base: Duration::from_secs(env_parse("RETRY_BASE_SECONDS", 30u64)),
                factor: env_parse("RETRY_FACTOR", 2.0f64),
                jitter: env_parse("RETRY_JITTER", 0.25f64),
            },
            job_deadline: Duration::from_secs(env_parse("JOB_DEADLINE_SECONDS", 1800u64)),
            lease_ttl: Duration::from_secs(env_parse("WORKER_LEASE_TTL_SECS", 60u64)),
            tick_interval: defaults.tick_interval,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// A job handed to the worker pool.
#[derive(Clone)]
pub struct JobAssignment {
    pub job: Job,
    pub cancel: CancelFlag,
    pub lease: String,
}

/// Terminal report from the worker for one attempt.
#[derive(Debug)]
pub enum JobOutcome {
    /// Worker wrote the COMPLETED row (results + artifacts) itself
    Completed,
    /// Attempt failed with a classified error
    Failed(JobError),
    /// Worker observed a user cancellation and cleaned up
    Cancelled,
}

#[derive(Clone)]
struct QueueEntry {
    job_id: JobId,
    principal_id: PrincipalId,
    class: PriorityClass,
}

struct RunningJob {
    principal_id: PrincipalId,
    cancel: CancelFlag,
    deadline: Instant,
}

#[derive(Default)]
struct State {
    interactive: VecDeque<QueueEntry>,
    batch: VecDeque<QueueEntry>,
    /// Retry entries not yet visible, ordered by due time
    delayed: Vec<(Instant, QueueEntry)>,
    running: HashMap<String, RunningJob>,
    per_principal: HashMap<String, usize>,
}

impl State {
    fn queue_for(&mut self, class: PriorityClass) -> &mut VecDeque<QueueEntry> {
        match class {
            PriorityClass::Interactive => &mut self.interactive,
            PriorityClass::Batch => &mut self.batch,
        }
    }

    fn remove_queued(&mut self, job_id: &JobId) -> bool {
        let before = self.interactive.len() + self.batch.len() + self.delayed.len();
        self.interactive.retain(|e| &e.job_id != job_id);
        self.batch.retain(|e| &e.job_id != job_id);
        self.delayed.retain(|(_, e)| &e.job_id != job_id);
        before != self.interactive.len() + self.batch.len() + self.delayed.len()
    }

    /// First dispatchable entry, honoring per-principal caps without
    /// reordering: capped entries keep their positions.
    fn take_eligible(&mut self, per_principal_cap: usize) -> Option<QueueEntry> {
        for class in [PriorityClass::Interactive, PriorityClass::Batch] {
            let queue = match class {
                PriorityClass::Interactive => &self.interactive,
                PriorityClass::Batch => &self.batch,
            };
            let position = queue.iter().position(|e| {
                self.per_principal
                    .get(e.principal_id.as_str())
                    .copied()
                    .unwrap_or(0)
                    < per_principal_cap
            });
            if let Some(pos) = position {
                return self.queue_for(class).remove(pos);
            }
        }
        None
    }
}

/// The scheduler. Shared by the HTTP surface (submit/cancel) and the
/// worker pool (outcome reports, heartbeats).
pub struct Scheduler {
    config: SchedulerConfig,
    store: Store,
    blobs: BlobStore,
    events: EventBus,
    state: Mutex<State>,
    assign_tx: mpsc::Sender<JobAssignment>,
    wake: Notify,
}

impl Scheduler {
    /// Build a scheduler and the assignment channel the worker pool
    /// consumes. Call [`Scheduler::run`] on a background task.
    pub fn new(
        config: SchedulerConfig,
        store: Store,
        blobs: BlobStore,
        events: EventBus,
    ) -> (Arc<Self>, mpsc::Receiver<JobAssignment>) {
        let (assign_tx, assign_rx) = mpsc::channel(config.worker_concurrency.max(1));
        let scheduler = Arc::new(Self {
            config,
            store,
            blobs,
            events,
            state: Mutex::new(State::default()),
            assign_tx,
            wake: Notify::new(),
        });
        (scheduler, assign_rx)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Admit a PENDING job (row must already be persisted) into its
    /// priority class.
    pub async fn submit(&self, job: &Job) -> QueueResult<()> {
        if job.status != JobStatus::Pending {
            return Err(QueueError::enqueue_failed(format!(
                "job {} is {}, not PENDING",
                job.id, job.status
            )));
        }
        let entry = QueueEntry {
            job_id: job.id.clone(),
            principal_id: job.principal_id.clone(),
            class: job.priority,
        };
        {
            let mut state = self.state.lock().await;
            state.queue_for(entry.class).push_back(entry);
        }
        self.events.publish_job(job).await;
        debug!(job_id = %job.id, class = job.priority.as_str(), "Job enqueued");
        self.wake.notify_one();
        Ok(())
    }

    /// Cancel a job for its owner.
    ///
    /// PENDING jobs are finalized immediately; RUNNING jobs get their
    /// flag tripped and finalize at the worker's next checkpoint.
    /// Cancelling a terminal job is a no-op.
    pub async fn cancel(&self, job_id: &JobId, principal: &PrincipalId) -> QueueResult<()> {
        let job = self.store.jobs.get_owned(job_id, principal).await?;

        match job.status {
            JobStatus::Pending => {
                {
                    let mut state = self.state.lock().await;
                    state.remove_queued(job_id);
                }
                let updated = self
                    .store
                    .jobs
                    .update(job_id, |row| {
                        if row.status == JobStatus::Pending {
                            row.cancel();
                        }
                        Ok(row.clone())
                    })
                    .await?;
                self.events.publish_job(&updated).await;
                self.schedule_ring_retirement(job_id);
                info!(job_id = %job_id, "Cancelled pending job");
            }
            JobStatus::Running => {
                let state = self.state.lock().await;
                if let Some(running) = state.running.get(job_id.as_str()) {
                    running.cancel.cancel(CancelReason::User);
                    info!(job_id = %job_id, "Cancellation requested for running job");
                }
            }
            // Idempotent on terminal states
            _ => {}
        }
        Ok(())
    }

    /// Renew the lease for a running job. Ignores mismatched leases
    /// (a newer attempt owns the row).
    pub async fn heartbeat(&self, job_id: &JobId, lease: &str) -> QueueResult<()> {
        let lease = lease.to_string();
        let ttl = chrono::Duration::from_std(self.config.lease_ttl).unwrap_or_else(|_| chrono::Duration::seconds(60));
        self.store
            .jobs
            .update(job_id, move |row| {
                if row.worker_lease.as_deref() == Some(lease.as_str()) {
                    row.lease_expires_at = Some(Utc::now() + ttl);
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Worker report for a finished attempt.
    pub async fn on_outcome(&self, job_id: &JobId, outcome: JobOutcome) -> QueueResult<()> {
        // Free the slot first so a completion can immediately unblock a
        // skipped head-of-class job.
        {
            let mut state = self.state.lock().await;
            if let Some(running) = state.running.remove(job_id.as_str()) {
                let key = running.principal_id.as_str().to_string();
                if let Some(count) = state.per_principal.get_mut(&key) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        state.per_principal.remove(&key);
                    }
                }
            }
        }

        match outcome {
            JobOutcome::Completed => {
                let job = self.store.jobs.get(job_id).await?;
                self.events.publish_job(&job).await;
                info!(job_id = %job_id, "Job completed");
            }
            JobOutcome::Cancelled => {
                let updated = self
                    .store
                    .jobs
                    .update(job_id, |row| {
                        if !row.status.is_terminal() {
                            row.cancel();
                        }
                        Ok(row.clone())
                    })
                    .await?;
                self.events.publish_job(&updated).await;
                info!(job_id = %job_id, "Job cancelled");
            }
            JobOutcome::Failed(error) => {
                self.handle_failure(job_id, error).await?;
            }
        }

        // Terminal rings stay around for late subscribers, then retire.
        if let Ok(job) = self.store.jobs.get(job_id).await {
            if job.status.is_terminal() {
                self.schedule_ring_retirement(job_id);
            }
        }

        self.wake.notify_one();
        Ok(())
    }

    fn schedule_ring_retirement(&self, job_id: &JobId) {
        let events = self.events.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(crate::events::RING_RETENTION_SECS)).await;
            events.retire(&job_id).await;
        });
    }

    async fn handle_failure(&self, job_id: &JobId, error: JobError) -> QueueResult<()> {
        let job = self.store.jobs.get(job_id).await?;
        let retryable = error.kind.is_retryable() && job.attempts < self.config.max_attempts;

        if retryable {
            let updated = self
                .store
                .jobs
                .update(job_id, |row| {
                    row.requeue();
                    Ok(row.clone())
                })
                .await?;
            let delay = self.config.retry.delay(job.attempts);
            let entry = QueueEntry {
                job_id: job_id.clone(),
                principal_id: updated.principal_id.clone(),
                class: updated.priority,
            };
            {
                let mut state = self.state.lock().await;
                state.delayed.push((Instant::now() + delay, entry));
                state.delayed.sort_by_key(|(due, _)| *due);
            }
            self.events.publish_job(&updated).await;
            warn!(
                job_id = %job_id,
                attempts = job.attempts,
                delay_secs = delay.as_secs(),
                kind = %error.kind,
                "Retryable failure, re-enqueued with backoff"
            );
        } else {
            let updated = self
                .store
                .jobs
                .update(job_id, move |row| {
                    row.fail(error);
                    Ok(row.clone())
                })
                .await?;
            self.events.publish_job(&updated).await;
            warn!(job_id = %job_id, "Job failed terminally");
        }
        Ok(())
    }

    /// Startup recovery: RUNNING rows with no live lease go back to
    /// PENDING when they still have attempts and their input blob exists;
    /// otherwise they fail with `worker-lost`. Surviving PENDING rows are
    /// re-admitted.
    pub async fn recover(&self) -> QueueResult<usize> {
        let now = Utc::now();
        let mut recovered = 0;

        for job in self.store.jobs.all().await {
            match job.status {
                JobStatus::Running if job.lease_expired(now) => {
                    let resumable = job.attempts < self.config.max_attempts
                        && self.blobs.exists(&job.input_blob_id).await;
                    if resumable {
                        let updated = self
                            .store
                            .jobs
                            .update(&job.id, |row| {
                                row.requeue();
                                Ok(row.clone())
                            })
                            .await?;
                        self.submit(&updated).await?;
                        recovered += 1;
                        info!(job_id = %job.id, "Recovered orphaned running job");
                    } else {
                        let updated = self
                            .store
                            .jobs
                            .update(&job.id, |row| {
                                row.fail(JobError::new(
                                    ErrorKind::WorkerLost,
                                    "worker lost and job is not resumable",
                                ));
                                Ok(row.clone())
                            })
                            .await?;
                        self.events.publish_job(&updated).await;
                        warn!(job_id = %job.id, "Orphaned job failed as worker-lost");
                    }
                }
                JobStatus::Pending => {
                    self.submit(&job).await?;
                    recovered += 1;
                }
                _ => {}
            }
        }

        Ok(recovered)
    }

    /// Dispatcher loop: promotes due retries, enforces deadlines and
    /// fills free worker slots. Runs until the assignment channel closes.
    pub async fn run(self: Arc<Self>) {
        info!(
            slots = self.config.worker_concurrency,
            per_principal = self.config.per_principal_concurrency,
            "Scheduler dispatcher started"
        );
        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }

            self.promote_due_retries().await;
            self.enforce_deadlines().await;
            if self.dispatch_ready().await.is_err() {
                info!("Assignment channel closed, dispatcher stopping");
                return;
            }
        }
    }

    async fn promote_due_retries(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let mut due = Vec::new();
        state.delayed.retain(|(when, entry)| {
            if *when <= now {
                due.push(entry.clone());
                false
            } else {
                true
            }
        });
        for entry in due {
            debug!(job_id = %entry.job_id, "Retry delay elapsed, job visible again");
            state.queue_for(entry.class).push_back(entry);
        }
    }

    async fn enforce_deadlines(&self) {
        let state = self.state.lock().await;
        let now = Instant::now();
        for (job_id, running) in state.running.iter() {
            if running.deadline <= now && !running.cancel.is_cancelled() {
                warn!(job_id = %job_id, "Job deadline exceeded, requesting stop");
                running.cancel.cancel(CancelReason::Deadline);
            }
        }
    }

    async fn dispatch_ready(&self) -> Result<(), ()> {
        loop {
            let entry = {
                let mut state = self.state.lock().await;
                if state.running.len() >= self.config.worker_concurrency {
                    return Ok(());
                }
                let cap = self.config.per_principal_concurrency;
                match state.take_eligible(cap) {
                    Some(e) => e,
                    None => return Ok(()),
                }
            };

            let lease = uuid::Uuid::new_v4().to_string();
            let lease_ttl = chrono::Duration::from_std(self.config.lease_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));

            // Claim the row; a job cancelled while queued loses the race
            // here and is simply skipped.
            let claim = {
                let lease = lease.clone();
                self.store
                    .jobs
                    .update(&entry.job_id, move |row| {
                        if row.status != JobStatus::Pending {
                            return Err(StoreError::conflict("job no longer pending"));
                        }
                        row.begin_attempt(lease, Utc::now() + lease_ttl);
                        Ok(row.clone())
                    })
                    .await
            };

            let job = match claim {
                Ok(job) => job,
                Err(e) => {
                    debug!(job_id = %entry.job_id, error = %e, "Skipping undispatchable job");
                    continue;
                }
            };

            let cancel = CancelFlag::new();
            {
                let mut state = self.state.lock().await;
                state.running.insert(
                    job.id.as_str().to_string(),
                    RunningJob {
                        principal_id: entry.principal_id.clone(),
                        cancel: cancel.clone(),
                        deadline: Instant::now() + self.config.job_deadline,
                    },
                );
                *state
                    .per_principal
                    .entry(entry.principal_id.as_str().to_string())
                    .or_insert(0) += 1;
            }

            self.events.publish_job(&job).await;
            debug!(job_id = %job.id, attempt = job.attempts, "Dispatching job");

            let assignment = JobAssignment { job, cancel, lease };
            if self.assign_tx.send(assignment).await.is_err() {
                return Err(());
            }
        }
    }

    /// Queue depths (interactive, batch, delayed); used by metrics.
    pub async fn queue_depth(&self) -> (usize, usize, usize) {
        let state = self.state.lock().await;
        (state.interactive.len(), state.batch.len(), state.delayed.len())
    }

    /// Number of currently running jobs.
    pub async fn running_count(&self) -> usize {
        self.state.lock().await.running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_blob::BlobConfig;
    use clipforge_models::JobOptions;
    use clipforge_store::StoreConfig;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Store,
        scheduler: Arc<Scheduler>,
        assignments: mpsc::Receiver<JobAssignment>,
        input: clipforge_models::BlobId,
    }

    async fn fixture(config: SchedulerConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Store::open(StoreConfig {
            root: dir.path().join("store"),
        })
        .await
        .unwrap();
        let blobs = BlobStore::open(BlobConfig {
            root: dir.path().join("blobs"),
        })
        .await
        .unwrap();
        let input = blobs.put_bytes(b"fake video").await.unwrap().id;
        let events = EventBus::new(128);
        let (scheduler, assignments) = Scheduler::new(config, store.clone(), blobs, events);
        Fixture {
            _dir: dir,
            store,
            scheduler,
            assignments,
            input,
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            worker_concurrency: 2,
            per_principal_concurrency: 1,
            max_attempts: 3,
            retry: RetryPolicy {
                base: Duration::from_millis(20),
                factor: 2.0,
                jitter: 0.0,
            },
            job_deadline: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(60),
            tick_interval: Duration::from_millis(10),
        }
    }

    async fn submit_job(f: &Fixture, principal: &str, class: PriorityClass) -> Job {
        let mut job = Job::new(
            PrincipalId::from(principal),
            f.input.clone(),
            JobOptions::default(),
            class,
            3,
        );
        job.max_attempts = 3;
        f.store.jobs.create(&job).await.unwrap();
        f.scheduler.submit(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn interactive_dispatches_before_batch() {
        let mut f = fixture(test_config()).await;
        let batch = submit_job(&f, "user-a", PriorityClass::Batch).await;
        let interactive = submit_job(&f, "user-b", PriorityClass::Interactive).await;

        tokio::spawn(Arc::clone(&f.scheduler).run());

        let first = f.assignments.recv().await.unwrap();
        let second = f.assignments.recv().await.unwrap();
        assert_eq!(first.job.id, interactive.id);
        assert_eq!(second.job.id, batch.id);
        assert_eq!(first.job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn per_principal_cap_skips_without_reordering() {
        let mut f = fixture(test_config()).await;
        let a1 = submit_job(&f, "user-a", PriorityClass::Batch).await;
        let a2 = submit_job(&f, "user-a", PriorityClass::Batch).await;
        let b1 = submit_job(&f, "user-b", PriorityClass::Batch).await;

        tokio::spawn(Arc::clone(&f.scheduler).run());

        // user-a capped at 1, so the second slot goes to user-b.
        let first = f.assignments.recv().await.unwrap();
        let second = f.assignments.recv().await.unwrap();
        assert_eq!(first.job.id, a1.id);
        assert_eq!(second.job.id, b1.id);

        // Completing a1 unblocks a2 at head-of-class.
        f.scheduler
            .store
            .jobs
            .update(&a1.id, |row| {
                row.complete(clipforge_models::JobResults {
                    total_clips: 1,
                    captions_added: false,
                    total_duration: 15.0,
                });
                Ok(())
            })
            .await
            .unwrap();
        f.scheduler
            .on_outcome(&a1.id, JobOutcome::Completed)
            .await
            .unwrap();

        let third = f.assignments.recv().await.unwrap();
        assert_eq!(third.job.id, a2.id);
    }

    #[tokio::test]
    async fn retryable_failure_reenqueues_with_attempts() {
        let mut f = fixture(test_config()).await;
        let job = submit_job(&f, "user-a", PriorityClass::Interactive).await;

        tokio::spawn(Arc::clone(&f.scheduler).run());

        let first = f.assignments.recv().await.unwrap();
        assert_eq!(first.job.attempts, 1);

        f.scheduler
            .on_outcome(
                &job.id,
                JobOutcome::Failed(JobError::new(ErrorKind::TransientDependency, "asr down")),
            )
            .await
            .unwrap();

        let retry = f.assignments.recv().await.unwrap();
        assert_eq!(retry.job.id, job.id);
        assert_eq!(retry.job.attempts, 2);
    }

    #[tokio::test]
    async fn non_retryable_failure_is_terminal() {
        let mut f = fixture(test_config()).await;
        let job = submit_job(&f, "user-a", PriorityClass::Interactive).await;

        tokio::spawn(Arc::clone(&f.scheduler).run());
        let _ = f.assignments.recv().await.unwrap();

        f.scheduler
            .on_outcome(
                &job.id,
                JobOutcome::Failed(JobError::new(ErrorKind::Unreadable, "no video stream")),
            )
            .await
            .unwrap();

        let row = f.store.jobs.get(&job.id).await.unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert!(!row.error.as_ref().unwrap().retryable);
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_fails_terminally() {
        let mut f = fixture(test_config()).await;
        let job = submit_job(&f, "user-a", PriorityClass::Interactive).await;

        tokio::spawn(Arc::clone(&f.scheduler).run());

        for _ in 0..3 {
            let assignment = f.assignments.recv().await.unwrap();
            f.scheduler
                .on_outcome(
                    &assignment.job.id,
                    JobOutcome::Failed(JobError::new(ErrorKind::TransientIo, "flaky disk")),
                )
                .await
                .unwrap();
        }

        // Attempts are exhausted; the job must not be re-enqueued.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let row = f.store.jobs.get(&job.id).await.unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert_eq!(row.attempts, 3);
        assert!(row.error.as_ref().unwrap().retryable);
    }

    #[tokio::test]
    async fn cancel_pending_is_immediate_and_idempotent() {
        let f = fixture(test_config()).await;
        let job = submit_job(&f, "user-a", PriorityClass::Batch).await;

        // Dispatcher not running: job stays queued.
        f.scheduler
            .cancel(&job.id, &PrincipalId::from("user-a"))
            .await
            .unwrap();
        let row = f.store.jobs.get(&job.id).await.unwrap();
        assert_eq!(row.status, JobStatus::Cancelled);

        // Second cancel is a no-op.
        f.scheduler
            .cancel(&job.id, &PrincipalId::from("user-a"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_requires_ownership() {
        let f = fixture(test_config()).await;
        let job = submit_job(&f, "user-a", PriorityClass::Batch).await;
        assert!(f
            .scheduler
            .cancel(&job.id, &PrincipalId::from("user-b"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn cancel_running_trips_the_flag() {
        let mut f = fixture(test_config()).await;
        let job = submit_job(&f, "user-a", PriorityClass::Interactive).await;

        tokio::spawn(Arc::clone(&f.scheduler).run());
        let assignment = f.assignments.recv().await.unwrap();

        f.scheduler
            .cancel(&job.id, &PrincipalId::from("user-a"))
            .await
            .unwrap();
        assert_eq!(assignment.cancel.get(), Some(CancelReason::User));

        // Worker observes the flag, cleans up and reports.
        f.scheduler
            .on_outcome(&job.id, JobOutcome::Cancelled)
            .await
            .unwrap();
        let row = f.store.jobs.get(&job.id).await.unwrap();
        assert_eq!(row.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn recovery_requeues_orphans_and_fails_exhausted_ones() {
        let mut f = fixture(test_config()).await;

        // Orphan with attempts remaining: RUNNING, expired lease.
        let fresh = submit_job(&f, "user-a", PriorityClass::Batch).await;
        f.store
            .jobs
            .update(&fresh.id, |row| {
                row.begin_attempt("dead-lease".into(), Utc::now() - chrono::Duration::seconds(5));
                Ok(())
            })
            .await
            .unwrap();

        // Orphan out of attempts.
        let exhausted = submit_job(&f, "user-b", PriorityClass::Batch).await;
        f.store
            .jobs
            .update(&exhausted.id, |row| {
                row.attempts = 3;
                row.begin_attempt("dead-lease".into(), Utc::now() - chrono::Duration::seconds(5));
                row.attempts = 3;
                Ok(())
            })
            .await
            .unwrap();

        // Clear the in-memory queues to simulate a fresh process.
        {
            let mut state = f.scheduler.state.lock().await;
            state.interactive.clear();
            state.batch.clear();
        }

        f.scheduler.recover().await.unwrap();

        let fresh_row = f.store.jobs.get(&fresh.id).await.unwrap();
        assert_eq!(fresh_row.status, JobStatus::Pending);

        let exhausted_row = f.store.jobs.get(&exhausted.id).await.unwrap();
        assert_eq!(exhausted_row.status, JobStatus::Failed);
        assert_eq!(
            exhausted_row.error.as_ref().unwrap().kind,
            ErrorKind::WorkerLost
        );

        tokio::spawn(Arc::clone(&f.scheduler).run());
        let assignment = f.assignments.recv().await.unwrap();
        assert_eq!(assignment.job.id, fresh.id);
    }
}
