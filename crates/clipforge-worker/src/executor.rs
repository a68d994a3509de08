//! Worker pool: consumes scheduler assignments and drives the pipeline.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use clipforge_queue::{JobAssignment, JobOutcome, Scheduler};

use crate::backend::MediaBackend;
use crate::credits::CreditSink;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{cleanup_attempt, run_pipeline, ProcessingContext};

/// Executes assignments from the scheduler. Concurrency is bounded by
/// the scheduler's slot accounting; each assignment runs on its own
/// task.
pub struct JobExecutor<B, C> {
    ctx: Arc<ProcessingContext<B>>,
    scheduler: Arc<Scheduler>,
    credits: Arc<C>,
}

impl<B: MediaBackend, C: CreditSink> JobExecutor<B, C> {
    pub fn new(ctx: Arc<ProcessingContext<B>>, scheduler: Arc<Scheduler>, credits: Arc<C>) -> Self {
        Self {
            ctx,
            scheduler,
            credits,
        }
    }

    /// Run until the assignment channel closes.
    pub async fn run(self: Arc<Self>, mut assignments: mpsc::Receiver<JobAssignment>) {
        info!("Worker pool started");
        while let Some(assignment) = assignments.recv().await {
            let executor = Arc::clone(&self);
            tokio::spawn(async move {
                executor.process(assignment).await;
            });
        }
        info!("Assignment channel closed, worker pool stopping");
    }

    async fn process(&self, assignment: JobAssignment) {
        let job = assignment.job;
        let job_id = job.id.clone();
        let attempt = job.attempts;

        info!(job_id = %job_id, attempt, "Processing job");
        metrics::counter!("clipforge_jobs_started_total").increment(1);
        let started = Instant::now();

        // Renew the lease while the stage machine runs.
        let heartbeat = {
            let scheduler = Arc::clone(&self.scheduler);
            let job_id = job_id.clone();
            let lease = assignment.lease.clone();
            let interval = self.ctx.config.heartbeat_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // immediate first tick
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.heartbeat(&job_id, &lease).await {
                        warn!(job_id = %job_id, error = %e, "Lease heartbeat failed");
                    }
                }
            })
        };

        let result = run_pipeline(&self.ctx, &job, &assignment.cancel).await;
        heartbeat.abort();

        let outcome = match result {
            Ok(results) => match self.finish_success(&job, results).await {
                Ok(()) => {
                    metrics::counter!("clipforge_jobs_completed_total").increment(1);
                    JobOutcome::Completed
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Completion bookkeeping failed");
                    JobOutcome::Failed(e.to_job_error())
                }
            },
            Err(WorkerError::Cancelled) => {
                info!(job_id = %job_id, "Cancellation observed, cleaning up");
                JobOutcome::Cancelled
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, kind = %e.error_kind(), "Attempt failed");
                metrics::counter!("clipforge_jobs_failed_total").increment(1);
                JobOutcome::Failed(e.to_job_error())
            }
        };

        // Intermediates for this attempt are always removed; the blob
        // store holds everything that should outlive the attempt.
        cleanup_attempt(&self.ctx.config, job_id.as_str(), attempt).await;

        metrics::histogram!("clipforge_job_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = self.scheduler.on_outcome(&job_id, outcome).await {
            error!(job_id = %job_id, error = %e, "Failed to report job outcome");
        }
    }

    /// Credit hook, then the COMPLETED transition.
    async fn finish_success(
        &self,
        job: &clipforge_models::Job,
        results: clipforge_models::JobResults,
    ) -> WorkerResult<()> {
        self.credits
            .debit(&job.principal_id, &job.id, results.total_clips)
            .await?;
        self.ctx
            .store
            .jobs
            .update(&job.id, move |row| {
                row.complete(results);
                Ok(())
            })
            .await?;
        Ok(())
    }
}
