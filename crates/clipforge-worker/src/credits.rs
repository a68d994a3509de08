//! Credit decrement hook.
//!
//! Billing is an external collaborator; the pipeline calls this hook
//! exactly once per job, after artifacts are registered and before the
//! COMPLETED transition. The policy (how many credits, what happens on
//! insufficient balance) belongs to the implementor.

use std::future::Future;

use tracing::info;

use clipforge_models::{JobId, PrincipalId};

use crate::error::WorkerResult;

/// Sink for per-job credit consumption.
pub trait CreditSink: Send + Sync + 'static {
    /// Record `clips_produced` clips for `principal`'s job. An error
    /// fails the job before it is marked COMPLETED.
    fn debit(
        &self,
        principal: &PrincipalId,
        job_id: &JobId,
        clips_produced: u32,
    ) -> impl Future<Output = WorkerResult<()>> + Send;
}

/// Default sink: log and accept. Used when no billing collaborator is
/// wired in.
#[derive(Debug, Clone, Default)]
pub struct LoggingCreditSink;

impl CreditSink for LoggingCreditSink {
    async fn debit(
        &self,
        principal: &PrincipalId,
        job_id: &JobId,
        clips_produced: u32,
    ) -> WorkerResult<()> {
        info!(
            principal = %principal,
            job_id = %job_id,
            clips = clips_produced,
            "Credit debit recorded"
        );
        Ok(())
    }
}
