use std::any::Any;
use std::sync::Arc;

use cadence_core::DispatchPolicy;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::{
    condition::now_ms,
    entry::JobEntry,
    job::JobContext,
    status::{ExecLog, ExecResult},
};

/// Issues job executions onto the Tokio runtime.
///
/// Each dispatch becomes an independent task; the caller gets the handle but
/// is free to drop it (the task keeps running detached).
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Launch one execution of `entry`. Returns `None` when the policy
    /// refuses because a previous execution is still in flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, entry: &Arc<JobEntry>, ctx: JobContext) -> Option<JoinHandle<()>> {
        if !entry.status().try_reserve(self.policy) {
            debug!(job = %entry.name(), "previous execution still running, skipped");
            return None;
        }

        let span = info_span!("job", name = %entry.name(), run_id = %ctx.run_id());
        let entry = Arc::clone(entry);
        Some(tokio::spawn(execute(entry, ctx).instrument(span)))
    }
}

/// Run the job on its own inner task so a panic surfaces as a `JoinError`
/// instead of tearing down anything else.
async fn execute(entry: Arc<JobEntry>, ctx: JobContext) {
    let created = entry.status().begin();
    let run_id = ctx.run_id();
    let job = entry.job();

    debug!(scheduled_at = %ctx.scheduled_at(), "execution started");
    let outcome = tokio::spawn(async move { job.run(&ctx).await }.in_current_span()).await;
    let updated = now_ms();

    let (status, message) = match outcome {
        Ok(Ok(())) => {
            debug!(duration_ms = updated - created, "execution finished");
            (ExecResult::Ok, None)
        }
        Ok(Err(e)) => {
            warn!(duration_ms = updated - created, error = %e, "execution failed");
            (ExecResult::Error, non_empty(e.to_string()))
        }
        Err(e) if e.is_panic() => {
            let reason = panic_message(e.into_panic());
            error!(reason = %reason, "job panicked");
            (ExecResult::Error, Some(format!("job panicked: {reason}")))
        }
        Err(e) => {
            warn!(error = %e, "execution cancelled");
            (ExecResult::Error, Some(format!("job cancelled: {e}")))
        }
    };

    entry.status().finish(ExecLog {
        run_id,
        created,
        updated,
        status,
        message,
    });
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
