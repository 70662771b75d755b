//! Retry-governed transfer executor.
//!
//! Drives one job's attempts against the transport: timeout-class errors are
//! retried with a visible "stalled" notice, other errors retried after a
//! shorter delay, cancellation aborts immediately at the poll points. A job
//! gets `max_attempts + 1` tries in total. Transient failures never escape
//! this module.

use std::path::Path;
use std::time::Duration;

use crate::broadcast::Broadcaster;
use crate::config::CarrierConfig;
use crate::error::{JobError, TransferError};
use crate::iface::{Sampler, Transport};
use crate::job::{wait_while_paused, Job};

/// Timing and budget for one job's retry loop.
#[derive(Debug, Clone)]
pub struct RetryPlan {
    pub max_attempts: u32,
    pub stall_delay: Duration,
    pub error_delay: Duration,
    pub pause_poll: Duration,
}

impl RetryPlan {
    pub fn from_config(cfg: &CarrierConfig) -> Self {
        Self {
            max_attempts: cfg.max_retry_attempts,
            stall_delay: Duration::from_secs(cfg.stall_retry_delay_secs),
            error_delay: Duration::from_secs(cfg.error_retry_delay_secs),
            pause_poll: Duration::from_millis(cfg.pause_poll_ms),
        }
    }
}

/// Run the transfer until it succeeds, the retry budget runs out, or the job
/// is cancelled. Cancellation before an attempt (including one arriving while
/// paused) aborts without consuming the budget.
pub async fn drive(
    transport: &dyn Transport,
    job: &Job,
    dest: &Path,
    sampler: &mut (dyn Sampler + Send),
    sinks: &Broadcaster,
    plan: &RetryPlan,
) -> Result<(), JobError> {
    let mut attempt = 0u32;
    loop {
        if job.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        wait_while_paused(job, plan.pause_poll).await;
        if job.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        match transport.transfer(job.key(), dest, sampler).await {
            Ok(()) => return Ok(()),
            Err(TransferError::Aborted) => return Err(JobError::Cancelled),
            Err(TransferError::Timeout) => {
                attempt += 1;
                if attempt > plan.max_attempts {
                    return Err(JobError::TransferFatal(
                        "stalled: retry budget exhausted".to_string(),
                    ));
                }
                sinks
                    .broadcast(
                        &format!(
                            "Download stalled. Retrying ({}/{})...",
                            attempt, plan.max_attempts
                        ),
                        None,
                    )
                    .await;
                tokio::time::sleep(plan.stall_delay).await;
            }
            Err(TransferError::Other(e)) => {
                attempt += 1;
                tracing::warn!(
                    job = job.key(),
                    attempt,
                    "transfer error: {e:#}"
                );
                if attempt > plan.max_attempts {
                    return Err(JobError::TransferFatal(format!("{e:#}")));
                }
                tokio::time::sleep(plan.error_delay).await;
            }
        }
    }
}

/// Accept the artifact only if it exists and holds at least 98% of the
/// expected size. Not exact equality: minor source/accounting discrepancies
/// are tolerated.
pub fn validate_size(expected: u64, path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    (meta.len() as u128) * 100 >= (expected as u128) * 98
}
