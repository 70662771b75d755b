//! Typed outcomes for job execution and the transport surface.
//!
//! Transient transport failures never leave the retry executor; everything in
//! `JobError` is a terminal outcome that is reported exactly once to the
//! primary handle and all watchers before the job is removed from bookkeeping.

use thiserror::Error;

/// Terminal outcome of a job that did not complete.
#[derive(Debug, Error)]
pub enum JobError {
    /// Space still insufficient after eviction. Carries the detail the
    /// requester must see verbatim (required floor, current projection).
    #[error("not enough disk space: projected free {projected_mb}MB, need >= {required_mb}MB")]
    AdmissionDenied { required_mb: u64, projected_mb: i64 },

    /// Retry budget exhausted or a non-retryable transport error.
    #[error("transfer failed: {0}")]
    TransferFatal(String),

    /// Artifact below 98% of the expected size after a nominally successful transfer.
    #[error("incomplete artifact: expected {expected} bytes, got {actual}")]
    ValidationFailed { expected: u64, actual: u64 },

    /// Cooperative cancellation. Not an error in the reporting sense; it
    /// short-circuits retries and validation and triggers artifact cleanup.
    #[error("cancelled")]
    Cancelled,

    /// Forced cancellation during graceful drain. Same cleanup path as `Cancelled`.
    #[error("cancelled (shutdown)")]
    ShutdownAbort,
}

/// Error raised by the external transfer capability for one attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Timeout-class stall; retried with the stall delay.
    #[error("transfer timed out")]
    Timeout,

    /// The progress callback asked the transport to stop (cancellation
    /// observed at a sample point). Never retried.
    #[error("transfer aborted from progress callback")]
    Aborted,

    /// Anything else; retried with the short error delay until the budget runs out.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Clip an error message for UI surfaces (char-boundary safe).
pub fn truncate_message(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() <= max_chars {
        return msg.to_string();
    }
    msg.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_messages() {
        assert_eq!(truncate_message("boom", 200), "boom");
    }

    #[test]
    fn truncate_clips_long_messages() {
        let long = "x".repeat(300);
        assert_eq!(truncate_message(&long, 200).len(), 200);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "é".repeat(10);
        let t = truncate_message(&s, 4);
        assert_eq!(t.chars().count(), 4);
    }

    #[test]
    fn admission_denied_message_carries_detail() {
        let e = JobError::AdmissionDenied {
            required_mb: 200,
            projected_mb: 150,
        };
        let msg = e.to_string();
        assert!(msg.contains("150"));
        assert!(msg.contains("200"));
    }
}
