//! Per-job state: status, cooperative pause/cancel flags, watcher handles.
//!
//! Cancellation is flag-based and cooperative: setting it never interrupts an
//! in-flight transfer call, it is observed at the poll points in the retry
//! loop and the progress callback. Status transitions are guarded here so the
//! dispatcher is the only path that promotes Queued -> Active.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::iface::{ControlAction, ControlBar, RequesterId, UiHandle};

/// Job status. `Cancelled` is terminal and idempotent from any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Active,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Failed
        )
    }
}

/// UI bookkeeping for one job: primary message, watcher mirrors, and the last
/// rendered text (so identical re-renders can be suppressed).
#[derive(Debug, Default)]
pub struct JobUi {
    pub primary: Option<UiHandle>,
    pub watchers: Vec<UiHandle>,
    /// Requesters who duplicated the submission while it was still queued;
    /// they get their own mirror message once the transfer starts.
    pub watch_owners: Vec<RequesterId>,
    pub last_text: String,
    pub last_bar: Option<ControlBar>,
}

/// One transfer job. Keyed by canonical resource name, unique among
/// active + queued jobs.
pub struct Job {
    key: String,
    path: PathBuf,
    size: u64,
    owner: RequesterId,
    seq: u64,
    token: String,
    paused: AtomicBool,
    cancelled: AtomicBool,
    status: Mutex<JobStatus>,
    pub ui: Mutex<JobUi>,
}

impl Job {
    pub fn new(key: String, path: PathBuf, size: u64, owner: RequesterId, seq: u64) -> Self {
        let token = crate::ids::short_token(&key);
        Self {
            key,
            path,
            size,
            owner,
            seq,
            token,
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            status: Mutex::new(JobStatus::Queued),
            ui: Mutex::new(JobUi::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn owner(&self) -> RequesterId {
        self.owner
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn status(&self) -> JobStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, next: JobStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Dispatcher-only promotion. Returns false if the job is no longer Queued.
    pub fn promote(&self) -> bool {
        let mut st = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if *st != JobStatus::Queued || self.is_cancelled() {
            return false;
        }
        *st = JobStatus::Active;
        true
    }

    /// Pause an active job. No-op (returns false) if already paused,
    /// cancelled, or not active.
    pub fn mark_paused(&self) -> bool {
        if self.is_cancelled() || self.is_paused() {
            return false;
        }
        let mut st = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if *st != JobStatus::Active {
            return false;
        }
        *st = JobStatus::Paused;
        self.paused.store(true, Ordering::Relaxed);
        true
    }

    /// Resume a paused job. No-op (returns false) if not paused or cancelled.
    pub fn mark_resumed(&self) -> bool {
        if self.is_cancelled() || !self.is_paused() {
            return false;
        }
        let mut st = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if *st == JobStatus::Paused {
            *st = JobStatus::Active;
        }
        self.paused.store(false, Ordering::Relaxed);
        true
    }

    /// Idempotent, terminal. Valid from any state.
    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.set_status(JobStatus::Cancelled);
    }

    /// Successful validated transfer.
    pub fn complete(&self) {
        let mut st = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if !st.is_terminal() {
            *st = JobStatus::Completed;
        }
    }

    /// Retry budget exhausted or fatal error.
    pub fn fail(&self) {
        let mut st = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if !st.is_terminal() {
            *st = JobStatus::Failed;
        }
    }

    /// True while the job holds a ledger reservation (Queued or Active/Paused).
    pub fn holds_reservation(&self) -> bool {
        !self.status().is_terminal()
    }

    /// Controls to offer on this job's messages right now. None once cancelled
    /// (terminal messages carry no controls).
    pub fn control_bar(&self) -> Option<ControlBar> {
        let actions = match self.status() {
            JobStatus::Queued => vec![ControlAction::Cancel],
            JobStatus::Active => vec![ControlAction::Pause, ControlAction::Cancel],
            JobStatus::Paused => vec![ControlAction::Resume, ControlAction::Cancel],
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Failed => return None,
        };
        Some(ControlBar {
            token: self.token.clone(),
            actions,
        })
    }
}

/// Block cooperatively while the job is paused, waking every `poll` to
/// re-check. Returns promptly once resumed or cancelled; the caller must
/// re-check the cancelled flag after waking.
pub async fn wait_while_paused(job: &Job, poll: Duration) {
    while job.is_paused() && !job.is_cancelled() {
        tokio::time::sleep(poll).await;
    }
}
