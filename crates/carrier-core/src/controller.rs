//! The controller: owns the job table, the short-token lookup, the ledger and
//! the admission queue, and drives jobs from submission to terminal cleanup.
//!
//! One instance per process, passed by reference to every component; there is
//! no ambient global state. Shared maps are guarded by narrow mutex sections
//! that never hold across an await. Terminal cleanup is unconditional: every
//! outcome (success, failure, cancellation) removes the job from the ledger
//! reservation, the token lookup, and the job table.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::broadcast::Broadcaster;
use crate::config::CarrierConfig;
use crate::error::{truncate_message, JobError};
use crate::iface::{ControlAction, Notifier, RequesterId, Transport, UiChannel};
use crate::job::{Job, JobStatus};
use crate::ledger::{remove_empty_parents, Ledger, SpaceCheck};
use crate::progress::{humanize_size, ReportIntervals, Reporter};
use crate::queue::AdmissionQueue;
use crate::retry::{self, RetryPlan};

/// An inbound transfer request: canonical key, expected size, owning requester.
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: String,
    pub size: u64,
    pub owner: RequesterId,
}

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A slot was free; the transfer is starting.
    Started,
    /// Enqueued at this 1-based waiting position.
    Queued(usize),
    /// Duplicate from a different requester; attached as a watcher.
    AttachedWatcher,
    /// Duplicate from the same requester of an active job.
    AlreadyActive,
    /// Duplicate from the same requester of a queued job.
    AlreadyQueued,
    /// Destination already holds a complete artifact.
    SkippedExisting,
    /// Space insufficient even after eviction.
    Denied,
    /// The previous job for this key is terminal but not yet cleaned up.
    CleanupPending,
    /// Controller is shutting down; no new work accepted.
    ShuttingDown,
}

/// Point-in-time view of the controller for status rendering.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub limit: usize,
    /// Active (and paused) job keys in submission order.
    pub active: Vec<String>,
    /// Waiting job keys in FIFO order.
    pub queued: Vec<String>,
}

pub struct Controller {
    cfg: CarrierConfig,
    ledger: Ledger,
    queue: AdmissionQueue,
    jobs: Mutex<HashMap<String, Arc<Job>>>,
    tokens: Mutex<HashMap<String, String>>,
    seq: AtomicU64,
    shutting_down: AtomicBool,
    transport: Arc<dyn Transport>,
    ui: Arc<dyn UiChannel>,
    notifier: Arc<dyn Notifier>,
}

impl Controller {
    pub fn new(
        cfg: CarrierConfig,
        transport: Arc<dyn Transport>,
        ui: Arc<dyn UiChannel>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let ledger = Ledger::new(cfg.download_dir.clone(), cfg.min_free_disk_mb);
        Self::with_ledger(cfg, ledger, transport, ui, notifier)
    }

    /// Construction with an explicit ledger (tests inject a probed one).
    pub fn with_ledger(
        cfg: CarrierConfig,
        ledger: Ledger,
        transport: Arc<dyn Transport>,
        ui: Arc<dyn UiChannel>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: AdmissionQueue::new(cfg.max_concurrent),
            ledger,
            cfg,
            jobs: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
            transport,
            ui,
            notifier,
        })
    }

    /// Start the dispatch loop. Call once after construction; it ends on its
    /// own when `stop` closes the queue.
    pub fn start(self: &Arc<Self>) {
        let Some(mut rx) = self.queue.take_receiver() else {
            return;
        };
        let ctrl = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(key) = rx.recv().await {
                let job = ctrl.jobs_lock().get(&key).cloned();
                let Some(job) = job else {
                    // Cancelled while waiting and already cleaned up.
                    ctrl.queue.take_waiting(&key);
                    continue;
                };
                if job.is_cancelled() {
                    ctrl.queue.take_waiting(&key);
                    ctrl.finalize(&job);
                    continue;
                }
                // Spawn rather than await: the loop keeps pulling while each
                // execution waits on its own admission slot.
                let ctrl2 = Arc::clone(&ctrl);
                tokio::spawn(async move {
                    ctrl2.run_with_slot(job, true).await;
                });
            }
            tracing::debug!("dispatch loop ended");
        });
    }

    fn jobs_lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tokens_lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sinks(&self, job: &Arc<Job>) -> Broadcaster {
        Broadcaster::new(Arc::clone(&self.ui), Arc::clone(job))
    }

    /// Sum of expected sizes over all jobs still holding a reservation,
    /// optionally excluding one key (when re-validating that job itself).
    fn reserved_bytes(&self, exclude: Option<&str>) -> u64 {
        self.jobs_lock()
            .values()
            .filter(|j| j.holds_reservation() && exclude != Some(j.key()))
            .map(|j| j.size())
            .sum()
    }

    async fn send_best_effort(&self, to: RequesterId, text: &str) {
        if let Err(e) = self.ui.send(to, text, None).await {
            tracing::debug!("requester message failed: {e:#}");
        }
    }

    /// Edit the job's primary message if it has one, else send a fresh one.
    async fn respond(&self, job: &Arc<Job>, text: &str) {
        let has_primary = {
            let ui = job.ui.lock().unwrap_or_else(|e| e.into_inner());
            ui.primary.is_some()
        };
        if has_primary {
            self.sinks(job).broadcast(text, None).await;
        } else {
            self.send_best_effort(job.owner(), text).await;
        }
    }

    /// Handle an inbound submission end to end (duplicate detection, existing
    /// artifact checks, space check, enqueue or immediate run).
    pub async fn submit(self: &Arc<Self>, sub: Submission) -> SubmitOutcome {
        if self.shutting_down.load(Ordering::SeqCst) {
            self.send_best_effort(sub.owner, "Shutting down; not accepting new transfers.")
                .await;
            return SubmitOutcome::ShuttingDown;
        }

        let key = sub.name.clone();
        let existing = self.jobs_lock().get(&key).cloned();
        if let Some(job) = existing {
            return match job.status() {
                JobStatus::Queued => self.handle_queued_duplicate(&job, sub.owner).await,
                JobStatus::Active | JobStatus::Paused => {
                    self.handle_active_duplicate(&job, sub.owner).await
                }
                _ => {
                    self.send_best_effort(
                        sub.owner,
                        &format!("{key} is finishing up; try again shortly."),
                    )
                    .await;
                    SubmitOutcome::CleanupPending
                }
            };
        }

        let dest = self.cfg.download_dir.join(&key);
        if let Ok(meta) = tokio::fs::metadata(&dest).await {
            if sub.size == 0 || (meta.len() as u128) * 100 >= (sub.size as u128) * 98 {
                self.send_best_effort(
                    sub.owner,
                    &format!(
                        "File already exists: {key} (size: {})",
                        humanize_size(meta.len() as f64)
                    ),
                )
                .await;
                tracing::info!(job = key.as_str(), "skip existing file");
                return SubmitOutcome::SkippedExisting;
            }
            self.send_best_effort(
                sub.owner,
                &format!(
                    "Found incomplete existing file ({}/{}); re-downloading...",
                    humanize_size(meta.len() as f64),
                    humanize_size(sub.size as f64)
                ),
            )
            .await;
            let _ = tokio::fs::remove_file(&dest).await;
        }

        // Submission-time space check: fast reject before queueing.
        let reserved = self.reserved_bytes(None);
        match self.ledger.ensure_space(&key, reserved, sub.size) {
            Ok(check) if check.ok => {
                if check.deleted > 0 {
                    self.send_best_effort(sub.owner, &auto_clean_text(&check)).await;
                }
            }
            Ok(check) => {
                let err = JobError::AdmissionDenied {
                    required_mb: check.required_mb,
                    projected_mb: check.projected_mb,
                };
                tracing::warn!(job = key.as_str(), "rejected: {err}");
                self.send_best_effort(
                    sub.owner,
                    &deny_text(&key, &check, reserved.saturating_add(sub.size)),
                )
                .await;
                return SubmitOutcome::Denied;
            }
            Err(e) => {
                tracing::error!(job = key.as_str(), "space check failed: {e:#}");
                self.send_best_effort(sub.owner, &format!("Could not check disk space for {key}."))
                    .await;
                return SubmitOutcome::Denied;
            }
        }

        if let Ok(free) = self.ledger.free_mb() {
            if free < self.cfg.disk_warning_mb {
                self.send_best_effort(
                    sub.owner,
                    &format!(
                        "Low disk space (< {}MB free). Consider cleaning up soon.",
                        self.cfg.disk_warning_mb
                    ),
                )
                .await;
            }
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let job = Arc::new(Job::new(key.clone(), dest, sub.size, sub.owner, seq));
        {
            self.jobs_lock().insert(key.clone(), Arc::clone(&job));
            self.tokens_lock()
                .insert(job.token().to_string(), key.clone());
        }

        if self.queue.is_saturated() {
            let Some(position) = self.queue.submit(&key) else {
                self.finalize(&job);
                return SubmitOutcome::ShuttingDown;
            };
            let text = format!(
                "Queued #{position}: {key}\nWaiting for free slot (limit {})",
                self.queue.limit()
            );
            let bar = job.control_bar();
            match self.ui.send(sub.owner, &text, bar.as_ref()).await {
                Ok(handle) => {
                    let mut ui = job.ui.lock().unwrap_or_else(|e| e.into_inner());
                    ui.primary = Some(handle);
                    ui.last_text = text;
                    ui.last_bar = bar;
                }
                Err(e) => tracing::debug!(job = key.as_str(), "queued message failed: {e:#}"),
            }
            tracing::info!(job = key.as_str(), position, "queued");
            SubmitOutcome::Queued(position)
        } else {
            let ctrl = Arc::clone(self);
            let job2 = Arc::clone(&job);
            tokio::spawn(async move {
                ctrl.run_with_slot(job2, false).await;
            });
            SubmitOutcome::Started
        }
    }

    async fn handle_active_duplicate(
        &self,
        job: &Arc<Job>,
        owner: RequesterId,
    ) -> SubmitOutcome {
        // A duplicate submission for a paused job doubles as a resume request.
        if job.mark_resumed() {
            self.sinks(job)
                .broadcast(
                    &format!("Resuming: {}", job.key()),
                    job.control_bar().as_ref(),
                )
                .await;
        }
        if owner == job.owner() {
            self.send_best_effort(owner, &format!("Already in progress: {}", job.key()))
                .await;
            return SubmitOutcome::AlreadyActive;
        }
        match self
            .ui
            .send(
                owner,
                &format!(
                    "Already being downloaded: {}. You'll receive progress here.",
                    job.key()
                ),
                None,
            )
            .await
        {
            Ok(handle) => {
                job.ui
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .watchers
                    .push(handle);
                SubmitOutcome::AttachedWatcher
            }
            Err(e) => {
                tracing::debug!(job = job.key(), "watcher attach failed: {e:#}");
                SubmitOutcome::AlreadyActive
            }
        }
    }

    async fn handle_queued_duplicate(
        &self,
        job: &Arc<Job>,
        owner: RequesterId,
    ) -> SubmitOutcome {
        if owner == job.owner() {
            self.send_best_effort(owner, &format!("Already queued: {}", job.key()))
                .await;
            return SubmitOutcome::AlreadyQueued;
        }
        self.send_best_effort(
            owner,
            &format!(
                "{} is queued. You'll receive progress here when it starts.",
                job.key()
            ),
        )
        .await;
        job.ui
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .watch_owners
            .push(owner);
        SubmitOutcome::AttachedWatcher
    }

    /// One admitted execution: acquire a slot, re-validate space, promote, run.
    async fn run_with_slot(self: Arc<Self>, job: Arc<Job>, from_queue: bool) {
        let slots = self.queue.slot();
        let _permit = match slots.acquire_owned().await {
            Ok(p) => p,
            Err(_) => return, // slots closed during shutdown
        };
        if from_queue {
            self.queue.take_waiting(job.key());
        }
        if job.is_cancelled() {
            self.finalize(&job);
            return;
        }

        // Promotion-time re-validation: free space may have moved since
        // submission, and only this check gates an actual transfer attempt.
        let reserved = self.reserved_bytes(Some(job.key()));
        match self.ledger.ensure_space(job.key(), reserved, job.size()) {
            Ok(check) if check.ok => {
                if check.deleted > 0 {
                    self.respond(&job, &auto_clean_text(&check)).await;
                }
            }
            Ok(check) => {
                let err = JobError::AdmissionDenied {
                    required_mb: check.required_mb,
                    projected_mb: check.projected_mb,
                };
                tracing::warn!(job = job.key(), "promotion denied: {err}");
                let text = deny_text(
                    job.key(),
                    &check,
                    reserved.saturating_add(job.size()),
                );
                self.respond(&job, &text).await;
                self.notifier
                    .notify("Download Failed", &truncate_message(&text, 50))
                    .await;
                self.finalize(&job);
                return;
            }
            Err(e) => {
                tracing::error!(job = job.key(), "space re-validation failed: {e:#}");
                self.respond(&job, &format!("Could not check disk space for {}.", job.key()))
                    .await;
                self.finalize(&job);
                return;
            }
        }

        if !job.promote() {
            self.finalize(&job);
            return;
        }
        self.execute(job).await;
        // Slot released here when the permit drops.
    }

    async fn execute(&self, job: Arc<Job>) {
        let sinks = self.open_sinks(&job).await;
        let mut reporter = Reporter::new(
            sinks.clone(),
            Arc::clone(&self.notifier),
            ReportIntervals::from_config(&self.cfg),
        );
        let plan = RetryPlan::from_config(&self.cfg);
        let dest = job.path().to_path_buf();

        let result = retry::drive(
            self.transport.as_ref(),
            &job,
            &dest,
            &mut reporter,
            &sinks,
            &plan,
        )
        .await;

        let outcome = match result {
            Ok(()) => {
                if retry::validate_size(job.size(), &dest) {
                    Ok(())
                } else if job.is_cancelled() {
                    Err(JobError::Cancelled)
                } else {
                    let actual = std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
                    Err(JobError::ValidationFailed {
                        expected: job.size(),
                        actual,
                    })
                }
            }
            Err(JobError::Cancelled) if self.shutting_down.load(Ordering::SeqCst) => {
                Err(JobError::ShutdownAbort)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                job.complete();
                self.handle_success(&job, &sinks).await;
            }
            Err(JobError::Cancelled) => {
                job.mark_cancelled();
                self.handle_cancelled(&job, &sinks, false).await;
            }
            Err(JobError::ShutdownAbort) => {
                job.mark_cancelled();
                self.handle_cancelled(&job, &sinks, true).await;
            }
            Err(e) => {
                job.fail();
                self.handle_failure(&job, &sinks, &e).await;
            }
        }
        self.finalize(&job);
    }

    /// Set up the fan-out for a starting transfer: reuse the queued
    /// placeholder as the primary message (or send a fresh one), and open a
    /// mirror for every requester who duplicated the submission while queued.
    async fn open_sinks(&self, job: &Arc<Job>) -> Broadcaster {
        let sinks = self.sinks(job);
        let text = format!("Starting download of {}...", job.key());
        let bar = job.control_bar();

        let (has_primary, watch_owners) = {
            let mut ui = job.ui.lock().unwrap_or_else(|e| e.into_inner());
            (ui.primary.is_some(), std::mem::take(&mut ui.watch_owners))
        };

        if has_primary {
            sinks.broadcast(&text, bar.as_ref()).await;
        } else {
            match self.ui.send(job.owner(), &text, bar.as_ref()).await {
                Ok(handle) => {
                    let mut ui = job.ui.lock().unwrap_or_else(|e| e.into_inner());
                    ui.primary = Some(handle);
                    ui.last_text = text.clone();
                    ui.last_bar = bar.clone();
                }
                Err(e) => tracing::debug!(job = job.key(), "start message failed: {e:#}"),
            }
        }

        for owner in watch_owners {
            match self.ui.send(owner, &text, bar.as_ref()).await {
                Ok(handle) => job
                    .ui
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .watchers
                    .push(handle),
                Err(e) => tracing::debug!(job = job.key(), "watcher mirror failed: {e:#}"),
            }
        }

        self.notifier.notify("Download Started", job.key()).await;
        tracing::info!(
            job = job.key(),
            size = job.size(),
            "start transfer ({})",
            humanize_size(job.size() as f64)
        );
        sinks
    }

    async fn handle_success(&self, job: &Arc<Job>, sinks: &Broadcaster) {
        let idle = self.notifier.is_idle().await;
        let text = if idle {
            format!("Download complete: {}\nStarting playback...", job.key())
        } else {
            format!(
                "Download complete: {}\nPlayback busy; file is ready.",
                job.key()
            )
        };
        sinks.broadcast(&text, None).await;
        if idle {
            self.notifier.play(job.path()).await;
        }
        self.notifier.notify("Download Complete", job.key()).await;
        tracing::info!(job = job.key(), "completed");
    }

    async fn handle_cancelled(&self, job: &Arc<Job>, sinks: &Broadcaster, shutdown: bool) {
        let text = if shutdown {
            format!("Cancelled (shutdown): {}", job.key())
        } else {
            format!("Download cancelled: {}", job.key())
        };
        sinks.broadcast(&text, None).await;
        self.cleanup_artifact(job).await;
        tracing::info!(job = job.key(), shutdown, "cancelled");
    }

    async fn handle_failure(&self, job: &Arc<Job>, sinks: &Broadcaster, err: &JobError) {
        let text = match err {
            JobError::ValidationFailed { expected, .. } => format!(
                "Download incomplete. Expected {}",
                humanize_size(*expected as f64)
            ),
            e => format!("Error: {}", truncate_message(&e.to_string(), 200)),
        };
        sinks.broadcast(&text, None).await;
        self.notifier
            .notify("Download Failed", &truncate_message(&err.to_string(), 50))
            .await;
        tracing::error!(job = job.key(), "failed: {err}");
    }

    /// Delete the partial artifact and prune now-empty ancestor directories
    /// up to the managed root. Best effort.
    async fn cleanup_artifact(&self, job: &Arc<Job>) {
        let path = job.path().to_path_buf();
        if tokio::fs::remove_file(&path).await.is_ok() {
            remove_empty_parents(&path, &self.cfg.download_dir);
        }
    }

    /// Unconditional terminal bookkeeping removal.
    fn finalize(&self, job: &Arc<Job>) {
        self.jobs_lock().remove(job.key());
        self.tokens_lock().remove(job.token());
        tracing::debug!(job = job.key(), "removed from bookkeeping");
    }

    /// Handle an inbound control action by short token. Returns the
    /// acknowledgement text (also delivered as a toast on the primary handle).
    pub async fn control(&self, token: &str, action: ControlAction) -> String {
        let key = self.tokens_lock().get(token).cloned();
        let job = key.and_then(|k| self.jobs_lock().get(&k).cloned());
        let Some(job) = job else {
            return "File not found".to_string();
        };
        if job.is_cancelled() || job.status().is_terminal() {
            return "Not available".to_string();
        }

        let sinks = self.sinks(&job);
        let ack = match (job.status(), action) {
            (JobStatus::Queued, ControlAction::Cancel) => {
                self.cancel_queued(&job).await;
                "Cancelled"
            }
            (JobStatus::Queued, _) => "Not available",
            (_, ControlAction::Pause) => {
                if job.mark_paused() {
                    // Re-render the last text so the buttons flip without
                    // clobbering the progress line.
                    let text = {
                        let ui = job.ui.lock().unwrap_or_else(|e| e.into_inner());
                        ui.last_text.clone()
                    };
                    sinks.broadcast(&text, job.control_bar().as_ref()).await;
                    "Paused"
                } else {
                    "Already paused"
                }
            }
            (_, ControlAction::Resume) => {
                if job.mark_resumed() {
                    sinks
                        .broadcast(
                            &format!("Resuming: {}", job.key()),
                            job.control_bar().as_ref(),
                        )
                        .await;
                    "Resuming"
                } else {
                    "Not paused"
                }
            }
            (_, ControlAction::Cancel) => {
                job.mark_cancelled();
                sinks
                    .broadcast(&format!("Cancelling: {}", job.key()), None)
                    .await;
                "Cancelling"
            }
        };
        sinks.ack(ack).await;
        ack.to_string()
    }

    /// Cancel a still-waiting job and renumber the rest of the waiting set.
    /// The renumbering renders are best-effort UI work and never fail
    /// processing.
    async fn cancel_queued(&self, job: &Arc<Job>) {
        job.mark_cancelled();
        let renumbered = self.queue.cancel(job.key());
        self.sinks(job)
            .broadcast(&format!("Cancelled (queued): {}", job.key()), None)
            .await;
        if let Some(entries) = renumbered {
            self.renumber(entries).await;
        }
        self.finalize(job);
    }

    async fn renumber(&self, entries: Vec<(String, usize)>) {
        for (key, position) in entries {
            let Some(job) = self.jobs_lock().get(&key).cloned() else {
                continue;
            };
            let text = format!(
                "Queued #{position}: {key}\nWaiting for free slot (limit {})",
                self.queue.limit()
            );
            self.sinks(&job)
                .broadcast(&text, job.control_bar().as_ref())
                .await;
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let mut active: Vec<(u64, String)> = self
            .jobs_lock()
            .values()
            .filter(|j| matches!(j.status(), JobStatus::Active | JobStatus::Paused))
            .map(|j| (j.seq(), j.key().to_string()))
            .collect();
        active.sort();
        StatusSnapshot {
            limit: self.queue.limit(),
            active: active.into_iter().map(|(_, k)| k).collect(),
            queued: self.queue.waiting_snapshot(),
        }
    }

    /// True while any job is active or waiting.
    pub fn is_busy(&self) -> bool {
        !self.jobs_lock().is_empty()
    }

    /// Graceful shutdown: stop accepting, cancel the waiting set with a
    /// shutdown notice, wait a bounded time for in-flight transfers, then
    /// force-abandon stragglers.
    pub async fn stop(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let leftovers = self.queue.close();
        for key in leftovers {
            let Some(job) = self.jobs_lock().get(&key).cloned() else {
                continue;
            };
            job.mark_cancelled();
            self.sinks(&job)
                .broadcast(&format!("Cancelled (shutdown): {key}"), None)
                .await;
            self.finalize(&job);
        }

        let drain = Duration::from_secs(self.cfg.shutdown_drain_secs);
        if !self.queue.drain(drain).await {
            tracing::warn!("shutdown drain timed out; abandoning in-flight transfers");
            let stragglers: Vec<Arc<Job>> = self.jobs_lock().values().cloned().collect();
            for job in stragglers {
                job.mark_cancelled();
            }
        }
        self.queue.shut();
        tracing::info!("controller stopped");
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.cfg.download_dir
    }
}

fn auto_clean_text(check: &SpaceCheck) -> String {
    format!(
        "Auto-clean removed {} file(s) (free {}MB -> {}MB). Proceeding.",
        check.deleted, check.free_before_mb, check.free_after_mb
    )
}

fn deny_text(key: &str, check: &SpaceCheck, cumulative: u64) -> String {
    format!(
        "Not enough disk space for {key} (projected free {}MB) after reserving {}. \
         Need >= {}MB free after all active downloads.",
        check.projected_mb,
        humanize_size(cumulative as f64),
        check.required_mb
    )
}
