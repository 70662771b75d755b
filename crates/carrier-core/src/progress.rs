//! Throttled translation of byte samples into UI and notification updates.
//!
//! Two independently rate-limited channels: the UI channel gets a textual
//! progress bar at most once per edit interval, and the notification surface
//! gets an update only on 10% boundaries, at most once per its own interval,
//! and only while it reports itself idle. An unchanged byte count older than
//! the stall window suppresses redundant re-renders; it never fails the
//! transfer (a genuinely dead transfer is the transport timeout's problem).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::broadcast::Broadcaster;
use crate::config::CarrierConfig;
use crate::iface::{AbortRequested, Notifier, Sampler};
use crate::job::wait_while_paused;

/// Human-readable size, largest fitting unit, two decimals. Caps at TB.
pub fn humanize_size(size_bytes: f64) -> String {
    if size_bytes <= 0.0 {
        return "0B".to_string();
    }
    const NAMES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut i = (size_bytes.log(1024.0)) as usize;
    if i >= NAMES.len() {
        i = NAMES.len() - 1;
    }
    let p = 1024f64.powi(i as i32);
    format!("{:.2} {}", size_bytes / p, NAMES[i])
}

/// Ten-slot text bar, one filled cell per 10%.
pub fn progress_bar(percent: u64) -> String {
    let filled = (percent / 10).min(10) as usize;
    format!("{}{}", "▓".repeat(filled), "░".repeat(10 - filled))
}

/// Independent minimum-interval gates for the two output channels.
pub struct RateLimiter {
    min_ui: Duration,
    min_notify: Duration,
    last_ui: Option<Instant>,
    last_notify: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_ui: Duration, min_notify: Duration) -> Self {
        Self {
            min_ui,
            min_notify,
            last_ui: None,
            last_notify: None,
        }
    }

    pub fn ui_ready(&mut self) -> bool {
        Self::gate(&mut self.last_ui, self.min_ui)
    }

    pub fn notify_ready(&mut self) -> bool {
        Self::gate(&mut self.last_notify, self.min_notify)
    }

    fn gate(last: &mut Option<Instant>, min: Duration) -> bool {
        let now = Instant::now();
        match last {
            Some(t) if now.duration_since(*t) < min => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Timing knobs the reporter and retry executor need, pulled from config.
#[derive(Debug, Clone)]
pub struct ReportIntervals {
    pub ui_edit: Duration,
    pub notify: Duration,
    pub stall_window: Duration,
    pub pause_poll: Duration,
}

impl ReportIntervals {
    pub fn from_config(cfg: &CarrierConfig) -> Self {
        Self {
            ui_edit: Duration::from_secs_f64(cfg.ui_edit_interval_secs),
            notify: Duration::from_secs_f64(cfg.notify_interval_secs),
            stall_window: Duration::from_secs(cfg.stall_window_secs),
            pause_poll: Duration::from_millis(cfg.pause_poll_ms),
        }
    }
}

/// Per-job progress context passed into the transport as its sampler.
/// Owns its own counters so concurrently running jobs never alias state.
pub struct Reporter {
    sinks: Broadcaster,
    notifier: Arc<dyn Notifier>,
    intervals: ReportIntervals,
    rate: RateLimiter,
    started: Instant,
    last_received: u64,
    last_change: Instant,
}

impl Reporter {
    pub fn new(sinks: Broadcaster, notifier: Arc<dyn Notifier>, intervals: ReportIntervals) -> Self {
        let rate = RateLimiter::new(intervals.ui_edit, intervals.notify);
        Self {
            sinks,
            notifier,
            intervals,
            rate,
            started: Instant::now(),
            last_received: 0,
            last_change: Instant::now(),
        }
    }

    /// True when the sample should be rendered; updates the activity clock.
    fn track_activity(&mut self, received: u64, now: Instant) -> bool {
        if received != self.last_received {
            self.last_received = received;
            self.last_change = now;
            return true;
        }
        now.duration_since(self.last_change) <= self.intervals.stall_window
    }

    fn percent(received: u64, total: u64) -> u64 {
        if total == 0 {
            return 0;
        }
        ((received as u128 * 100) / total as u128) as u64
    }

    fn speed(&self, received: u64, now: Instant) -> String {
        let elapsed = now.duration_since(self.started).as_secs_f64().max(0.001);
        humanize_size(received as f64 / elapsed)
    }
}

#[async_trait]
impl Sampler for Reporter {
    async fn on_sample(&mut self, received: u64, total: u64) -> Result<(), AbortRequested> {
        let job = Arc::clone(self.sinks.job());
        if job.is_cancelled() {
            return Err(AbortRequested);
        }
        wait_while_paused(&job, self.intervals.pause_poll).await;
        if job.is_cancelled() {
            return Err(AbortRequested);
        }

        let now = Instant::now();
        if !self.track_activity(received, now) {
            return Ok(());
        }

        let percent = Self::percent(received, total);
        let speed = self.speed(received, now);

        if self.rate.ui_ready() {
            let text = format!(
                "Downloading: {}\nProgress: {} {}%\nSize: {}/{}\nSpeed: {}/s",
                job.key(),
                progress_bar(percent),
                percent,
                humanize_size(received as f64),
                humanize_size(total as f64),
                speed,
            );
            // Reuse the job's current controls so a render never drops them.
            self.sinks.broadcast(&text, job.control_bar().as_ref()).await;
        }

        if percent % 10 == 0 && self.rate.notify_ready() && self.notifier.is_idle().await {
            self.notifier
                .notify(
                    &format!("Downloading: {}", job.key()),
                    &format!("{} {}% | {}/s", progress_bar(percent), percent, speed),
                )
                .await;
        }

        Ok(())
    }
}
