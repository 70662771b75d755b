//! Multi-sink broadcaster: one edit fans out to the primary message and every
//! watcher mirror.
//!
//! Delivery is best-effort by design at this boundary: a failure on any one
//! sink is logged and never blocks the rest. Watcher handles that fail an
//! edit are pruned so a dead mirror does not generate noise for the whole
//! transfer. Identical back-to-back renders (same text, same controls) are
//! suppressed against the job's last rendered state.

use std::sync::Arc;

use crate::iface::{ControlBar, UiChannel, UiHandle};
use crate::job::Job;

#[derive(Clone)]
pub struct Broadcaster {
    ui: Arc<dyn UiChannel>,
    job: Arc<Job>,
}

impl Broadcaster {
    pub fn new(ui: Arc<dyn UiChannel>, job: Arc<Job>) -> Self {
        Self { ui, job }
    }

    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    /// Edit the primary message and all watcher mirrors with the same content.
    pub async fn broadcast(&self, text: &str, bar: Option<&ControlBar>) {
        let (primary, watchers) = {
            let mut ui = self.job.ui.lock().unwrap_or_else(|e| e.into_inner());
            if ui.last_text == text && ui.last_bar.as_ref() == bar {
                return;
            }
            ui.last_text = text.to_string();
            ui.last_bar = bar.cloned();
            (ui.primary, ui.watchers.clone())
        };

        if let Some(handle) = primary {
            if let Err(e) = self.ui.edit(handle, text, bar).await {
                tracing::debug!(job = self.job.key(), "primary edit failed: {e:#}");
            }
        }

        let mut dead: Vec<UiHandle> = Vec::new();
        for handle in watchers {
            if let Err(e) = self.ui.edit(handle, text, bar).await {
                tracing::debug!(job = self.job.key(), "watcher edit failed, pruning: {e:#}");
                dead.push(handle);
            }
        }
        if !dead.is_empty() {
            let mut ui = self.job.ui.lock().unwrap_or_else(|e| e.into_inner());
            ui.watchers.retain(|h| !dead.contains(h));
        }
    }

    /// Best-effort toast on the primary message (control-press acknowledgement).
    pub async fn ack(&self, text: &str) {
        let primary = {
            let ui = self.job.ui.lock().unwrap_or_else(|e| e.into_inner());
            ui.primary
        };
        if let Some(handle) = primary {
            if let Err(e) = self.ui.ack(handle, text).await {
                tracing::debug!(job = self.job.key(), "ack failed: {e:#}");
            }
        }
    }
}
