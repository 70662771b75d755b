//! Shared fakes for controller integration tests: a recording UI channel, a
//! scriptable transport, and a toggleable notification surface.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use carrier_core::config::CarrierConfig;
use carrier_core::controller::Controller;
use carrier_core::error::TransferError;
use carrier_core::iface::{
    ControlBar, Notifier, RequesterId, Sampler, Transport, UiChannel, UiHandle,
};
use carrier_core::ledger::Ledger;

#[derive(Debug, Clone)]
pub enum UiEvent {
    Sent {
        to: RequesterId,
        handle: UiHandle,
        text: String,
        controls: Option<ControlBar>,
    },
    Edited {
        handle: UiHandle,
        text: String,
        controls: Option<ControlBar>,
    },
    Acked {
        handle: UiHandle,
        text: String,
    },
}

/// UI channel that records every call and can be told to fail edits on
/// specific handles (dead-watcher simulation).
#[derive(Default)]
pub struct RecordingUi {
    next: AtomicU64,
    events: Mutex<Vec<UiEvent>>,
    failing: Mutex<Vec<UiHandle>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            ..Self::default()
        }
    }

    pub fn fail_handle(&self, handle: UiHandle) {
        self.failing.lock().unwrap().push(handle);
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Every text ever shown on `handle`, sends and edits alike, in order.
    pub fn texts_for(&self, handle: UiHandle) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Sent { handle: h, text, .. } | UiEvent::Edited { handle: h, text, .. }
                    if h == handle =>
                {
                    Some(text)
                }
                _ => None,
            })
            .collect()
    }

    pub fn last_text_for(&self, handle: UiHandle) -> Option<String> {
        self.texts_for(handle).pop()
    }

    /// Handles of messages sent to a given requester, in order.
    pub fn handles_sent_to(&self, to: RequesterId) -> Vec<UiHandle> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Sent {
                    to: t, handle, ..
                } if t == to => Some(handle),
                _ => None,
            })
            .collect()
    }

    /// All texts across all sinks, in call order.
    pub fn all_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Sent { text, .. } | UiEvent::Edited { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn acks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Acked { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// The control tokens last rendered, keyed by message handle.
    pub fn last_controls_for(&self, handle: UiHandle) -> Option<ControlBar> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Sent {
                    handle: h,
                    controls,
                    ..
                }
                | UiEvent::Edited {
                    handle: h,
                    controls,
                    ..
                } if h == handle => Some(controls),
                _ => None,
            })
            .last()
            .flatten()
    }
}

#[async_trait]
impl UiChannel for RecordingUi {
    async fn send(
        &self,
        to: RequesterId,
        text: &str,
        controls: Option<&ControlBar>,
    ) -> anyhow::Result<UiHandle> {
        let handle = UiHandle(self.next.fetch_add(1, Ordering::SeqCst));
        self.events.lock().unwrap().push(UiEvent::Sent {
            to,
            handle,
            text: text.to_string(),
            controls: controls.cloned(),
        });
        Ok(handle)
    }

    async fn edit(
        &self,
        handle: UiHandle,
        text: &str,
        controls: Option<&ControlBar>,
    ) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&handle) {
            anyhow::bail!("message gone");
        }
        self.events.lock().unwrap().push(UiEvent::Edited {
            handle,
            text: text.to_string(),
            controls: controls.cloned(),
        });
        Ok(())
    }

    async fn ack(&self, handle: UiHandle, text: &str) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(UiEvent::Acked {
            handle,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Per-resource transfer script.
#[derive(Clone)]
pub enum Script {
    /// Write this many bytes and succeed.
    Complete(u64),
    /// Write this many bytes (short of the expected size) and succeed.
    Partial(u64),
    /// Wait for a release permit, then write this many bytes and succeed.
    Hold(u64, Arc<tokio::sync::Semaphore>),
    /// Never finish; keep sampling until aborted.
    StallForever,
    /// Fail with timeouts this many times, then write the bytes and succeed.
    FailTimeouts(u32, u64),
}

/// Transport whose behavior per resource is scripted by the test.
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    timeouts_left: Mutex<HashMap<String, u32>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            timeouts_left: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(&self, resource: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(resource.to_string(), script);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Resources that finished a transfer successfully, in completion order.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    async fn write_and_sample(
        &self,
        dest: &Path,
        bytes: u64,
        total: u64,
        sampler: &mut (dyn Sampler + Send),
    ) -> Result<(), TransferError> {
        tokio::fs::write(dest, vec![0u8; bytes as usize])
            .await
            .map_err(|e| TransferError::Other(e.into()))?;
        for received in [bytes / 2, bytes] {
            if sampler.on_sample(received, total).await.is_err() {
                return Err(TransferError::Aborted);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn transfer(
        &self,
        resource: &str,
        dest: &Path,
        sampler: &mut (dyn Sampler + Send),
    ) -> Result<(), TransferError> {
        self.calls.lock().unwrap().push(resource.to_string());
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::Other(e.into()))?;
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(resource)
            .cloned()
            .unwrap_or(Script::Complete(0));

        match script {
            Script::Complete(bytes) | Script::Partial(bytes) => {
                self.write_and_sample(dest, bytes, bytes, sampler).await?;
            }
            Script::Hold(bytes, gate) => {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|_| TransferError::Other(anyhow::anyhow!("gate closed")))?;
                permit.forget();
                self.write_and_sample(dest, bytes, bytes, sampler).await?;
            }
            Script::StallForever => loop {
                if sampler.on_sample(0, 100).await.is_err() {
                    return Err(TransferError::Aborted);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            },
            Script::FailTimeouts(times, bytes) => {
                let remaining = {
                    let mut left = self.timeouts_left.lock().unwrap();
                    let entry = left.entry(resource.to_string()).or_insert(times);
                    if *entry > 0 {
                        *entry -= 1;
                        true
                    } else {
                        false
                    }
                };
                if remaining {
                    return Err(TransferError::Timeout);
                }
                self.write_and_sample(dest, bytes, bytes, sampler).await?;
            }
        }
        self.completed.lock().unwrap().push(resource.to_string());
        Ok(())
    }
}

/// Notification surface with a toggleable idle state.
pub struct ToggleNotifier {
    idle: AtomicBool,
    notifications: Mutex<Vec<(String, String)>>,
    played: Mutex<Vec<PathBuf>>,
}

impl ToggleNotifier {
    pub fn new(idle: bool) -> Self {
        Self {
            idle: AtomicBool::new(idle),
            notifications: Mutex::new(Vec::new()),
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn set_idle(&self, idle: bool) {
        self.idle.store(idle, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for ToggleNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }

    async fn play(&self, path: &Path) {
        self.played.lock().unwrap().push(path.to_path_buf());
    }

    async fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }
}

/// Fast timings so tests never wait on production intervals.
pub fn test_config(download_dir: &Path, limit: usize) -> CarrierConfig {
    CarrierConfig {
        download_dir: download_dir.to_path_buf(),
        max_concurrent: limit,
        min_free_disk_mb: 200,
        disk_warning_mb: 0,
        max_retry_attempts: 3,
        pause_poll_ms: 10,
        stall_retry_delay_secs: 0,
        error_retry_delay_secs: 0,
        ui_edit_interval_secs: 0.0,
        notify_interval_secs: 0.0,
        stall_window_secs: 30,
        shutdown_drain_secs: 1,
    }
}

pub struct Harness {
    pub controller: Arc<Controller>,
    pub ui: Arc<RecordingUi>,
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Arc<ToggleNotifier>,
}

/// Controller over a probed ledger (plenty of free space unless overridden).
pub fn harness(cfg: CarrierConfig) -> Harness {
    harness_with_free_mb(cfg, 1_000_000)
}

pub fn harness_with_free_mb(cfg: CarrierConfig, free_mb: u64) -> Harness {
    let ui = Arc::new(RecordingUi::new());
    let transport = Arc::new(ScriptedTransport::new());
    let notifier = Arc::new(ToggleNotifier::new(true));
    let ledger = Ledger::with_probe(cfg.download_dir.clone(), cfg.min_free_disk_mb, move |_| {
        Ok(free_mb)
    });
    let controller = Controller::with_ledger(
        cfg,
        ledger,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&ui) as Arc<dyn UiChannel>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    controller.start();
    Harness {
        controller,
        ui,
        transport,
        notifier,
    }
}

/// Poll until the controller has no jobs left or the deadline passes.
pub async fn wait_until_idle(controller: &Controller, deadline: Duration) -> bool {
    let start = std::time::Instant::now();
    while controller.is_busy() {
        if start.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}
