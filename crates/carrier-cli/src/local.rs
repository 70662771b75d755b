//! Local adapters for running the controller from a terminal: a file-copy
//! transport, a line-printing UI channel, and a log-only notification surface.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use carrier_core::error::TransferError;
use carrier_core::iface::{ControlAction, ControlBar, Notifier, RequesterId, Sampler, Transport, UiHandle, UiChannel};

const COPY_CHUNK: usize = 256 * 1024;

/// Transport that copies registered local files chunk by chunk, feeding the
/// sampler after every chunk so pause/cancel and progress behave exactly as
/// they would for a remote transfer.
pub struct LocalTransport {
    sources: Mutex<HashMap<String, PathBuf>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, key: &str, source: PathBuf) {
        self.sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), source);
    }

    fn source_for(&self, key: &str) -> Option<PathBuf> {
        self.sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn transfer(
        &self,
        resource: &str,
        dest: &Path,
        sampler: &mut (dyn Sampler + Send),
    ) -> Result<(), TransferError> {
        let source = self
            .source_for(resource)
            .ok_or_else(|| TransferError::Other(anyhow::anyhow!("unknown resource {resource}")))?;

        let total = tokio::fs::metadata(&source)
            .await
            .map_err(|e| TransferError::Other(e.into()))?
            .len();
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::Other(e.into()))?;
        }

        let mut src = tokio::fs::File::open(&source)
            .await
            .map_err(map_io_error)?;
        let mut dst = tokio::fs::File::create(dest).await.map_err(map_io_error)?;

        let mut buf = vec![0u8; COPY_CHUNK];
        let mut received: u64 = 0;
        loop {
            let n = src.read(&mut buf).await.map_err(map_io_error)?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n]).await.map_err(map_io_error)?;
            received += n as u64;
            if sampler.on_sample(received, total).await.is_err() {
                return Err(TransferError::Aborted);
            }
        }
        dst.flush().await.map_err(map_io_error)?;
        Ok(())
    }
}

fn map_io_error(e: std::io::Error) -> TransferError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        TransferError::Timeout
    } else {
        TransferError::Other(e.into())
    }
}

/// UI channel that renders messages as terminal lines. Each handle is a
/// monotonically numbered message; edits re-print under the same number.
pub struct ConsoleUi {
    next: AtomicU64,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    fn render(handle: UiHandle, text: &str, controls: Option<&ControlBar>) {
        let controls = controls
            .map(|bar| format!("  {}", render_bar(bar)))
            .unwrap_or_default();
        // Indent continuation lines under the message number.
        let text = text.replace('\n', "\n         ");
        println!("[msg {:>3}] {text}{controls}", handle.0);
    }
}

fn render_bar(bar: &ControlBar) -> String {
    let actions: Vec<&str> = bar
        .actions
        .iter()
        .map(|a| match a {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
        })
        .collect();
    format!("<{} {}>", bar.token, actions.join("|"))
}

#[async_trait]
impl UiChannel for ConsoleUi {
    async fn send(
        &self,
        _to: RequesterId,
        text: &str,
        controls: Option<&ControlBar>,
    ) -> Result<UiHandle> {
        let handle = UiHandle(self.next.fetch_add(1, Ordering::SeqCst));
        Self::render(handle, text, controls);
        Ok(handle)
    }

    async fn edit(&self, handle: UiHandle, text: &str, controls: Option<&ControlBar>) -> Result<()> {
        Self::render(handle, text, controls);
        Ok(())
    }

    async fn ack(&self, handle: UiHandle, text: &str) -> Result<()> {
        println!("[msg {:>3}] ({text})", handle.0);
        Ok(())
    }
}

/// Notification surface that only logs. Always reports idle so completed
/// transfers take the auto-play path (which also just logs).
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, "{message}");
    }

    async fn play(&self, path: &Path) {
        tracing::info!("would start playback of {}", path.display());
    }

    async fn is_idle(&self) -> bool {
        true
    }
}
