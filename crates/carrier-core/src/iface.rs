//! Consumed capabilities: transport, UI channel, notification surface.
//!
//! These are implemented by collaborators, not by this crate. UI and
//! notification calls are best-effort at this boundary: implementations log
//! failures and the controller swallows per-sink errors; nothing here may
//! abort job processing. The transport is the only capability whose errors
//! feed back into job outcomes (via the retry executor).

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::TransferError;

/// Identity of a requester (the party that submitted a job). Opaque to the
/// controller; the UI channel knows how to address it.
pub type RequesterId = i64;

/// Opaque handle to a rendered UI message, returned by `UiChannel::send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiHandle(pub u64);

/// Control action a requester can press on a job's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
}

/// The set of controls currently offered on a job's message, bound to the
/// job's short token so inbound control events can be routed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBar {
    pub token: String,
    pub actions: Vec<ControlAction>,
}

/// Raised from the progress callback to stop the transfer cooperatively.
#[derive(Debug)]
pub struct AbortRequested;

/// Receiver for byte-count samples during a transfer. The transport calls
/// `on_sample` as data arrives; an `Err(AbortRequested)` means it must stop
/// the transfer and return `TransferError::Aborted`.
#[async_trait]
pub trait Sampler: Send {
    async fn on_sample(&mut self, received: u64, total: u64) -> Result<(), AbortRequested>;
}

/// The external transfer capability: moves one resource to `dest`, reporting
/// progress through the sampler. Timeout-class stalls must map to
/// `TransferError::Timeout` so the retry executor can classify them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn transfer(
        &self,
        resource: &str,
        dest: &Path,
        sampler: &mut (dyn Sampler + Send),
    ) -> Result<(), TransferError>;
}

/// Text/controls channel back to requesters.
#[async_trait]
pub trait UiChannel: Send + Sync {
    /// Send a new message to a requester; returns a handle for later edits.
    async fn send(
        &self,
        to: RequesterId,
        text: &str,
        controls: Option<&ControlBar>,
    ) -> Result<UiHandle>;

    /// Edit an existing message in place.
    async fn edit(&self, handle: UiHandle, text: &str, controls: Option<&ControlBar>)
        -> Result<()>;

    /// Short acknowledgement of a control press (toast-style, no new message).
    async fn ack(&self, handle: UiHandle, text: &str) -> Result<()>;
}

/// Playback/notification surface. All fire-and-forget: implementations log
/// failures and never propagate them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
    async fn play(&self, path: &Path);
    /// True when nothing is playing; gates progress chatter and auto-play.
    async fn is_idle(&self) -> bool;
}
