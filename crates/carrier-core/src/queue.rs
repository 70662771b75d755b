//! FIFO admission queue with bounded concurrency.
//!
//! Submissions enter an unbounded FIFO channel and a visible waiting list.
//! The dispatcher (in the controller) pulls tokens in order and spawns an
//! independent execution per token; each execution acquires one of the
//! `limit` semaphore permits itself, so the dispatch loop never blocks on a
//! running job. The semaphore queues acquirers fairly, which preserves strict
//! FIFO promotion order among waiting jobs.
//!
//! Position numbers are 1-based among currently-waiting jobs and are assigned
//! under the waiting-list mutex so concurrent submissions never collide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;

pub struct AdmissionQueue {
    limit: usize,
    slots: Arc<Semaphore>,
    tx: Mutex<Option<UnboundedSender<String>>>,
    rx: Mutex<Option<UnboundedReceiver<String>>>,
    waiting: Mutex<Vec<String>>,
    accepting: AtomicBool,
}

impl AdmissionQueue {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            limit,
            slots: Arc::new(Semaphore::new(limit)),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            waiting: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The shared counting admission slots. Fast-path callers acquire a
    /// permit directly instead of enqueueing.
    pub fn slot(&self) -> Arc<Semaphore> {
        Arc::clone(&self.slots)
    }

    /// Whether all concurrency slots are taken right now.
    pub fn is_saturated(&self) -> bool {
        self.slots.available_permits() == 0
    }

    /// Enqueue a key; returns its 1-based position among waiting jobs, or
    /// None once the queue has stopped accepting.
    pub fn submit(&self, key: &str) -> Option<usize> {
        if !self.accepting.load(Ordering::SeqCst) {
            return None;
        }
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = tx.as_ref() else {
            return None;
        };
        if tx.send(key.to_string()).is_err() {
            return None;
        }
        waiting.push(key.to_string());
        Some(waiting.len())
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        let waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        waiting.iter().position(|k| k == key).map(|i| i + 1)
    }

    /// Remove a key from the visible waiting set (on promotion or skip).
    pub fn take_waiting(&self, key: &str) -> bool {
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        match waiting.iter().position(|k| k == key) {
            Some(i) => {
                waiting.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove a cancelled key from the waiting set. Returns the remaining
    /// waiting keys with their recomputed 1-based positions (original relative
    /// order preserved) so the caller can re-render them, or None if the key
    /// was not waiting.
    pub fn cancel(&self, key: &str) -> Option<Vec<(String, usize)>> {
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        let i = waiting.iter().position(|k| k == key)?;
        waiting.remove(i);
        Some(
            waiting
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), i + 1))
                .collect(),
        )
    }

    pub fn waiting_snapshot(&self) -> Vec<String> {
        self.waiting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Taken once by the controller's dispatch loop.
    pub fn take_receiver(&self) -> Option<UnboundedReceiver<String>> {
        self.rx.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Stop accepting new tokens and return every still-waiting key so the
    /// caller can mark them cancelled with a shutdown notice. Dropping the
    /// sender ends the dispatch loop once it has drained.
    pub fn close(&self) -> Vec<String> {
        self.accepting.store(false, Ordering::SeqCst);
        // Same lock order as submit: waiting before tx.
        let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        std::mem::take(&mut *waiting)
    }

    /// Wait up to `timeout` for every in-flight execution to release its slot.
    /// Returns false on timeout (stragglers are abandoned by the caller).
    pub async fn drain(&self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, self.slots.acquire_many(self.limit as u32)).await,
            Ok(Ok(_))
        )
    }

    /// Close the slots so any straggling execution fails its acquire and
    /// becomes a no-op.
    pub fn shut(&self) {
        self.slots.close();
    }
}
