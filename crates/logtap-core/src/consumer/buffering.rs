//! Buffering consumer with race-free "wait for a message".

use super::LogConsumer;
use crate::error::WaitError;
use crate::types::LogRecord;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Appends every record's text to an ordered buffer and lets one caller at a
/// time block until a record containing some target text shows up.
///
/// The buffer and the pending-wait slot share one mutex. `accept` appends and
/// checks the slot under that lock; `wait_for` tests and sets the slot under
/// the same lock. A record is therefore either appended before the wait is
/// registered (and is not a match for it) or observed by the wait; it can
/// never slip between the two.
///
/// Only records delivered after the wait is registered can satisfy it.
#[derive(Debug, Default)]
pub struct BufferingConsumer {
    state: Mutex<BufferState>,
}

#[derive(Debug, Default)]
struct BufferState {
    messages: Vec<String>,
    pending: Option<PendingWait>,
    next_wait_id: u64,
}

#[derive(Debug)]
struct PendingWait {
    id: u64,
    target: String,
    notify: oneshot::Sender<()>,
}

impl BufferingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every message received so far, in delivery order.
    pub fn snapshot(&self) -> Vec<String> {
        self.state().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().messages.is_empty()
    }

    /// Whether a `wait_for` is currently pending.
    pub fn is_waiting(&self) -> bool {
        self.state().pending.is_some()
    }

    /// Wait until a record whose text contains `target` is accepted, or until
    /// `cancel` fires.
    ///
    /// Fails immediately with [`WaitError::AlreadyWaiting`] if another wait is
    /// pending on this consumer; the pending wait is left untouched.
    pub async fn wait_for(&self, target: &str, cancel: &CancellationToken) -> Result<(), WaitError> {
        let cancelled = cancel.cancelled();
        self.wait_until(target, async move {
            cancelled.await;
            WaitError::Cancelled {
                target: target.to_string(),
            }
        })
        .await
    }

    /// Like [`wait_for`](Self::wait_for) with a deadline instead of a token.
    pub async fn wait_for_timeout(&self, target: &str, timeout: Duration) -> Result<(), WaitError> {
        self.wait_until(target, async move {
            tokio::time::sleep(timeout).await;
            WaitError::TimedOut {
                target: target.to_string(),
                elapsed: timeout,
            }
        })
        .await
    }

    async fn wait_until(
        &self,
        target: &str,
        give_up: impl Future<Output = WaitError>,
    ) -> Result<(), WaitError> {
        let (id, matched) = self.register_wait(target)?;
        let _slot = PendingSlot { consumer: self, id };

        tokio::select! {
            biased;
            res = matched => res.map_err(|_| WaitError::Cancelled {
                target: target.to_string(),
            }),
            err = give_up => Err(err),
        }
    }

    fn register_wait(&self, target: &str) -> Result<(u64, oneshot::Receiver<()>), WaitError> {
        let mut state = self.state();
        if let Some(pending) = &state.pending {
            tracing::debug!(pending = %pending.target, requested = %target, "wait_for rejected; another wait is pending");
            return Err(WaitError::AlreadyWaiting {
                pending: pending.target.clone(),
            });
        }

        let (notify, matched) = oneshot::channel();
        let id = state.next_wait_id;
        state.next_wait_id += 1;
        state.pending = Some(PendingWait {
            id,
            target: target.to_string(),
            notify,
        });
        Ok((id, matched))
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogConsumer for BufferingConsumer {
    fn accept(&self, record: &LogRecord) {
        let text = record.text().into_owned();
        let mut state = self.state();

        let matched = state
            .pending
            .as_ref()
            .is_some_and(|pending| text.contains(pending.target.as_str()));
        if matched {
            if let Some(pending) = state.pending.take() {
                // The waiter may already have given up; nothing to do then.
                let _ = pending.notify.send(());
            }
        }

        state.messages.push(text);
    }
}

/// Frees the pending-wait slot when a wait finishes for any reason,
/// including the waiting future being dropped.
struct PendingSlot<'a> {
    consumer: &'a BufferingConsumer,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.consumer.state();
        if state.pending.as_ref().is_some_and(|p| p.id == self.id) {
            state.pending = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
