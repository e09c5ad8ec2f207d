//! Opt-in "end of relevant output" convention.
//!
//! A [`SentinelConsumer`] wraps another consumer. Records whose content is
//! exactly the sentinel payload are swallowed and trip the paired
//! [`SentinelSignal`]; everything else is forwarded untouched. Nothing in the
//! producer or router knows about sentinels.

use super::LogConsumer;
use crate::error::WaitError;
use crate::types::LogRecord;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::watch;

pub struct SentinelConsumer<C> {
    inner: C,
    sentinel: Bytes,
    done: watch::Sender<bool>,
}

/// Completion side of a [`SentinelConsumer`].
#[derive(Debug, Clone)]
pub struct SentinelSignal {
    sentinel: Bytes,
    done: watch::Receiver<bool>,
}

impl<C: LogConsumer> SentinelConsumer<C> {
    pub fn new(inner: C, sentinel: impl Into<Bytes>) -> (Self, SentinelSignal) {
        let sentinel = sentinel.into();
        let (done, rx) = watch::channel(false);
        (
            Self {
                inner,
                sentinel: sentinel.clone(),
                done,
            },
            SentinelSignal { sentinel, done: rx },
        )
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: LogConsumer> LogConsumer for SentinelConsumer<C> {
    fn accept(&self, record: &LogRecord) {
        if record.content() == &self.sentinel {
            self.done.send_replace(true);
            return;
        }
        self.inner.accept(record);
    }
}

impl SentinelSignal {
    pub fn is_tripped(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until the sentinel has been seen. Returns `false` if the consumer
    /// was dropped first.
    pub async fn wait(&mut self) -> bool {
        self.done.wait_for(|seen| *seen).await.is_ok()
    }

    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<(), WaitError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(WaitError::TimedOut {
                target: String::from_utf8_lossy(&self.sentinel).into_owned(),
                elapsed: timeout,
            }),
        }
    }
}
