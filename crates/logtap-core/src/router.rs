//! Router — fans each [`LogRecord`](crate::LogRecord) out to every registered
//! consumer of one resource.
//!
//! Dispatch iterates a snapshot of the registry taken at the start of the
//! call, so a consumer registered mid-dispatch starts with the next record
//! and `register` never waits on a slow `accept`.

use crate::consumer::LogConsumer;
use crate::types::LogRecord;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct Router {
    consumers: RwLock<Vec<Arc<dyn LogConsumer>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer. It receives records dispatched after this call returns.
    pub fn register(&self, consumer: Arc<dyn LogConsumer>) {
        self.consumers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(consumer);
    }

    /// Deliver `record` to every registered consumer, in registration order.
    pub fn dispatch(&self, record: &LogRecord) {
        for consumer in self.snapshot() {
            consumer.accept(record);
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn LogConsumer>> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn LogConsumer>>> {
        self.consumers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("consumers", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
