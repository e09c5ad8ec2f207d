use super::LogConsumer;
use crate::types::{LogRecord, Origin};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Keeps the latest record text seen for each [`Origin`] (last write wins).
#[derive(Debug, Default)]
pub struct TypedConsumer {
    latest: Mutex<HashMap<Origin, String>>,
}

impl TypedConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, origin: Origin) -> Option<String> {
        self.map().get(&origin).cloned()
    }

    pub fn snapshot(&self) -> HashMap<Origin, String> {
        self.map().clone()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Origin, String>> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogConsumer for TypedConsumer {
    fn accept(&self, record: &LogRecord) {
        self.map()
            .insert(record.origin(), record.text().into_owned());
    }
}
