//! The consumer capability and its reference implementations.
//!
//! # Delivery contract
//!
//! [`LogConsumer::accept`] is called synchronously from the producer task
//! that read the record, once per record, in read order. The producer does
//! not read the next frame until every consumer has returned, so an `accept`
//! that blocks stalls the whole pipeline for that resource. Implementations
//! that need to do slow work must hand the record off (channel, buffer) and
//! return.
//!
//! All implementations in this module return promptly: they take a short
//! mutex and, at most, fire a one-shot notification.

mod buffering;
mod sentinel;
mod typed;

pub use buffering::BufferingConsumer;
pub use sentinel::{SentinelConsumer, SentinelSignal};
pub use typed::TypedConsumer;

use crate::types::LogRecord;
use std::sync::Arc;

/// Anything that accepts log records from a router.
pub trait LogConsumer: Send + Sync {
    /// Receive one record. Runs on the producer task; see the module docs
    /// for the blocking contract.
    fn accept(&self, record: &LogRecord);
}

impl<C: LogConsumer + ?Sized> LogConsumer for Arc<C> {
    fn accept(&self, record: &LogRecord) {
        (**self).accept(record)
    }
}
