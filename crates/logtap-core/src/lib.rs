//! logtap-core — records, fan-out, and consumers.
//!
//! This crate holds everything downstream of the demultiplexer: the
//! [`LogRecord`] value, the [`Router`](router::Router) that fans records out,
//! the [`LogConsumer`](consumer::LogConsumer) capability with its reference
//! implementations, and the shared configuration types.
//!
//! # Architecture
//!
//! ```text
//! LogSource ──► Demux ──► Producer loop ──► Router ──► Consumer × N
//! (logtap-feeds)                            (this crate)
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod router;
pub mod types;

pub use consumer::LogConsumer;
pub use error::WaitError;
pub use router::Router;
pub use types::{LogRecord, Origin};
