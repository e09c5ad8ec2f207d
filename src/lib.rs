//! logtap — follow container stdout/stderr and fan it out to consumers.
//!
//! This crate re-exports the two library layers so integration tests and the
//! binary can import them from one place.
//!
//! # Architecture
//!
//! ```text
//! LogSource ──► Demux ──► LogProducer ──► Router ──► Consumer × N
//! └────────── logtap-feeds ──────────┘   └─── logtap-core ───┘
//! ```
//!
//! Each producer runs one background `tokio` task; consumers are called
//! synchronously from it, in read order.

pub mod print;

pub use logtap_core::config::Config;
pub use logtap_core::consumer::{
    BufferingConsumer, LogConsumer, SentinelConsumer, SentinelSignal, TypedConsumer,
};
pub use logtap_core::{LogRecord, Origin, Router, WaitError};
pub use logtap_feeds::{
    collect_logs, DockerEndpoint, DockerSource, FollowError, FollowOptions, FrameDecoder,
    FrameError, LogProducer, LogQuery, LogSource, RetryPolicy,
};
