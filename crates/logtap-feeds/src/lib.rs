//! logtap-feeds — following container log streams.
//!
//! A [`LogSource`] opens a resource's multiplexed output, the
//! [`demux`] module splits it into [`logtap_core::LogRecord`]s, and a
//! [`LogProducer`] drives that pipeline on a background task, reconnecting
//! on transient failures and dispatching every record to its router.

pub mod demux;
pub mod docker;
pub mod producer;
pub mod retry;
pub mod source;

pub use demux::{FrameDecoder, FrameError};
pub use docker::{DockerEndpoint, DockerSource};
pub use producer::{collect_logs, FollowError, FollowOptions, LogProducer};
pub use retry::RetryPolicy;
pub use source::{LogQuery, LogSource};
