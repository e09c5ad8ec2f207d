//! The inbound contract: something that can open a resource's multiplexed
//! log stream.

use std::future::Future;
use std::io;
use std::time::SystemTime;
use tokio::io::AsyncRead;

/// What to ask the resource for when opening its log stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Keep the stream open and deliver output as it is written.
    pub follow: bool,
    /// Only output written at or after this instant. `None` means from the
    /// beginning.
    pub since: Option<SystemTime>,
}

impl LogQuery {
    /// Live stream from the beginning of the resource's output.
    pub fn follow() -> Self {
        Self {
            follow: true,
            since: None,
        }
    }

    /// Everything written so far, then end of stream.
    pub fn snapshot() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: SystemTime) -> Self {
        self.since = Some(since);
        self
    }
}

/// A resource whose output can be read as a multiplexed frame stream.
///
/// `open` errors are classified with [`is_transient`]: connection-level
/// kinds make the producer retry, anything else (notably
/// [`io::ErrorKind::NotFound`] for a resource that no longer exists) ends
/// the follow.
pub trait LogSource: Send + Sync + 'static {
    type Reader: AsyncRead + Send + Unpin + 'static;

    /// Short name for log lines (container id, fake name, ...).
    fn describe(&self) -> String;

    /// Whether every payload starts with the runtime's RFC 3339 write time
    /// and a space. Stamped records let a reconnect resume right after the
    /// last delivered record by the runtime's own clock.
    fn timestamped(&self) -> bool {
        false
    }

    fn open(&self, query: LogQuery) -> impl Future<Output = io::Result<Self::Reader>> + Send;
}

/// Connection-level failures that do not mean the process exited.
pub fn is_transient(err: &io::Error) -> bool {
    use io::ErrorKind::*;
    matches!(
        err.kind(),
        ConnectionReset
            | ConnectionAborted
            | ConnectionRefused
            | BrokenPipe
            | NotConnected
            | UnexpectedEof
            | TimedOut
            | Interrupted
    )
}
