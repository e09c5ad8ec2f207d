//! Errors returned by consumer wait operations.

/// Why a [`BufferingConsumer::wait_for`](crate::consumer::BufferingConsumer::wait_for)
/// call did not observe its target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// Another wait is already pending on the same consumer.
    #[error("already waiting for {pending:?}")]
    AlreadyWaiting { pending: String },

    /// The caller's cancellation token fired before a match arrived.
    #[error("wait for {target:?} was cancelled")]
    Cancelled { target: String },

    /// The deadline elapsed before a match arrived.
    #[error("timed out after {elapsed:?} waiting for {target:?}")]
    TimedOut {
        target: String,
        elapsed: std::time::Duration,
    },
}

impl WaitError {
    /// `true` for both cancellation flavours (token or deadline).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. } | WaitError::TimedOut { .. })
    }
}
