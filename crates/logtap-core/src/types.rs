//! Core types for logtap-core.
//!
//! A [`LogRecord`] is the unit that flows from the demultiplexer, through the
//! producer loop and router, into every consumer. Its [`Origin`] is assigned
//! once, when the frame is decoded, and never changes afterwards.

use bytes::Bytes;
use std::time::SystemTime;

/// Which output channel of the observed process a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    Stdout,
    Stderr,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Stdout => write!(f, "STDOUT"),
            Origin::Stderr => write!(f, "STDERR"),
        }
    }
}

/// One chunk of process output, tagged with its origin.
///
/// Content is kept exactly as the process wrote it (trailing newline
/// included). Cloning shares the underlying buffer.
///
/// `timestamp` is the runtime's own write time, present when the source
/// stamps its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    origin: Origin,
    content: Bytes,
    timestamp: Option<SystemTime>,
}

impl LogRecord {
    pub fn new(origin: Origin, content: impl Into<Bytes>) -> Self {
        Self {
            origin,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, at: SystemTime) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn stdout(content: impl Into<Bytes>) -> Self {
        Self::new(Origin::Stdout, content)
    }

    pub fn stderr(content: impl Into<Bytes>) -> Self {
        Self::new(Origin::Stderr, content)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Content as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
