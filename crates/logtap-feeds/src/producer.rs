//! Producer — owns the background task that follows one resource's logs.
//!
//! ```text
//! start() ──► spawn follow loop ──► open(source) ──► demux ──► router.dispatch
//!                    ▲                                  │
//!                    └──── transient error: backoff, ◄──┘
//!                          reopen after the last delivered record
//! ```
//!
//! One producer is bound to one [`LogSource`]. At most one follow task runs
//! at a time; `start` while it runs is an error, `stop` while idle is a no-op.
//! A fresh `start` asks for the resource's output from the beginning; only
//! reconnects inside a run resume, 1ns after the last delivered record. That
//! instant is the record's runtime timestamp when the source stamps its
//! output, else the time it was read.

use crate::demux::{self, FrameDecoder, FrameError, DEFAULT_MAX_FRAME_BYTES};
use crate::retry::RetryPolicy;
use crate::source::{self, LogQuery, LogSource};
use futures::StreamExt;
use logtap_core::config::Config;
use logtap_core::{LogConsumer, LogRecord, Router};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("log producer for {0} is already started")]
    AlreadyStarted(String),

    /// The resource refused the stream for a non-transient reason.
    #[error("could not open log stream: {0}")]
    Open(#[source] io::Error),

    #[error("log stream still failing after {attempts} reconnect attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: FrameError,
    },

    #[error("log stream failed: {0}")]
    Fatal(#[source] FrameError),

    #[error("log follow task panicked")]
    Panicked,
}

/// Tunables for a producer's follow loop.
#[derive(Debug, Clone)]
pub struct FollowOptions {
    pub retry: RetryPolicy,
    pub max_frame_bytes: usize,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl From<&Config> for FollowOptions {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from(&config.reconnect),
            max_frame_bytes: config.follow.max_frame_bytes,
        }
    }
}

struct FollowTask {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), FollowError>>,
}

impl FollowTask {
    async fn join(self) -> Result<(), FollowError> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => Err(FollowError::Panicked),
            Err(_) => Ok(()),
        }
    }
}

pub struct LogProducer<S: LogSource> {
    source: Arc<S>,
    router: Arc<Router>,
    options: FollowOptions,
    task: tokio::sync::Mutex<Option<FollowTask>>,
    last_error: Mutex<Option<FollowError>>,
}

impl<S: LogSource> LogProducer<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, FollowOptions::default())
    }

    pub fn with_options(source: S, options: FollowOptions) -> Self {
        Self {
            source: Arc::new(source),
            router: Arc::new(Router::new()),
            options,
            task: tokio::sync::Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Register a consumer for records read after this call. Allowed whether
    /// or not the producer is running.
    pub fn follow_output(&self, consumer: Arc<dyn LogConsumer>) {
        self.router.register(consumer);
    }

    /// Spawn the follow task.
    ///
    /// Fails with [`FollowError::AlreadyStarted`] while a task is running. A
    /// task that already ended on its own (clean exit or fatal error) is
    /// reaped first; a fatal outcome nobody collected with
    /// [`stop`](Self::stop) is kept for [`take_last_error`](Self::take_last_error).
    pub async fn start(&self) -> Result<(), FollowError> {
        let mut task = self.task.lock().await;

        if let Some(running) = task.as_ref() {
            if !running.handle.is_finished() {
                return Err(FollowError::AlreadyStarted(self.source.describe()));
            }
        }
        if let Some(finished) = task.take() {
            if let Err(err) = finished.join().await {
                tracing::warn!(source = %self.source.describe(), error = %err, "previous follow ended with an error");
                *self.last_error() = Some(err);
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(follow(
            self.source.clone(),
            self.router.clone(),
            self.options.clone(),
            cancel.clone(),
        ));
        *task = Some(FollowTask { cancel, handle });

        tracing::info!(source = %self.source.describe(), "log producer started");
        Ok(())
    }

    /// Cancel the follow task and wait for it to exit.
    ///
    /// A no-op when nothing is running. If the task had already died, its
    /// error is returned here.
    pub async fn stop(&self) -> Result<(), FollowError> {
        let mut task = self.task.lock().await;
        let Some(running) = task.take() else {
            return Ok(());
        };

        running.cancel.cancel();
        let outcome = running.join().await;
        tracing::info!(source = %self.source.describe(), "log producer stopped");
        outcome
    }

    /// Whether a follow task is currently alive.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Error from a run that died on its own and was reaped by `start`.
    pub fn take_last_error(&self) -> Option<FollowError> {
        self.last_error().take()
    }

    fn last_error(&self) -> MutexGuard<'_, Option<FollowError>> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: LogSource> Drop for LogProducer<S> {
    fn drop(&mut self) {
        if let Some(running) = self.task.get_mut().as_ref() {
            running.cancel.cancel();
        }
    }
}

impl<S: LogSource> std::fmt::Debug for LogProducer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogProducer")
            .field("source", &self.source.describe())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Follow loop
// ---------------------------------------------------------------------------

async fn follow<S: LogSource>(
    source: Arc<S>,
    router: Arc<Router>,
    options: FollowOptions,
    cancel: CancellationToken,
) -> Result<(), FollowError> {
    let name = source.describe();
    let mut query = LogQuery::follow();
    // Consecutive failed attempts with no record delivered in between.
    let mut attempt = 0u32;
    let mut last_delivered: Option<SystemTime> = None;

    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            opened = source.open(query) => opened,
        };

        let failure = match opened {
            Ok(reader) => {
                let decoder = decoder_for(&*source, options.max_frame_bytes);
                let mut records = demux::demux_with(reader, decoder);
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(()),
                        next = records.next() => next,
                    };
                    match next {
                        Some(Ok(record)) => {
                            attempt = 0;
                            last_delivered = Some(record.timestamp().unwrap_or_else(SystemTime::now));
                            router.dispatch(&record);
                        }
                        Some(Err(err)) => break err,
                        None => {
                            tracing::info!(source = %name, "log stream closed; process exited");
                            return Ok(());
                        }
                    }
                }
            }
            Err(err) if source::is_transient(&err) => FrameError::Io(err),
            Err(err) => {
                tracing::error!(source = %name, error = %err, "log stream cannot be opened");
                return Err(FollowError::Open(err));
            }
        };

        if !failure.is_transient() {
            tracing::error!(source = %name, error = %failure, "log stream failed; stopping");
            return Err(FollowError::Fatal(failure));
        }

        attempt += 1;
        let Some(delay) = options.retry.next_delay(attempt) else {
            tracing::error!(source = %name, attempts = attempt - 1, error = %failure, "giving up reconnecting");
            return Err(FollowError::RetriesExhausted {
                attempts: attempt - 1,
                last: failure,
            });
        };

        tracing::warn!(source = %name, attempt, ?delay, error = %failure, "log stream dropped; reconnecting");
        query = resume_query(last_delivered);
        if !sleep_unless_cancelled(&cancel, delay).await {
            return Ok(());
        }
    }
}

/// Nothing delivered yet means nothing can be duplicated: start over.
fn resume_query(last_delivered: Option<SystemTime>) -> LogQuery {
    match last_delivered {
        Some(at) => LogQuery::follow().since(at + Duration::from_nanos(1)),
        None => LogQuery::follow(),
    }
}

fn decoder_for<S: LogSource>(source: &S, max_frame_bytes: usize) -> FrameDecoder {
    let decoder = FrameDecoder::new(max_frame_bytes);
    if source.timestamped() {
        decoder.timestamped()
    } else {
        decoder
    }
}

/// `false` if `cancel` fired first.
async fn sleep_unless_cancelled(cancel: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

// ---------------------------------------------------------------------------
// One-shot read
// ---------------------------------------------------------------------------

/// Read everything the resource has written so far, framing stripped.
pub async fn collect_logs<S: LogSource>(
    source: &S,
    max_frame_bytes: usize,
) -> Result<Vec<LogRecord>, FollowError> {
    let reader = source
        .open(LogQuery::snapshot())
        .await
        .map_err(FollowError::Open)?;

    let mut records = demux::demux_with(reader, decoder_for(source, max_frame_bytes));
    let mut out = Vec::new();
    while let Some(next) = records.next().await {
        out.push(next.map_err(FollowError::Fatal)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
