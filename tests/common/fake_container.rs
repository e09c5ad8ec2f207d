//! FakeContainer — an in-memory [`LogSource`] with scriptable failures.
//!
//! Every write is stored with its wall-clock time and pushed to each open
//! follow stream as one runtime-shaped frame. Opening with `since` replays
//! only frames written at or after that instant, the way the container
//! runtime does, so reconnect behaviour can be asserted without a daemon.
//! Timestamped streams prefix each payload with its RFC 3339 write time.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::Stream;
use logtap::{LogQuery, LogSource, Origin};
use logtap_feeds::demux::encode_frame;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

/// Byte chunks of one opened stream. Implements [`Stream`] so it can back a
/// [`StreamReader`] here and an HTTP body in the fake Docker API.
pub struct FakeChunks {
    rx: mpsc::UnboundedReceiver<io::Result<Bytes>>,
}

impl Stream for FakeChunks {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a linked sender/stream pair.
pub fn fake_chunks() -> (mpsc::UnboundedSender<io::Result<Bytes>>, FakeChunks) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, FakeChunks { rx })
}

#[derive(Default)]
struct ContainerState {
    written: Vec<Written>,
    live: Vec<LiveStream>,
    opens: Vec<LogQuery>,
    refuse_opens: usize,
    exited: bool,
    removed: bool,
}

struct Written {
    at: SystemTime,
    origin: Origin,
    payload: Bytes,
}

impl Written {
    fn frame(&self, timestamped: bool) -> Bytes {
        if !timestamped {
            return Bytes::from(encode_frame(self.origin, &self.payload));
        }
        let stamp = DateTime::<Utc>::from(self.at).to_rfc3339_opts(SecondsFormat::Nanos, true);
        let mut payload = Vec::with_capacity(stamp.len() + 1 + self.payload.len());
        payload.extend_from_slice(stamp.as_bytes());
        payload.push(b' ');
        payload.extend_from_slice(&self.payload);
        Bytes::from(encode_frame(self.origin, &payload))
    }
}

struct LiveStream {
    tx: mpsc::UnboundedSender<io::Result<Bytes>>,
    timestamped: bool,
}

/// Cheaply cloneable handle; clones share the same container.
#[derive(Clone)]
pub struct FakeContainer {
    name: String,
    state: Arc<Mutex<ContainerState>>,
}

impl FakeContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    pub fn stdout(&self, line: &str) {
        self.write(Origin::Stdout, line.as_bytes(), None);
    }

    pub fn stderr(&self, line: &str) {
        self.write(Origin::Stderr, line.as_bytes(), None);
    }

    /// Write one frame but deliver it to live streams as two chunks, split
    /// `at` bytes into the encoded frame (header included).
    pub fn stdout_split(&self, line: &str, at: usize) {
        self.write(Origin::Stdout, line.as_bytes(), Some(at));
    }

    /// Reset every open follow stream, as a dropped daemon connection would.
    pub fn drop_connections(&self) {
        let mut state = self.state();
        for live in state.live.drain(..) {
            let _ = live.tx.send(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
    }

    /// The process exits: open streams end cleanly after what was written.
    pub fn exit(&self) {
        let mut state = self.state();
        state.exited = true;
        state.live.clear();
    }

    /// The container disappears: further opens fail with `NotFound`.
    pub fn remove(&self) {
        self.state().removed = true;
    }

    /// Fail the next `n` opens with `ConnectionRefused`.
    pub fn refuse_next_opens(&self, n: usize) {
        self.state().refuse_opens = n;
    }

    /// Queries of every open attempt so far, successful or not.
    pub fn opens(&self) -> Vec<LogQuery> {
        self.state().opens.clone()
    }

    pub async fn wait_for_opens(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.opens().len() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {n} opens, saw {:?}", self.opens()));
    }

    /// Open a stream of raw chunks. Shared by the [`LogSource`] impl and
    /// the fake Docker API.
    pub fn open_chunks(&self, query: LogQuery, timestamped: bool) -> io::Result<FakeChunks> {
        let mut state = self.state();
        state.opens.push(query);

        if state.removed {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such container: {}", self.name),
            ));
        }
        if state.refuse_opens > 0 {
            state.refuse_opens -= 1;
            return Err(io::ErrorKind::ConnectionRefused.into());
        }

        let (tx, chunks) = fake_chunks();
        for written in &state.written {
            if query.since.map_or(true, |since| written.at >= since) {
                let _ = tx.send(Ok(written.frame(timestamped)));
            }
        }
        if query.follow && !state.exited {
            state.live.push(LiveStream { tx, timestamped });
        }
        Ok(chunks)
    }

    fn write(&self, origin: Origin, payload: &[u8], split: Option<usize>) {
        let mut state = self.state();
        let written = Written {
            at: SystemTime::now(),
            origin,
            payload: Bytes::copy_from_slice(payload),
        };

        state.live.retain(|live| {
            let frame = written.frame(live.timestamped);
            let chunks: Vec<Bytes> = match split {
                Some(at) => vec![frame.slice(..at), frame.slice(at..)],
                None => vec![frame],
            };
            chunks.into_iter().all(|chunk| live.tx.send(Ok(chunk)).is_ok())
        });
        state.written.push(written);
    }

    fn state(&self) -> MutexGuard<'_, ContainerState> {
        self.state.lock().unwrap()
    }
}

impl LogSource for FakeContainer {
    type Reader = StreamReader<FakeChunks, Bytes>;

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn timestamped(&self) -> bool {
        true
    }

    fn open(&self, query: LogQuery) -> impl Future<Output = io::Result<Self::Reader>> + Send {
        std::future::ready(self.open_chunks(query, true).map(StreamReader::new))
    }
}
