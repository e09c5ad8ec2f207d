//! Demux — splits a multiplexed container log stream into [`LogRecord`]s.
//!
//! The runtime interleaves stdout and stderr on one connection, prefixing
//! each chunk with an 8-byte header:
//!
//! ```text
//! [stream: u8, 0, 0, 0, len: u32 big-endian][payload: len bytes]
//! ```
//!
//! | stream | meaning      | result                               |
//! |--------|--------------|--------------------------------------|
//! | 0      | stdin        | record tagged [`Origin::Stdout`]     |
//! | 1      | stdout       | record tagged [`Origin::Stdout`]     |
//! | 2      | stderr       | record tagged [`Origin::Stderr`]     |
//! | 3      | system error | [`FrameError::SystemError`]          |
//! | other  | —            | [`FrameError::InvalidStream`]        |
//!
//! Headers never reach consumers. A frame split across any number of reads
//! is reassembled before it is emitted; one frame is one record.
//!
//! A timestamped decoder also strips the `<RFC 3339 time> ` prefix the
//! runtime adds when asked for timestamps, and keeps the time on the record.

use crate::source;
use bytes::{Buf, Bytes, BytesMut};
use logtap_core::{LogRecord, Origin};
use std::io;
use std::time::SystemTime;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

pub const HEADER_LEN: usize = 8;

/// Default cap on one frame's payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const STREAM_STDIN: u8 = 0;
const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;
const STREAM_SYSTEM_ERR: u8 = 3;

/// Longest prefix searched for the timestamp separator.
/// `2006-01-02T15:04:05.999999999+07:00` is 35 bytes.
const MAX_TIMESTAMP_LEN: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Unknown stream byte. Everything after it is unframed garbage.
    #[error("received invalid stream type {0}; log stream is out of sync")]
    InvalidStream(u8),

    #[error("container runtime reported an error: {0}")]
    SystemError(String),

    /// Input ended inside a header or payload.
    #[error("log stream ended mid-frame with {buffered} bytes buffered")]
    Truncated { buffered: usize },

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Whether reopening the stream is worth trying.
    pub fn is_transient(&self) -> bool {
        match self {
            FrameError::Truncated { .. } => true,
            FrameError::Io(err) => source::is_transient(err),
            _ => false,
        }
    }
}

/// [`Decoder`] for the multiplexed frame format.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_bytes: usize,
    timestamps: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            timestamps: false,
        }
    }

    /// Expect every payload to start with a runtime timestamp.
    pub fn timestamped(mut self) -> Self {
        self.timestamps = true;
        self
    }
}

impl Decoder for FrameDecoder {
    type Item = LogRecord;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogRecord>, FrameError> {
        loop {
            if src.len() < HEADER_LEN {
                src.reserve(HEADER_LEN - src.len());
                return Ok(None);
            }

            let stream = src[0];
            let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;

            let origin = match stream {
                STREAM_STDIN | STREAM_STDOUT => Some(Origin::Stdout),
                STREAM_STDERR => Some(Origin::Stderr),
                STREAM_SYSTEM_ERR => None,
                other => return Err(FrameError::InvalidStream(other)),
            };

            if len == 0 {
                src.advance(HEADER_LEN);
                continue;
            }

            if len > self.max_frame_bytes {
                return Err(FrameError::FrameTooLarge {
                    len,
                    max: self.max_frame_bytes,
                });
            }

            let frame_len = HEADER_LEN + len;
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            src.advance(HEADER_LEN);
            let payload = src.split_to(len).freeze();

            return match origin {
                Some(origin) if self.timestamps => {
                    let (at, content) = split_timestamp(payload);
                    let record = LogRecord::new(origin, content);
                    Ok(Some(match at {
                        Some(at) => record.with_timestamp(at),
                        None => record,
                    }))
                }
                Some(origin) => Ok(Some(LogRecord::new(origin, payload))),
                None => Err(FrameError::SystemError(
                    String::from_utf8_lossy(&payload).trim_end().to_string(),
                )),
            };
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogRecord>, FrameError> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                buffered: src.len(),
            }),
        }
    }
}

/// Split `<RFC 3339 time> <content>`. A payload without a parseable prefix
/// is returned whole.
fn split_timestamp(payload: Bytes) -> (Option<SystemTime>, Bytes) {
    let Some(space) = payload
        .iter()
        .take(MAX_TIMESTAMP_LEN)
        .position(|&b| b == b' ')
    else {
        return (None, payload);
    };
    let at = std::str::from_utf8(&payload[..space])
        .ok()
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok());
    match at {
        Some(at) => (Some(SystemTime::from(at)), payload.slice(space + 1..)),
        None => (None, payload),
    }
}

/// Stream of records read from `reader`. Ends at a clean end of input.
pub type Demuxer<R> = FramedRead<R, FrameDecoder>;

pub fn demux<R: AsyncRead>(reader: R, max_frame_bytes: usize) -> Demuxer<R> {
    demux_with(reader, FrameDecoder::new(max_frame_bytes))
}

pub fn demux_with<R: AsyncRead>(reader: R, decoder: FrameDecoder) -> Demuxer<R> {
    FramedRead::new(reader, decoder)
}

/// Encode one frame. The inverse of [`FrameDecoder`], used by fakes and
/// benches that need to produce a runtime-shaped stream.
pub fn encode_frame(origin: Origin, payload: &[u8]) -> Vec<u8> {
    let stream = match origin {
        Origin::Stdout => STREAM_STDOUT,
        Origin::Stderr => STREAM_STDERR,
    };
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&[stream, 0, 0, 0]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
