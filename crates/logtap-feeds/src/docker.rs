//! Docker Engine API log source.
//!
//! Opens `GET /containers/{id}/logs` with one HTTP/1.1 connection per
//! stream, over the daemon's Unix socket or plain TCP, and hands the raw
//! multiplexed body to the demultiplexer. Output is always requested with
//! daemon timestamps so reconnects resume by the daemon's clock.
//! Container lifecycle is not handled here.

use crate::source::{LogQuery, LogSource};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http_body_util::{BodyExt, BodyStream, Empty};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use logtap_core::config::DockerConfig;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::io::StreamReader;

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST`-style address: `unix:///path`, `tcp://host:port`,
    /// `http://host:port`, or a bare socket path.
    pub fn parse(host: &str) -> io::Result<Self> {
        let host = host.trim();
        if let Some(path) = host.strip_prefix("unix://") {
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if host.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(host)));
        }
        if let Some(rest) = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
        {
            let authority = rest.split('/').next().unwrap_or_default();
            if authority.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("docker host {host:?} has no address"),
                ));
            }
            return Ok(Self::Tcp(authority.to_string()));
        }
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported docker host {host:?}"),
        ))
    }
}

pub type DockerLogReader = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

/// Log stream of one container.
#[derive(Debug, Clone)]
pub struct DockerSource {
    endpoint: DockerEndpoint,
    container: String,
}

impl DockerSource {
    pub fn new(endpoint: DockerEndpoint, container: impl Into<String>) -> Self {
        Self {
            endpoint,
            container: container.into(),
        }
    }

    pub fn from_config(config: &DockerConfig, container: impl Into<String>) -> io::Result<Self> {
        Ok(Self::new(
            DockerEndpoint::parse(&config.resolved_host())?,
            container,
        ))
    }

    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.endpoint
    }

    fn logs_path(&self, query: LogQuery) -> String {
        let mut path = format!(
            "/containers/{}/logs?stdout=1&stderr=1&timestamps=1&follow={}",
            self.container,
            u8::from(query.follow)
        );
        if let Some(since) = query.since {
            path.push_str("&since=");
            path.push_str(&format_since(since));
        }
        path
    }

    async fn request(&self, query: LogQuery) -> io::Result<Response<Incoming>> {
        let request = Request::get(self.logs_path(query))
            .header(hyper::header::HOST, "docker")
            .body(Empty::<Bytes>::new())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        match &self.endpoint {
            #[cfg(unix)]
            DockerEndpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                send(TokioIo::new(stream), request).await
            }
            #[cfg(not(unix))]
            DockerEndpoint::Unix(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix sockets are not available here: {}", path.display()),
            )),
            DockerEndpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
                send(TokioIo::new(stream), request).await
            }
        }
    }
}

impl LogSource for DockerSource {
    type Reader = DockerLogReader;

    fn describe(&self) -> String {
        self.container.clone()
    }

    /// Always requested with `timestamps=1`.
    fn timestamped(&self) -> bool {
        true
    }

    async fn open(&self, query: LogQuery) -> io::Result<DockerLogReader> {
        tracing::debug!(container = %self.container, ?query, "opening docker log stream");
        let response = self.request(query).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such container: {}", self.container),
                ));
            }
            status => {
                let body = response
                    .into_body()
                    .collect()
                    .await
                    .map(|collected| collected.to_bytes())
                    .unwrap_or_default();
                return Err(io::Error::other(format!(
                    "docker API returned {status}: {}",
                    String::from_utf8_lossy(&body).trim()
                )));
            }
        }

        let body = BodyStream::new(response.into_body())
            .try_filter_map(|frame| futures::future::ready(Ok(frame.into_data().ok())))
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))
            .boxed();
        Ok(StreamReader::new(body))
    }
}

async fn send<T>(io: T, request: Request<Empty<Bytes>>) -> io::Result<Response<Incoming>>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(hyper_to_io)?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            tracing::debug!(error = %err, "docker connection closed");
        }
    });
    sender.send_request(request).await.map_err(hyper_to_io)
}

fn hyper_to_io(err: hyper::Error) -> io::Error {
    let kind = if err.is_parse() || err.is_user() {
        io::ErrorKind::InvalidData
    } else {
        io::ErrorKind::ConnectionAborted
    };
    io::Error::new(kind, err)
}

/// `since` as the API expects it: `<unix seconds>.<nanoseconds>`.
fn format_since(at: SystemTime) -> String {
    let elapsed = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:09}", elapsed.as_secs(), elapsed.subsec_nanos())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
