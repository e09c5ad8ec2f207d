//! Fake Docker Engine API server for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves:
//! - `GET /containers/{id}/logs` — the container's output as multiplexed
//!   frames, backed by a [`FakeContainer`] so `follow`, `since` and
//!   `timestamps` behave like the real daemon
//!
//! In production the Docker API is usually served over a Unix socket. For
//! tests we use TCP; point a `DockerSource` at [`FakeDockerApi::endpoint`].
//!
//! # Example
//!
//! ```rust,ignore
//! let api = FakeDockerApi::start().await.unwrap();
//! let container = api.add_container("abc123").await;
//! container.stdout("ready\n");
//!
//! let source = DockerSource::new(api.endpoint(), "abc123");
//! ```

use super::fake_container::FakeContainer;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use logtap::{DockerEndpoint, LogQuery};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// State shared between the router and test code.
#[derive(Default)]
struct ApiState {
    containers: HashMap<String, FakeContainer>,
    /// Query string of every logs request, in arrival order.
    requests: Vec<HashMap<String, String>>,
}

/// Handle to the running fake Docker API server.
pub struct FakeDockerApi {
    addr: SocketAddr,
    state: Arc<Mutex<ApiState>>,
}

impl FakeDockerApi {
    /// Start the fake Docker API server on a random port. Returns once the
    /// server is listening.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(ApiState::default()));

        let app = Router::new()
            .route("/containers/{id}/logs", get(container_logs))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(Self { addr, state })
    }

    pub fn endpoint(&self) -> DockerEndpoint {
        DockerEndpoint::Tcp(self.addr.to_string())
    }

    /// Register a container and return the handle used to write its output.
    pub async fn add_container(&self, id: &str) -> FakeContainer {
        let container = FakeContainer::new(id);
        self.state
            .lock()
            .await
            .containers
            .insert(id.to_string(), container.clone());
        container
    }

    /// Query strings of every logs request received so far.
    pub async fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().await.requests.clone()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn container_logs(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<Mutex<ApiState>>>,
) -> Response {
    let container = {
        let mut state = state.lock().await;
        state.requests.push(params.clone());
        state.containers.get(&id).cloned()
    };

    let Some(container) = container else {
        return (
            StatusCode::NOT_FOUND,
            format!(r#"{{"message":"No such container: {id}"}}"#),
        )
            .into_response();
    };

    let query = LogQuery {
        follow: params.get("follow").map(String::as_str) == Some("1"),
        since: params.get("since").and_then(|s| parse_since(s)),
    };
    let timestamped = params.get("timestamps").map(String::as_str) == Some("1");
    match container.open_chunks(query, timestamped) {
        Ok(chunks) => (StatusCode::OK, Body::from_stream(chunks)).into_response(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// Inverse of the client's `<secs>.<nanos>` encoding.
fn parse_since(raw: &str) -> Option<SystemTime> {
    let (secs, nanos) = raw.split_once('.').unwrap_or((raw, "0"));
    Some(UNIX_EPOCH + Duration::new(secs.parse().ok()?, nanos.parse().ok()?))
}
