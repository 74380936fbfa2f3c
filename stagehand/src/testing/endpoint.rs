//! A loopback HTTP endpoint that records every request.

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One request received by a [`RecordingEndpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Request body.
    pub body: String,
}

#[derive(Clone)]
struct EndpointState {
    status: StatusCode,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Answers every request with a fixed status and keeps a copy of it.
#[derive(Debug)]
pub struct RecordingEndpoint {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl RecordingEndpoint {
    /// Starts an endpoint answering 200.
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with_status(200).await
    }

    /// Starts an endpoint answering `status`.
    pub async fn start_with_status(status: u16) -> std::io::Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = EndpointState {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            requests: Arc::clone(&requests),
        };
        let router = Router::new().fallback(record).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            addr,
            requests,
            server,
        })
    }

    /// Base URL, without a trailing slash.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl Drop for RecordingEndpoint {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn record(
    State(state): State<EndpointState>,
    method: Method,
    uri: Uri,
    body: String,
) -> StatusCode {
    state.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    });
    state.status
}
