//! HTTP host: one task per `POST /`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::response_summary;
use super::source::read_request;
use crate::context::WorkerContext;
use crate::pipeline::Pipeline;
use crate::storage::ObjectStore;

#[derive(Clone)]
struct ServerState {
    pipeline: Pipeline,
    store: Arc<dyn ObjectStore>,
}

/// Builds the router for a worker context.
pub fn router(ctx: &WorkerContext) -> Router {
    build_router(Pipeline::from_context(ctx), Arc::clone(ctx.store()))
}

/// Builds the router over an explicit pipeline and request store.
pub fn build_router(pipeline: Pipeline, store: Arc<dyn ObjectStore>) -> Router {
    Router::new()
        .route("/", post(handle_task))
        .route("/health", get(health))
        .with_state(ServerState { pipeline, store })
}

/// Binds the configured address and serves until the process exits.
pub async fn serve(ctx: &WorkerContext) -> std::io::Result<()> {
    let addr = ctx.config().server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "Listening for task requests");
    serve_on(listener, router(ctx)).await
}

/// Serves `router` on an already bound listener.
pub async fn serve_on(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router).await
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_task(State(state): State<ServerState>, body: String) -> (StatusCode, String) {
    let request = match read_request(&body, state.store.as_ref()).await {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Rejected task request");
            return (StatusCode::BAD_REQUEST, format!("Bad Request: {e}"));
        }
    };

    // a panicking pipeline surfaces as a join error instead of a dropped connection
    let pipeline = state.pipeline.clone();
    let run = tokio::spawn(async move { pipeline.run(&request).await });
    match run.await {
        Ok(Ok(record)) => {
            let body = response_summary(&record);
            info!("{}", body);
            (StatusCode::OK, body)
        }
        Ok(Err(e)) => (StatusCode::BAD_REQUEST, format!("Bad Request: {e}")),
        Err(e) => {
            error!(error = %e, "Pipeline task aborted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {e}"),
            )
        }
    }
}
