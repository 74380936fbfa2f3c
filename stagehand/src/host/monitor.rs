//! Monitoring-only host: sample resources until interrupted.

use tracing::{info, warn};

use crate::context::WorkerContext;

/// Starts the sampler and waits for Ctrl-C.
pub async fn run_monitor(ctx: &WorkerContext) -> std::io::Result<()> {
    let sampler = ctx.start_sampler();
    info!(
        interval = ?ctx.config().sampler.interval,
        interface = %ctx.config().sampler.interface,
        "Monitoring started"
    );
    let result = tokio::signal::ctrl_c().await;
    sampler.abort();
    match &result {
        Ok(()) => info!("Monitoring stopped"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
    result
}
