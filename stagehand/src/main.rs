//! Stagehand worker binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use stagehand::config::WorkerConfig;
use stagehand::context::WorkerContext;
use stagehand::host::{self, BatchInput};
use stagehand::observability::init_logging;

/// Containerized task worker.
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one task and exit 0 on success, 1 on failure
    Run {
        /// Task request JSON, or a `{"pointer": ...}` envelope
        request: Option<String>,

        /// Read the request from a file instead
        #[arg(long, conflicts_with = "request")]
        file: Option<PathBuf>,
    },

    /// Accept task requests over HTTP
    Serve,

    /// Only sample resources, until interrupted
    Monitor,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    init_logging(config.log_format).context("failed to initialise logging")?;

    let ctx = WorkerContext::initialize(config).await;

    match cli.command {
        Commands::Run { request, file } => {
            let _sampler = ctx.start_sampler();
            let input = match file {
                Some(path) => BatchInput::File(path),
                None => BatchInput::Inline(request.unwrap_or_default()),
            };
            let result = host::run_batch(&ctx, input).await;
            if let Err(e) = &result {
                error!(error = %e, "Task failed");
            }
            let code = u8::try_from(host::exit_code(&result)).unwrap_or(1);
            Ok(ExitCode::from(code))
        }
        Commands::Serve => {
            let _sampler = ctx.start_sampler();
            host::serve(&ctx).await.context("HTTP host failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Monitor => {
            host::run_monitor(&ctx).await.context("monitor failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
