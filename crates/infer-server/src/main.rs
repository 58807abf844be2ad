use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use infer_runtime::{mock::DEFAULT_MODEL_NAME, MockEngine};
use infer_server::{run_server, AppState, JobManager, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Polled generation job server backed by the mock echo engine.
#[derive(Parser)]
#[command(name = "infer-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "INFER_ADDR", default_value = "0.0.0.0:9090")]
    addr: SocketAddr,

    /// Model name reported by /health.
    #[arg(long, env = "INFER_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    model_name: String,

    /// Upper bound on max_new_tokens per job.
    #[arg(long, env = "INFER_MAX_NEW_TOKENS", default_value_t = 2000)]
    max_new_tokens: usize,

    /// Stop jobs running longer than this many seconds.
    #[arg(long, env = "INFER_JOB_TIMEOUT_SECS")]
    job_timeout_secs: Option<u64>,

    /// Simulated compute time per decoding step, in milliseconds.
    #[arg(long, env = "INFER_STEP_DELAY_MS", default_value_t = 25)]
    step_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let jobs = Arc::new(JobManager::loading());
    tracing::info!(model = %args.model_name, "loading engine");
    let engine = MockEngine::new()
        .with_name(args.model_name)
        .with_step_delay(Duration::from_millis(args.step_delay_ms));
    jobs.mark_loaded();

    let config = ServerConfig {
        max_new_tokens: args.max_new_tokens,
        job_timeout: args.job_timeout_secs.map(Duration::from_secs),
    };
    let state = AppState::with_jobs(Arc::new(engine), jobs, config);

    run_server(state, args.addr).await
}
