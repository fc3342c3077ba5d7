//! # XA Coordinator
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Load and validate configuration from the environment
//! 3. Open the journal and build the application context
//! 4. Replay outstanding transactions, start background tasks
//! 5. Run until Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use xa_runtime::{ApplicationContext, CoordinatorRuntime, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    let context = ApplicationContext::new(config)?;

    let mut runtime = CoordinatorRuntime::new(context);
    runtime.start().await?;

    info!("[xa-rt] Coordinator is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
