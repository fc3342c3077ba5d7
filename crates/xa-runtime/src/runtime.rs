use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use xa_02_coordinator::RecoveryReport;

use crate::container::ApplicationContext;
use crate::handlers::{spawn_compaction, spawn_recovery_sweep};

/// A running coordinator: the application context plus its background tasks.
pub struct CoordinatorRuntime {
    context: Arc<ApplicationContext>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorRuntime {
    pub fn new(context: ApplicationContext) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            context: Arc::new(context),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    /// Start the coordinator.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Replay the journal and re-drive every surviving transaction
    /// 2. Start the compaction task
    /// 3. Start the recovery sweep
    ///
    /// Register resources on the context before this is called. A journaled
    /// branch whose resource is missing is retried by the sweep once it
    /// registers.
    pub async fn start(&mut self) -> Result<RecoveryReport> {
        info!("[xa-rt] Starting transaction coordinator");

        let recovery = Arc::clone(&self.context.recovery);
        let report = tokio::task::spawn_blocking(move || recovery.start_recovery())
            .await
            .context("Startup recovery task panicked")?
            .context("Startup recovery failed")?;

        info!(
            recovered = report.recovered,
            committed = report.committed,
            rolled_back = report.rolled_back,
            in_doubt = report.in_doubt,
            pending_forget = report.pending_forget,
            failed = report.failed,
            "[xa-rt] Startup recovery finished"
        );

        self.tasks.push(spawn_compaction(
            Arc::clone(&self.context.journal),
            self.context.config.journal.compaction_interval,
            self.shutdown_rx.clone(),
        ));
        self.tasks.push(spawn_recovery_sweep(
            Arc::clone(&self.context.recovery),
            self.context.config.coordinator.recovery_interval,
            self.shutdown_rx.clone(),
        ));

        info!(
            journal = %self.context.config.journal.directory.display(),
            "[xa-rt] Coordinator running"
        );
        Ok(report)
    }

    /// Stop the background tasks and flush the journal.
    pub async fn shutdown(self) {
        info!("[xa-rt] Initiating graceful shutdown");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!(error = %e, "[xa-rt] Failed to send shutdown signal");
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "[xa-rt] Background task ended abnormally");
            }
        }

        self.context.journal.close();
        info!("[xa-rt] Shutdown complete");
    }

    pub fn context(&self) -> Arc<ApplicationContext> {
        Arc::clone(&self.context)
    }

    pub fn background_tasks(&self) -> usize {
        self.tasks.len()
    }
}
