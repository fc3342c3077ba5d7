//! # Background Worker
//!
//! Periodic blocking jobs on the tokio runtime. Each job runs on the blocking
//! pool so journal I/O and calls to remote resources never stall the async
//! workers. A job stops at the next tick after the shutdown channel flips.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use xa_01_journal::ArchiveJournal;
use xa_02_coordinator::TransactionRecovery;

/// Run `job` every `period` until `shutdown` becomes true or its sender
/// is dropped. The first run happens one period after spawning.
pub fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() + Send + Sync + 'static,
{
    let job = Arc::new(job);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let job = Arc::clone(&job);
                    if let Err(e) = tokio::task::spawn_blocking(move || job()).await {
                        warn!(task = name, error = %e, "[xa-rt] Background job aborted");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(task = name, "[xa-rt] Shutdown signal received");
                        break;
                    }
                }
            }
        }
    })
}

/// Compact the journal every `period`.
pub fn spawn_compaction(
    journal: Arc<ArchiveJournal>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_periodic("compaction", period, shutdown, move || {
        match journal.compact() {
            Ok(report) if report.swapped => debug!(
                dropped = report.transactions_dropped,
                bytes_after = report.bytes_after,
                "[xa-rt] Scheduled compaction swapped journal files"
            ),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "[xa-rt] Scheduled compaction failed"),
        }
    })
}

/// Retry every transaction in the error set every `period`.
pub fn spawn_recovery_sweep(
    recovery: Arc<TransactionRecovery>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_periodic("recovery", period, shutdown, move || {
        let report = recovery.timing_recover();
        if report.recovered > 0 {
            info!(
                recovered = report.recovered,
                committed = report.committed,
                rolled_back = report.rolled_back,
                failed = report.failed,
                "[xa-rt] Recovery sweep finished"
            );
        }
    })
}
