//! # Transaction Recovery
//!
//! Replays the journal at startup and re-drives every surviving transaction
//! toward its recorded outcome. Anything that cannot finish yet goes to the
//! repository's error set, which `timing_recover` retries on every sweep.
//! Branches whose resource was not registered at replay are bound again
//! before each attempt.
//!
//! | Archive | Action |
//! |---|---|
//! | participant, `Prepared` | kept in doubt until the peer decides |
//! | terminal with heuristic branches | kept until `forget` |
//! | `Prepared` / `Committing` / `Committed` | commit |
//! | anything else | rollback |

use std::sync::Arc;

use shared_types::{TransactionArchive, TransactionStatus, XidFactory};
use tracing::{debug, error, info, warn};
use xa_01_journal::TransactionLogger;

use super::coordinator::TransactionCoordinator;
use super::listener::ListenerChain;
use super::repository::TransactionRepository;
use crate::domain::TransactionError;
use crate::ports::outbound::ResourceResolver;

/// Counts from one recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Transactions examined.
    pub recovered: usize,
    pub committed: usize,
    pub rolled_back: usize,
    /// Participants waiting for their propagating peer.
    pub in_doubt: usize,
    /// Heuristic outcomes waiting for `forget`.
    pub pending_forget: usize,
    /// Still unresolved; retried on the next sweep.
    pub failed: usize,
}

/// Recovery engine.
pub struct TransactionRecovery {
    logger: Arc<dyn TransactionLogger>,
    repository: Arc<TransactionRepository>,
    resolver: Arc<dyn ResourceResolver>,
    listeners: ListenerChain,
    xid_factory: Arc<XidFactory>,
}

impl TransactionRecovery {
    pub fn new(
        logger: Arc<dyn TransactionLogger>,
        repository: Arc<TransactionRepository>,
        resolver: Arc<dyn ResourceResolver>,
        listeners: ListenerChain,
        xid_factory: Arc<XidFactory>,
    ) -> Self {
        Self {
            logger,
            repository,
            resolver,
            listeners,
            xid_factory,
        }
    }

    /// Replay the journal and re-drive every surviving transaction.
    pub fn start_recovery(&self) -> Result<RecoveryReport, TransactionError> {
        let mut archives = Vec::new();
        self.logger
            .recover(&mut |archive: TransactionArchive| archives.push(archive))?;
        info!(count = archives.len(), "[xa-02] Journal replayed");

        let mut report = RecoveryReport::default();
        for archive in archives {
            if self.repository.contains(&archive.xid) {
                debug!(xid = %archive.xid, "[xa-02] Transaction already live, skipping");
                continue;
            }

            let coordinator = Arc::new(TransactionCoordinator::from_archive(
                archive,
                self.resolver.as_ref(),
                self.logger.clone(),
                self.listeners.clone(),
                self.xid_factory.clone(),
            ));
            report.recovered += 1;

            if coordinator.is_in_doubt() {
                info!(xid = %coordinator.xid(), "[xa-02] Prepared participant left in doubt");
                self.repository.put_error_transaction(coordinator);
                report.in_doubt += 1;
                continue;
            }
            self.drive(&coordinator, &mut report);
        }

        info!(
            recovered = report.recovered,
            committed = report.committed,
            rolled_back = report.rolled_back,
            in_doubt = report.in_doubt,
            pending_forget = report.pending_forget,
            failed = report.failed,
            "[xa-02] Recovery complete"
        );
        Ok(report)
    }

    /// Retry every errored transaction that recovery can finish.
    pub fn timing_recover(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();
        for coordinator in self.repository.error_transactions() {
            if coordinator.is_in_doubt() || coordinator.awaits_forget() {
                continue;
            }
            report.recovered += 1;
            self.drive(&coordinator, &mut report);
        }
        if report.recovered > 0 {
            debug!(
                retried = report.recovered,
                failed = report.failed,
                "[xa-02] Recovery sweep finished"
            );
        }
        report
    }

    fn drive(&self, coordinator: &Arc<TransactionCoordinator>, report: &mut RecoveryReport) {
        let xid = coordinator.xid();
        coordinator.rebind(self.resolver.as_ref());
        let result = coordinator.recover();

        if coordinator.awaits_forget() {
            if let Err(e) = &result {
                error!(%xid, error = %e, "[xa-02] Recovered transaction ended heuristically");
            }
            self.repository.mark_error(coordinator.clone());
            report.pending_forget += 1;
            return;
        }

        match result {
            Ok(()) if !coordinator.needs_recovery() => {
                self.repository.forget(&xid);
                match coordinator.status() {
                    TransactionStatus::Committed => report.committed += 1,
                    TransactionStatus::RolledBack => report.rolled_back += 1,
                    _ => {}
                }
            }
            Ok(()) => {
                self.repository.mark_error(coordinator.clone());
                report.failed += 1;
            }
            Err(e) => {
                warn!(
                    %xid,
                    attempt = coordinator.recovered_times(),
                    error = %e,
                    "[xa-02] Recovery attempt failed, will retry"
                );
                self.repository.mark_error(coordinator.clone());
                report.failed += 1;
            }
        }
    }
}
