//! # Journal Under Coordinator Load
//!
//! Compaction and the master/slave swap while the coordinator is writing,
//! and a crash in the middle of a swap with a transaction still in flight.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_types::{TransactionStatus, XaErrorCode};
    use xa_01_journal::domain::deleted_ids;
    use xa_01_journal::{JournalConfig, JournalFile, JournalRecord};
    use xa_02_coordinator::TransactionError;
    use xa_runtime::ApplicationContext;

    use crate::integration::support::{node, node_config, register, rm};

    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    #[test]
    fn test_concurrent_commits_trigger_compaction_and_leave_nothing_live() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        let tx = node.manager.begin();
                        tx.enlist(a.clone()).unwrap();
                        tx.enlist(b.clone()).unwrap();
                        node.manager.commit(tx).unwrap();
                    }
                });
            }
        });

        let total = THREADS * PER_THREAD;
        assert_eq!(a.commit_calls(), total);
        assert_eq!(b.commit_calls(), total);
        assert!(node.journal_stats().swap_count > 0);
        assert!(node.journal.replay().unwrap().is_empty());
        assert_eq!(node.repository.active_count(), 0);

        node.journal.compact().unwrap();
        let stats = node.journal_stats();
        assert_eq!(stats.used_bytes, 0);
    }

    #[test]
    fn test_compaction_keeps_in_flight_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = node_config(dir.path());
        config.journal.initial_size = 1024 * 1024;
        let node = ApplicationContext::new(config).unwrap();
        let (a, b) = (rm("db-a"), rm("db-b"));

        for _ in 0..5 {
            let tx = node.manager.begin();
            tx.enlist(a.clone()).unwrap();
            tx.enlist(b.clone()).unwrap();
            node.manager.commit(tx).unwrap();
        }

        b.fail_commit(XaErrorCode::ResourceManagerFail);
        let tx = node.manager.begin();
        let xid = tx.xid();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(b.clone()).unwrap();
        assert!(node.manager.commit(tx).is_err());

        let report = node.journal.compact().unwrap();
        assert!(report.swapped);
        assert_eq!(report.transactions_dropped, 5);

        let live = node.journal.replay().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].xid, xid);
        assert_eq!(live[0].status, TransactionStatus::Committing);

        b.heal();
        let sweep = node.recovery.timing_recover();
        assert_eq!(sweep.committed, 1);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    /// Open both files and return them as (master, slave).
    fn split(config: &JournalConfig) -> (JournalFile, JournalFile) {
        let first = JournalFile::open(&config.first_path()).unwrap();
        let second = JournalFile::open(&config.second_path()).unwrap();
        if first.is_master() {
            (first, second)
        } else {
            (second, first)
        }
    }

    #[test]
    fn test_crash_mid_swap_keeps_unresolved_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let config = JournalConfig::for_testing(dir.path());

        let xid = {
            let node = node(dir.path());
            let (a, b) = (rm("db-a"), rm("db-b"));
            for _ in 0..3 {
                let tx = node.manager.begin();
                tx.enlist(a.clone()).unwrap();
                tx.enlist(b.clone()).unwrap();
                node.manager.commit(tx).unwrap();
            }

            b.fail_commit(XaErrorCode::ResourceManagerFail);
            let tx = node.manager.begin();
            let xid = tx.xid();
            tx.enlist(a.clone()).unwrap();
            tx.enlist(b.clone()).unwrap();
            let err = node.manager.commit(tx).unwrap_err();
            assert!(matches!(err, TransactionError::HeuristicHazard(_)));
            xid
        };

        // Copy live records into the slave and mark it, then stop before
        // the old master is demoted.
        let promoted = {
            let (mut master, mut slave) = split(&config);
            let records = master.read_records().unwrap();
            let deleted = deleted_ids(&records);
            let live: Vec<JournalRecord> = records
                .into_iter()
                .filter(|r| !deleted.contains(&r.global_id))
                .collect();
            assert!(!live.is_empty());

            slave.reset(10).unwrap();
            slave.append_batch(&live, 11, config.increase_size).unwrap();
            slave.mark_as_master(12).unwrap();
            assert!(master.is_master());
            slave.path().to_path_buf()
        };

        let node = node(dir.path());
        assert_eq!(node.journal_stats().master_path, promoted);

        let journaled = node.journal.replay().unwrap();
        assert_eq!(journaled.len(), 1);
        assert_eq!(journaled[0].xid, xid);

        let (a, b) = (rm("db-a"), rm("db-b"));
        register(&node, &[Arc::clone(&a), Arc::clone(&b)]);
        let report = node.recovery.start_recovery().unwrap();

        assert_eq!(report.committed, 1);
        assert_eq!(a.commit_calls(), 0);
        assert_eq!(b.commit_calls(), 1);
        assert!(node.journal.replay().unwrap().is_empty());
    }
}
