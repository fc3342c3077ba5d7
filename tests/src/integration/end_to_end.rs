//! # End-to-End Completion Paths
//!
//! The coordinator driving mock resources while every transition lands in
//! the file journal.
//!
//! ## Flows Tested:
//!
//! 1. Two-phase commit across native resources, every transition journaled
//! 2. Last-resource optimization with a remote peer
//! 3. Heuristic mixed outcome held until `forget`
//! 4. Prepare failure and rollback-only paths

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_types::{
        DelistFlag, RecoverFlags, RollbackReason, StrategyType, TransactionStatus, Vote,
        XaErrorCode,
    };
    use xa_01_journal::{
        ArchivePayload, ArchiveSerializer, BincodeArchiveSerializer, JournalFile, JournalOperator,
    };
    use xa_02_coordinator::{MockListener, TransactionError, XaCoordinatorApi};
    use xa_runtime::ApplicationContext;

    use crate::integration::support::{node, node_config, node_with_listener, peer, rm};

    #[test]
    fn test_native_and_remote_commit_journals_every_transition() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = node_config(dir.path());
        config.journal.initial_size = 1024 * 1024;
        let node = ApplicationContext::new(config).unwrap();
        let (a, b) = (rm("db-a"), peer("peer-b"));

        let tx = node.manager.begin();
        let xid = tx.xid();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(b.clone()).unwrap();
        node.manager.commit(tx).unwrap();

        let mut master = JournalFile::open(&node.journal_stats().master_path).unwrap();
        let serializer = BincodeArchiveSerializer;
        let transitions: Vec<_> = master
            .read_records()
            .unwrap()
            .into_iter()
            .filter(|r| &r.global_id == xid.global_transaction_id())
            .filter_map(|r| match serializer.deserialize(&r.payload) {
                Ok(ArchivePayload::Transaction(archive)) => Some((r.operator, archive.status)),
                _ => None,
            })
            .collect();

        assert_eq!(
            transitions,
            vec![
                (JournalOperator::Create, TransactionStatus::Preparing),
                (JournalOperator::Modify, TransactionStatus::Prepared),
                (JournalOperator::Modify, TransactionStatus::Committing),
                (JournalOperator::Delete, TransactionStatus::Committed),
            ]
        );
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_two_phase_commit_leaves_nothing_to_recover() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = (rm("db-a"), rm("db-b"));

        {
            let node = node(dir.path());
            let tx = node.manager.begin();
            tx.enlist(a.clone()).unwrap();
            tx.enlist(b.clone()).unwrap();
            node.manager.commit(tx).unwrap();

            assert_eq!((a.prepare_calls(), a.commit_calls()), (1, 1));
            assert_eq!((b.prepare_calls(), b.commit_calls()), (1, 1));
            assert!(node.journal_stats().used_bytes > 0);
        }

        let node = node(dir.path());
        assert!(node.journal.replay().unwrap().is_empty());
        let report = node.recovery.start_recovery().unwrap();
        assert_eq!(report.recovered, 0);
    }

    #[test]
    fn test_read_only_voters_skip_the_commit_phase() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));
        a.set_vote(Vote::ReadOnly);
        b.set_vote(Vote::ReadOnly);

        let tx = node.manager.begin();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(b.clone()).unwrap();
        node.manager.commit(tx).unwrap();

        assert_eq!(a.commit_calls() + b.commit_calls(), 0);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_last_resource_optimization_with_remote_peer() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());
        let (a, p) = (rm("db-a"), peer("peer-p"));

        let tx = node.manager.begin();
        let coordinator = tx.coordinator().clone();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(p.clone()).unwrap();
        node.manager.commit(tx).unwrap();

        assert_eq!(coordinator.strategy_type(), Some(StrategyType::LastResourceOptimize));
        assert_eq!(a.prepare_calls(), 0);
        assert_eq!(a.one_phase_commits(), 1);
        assert_eq!(p.prepare_calls(), 1);
        assert_eq!(p.commit_calls(), 1);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_heuristic_mixed_is_journaled_until_forget() {
        let dir = tempfile::tempdir().unwrap();
        let listener = Arc::new(MockListener::new());
        let node = node_with_listener(dir.path(), listener.clone());
        let (a, b, p) = (rm("db-a"), rm("db-b"), peer("peer-p"));
        p.fail_commit(XaErrorCode::HeuristicRollback);

        let tx = node.manager.begin();
        let xid = tx.xid();
        for resource in [&a, &b, &p] {
            tx.enlist(resource.clone()).unwrap();
        }

        let err = node.manager.commit(tx).unwrap_err();
        assert!(matches!(err, TransactionError::HeuristicMixed));
        assert!(listener.events().contains(&"commit_heuristic_mixed"));

        let journaled = node.journal.replay().unwrap();
        assert_eq!(journaled.len(), 1);
        assert_eq!(journaled[0].status, TransactionStatus::Committed);
        assert!(journaled[0].resources().any(|r| r.heuristic));

        let scan = XaCoordinatorApi::recover(&*node.manager, RecoverFlags::TMSTARTRSCAN).unwrap();
        assert_eq!(scan, vec![xid]);

        XaCoordinatorApi::forget(&*node.manager, &xid).unwrap();
        assert_eq!(p.forget_calls(), 1);
        assert!(node.journal.replay().unwrap().is_empty());
        assert_eq!(node.repository.error_count(), 0);
    }

    #[test]
    fn test_prepare_failure_rolls_back_and_clears_journal() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));
        b.fail_prepare(XaErrorCode::RolledBack(RollbackReason::Integrity));

        let tx = node.manager.begin();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(b.clone()).unwrap();

        let err = node.manager.commit(tx).unwrap_err();
        assert!(matches!(err, TransactionError::RollbackRequired(_)));
        assert_eq!(a.rollback_calls(), 1);
        assert_eq!(a.commit_calls() + b.commit_calls(), 0);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_failed_delist_never_touches_the_journal() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));

        let tx = node.manager.begin();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(b.clone()).unwrap();
        tx.delist(b.as_ref(), DelistFlag::Fail).unwrap();
        assert_eq!(tx.status(), TransactionStatus::MarkedRollback);

        let err = node.manager.commit(tx).unwrap_err();
        assert!(matches!(err, TransactionError::RollbackRequired(_)));
        assert_eq!(a.prepare_calls() + b.prepare_calls(), 0);
        assert_eq!(node.journal_stats().used_bytes, 0);
    }

    #[test]
    fn test_participant_waits_for_propagating_peer() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = node(dir.path().join("upstream").as_path());
        let downstream = node(dir.path().join("downstream").as_path());
        let a = rm("db-a");

        let origin = upstream.manager.begin();
        let context = origin.context().propagate("node-upstream");
        let tx = downstream.manager.begin_propagated(&context).unwrap();
        tx.enlist(a.clone()).unwrap();
        let xid = tx.xid();
        drop(tx);

        assert_eq!(
            XaCoordinatorApi::prepare(&*downstream.manager, &xid).unwrap(),
            Vote::Ok
        );
        assert_eq!(downstream.journal.replay().unwrap().len(), 1);

        XaCoordinatorApi::commit(&*downstream.manager, &xid, false).unwrap();
        assert_eq!(a.commit_calls(), 1);
        assert!(downstream.journal.replay().unwrap().is_empty());

        upstream.manager.rollback(origin).unwrap();
        assert_eq!(upstream.journal_stats().used_bytes, 0);
    }
}
