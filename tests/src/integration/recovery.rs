//! # Crash Recovery
//!
//! A node is "crashed" by dropping its application context and restarted by
//! opening a new one on the same journal directory with fresh resources
//! registered under the same identifiers.
//!
//! ## Flows Tested:
//!
//! 1. Durable commit decision is carried out after restart
//! 2. Undecided transaction is rolled back after restart
//! 3. Unknown branch outcome is retried, settled branches are not, and a
//!    branch committed in one phase is retried in one phase
//! 4. Heuristic outcome and in-doubt participant survive restart
//! 5. Background sweep settles a transaction once its resource heals

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shared_types::{
        RecoverFlags, TransactionContext, TransactionStatus, Vote, XaErrorCode, XidFactory,
    };
    use xa_02_coordinator::{TransactionError, XaCoordinatorApi};
    use xa_runtime::CoordinatorRuntime;

    use crate::integration::support::{journal_archive, node, node_config, peer, register, rm};

    #[test]
    fn test_prepared_transaction_is_committed_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let xid = {
            let node = node(dir.path());
            journal_archive(
                &node,
                TransactionStatus::Prepared,
                true,
                &[(&rm("db-a"), Vote::Ok), (&rm("db-b"), Vote::Ok)],
            )
        };

        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));
        register(&node, &[a.clone(), b.clone()]);

        let report = node.recovery.start_recovery().unwrap();

        assert_eq!(report.recovered, 1);
        assert_eq!(report.committed, 1);
        assert_eq!((a.commit_calls(), b.commit_calls()), (1, 1));
        assert_eq!(a.rollback_calls() + b.rollback_calls(), 0);
        assert!(!node.repository.contains(&xid));
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_undecided_transaction_is_rolled_back_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let node = node(dir.path());
            journal_archive(
                &node,
                TransactionStatus::Preparing,
                true,
                &[(&rm("db-a"), Vote::Ok), (&rm("db-b"), Vote::Unset)],
            );
        }

        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));
        register(&node, &[a.clone(), b.clone()]);

        let report = node.recovery.start_recovery().unwrap();

        assert_eq!(report.rolled_back, 1);
        assert_eq!(a.rollback_calls(), 1);
        assert_eq!(a.commit_calls() + b.commit_calls(), 0);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_only_unsettled_branch_is_retried_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let xid = {
            let node = node(dir.path());
            let (a, b) = (rm("db-a"), rm("db-b"));
            b.fail_commit(XaErrorCode::ResourceManagerFail);

            let tx = node.manager.begin();
            let xid = tx.xid();
            tx.enlist(a.clone()).unwrap();
            tx.enlist(b.clone()).unwrap();

            let err = node.manager.commit(tx).unwrap_err();
            assert!(matches!(err, TransactionError::HeuristicHazard(_)));
            assert_eq!(a.commit_calls(), 1);

            let journaled = node.journal.replay().unwrap();
            assert_eq!(journaled[0].status, TransactionStatus::Committing);
            xid
        };

        let node = node(dir.path());
        let (a, b) = (rm("db-a"), rm("db-b"));
        register(&node, &[a.clone(), b.clone()]);

        let report = node.recovery.start_recovery().unwrap();

        assert_eq!(report.committed, 1);
        assert_eq!(a.commit_calls(), 0);
        assert_eq!(b.commit_calls(), 1);
        assert_eq!(node.manager.status(&xid), None);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_single_branch_is_recommitted_in_one_phase_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let node = node(dir.path());
            let a = rm("db-a");
            a.fail_commit(XaErrorCode::ResourceManagerFail);

            let tx = node.manager.begin();
            tx.enlist(a.clone()).unwrap();
            let err = node.manager.commit(tx).unwrap_err();
            assert!(matches!(err, TransactionError::HeuristicHazard(_)));
            assert_eq!(a.one_phase_commits(), 1);
        }

        let node = node(dir.path());
        let a = rm("db-a");
        register(&node, &[a.clone()]);

        let report = node.recovery.start_recovery().unwrap();

        assert_eq!(report.committed, 1);
        assert_eq!(a.prepare_calls(), 0);
        assert_eq!(a.one_phase_commits(), 1);
        assert_eq!(a.commit_calls(), 1);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_heuristic_outcome_survives_restart_until_forget() {
        let dir = tempfile::tempdir().unwrap();
        let xid = {
            let node = node(dir.path());
            let (a, b, p) = (rm("db-a"), rm("db-b"), peer("peer-p"));
            p.fail_commit(XaErrorCode::HeuristicRollback);

            let tx = node.manager.begin();
            let xid = tx.xid();
            for resource in [&a, &b, &p] {
                tx.enlist(resource.clone()).unwrap();
            }
            assert!(matches!(
                node.manager.commit(tx).unwrap_err(),
                TransactionError::HeuristicMixed
            ));
            xid
        };

        let node = node(dir.path());
        let (a, b, p) = (rm("db-a"), rm("db-b"), peer("peer-p"));
        register(&node, &[a.clone(), b.clone(), p.clone()]);

        let report = node.recovery.start_recovery().unwrap();
        assert_eq!(report.pending_forget, 1);
        assert_eq!(a.commit_calls() + b.commit_calls() + p.commit_calls(), 0);
        assert_eq!(node.manager.status(&xid), Some(TransactionStatus::Committed));

        let scan = XaCoordinatorApi::recover(&*node.manager, RecoverFlags::TMNOFLAGS).unwrap();
        assert_eq!(scan, vec![xid]);
        assert!(XaCoordinatorApi::recover(&*node.manager, RecoverFlags::TMENDRSCAN)
            .unwrap()
            .is_empty());

        XaCoordinatorApi::forget(&*node.manager, &xid).unwrap();
        assert_eq!(p.forget_calls(), 1);
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_in_doubt_participant_waits_for_peer_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let xid = {
            let node = node(dir.path());
            let a = rm("db-a");
            let origin = TransactionContext::new(XidFactory::default().create_global_xid(), 300)
                .propagate("node-upstream");
            let tx = node.manager.begin_propagated(&origin).unwrap();
            tx.enlist(a).unwrap();
            let xid = tx.xid();
            drop(tx);
            assert_eq!(XaCoordinatorApi::prepare(&*node.manager, &xid).unwrap(), Vote::Ok);
            xid
        };

        let node = node(dir.path());
        let a = rm("db-a");
        register(&node, &[a.clone()]);

        let report = node.recovery.start_recovery().unwrap();
        assert_eq!(report.in_doubt, 1);
        assert_eq!(node.recovery.timing_recover().recovered, 0);
        assert_eq!(a.commit_calls() + a.rollback_calls(), 0);

        let scan = XaCoordinatorApi::recover(&*node.manager, RecoverFlags::TMSTARTRSCAN).unwrap();
        assert_eq!(scan, vec![xid]);

        XaCoordinatorApi::rollback(&*node.manager, &xid).unwrap();
        assert_eq!(a.rollback_calls(), 1);
        assert!(!node.repository.contains(&xid));
        assert!(node.journal.replay().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_sweep_settles_healed_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = node_config(dir.path());
        config.coordinator.recovery_interval = Duration::from_millis(20);
        let context = xa_runtime::ApplicationContext::new(config).unwrap();

        let (a, b) = (rm("db-a"), rm("db-b"));
        b.fail_commit(XaErrorCode::ResourceManagerFail);
        let tx = context.manager.begin();
        let xid = tx.xid();
        tx.enlist(a.clone()).unwrap();
        tx.enlist(b.clone()).unwrap();
        assert!(context.manager.commit(tx).is_err());
        assert_eq!(context.repository.error_count(), 1);

        let mut runtime = CoordinatorRuntime::new(context);
        let report = runtime.start().await.unwrap();
        assert_eq!(report.recovered, 0);

        b.heal();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let context = runtime.context();
        assert_eq!(context.repository.error_count(), 0);
        assert_eq!(context.manager.status(&xid), None);
        assert_eq!(b.commit_calls(), 2);
        assert!(context.journal.replay().unwrap().is_empty());

        drop(context);
        runtime.shutdown().await;
    }
}
