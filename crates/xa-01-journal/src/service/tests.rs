//! # Archive Journal Tests

use super::*;
use crate::adapters::file::JournalFile;
use shared_types::{StrategyType, TransactionStatus, Vote, Xid};

fn archive(id: u8) -> TransactionArchive {
    let global = Xid::global(Xid::DEFAULT_FORMAT_ID, [id; 32]);
    let mut archive = TransactionArchive::new(global, true);
    archive.upsert_resource(ResourceArchive::new(global.with_branch([1; 32]), "rm-native", false));
    archive.upsert_resource(ResourceArchive::new(global.with_branch([2; 32]), "peer-remote", true));
    archive
}

fn open(dir: &std::path::Path) -> ArchiveJournal {
    ArchiveJournal::open_default(JournalConfig::for_testing(dir)).unwrap()
}

fn collect(journal: &ArchiveJournal) -> Vec<TransactionArchive> {
    let mut out = Vec::new();
    journal
        .recover(&mut |a: TransactionArchive| out.push(a))
        .unwrap();
    out
}

#[test]
fn test_fresh_journal_has_first_file_as_master() {
    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());

    let stats = journal.stats();
    assert_eq!(stats.master_path, dir.path().join("journal-1.log"));
    assert_eq!(stats.used_bytes, 0);
    assert_eq!(stats.swap_count, 0);
}

#[test]
fn test_archive_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut tx = archive(1);
    tx.status = TransactionStatus::Prepared;
    tx.vote = Vote::Ok;
    tx.strategy_type = Some(StrategyType::Common);
    tx.propagated_by = Some("peer-a".to_string());
    tx.recovered_times = 2;
    tx.recovered_at = 1_700_000_000_000;

    {
        let journal = open(dir.path());
        journal.create_transaction(&tx).unwrap();
        journal.close();
    }

    let journal = open(dir.path());
    let recovered = collect(&journal);
    assert_eq!(recovered, vec![tx]);
}

#[test]
fn test_resource_update_replaces_branch() {
    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());
    let tx = archive(1);
    journal.create_transaction(&tx).unwrap();

    let mut branch = tx.native_resources[0].clone();
    branch.vote = Vote::Ok;
    journal.update_resource(&branch).unwrap();
    branch.committed = true;
    journal.update_resource(&branch).unwrap();

    let recovered = collect(&journal);
    assert_eq!(recovered[0].native_resources.len(), 1);
    assert!(recovered[0].native_resources[0].committed);
    assert_eq!(recovered[0].remote_resources.len(), 1);
}

#[test]
fn test_second_open_is_locked() {
    let dir = tempfile::tempdir().unwrap();
    let _journal = open(dir.path());
    let second = ArchiveJournal::open_default(JournalConfig::for_testing(dir.path()));
    assert!(matches!(second, Err(JournalError::Locked { .. })));
}

#[test]
fn test_compaction_keeps_only_live_records_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());

    let a = archive(1);
    let b = archive(2);
    let mut c = archive(3);
    journal.create_transaction(&a).unwrap();
    journal.create_transaction(&b).unwrap();
    journal.create_transaction(&c).unwrap();
    c.status = TransactionStatus::Prepared;
    journal.update_transaction(&c).unwrap();
    journal.delete_transaction(&b).unwrap();

    let report = journal.compact().unwrap();
    assert!(report.swapped);
    assert_eq!(report.records_before, 5);
    assert_eq!(report.records_after, 3);
    assert_eq!(report.transactions_dropped, 1);

    let stats = journal.stats();
    assert_eq!(stats.master_path, dir.path().join("journal-2.log"));
    assert_eq!(stats.swap_count, 1);

    let recovered = collect(&journal);
    let ids: Vec<Xid> = recovered.iter().map(|r| r.xid).collect();
    assert_eq!(ids, vec![a.xid, c.xid]);
    assert_eq!(recovered[1].status, TransactionStatus::Prepared);
}

#[test]
fn test_compaction_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());
    let a = archive(1);
    let b = archive(2);
    journal.create_transaction(&a).unwrap();
    journal.create_transaction(&b).unwrap();
    journal.delete_transaction(&a).unwrap();

    journal.compact().unwrap();
    let after_first = journal.stats();
    let recovered_first = collect(&journal);

    let second = journal.compact().unwrap();
    assert!(!second.swapped);
    assert_eq!(second.records_before, second.records_after);
    assert_eq!(journal.stats(), after_first);
    assert_eq!(collect(&journal), recovered_first);
}

#[test]
fn test_threshold_triggers_inline_compaction() {
    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());

    // Resolved transactions only: every swap empties the master.
    for id in 0..40u8 {
        let tx = archive(id);
        journal.create_transaction(&tx).unwrap();
        journal.delete_transaction(&tx).unwrap();
    }

    let stats = journal.stats();
    assert!(stats.swap_count > 0);
    assert!(collect(&journal).is_empty());
    let config = journal.config();
    assert!(!config.exceeds_threshold(stats.used_bytes, stats.capacity_bytes - 64));
}

#[test]
fn test_failed_inline_compaction_still_acknowledges_appends() {
    use std::io::{Seek, SeekFrom, Write};

    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());
    journal.create_transaction(&archive(0)).unwrap();

    // Garble the operator byte of the first record so compaction cannot
    // read the master back.
    let mut raw = std::fs::OpenOptions::new()
        .write(true)
        .open(journal.stats().master_path)
        .unwrap();
    raw.seek(SeekFrom::Start(64 + 32)).unwrap();
    raw.write_all(&[0xFF]).unwrap();
    raw.sync_all().unwrap();

    for id in 1..40u8 {
        let tx = archive(id);
        journal.create_transaction(&tx).unwrap();
        journal.delete_transaction(&tx).unwrap();
    }

    let stats = journal.stats();
    assert_eq!(stats.swap_count, 0);
    assert!(stats.used_bytes > 4 * 1024);
    assert!(matches!(journal.compact(), Err(JournalError::Corrupt { .. })));
}

#[test]
fn test_live_records_grow_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let journal = open(dir.path());
    let initial = journal.stats().capacity_bytes;

    for id in 0..60u8 {
        journal.create_transaction(&archive(id)).unwrap();
    }

    let stats = journal.stats();
    assert!(stats.capacity_bytes > initial);
    assert_eq!(collect(&journal).len(), 60);
}

#[test]
fn test_crash_after_mark_as_master_rolls_forward() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::for_testing(dir.path());
    let a = archive(1);
    let b = archive(2);

    {
        let journal = open(dir.path());
        journal.create_transaction(&a).unwrap();
        journal.create_transaction(&b).unwrap();
        journal.delete_transaction(&a).unwrap();
    }

    // Replay steps 1-3a of the swap by hand, then "crash".
    {
        let mut master = JournalFile::open(&config.first_path()).unwrap();
        let mut slave = JournalFile::open(&config.second_path()).unwrap();
        let records = master.read_records().unwrap();
        let deleted = deleted_ids(&records);
        let live: Vec<JournalRecord> = records
            .into_iter()
            .filter(|r| !deleted.contains(&r.global_id))
            .collect();
        slave.append_batch(&live, 5, config.increase_size).unwrap();
        slave.mark_as_master(6).unwrap();
        assert!(master.is_master());
    }

    let journal = open(dir.path());
    assert_eq!(journal.stats().master_path, config.second_path());
    assert_eq!(collect(&journal), vec![b]);
    drop(journal);

    let first = JournalFile::open(&config.first_path()).unwrap();
    let second = JournalFile::open(&config.second_path()).unwrap();
    assert!(!first.is_master() && !first.is_marked());
    assert!(second.is_master() && !second.is_marked());
}

#[test]
fn test_crash_after_switch_to_slave_repairs_marked_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::for_testing(dir.path());
    let a = archive(1);

    {
        let journal = open(dir.path());
        journal.create_transaction(&a).unwrap();
    }

    {
        let mut master = JournalFile::open(&config.first_path()).unwrap();
        let mut slave = JournalFile::open(&config.second_path()).unwrap();
        let records = master.read_records().unwrap();
        slave.append_batch(&records, 5, config.increase_size).unwrap();
        slave.mark_as_master(6).unwrap();
        master.switch_to_slave(7).unwrap();
    }

    let journal = open(dir.path());
    assert_eq!(journal.stats().master_path, config.second_path());
    assert_eq!(collect(&journal), vec![a]);
}

#[test]
fn test_two_marked_files_are_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::for_testing(dir.path());
    drop(open(dir.path()));

    JournalFile::open(&config.first_path()).unwrap().mark_as_master(1).unwrap();
    JournalFile::open(&config.second_path()).unwrap().mark_as_master(1).unwrap();

    let err = ArchiveJournal::open_default(config).err().unwrap();
    assert!(err.is_fatal());
}

#[test]
fn test_two_masters_are_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::for_testing(dir.path());
    drop(open(dir.path()));

    JournalFile::open(&config.second_path())
        .unwrap()
        .switch_to_master(1)
        .unwrap();

    let err = ArchiveJournal::open_default(config).err().unwrap();
    assert!(matches!(err, JournalError::Corrupt { .. }));
}

#[test]
fn test_no_master_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::for_testing(dir.path());
    drop(open(dir.path()));

    JournalFile::open(&config.first_path())
        .unwrap()
        .switch_to_slave(1)
        .unwrap();

    assert!(ArchiveJournal::open_default(config).is_err());
}

#[test]
fn test_missing_slave_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::for_testing(dir.path());
    let a = archive(1);
    {
        let journal = open(dir.path());
        journal.create_transaction(&a).unwrap();
    }
    std::fs::remove_file(config.second_path()).unwrap();

    let journal = open(dir.path());
    assert_eq!(collect(&journal), vec![a]);
    assert!(config.second_path().exists());
}

// =============================================================================
// Properties over arbitrary record streams
// =============================================================================

mod properties {
    use super::archive;
    use crate::adapters::file::JournalFile;
    use crate::domain::config::JournalConfig;
    use crate::domain::record::JournalRecord;
    use crate::domain::replay::deleted_ids;
    use crate::ports::inbound::TransactionLogger;
    use crate::service::ArchiveJournal;
    use proptest::prelude::*;
    use shared_types::{TransactionArchive, TransactionStatus};
    use std::collections::HashMap;

    #[derive(Debug, Clone)]
    enum Op {
        Create(u8, TransactionStatus),
        Modify(u8, TransactionStatus),
        Delete(u8),
    }

    fn status() -> impl Strategy<Value = TransactionStatus> {
        use TransactionStatus::*;
        proptest::sample::select(vec![
            Active, Preparing, Prepared, Committing, Committed, RollingBack, RolledBack,
        ])
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, status()).prop_map(|(id, s)| Op::Create(id, s)),
            (0u8..6, status()).prop_map(|(id, s)| Op::Modify(id, s)),
            (0u8..6).prop_map(Op::Delete),
        ]
    }

    fn versioned(id: u8, status: TransactionStatus) -> TransactionArchive {
        let mut tx = archive(id);
        tx.status = status;
        tx
    }

    /// Surviving archives in order of first appearance, as replay defines them.
    fn model(ops: &[Op]) -> Vec<TransactionArchive> {
        let mut order = Vec::new();
        let mut latest: HashMap<u8, Option<TransactionArchive>> = HashMap::new();
        for op in ops {
            match op {
                Op::Create(id, s) | Op::Modify(id, s) => {
                    if !latest.contains_key(id) {
                        order.push(*id);
                    }
                    latest.insert(*id, Some(versioned(*id, *s)));
                }
                Op::Delete(id) => {
                    if let Some(entry) = latest.get_mut(id) {
                        *entry = None;
                    }
                }
            }
        }
        order
            .into_iter()
            .filter_map(|id| latest.remove(&id).flatten())
            .collect()
    }

    fn apply(journal: &ArchiveJournal, ops: &[Op]) {
        for op in ops {
            match op {
                Op::Create(id, s) => journal.create_transaction(&versioned(*id, *s)).unwrap(),
                Op::Modify(id, s) => journal.update_transaction(&versioned(*id, *s)).unwrap(),
                Op::Delete(id) => journal.delete_transaction(&archive(*id)).unwrap(),
            }
        }
    }

    fn open_large(dir: &std::path::Path) -> ArchiveJournal {
        ArchiveJournal::open_default(
            JournalConfig::for_testing(dir).with_initial_size(1024 * 1024),
        )
        .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_replay_matches_latest_surviving_archives(
            ops in proptest::collection::vec(op(), 0..40)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let journal = open_large(dir.path());
            apply(&journal, &ops);

            prop_assert_eq!(journal.replay().unwrap(), model(&ops));
        }

        #[test]
        fn test_compaction_preserves_replay_and_is_idempotent(
            ops in proptest::collection::vec(op(), 1..40)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let journal = open_large(dir.path());
            apply(&journal, &ops);
            let expected = model(&ops);

            let before = JournalFile::open(&journal.stats().master_path)
                .unwrap()
                .read_records()
                .unwrap();
            let deleted = deleted_ids(&before);
            let live: Vec<JournalRecord> = before
                .iter()
                .filter(|r| !deleted.contains(&r.global_id))
                .cloned()
                .collect();

            let first = journal.compact().unwrap();
            prop_assert_eq!(first.swapped, !deleted.is_empty());
            prop_assert_eq!(first.records_after, live.len());
            prop_assert_eq!(journal.replay().unwrap(), expected.clone());

            let after = JournalFile::open(&journal.stats().master_path)
                .unwrap()
                .read_records()
                .unwrap();
            prop_assert_eq!(&after, &live);

            let second = journal.compact().unwrap();
            prop_assert!(!second.swapped);
            prop_assert_eq!(second.records_after, live.len());

            journal.close();
            drop(journal);
            let reopened = open_large(dir.path());
            prop_assert_eq!(reopened.replay().unwrap(), expected);
        }
    }
}
