//! # XA Coordinator Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | xa-01 Journal | synced append of a transaction archive |
//! | xa-01 Journal | compaction of a journal full of resolved transactions |
//! | xa-02 Coordinator | full two-phase commit, in-memory vs file journal |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use shared_types::{ResourceArchive, TransactionArchive, Xid, XidFactory};
use xa_01_journal::{ArchiveJournal, InMemoryTransactionLogger, JournalConfig, TransactionLogger};
use xa_02_coordinator::{
    CoordinatorConfig, MockResource, TransactionManager, TransactionRepository,
};

fn archive(factory: &XidFactory, branches: usize) -> TransactionArchive {
    let global = factory.create_global_xid();
    let mut archive = TransactionArchive::new(global, true);
    for i in 0..branches {
        archive.upsert_resource(ResourceArchive::new(
            factory.create_branch_xid(&global),
            format!("rm-{i}"),
            i % 2 == 1,
        ));
    }
    archive
}

fn random_global() -> Xid {
    let mut id = [0u8; 32];
    rand::thread_rng().fill(&mut id);
    Xid::global(Xid::DEFAULT_FORMAT_ID, id)
}

// ============================================================================
// xa-01: Journal
// ============================================================================

fn bench_journal_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("xa-01-journal-append");
    group.measurement_time(Duration::from_secs(10));
    let factory = XidFactory::default();

    for branches in [1usize, 4, 16] {
        let dir = tempfile::tempdir().unwrap();
        let journal = ArchiveJournal::open_default(
            JournalConfig::new(dir.path()).with_initial_size(16 * 1024 * 1024),
        )
        .unwrap();
        let sample = archive(&factory, branches);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("create_delete", branches), &sample, |b, a| {
            b.iter(|| {
                journal.create_transaction(black_box(a)).unwrap();
                journal.delete_transaction(black_box(a)).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_journal_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("xa-01-journal-compaction");
    group.sample_size(20);
    let factory = XidFactory::default();

    for resolved in [100usize, 1000] {
        group.bench_function(BenchmarkId::new("resolved", resolved), |b| {
            b.iter_batched(
                || {
                    let dir = tempfile::tempdir().unwrap();
                    let journal = ArchiveJournal::open_default(
                        JournalConfig::new(dir.path()).with_initial_size(64 * 1024 * 1024),
                    )
                    .unwrap();
                    for _ in 0..resolved {
                        let a = archive(&factory, 2);
                        journal.create_transaction(&a).unwrap();
                        journal.delete_transaction(&a).unwrap();
                    }
                    let mut live = TransactionArchive::new(random_global(), true);
                    live.upsert_resource(ResourceArchive::new(
                        live.xid.with_branch([1; 32]),
                        "rm-live",
                        false,
                    ));
                    journal.create_transaction(&live).unwrap();
                    (dir, journal)
                },
                |(_dir, journal)| black_box(journal.compact().unwrap()),
                criterion::BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

// ============================================================================
// xa-02: Coordinator
// ============================================================================

fn two_phase_commit(manager: &TransactionManager, resources: &[Arc<MockResource>]) {
    let tx = manager.begin();
    for resource in resources {
        tx.enlist(resource.clone()).unwrap();
    }
    manager.commit(tx).unwrap();
}

fn bench_two_phase_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("xa-02-two-phase-commit");
    group.measurement_time(Duration::from_secs(10));

    let resources: Vec<Arc<MockResource>> = (0..3)
        .map(|i| MockResource::new(format!("db-{i}")).into_arc())
        .collect();

    let memory = TransactionManager::new(
        CoordinatorConfig::default(),
        Arc::new(InMemoryTransactionLogger::new()),
        Arc::new(TransactionRepository::new()),
    );
    group.bench_function("in_memory_journal", |b| {
        b.iter(|| two_phase_commit(&memory, &resources))
    });

    let dir = tempfile::tempdir().unwrap();
    let journal = ArchiveJournal::open_default(JournalConfig::new(dir.path())).unwrap();
    let file = TransactionManager::new(
        CoordinatorConfig::default(),
        Arc::new(journal),
        Arc::new(TransactionRepository::new()),
    );
    group.bench_function("file_journal", |b| b.iter(|| two_phase_commit(&file, &resources)));

    group.finish();
}

criterion_group!(
    benches,
    bench_journal_append,
    bench_journal_compaction,
    bench_two_phase_commit
);
criterion_main!(benches);
