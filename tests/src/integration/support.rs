//! Shared fixtures: a "node" is an application context over a real journal
//! directory; dropping it is the crash, building another on the same
//! directory is the restart.

use std::path::Path;
use std::sync::Arc;

use shared_types::{
    ResourceArchive, StrategyType, TransactionArchive, TransactionStatus, Vote, Xid, XidFactory,
};
use xa_01_journal::{JournalConfig, TransactionLogger};
use xa_02_coordinator::{CoordinatorConfig, MockResource, TransactionListener, XaResourceDescriptor};
use xa_runtime::{ApplicationContext, RuntimeConfig};

pub fn node_config(dir: &Path) -> RuntimeConfig {
    RuntimeConfig {
        journal: JournalConfig::for_testing(dir),
        coordinator: CoordinatorConfig::default(),
    }
}

pub fn node(dir: &Path) -> ApplicationContext {
    ApplicationContext::new(node_config(dir)).unwrap()
}

pub fn node_with_listener(dir: &Path, listener: Arc<dyn TransactionListener>) -> ApplicationContext {
    ApplicationContext::with_listeners(node_config(dir), vec![listener]).unwrap()
}

pub fn rm(name: &str) -> Arc<MockResource> {
    MockResource::new(name).into_arc()
}

pub fn peer(name: &str) -> Arc<MockResource> {
    MockResource::remote(name).into_arc()
}

/// Make `resources` resolvable by the node's recovery.
pub fn register(node: &ApplicationContext, resources: &[Arc<MockResource>]) {
    for resource in resources {
        node.register_resource(resource.clone());
    }
}

/// Write a transaction straight into the journal, as a process that died
/// right after journaling `status` would have left it.
pub fn journal_archive(
    node: &ApplicationContext,
    status: TransactionStatus,
    coordinator: bool,
    branches: &[(&Arc<MockResource>, Vote)],
) -> Xid {
    let factory = XidFactory::default();
    let global = factory.create_global_xid();
    let mut archive = TransactionArchive::new(global, coordinator);
    archive.status = status;
    archive.vote = if status.is_commit_decided() { Vote::Ok } else { Vote::Unset };
    archive.strategy_type = Some(StrategyType::Simple);
    for (resource, vote) in branches {
        let mut branch = ResourceArchive::new(
            factory.create_branch_xid(&global),
            resource.identifier(),
            resource.is_remote(),
        );
        branch.vote = *vote;
        branch.delisted = true;
        archive.upsert_resource(branch);
    }
    node.journal.create_transaction(&archive).unwrap();
    global
}
