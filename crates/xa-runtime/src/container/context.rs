use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use xa_01_journal::{ArchiveJournal, JournalStats, TransactionLogger};
use xa_02_coordinator::{
    ResourceRegistry, ResourceResolver, TransactionListener, TransactionManager,
    TransactionRecovery, TransactionRepository, XaResourceDescriptor,
};

use super::config::RuntimeConfig;

/// Every long-lived component of a running coordinator.
pub struct ApplicationContext {
    pub config: RuntimeConfig,
    pub journal: Arc<ArchiveJournal>,
    pub repository: Arc<TransactionRepository>,
    pub registry: Arc<ResourceRegistry>,
    pub manager: Arc<TransactionManager>,
    pub recovery: Arc<TransactionRecovery>,
}

impl ApplicationContext {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_listeners(config, Vec::new())
    }

    /// Build the context, registering `listeners` on both the manager and
    /// the recovery engine.
    pub fn with_listeners(
        config: RuntimeConfig,
        listeners: Vec<Arc<dyn TransactionListener>>,
    ) -> Result<Self> {
        config.validate().context("Invalid runtime configuration")?;

        let journal = Arc::new(
            ArchiveJournal::open_default(config.journal.clone()).with_context(|| {
                format!(
                    "Failed to open journal in {}",
                    config.journal.directory.display()
                )
            })?,
        );
        let logger: Arc<dyn TransactionLogger> = Arc::clone(&journal) as Arc<dyn TransactionLogger>;

        let repository = Arc::new(TransactionRepository::default());
        let registry = Arc::new(ResourceRegistry::default());

        let mut manager = TransactionManager::new(
            config.coordinator.clone(),
            Arc::clone(&logger),
            Arc::clone(&repository),
        );
        for listener in listeners {
            manager = manager.with_listener(listener);
        }

        let recovery = Arc::new(TransactionRecovery::new(
            logger,
            Arc::clone(&repository),
            Arc::clone(&registry) as Arc<dyn ResourceResolver>,
            manager.listeners().clone(),
            Arc::clone(manager.xid_factory()),
        ));

        info!(
            journal = %config.journal.directory.display(),
            timeout_secs = config.coordinator.default_timeout_secs,
            "[xa-rt] Application context created"
        );

        Ok(Self {
            config,
            journal,
            repository,
            registry,
            manager: Arc::new(manager),
            recovery,
        })
    }

    /// Make a resource resolvable by recovery.
    pub fn register_resource(&self, descriptor: Arc<dyn XaResourceDescriptor>) {
        self.registry.register(descriptor);
    }

    pub fn journal_stats(&self) -> JournalStats {
        self.journal.stats()
    }
}
