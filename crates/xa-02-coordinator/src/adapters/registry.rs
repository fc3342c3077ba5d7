//! Resource Registry Adapter
//!
//! Implements `ResourceResolver` over the descriptors the application
//! registered at startup, so recovery can rebind journaled branches.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{RecoverFlags, Vote, XaErrorCode, XaException, Xid};
use tracing::debug;

use crate::ports::outbound::{ResourceResolver, XaResourceDescriptor};

/// Live descriptors by identifier, native and remote kept apart.
#[derive(Default)]
pub struct ResourceRegistry {
    native: RwLock<HashMap<String, Arc<dyn XaResourceDescriptor>>>,
    remote: RwLock<HashMap<String, Arc<dyn XaResourceDescriptor>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any with the same identifier.
    pub fn register(&self, descriptor: Arc<dyn XaResourceDescriptor>) {
        let identifier = descriptor.identifier().to_string();
        debug!(%identifier, remote = descriptor.is_remote(), "[xa-02] Resource registered");
        self.map(descriptor.is_remote()).write().insert(identifier, descriptor);
    }

    pub fn unregister(&self, identifier: &str, remote: bool) -> Option<Arc<dyn XaResourceDescriptor>> {
        self.map(remote).write().remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.native.read().len() + self.remote.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self, remote: bool) -> &RwLock<HashMap<String, Arc<dyn XaResourceDescriptor>>> {
        if remote {
            &self.remote
        } else {
            &self.native
        }
    }
}

impl ResourceResolver for ResourceRegistry {
    fn resolve(&self, identifier: &str, remote: bool) -> Option<Arc<dyn XaResourceDescriptor>> {
        self.map(remote).read().get(identifier).cloned()
    }
}

/// Stand-in for a journaled branch whose resource is not registered.
///
/// Every completion verb fails with `XAER_RMFAIL`, which classifies as
/// unfinished, so the transaction stays in the error set and is retried.
#[derive(Debug, Clone)]
pub struct UnresolvedResource {
    identifier: String,
    remote: bool,
}

impl UnresolvedResource {
    pub fn new(identifier: impl Into<String>, remote: bool) -> Self {
        Self {
            identifier: identifier.into(),
            remote,
        }
    }

    fn unavailable(&self) -> XaException {
        XaException::new(
            XaErrorCode::ResourceManagerFail,
            format!("resource {} is not registered", self.identifier),
        )
    }
}

impl XaResourceDescriptor for UnresolvedResource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn prepare(&self, _xid: &Xid) -> Result<Vote, XaException> {
        Err(self.unavailable())
    }

    fn commit(&self, _xid: &Xid, _one_phase: bool) -> Result<(), XaException> {
        Err(self.unavailable())
    }

    fn rollback(&self, _xid: &Xid) -> Result<(), XaException> {
        Err(self.unavailable())
    }

    fn recover(&self, _flags: RecoverFlags) -> Result<Vec<Xid>, XaException> {
        Err(self.unavailable())
    }

    fn forget(&self, _xid: &Xid) -> Result<(), XaException> {
        Err(self.unavailable())
    }
}
