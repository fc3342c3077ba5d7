//! Listener fan-out. Hook failures and panics are logged and swallowed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use shared_types::Xid;
use tracing::warn;

use crate::ports::outbound::TransactionListener;

/// Ordered set of listeners notified at each transition.
#[derive(Clone, Default)]
pub struct ListenerChain {
    listeners: Vec<Arc<dyn TransactionListener>>,
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChain")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

macro_rules! hooks {
    ($($hook:ident),* $(,)?) => {
        $(
            pub fn $hook(&self, xid: &Xid) {
                self.fire(stringify!($hook), xid, |l| l.$hook(xid));
            }
        )*
    };
}

impl ListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn TransactionListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    hooks!(
        prepare_start,
        prepare_success,
        prepare_failure,
        commit_start,
        commit_success,
        commit_failure,
        commit_heuristic_mixed,
        commit_heuristic_rolledback,
        rollback_start,
        rollback_success,
        rollback_failure,
    );

    fn fire<F>(&self, hook: &str, xid: &Xid, call: F)
    where
        F: Fn(&dyn TransactionListener) -> anyhow::Result<()>,
    {
        for listener in &self.listeners {
            match catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%xid, hook, error = %e, "[xa-02] Listener failed"),
                Err(_) => warn!(%xid, hook, "[xa-02] Listener panicked"),
            }
        }
    }
}
