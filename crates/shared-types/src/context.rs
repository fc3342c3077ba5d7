//! Ephemeral per-transaction context (never journaled).

use crate::time::current_time_millis;
use crate::xid::Xid;

/// Context passed explicitly into every coordinator operation.
///
/// Cloned, never shared, when crossing a coordinator boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionContext {
    pub xid: Xid,
    /// Creation time in millis.
    pub created_time: u64,
    /// Expiry time in millis.
    pub expired_time: u64,
    pub coordinator: bool,
    pub propagated: bool,
    pub propagated_by: Option<String>,
    pub recovered: bool,
}

impl TransactionContext {
    /// Context for a transaction coordinated by this node.
    pub fn new(xid: Xid, timeout_secs: u64) -> Self {
        let now = current_time_millis();
        Self {
            xid,
            created_time: now,
            expired_time: now.saturating_add(timeout_secs.saturating_mul(1000)),
            coordinator: true,
            propagated: false,
            propagated_by: None,
            recovered: false,
        }
    }

    /// Clone for a peer: same xid and expiry, fresh creation time.
    pub fn propagate(&self, propagated_by: impl Into<String>) -> Self {
        Self {
            xid: self.xid,
            created_time: current_time_millis(),
            expired_time: self.expired_time,
            coordinator: false,
            propagated: true,
            propagated_by: Some(propagated_by.into()),
            recovered: false,
        }
    }

    /// Context rebuilt from the journal. It never expires.
    pub fn recovered(xid: Xid, coordinator: bool, propagated_by: Option<String>) -> Self {
        Self {
            xid,
            created_time: current_time_millis(),
            expired_time: u64::MAX,
            coordinator,
            propagated: !coordinator,
            propagated_by,
            recovered: true,
        }
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis > self.expired_time
    }

    /// Remaining time before expiry, in whole seconds.
    pub fn remaining_secs(&self, now_millis: u64) -> u64 {
        self.expired_time.saturating_sub(now_millis) / 1000
    }
}
