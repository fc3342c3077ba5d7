//! # Transaction Identifiers
//!
//! An `Xid` is the XA identifier triple. A global xid has no branch
//! qualifier; a branch xid is derived from a global xid by attaching one.
//!
//! ## Layout of generated ids
//!
//! ```text
//! 0        16                 24                32
//! ├─ uuid ─┼─ creation millis ─┼─ local counter ─┤
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::time::current_time_millis;

/// Length of the global transaction id.
pub const GLOBAL_TRANSACTION_ID_LEN: usize = 32;

/// Length of a non-empty branch qualifier.
pub const BRANCH_QUALIFIER_LEN: usize = 32;

/// Global transaction id bytes.
pub type GlobalId = [u8; GLOBAL_TRANSACTION_ID_LEN];

/// XA transaction identifier.
///
/// Equality and hashing are structural over all three fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Xid {
    format_id: i32,
    global_transaction_id: GlobalId,
    branch_qualifier: Option<[u8; BRANCH_QUALIFIER_LEN]>,
}

impl Xid {
    /// Format id used by `XidFactory::default()`.
    pub const DEFAULT_FORMAT_ID: i32 = 1207;

    /// Build a global xid (empty branch qualifier).
    pub fn global(format_id: i32, global_transaction_id: GlobalId) -> Self {
        Self {
            format_id,
            global_transaction_id,
            branch_qualifier: None,
        }
    }

    /// Build a branch xid directly from its parts.
    pub fn branch(
        format_id: i32,
        global_transaction_id: GlobalId,
        branch_qualifier: [u8; BRANCH_QUALIFIER_LEN],
    ) -> Self {
        Self {
            format_id,
            global_transaction_id,
            branch_qualifier: Some(branch_qualifier),
        }
    }

    /// Derive a branch xid sharing this xid's global part.
    pub fn with_branch(&self, branch_qualifier: [u8; BRANCH_QUALIFIER_LEN]) -> Self {
        Self::branch(self.format_id, self.global_transaction_id, branch_qualifier)
    }

    /// The global xid this xid belongs to (itself if already global).
    pub fn to_global(&self) -> Self {
        Self::global(self.format_id, self.global_transaction_id)
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_transaction_id(&self) -> &GlobalId {
        &self.global_transaction_id
    }

    pub fn branch_qualifier(&self) -> Option<&[u8; BRANCH_QUALIFIER_LEN]> {
        self.branch_qualifier.as_ref()
    }

    /// True if this xid has no branch qualifier.
    pub fn is_global(&self) -> bool {
        self.branch_qualifier.is_none()
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.global_transaction_id))?;
        if let Some(bqual) = &self.branch_qualifier {
            write!(f, "/{}", hex::encode(bqual))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Xid({}:{})", self.format_id, self)
    }
}

/// Creates globally unique transaction and branch identifiers.
#[derive(Debug)]
pub struct XidFactory {
    format_id: i32,
    counter: AtomicU64,
}

impl XidFactory {
    pub fn new(format_id: i32) -> Self {
        Self {
            format_id,
            counter: AtomicU64::new(0),
        }
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    /// Create a fresh global xid.
    pub fn create_global_xid(&self) -> Xid {
        Xid::global(self.format_id, self.next_id())
    }

    /// Create a fresh branch xid under `global`.
    pub fn create_branch_xid(&self, global: &Xid) -> Xid {
        global.with_branch(self.next_id())
    }

    fn next_id(&self) -> [u8; 32] {
        let mut id = [0u8; 32];
        id[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        id[16..24].copy_from_slice(&current_time_millis().to_be_bytes());
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        id[24..].copy_from_slice(&sequence.to_be_bytes());
        id
    }
}

impl Default for XidFactory {
    fn default() -> Self {
        Self::new(Xid::DEFAULT_FORMAT_ID)
    }
}
