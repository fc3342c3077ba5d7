//! # Outbound Ports
//!
//! Traits for the resource managers the coordinator drives and the
//! listeners it notifies.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{
    DelistFlag, RecoverFlags, StartFlag, Vote, XaErrorCode, XaException, Xid,
};

/// A resource manager branch endpoint, local or fronted by a remote peer.
///
/// Calls are synchronous and may block on network I/O.
pub trait XaResourceDescriptor: Send + Sync {
    /// Stable identity; journaled and used to rebind at recovery.
    fn identifier(&self) -> &str;

    /// True if the branch is fronted by a remote peer coordinator.
    fn is_remote(&self) -> bool {
        false
    }

    /// Resource-manager equality, analogous to XA `isSameRM`.
    fn is_same_rm(&self, other: &dyn XaResourceDescriptor) -> bool {
        self.identifier() == other.identifier()
    }

    /// Associate the branch with the caller's work.
    fn start(&self, _xid: &Xid, _flag: StartFlag) -> Result<(), XaException> {
        Ok(())
    }

    /// End (or suspend) the association.
    fn end(&self, _xid: &Xid, _flag: DelistFlag) -> Result<(), XaException> {
        Ok(())
    }

    fn prepare(&self, xid: &Xid) -> Result<Vote, XaException>;

    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), XaException>;

    fn rollback(&self, xid: &Xid) -> Result<(), XaException>;

    fn recover(&self, flags: RecoverFlags) -> Result<Vec<Xid>, XaException>;

    fn forget(&self, xid: &Xid) -> Result<(), XaException>;

    /// Returns false if the resource ignores timeouts.
    fn set_transaction_timeout(&self, _secs: u64) -> Result<bool, XaException> {
        Ok(false)
    }
}

/// Looks up live descriptors for journaled branches.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, identifier: &str, remote: bool) -> Option<Arc<dyn XaResourceDescriptor>>;
}

/// Observer of transaction transitions.
///
/// Every hook defaults to a no-op. An error (or panic) in a hook is logged
/// and never changes the transaction outcome.
pub trait TransactionListener: Send + Sync {
    fn prepare_start(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn prepare_success(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn prepare_failure(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn commit_start(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn commit_success(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn commit_failure(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn commit_heuristic_mixed(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn commit_heuristic_rolledback(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn rollback_start(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn rollback_success(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn rollback_failure(&self, _xid: &Xid) -> anyhow::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Scriptable resource for testing.
///
/// Every verb returns its configured result (success by default) and
/// counts its invocations.
#[derive(Debug)]
pub struct MockResource {
    identifier: String,
    remote: bool,
    prepare_result: Mutex<Result<Vote, XaException>>,
    commit_result: Mutex<Result<(), XaException>>,
    rollback_result: Mutex<Result<(), XaException>>,
    start_result: Mutex<Result<(), XaException>>,
    in_doubt: Mutex<Vec<Xid>>,
    ended: Mutex<Vec<DelistFlag>>,
    prepare_calls: AtomicUsize,
    commit_calls: AtomicUsize,
    one_phase_commits: AtomicUsize,
    rollback_calls: AtomicUsize,
    forget_calls: AtomicUsize,
    start_calls: AtomicUsize,
    timeout_secs: AtomicU64,
}

impl MockResource {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            remote: false,
            prepare_result: Mutex::new(Ok(Vote::Ok)),
            commit_result: Mutex::new(Ok(())),
            rollback_result: Mutex::new(Ok(())),
            start_result: Mutex::new(Ok(())),
            in_doubt: Mutex::new(Vec::new()),
            ended: Mutex::new(Vec::new()),
            prepare_calls: AtomicUsize::new(0),
            commit_calls: AtomicUsize::new(0),
            one_phase_commits: AtomicUsize::new(0),
            rollback_calls: AtomicUsize::new(0),
            forget_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            timeout_secs: AtomicU64::new(0),
        }
    }

    /// Mock fronted by a remote peer.
    pub fn remote(identifier: impl Into<String>) -> Self {
        Self {
            remote: true,
            ..Self::new(identifier)
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_vote(&self, vote: Vote) {
        *self.prepare_result.lock() = Ok(vote);
    }

    pub fn fail_prepare(&self, code: XaErrorCode) {
        *self.prepare_result.lock() = Err(XaException::new(code, "scripted prepare failure"));
    }

    pub fn fail_commit(&self, code: XaErrorCode) {
        *self.commit_result.lock() = Err(XaException::new(code, "scripted commit failure"));
    }

    pub fn fail_rollback(&self, code: XaErrorCode) {
        *self.rollback_result.lock() = Err(XaException::new(code, "scripted rollback failure"));
    }

    pub fn fail_start(&self, code: XaErrorCode) {
        *self.start_result.lock() = Err(XaException::new(code, "scripted start failure"));
    }

    /// Restore success for commit and rollback.
    pub fn heal(&self) {
        *self.commit_result.lock() = Ok(());
        *self.rollback_result.lock() = Ok(());
    }

    pub fn add_in_doubt(&self, xid: Xid) {
        self.in_doubt.lock().push(xid);
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    /// Two-phase and one-phase commits together.
    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn one_phase_commits(&self) -> usize {
        self.one_phase_commits.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    pub fn forget_calls(&self) -> usize {
        self.forget_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Flags passed to `end`, in order.
    pub fn ended_with(&self) -> Vec<DelistFlag> {
        self.ended.lock().clone()
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.load(Ordering::SeqCst)
    }
}

impl XaResourceDescriptor for MockResource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn start(&self, _xid: &Xid, _flag: StartFlag) -> Result<(), XaException> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_result.lock().clone()
    }

    fn end(&self, _xid: &Xid, flag: DelistFlag) -> Result<(), XaException> {
        self.ended.lock().push(flag);
        Ok(())
    }

    fn prepare(&self, _xid: &Xid) -> Result<Vote, XaException> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        self.prepare_result.lock().clone()
    }

    fn commit(&self, _xid: &Xid, one_phase: bool) -> Result<(), XaException> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        if one_phase {
            self.one_phase_commits.fetch_add(1, Ordering::SeqCst);
        }
        self.commit_result.lock().clone()
    }

    fn rollback(&self, _xid: &Xid) -> Result<(), XaException> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.rollback_result.lock().clone()
    }

    fn recover(&self, flags: RecoverFlags) -> Result<Vec<Xid>, XaException> {
        if flags.returns_results() {
            Ok(self.in_doubt.lock().clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn forget(&self, xid: &Xid) -> Result<(), XaException> {
        self.forget_calls.fetch_add(1, Ordering::SeqCst);
        self.in_doubt.lock().retain(|x| x != xid);
        Ok(())
    }

    fn set_transaction_timeout(&self, secs: u64) -> Result<bool, XaException> {
        self.timeout_secs.store(secs, Ordering::SeqCst);
        Ok(true)
    }
}

/// Listener that records every hook it receives.
#[derive(Debug, Default)]
pub struct MockListener {
    events: Mutex<Vec<(&'static str, Xid)>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MockListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every hook return an error after recording.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hook names in the order received.
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|(name, _)| *name).collect()
    }

    fn record(&self, name: &'static str, xid: &Xid) -> anyhow::Result<()> {
        self.events.lock().push((name, *xid));
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("listener {name} failed");
        }
        Ok(())
    }
}

impl TransactionListener for MockListener {
    fn prepare_start(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("prepare_start", xid)
    }

    fn prepare_success(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("prepare_success", xid)
    }

    fn prepare_failure(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("prepare_failure", xid)
    }

    fn commit_start(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("commit_start", xid)
    }

    fn commit_success(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("commit_success", xid)
    }

    fn commit_failure(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("commit_failure", xid)
    }

    fn commit_heuristic_mixed(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("commit_heuristic_mixed", xid)
    }

    fn commit_heuristic_rolledback(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("commit_heuristic_rolledback", xid)
    }

    fn rollback_start(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("rollback_start", xid)
    }

    fn rollback_success(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("rollback_success", xid)
    }

    fn rollback_failure(&self, xid: &Xid) -> anyhow::Result<()> {
        self.record("rollback_failure", xid)
    }
}
