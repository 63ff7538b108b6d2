//! Proxy coordinator
//!
//! Tracks the current version of every identity and a count of outstanding
//! locks on it. Readers asking for the current version wait while the count
//! is above zero, so a handle that is mid-composition is never handed out.
//!
//! Locking discipline: the identity map has one coarse mutex, used only for
//! insert, remove and lookup. Each entry has its own mutex and condition
//! variable, and every wait happens on the entry with the map mutex already
//! released. Lock order is always map before entry.

use crate::status::{CoordinatorStats, ProxyStatus};
use parking_lot::{Condvar, Mutex};
use persona_core::{CoordinatorConfig, ProxyId, ProxyResolver, SharedProxy};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

struct ProxyEntry {
    status: Mutex<ProxyStatus>,
    unlocked: Condvar,
}

impl ProxyEntry {
    fn new(current: SharedProxy) -> Self {
        Self {
            status: Mutex::new(ProxyStatus::new(current)),
            unlocked: Condvar::new(),
        }
    }
}

/// Concurrent registry of current handle versions
pub struct ProxyCoordinator {
    entries: Mutex<HashMap<ProxyId, Arc<ProxyEntry>>>,
    manipulations: AtomicU64,
    config: CoordinatorConfig,
}

impl ProxyCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            manipulations: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Record `handle` as the current version of its identity
    ///
    /// Returns the version it replaced, if the identity was already tracked.
    /// Outstanding locks are kept.
    pub fn store(&self, handle: SharedProxy) -> Option<SharedProxy> {
        self.manipulations.fetch_add(1, Ordering::Relaxed);
        let id = handle.id();
        let entry = {
            let mut entries = self.entries.lock();
            match entries.get(&id) {
                Some(entry) => Arc::clone(entry),
                None => {
                    let entry = ProxyEntry::new(handle);
                    entry.status.lock().touch();
                    entries.insert(id, Arc::new(entry));
                    debug!(proxy = %id, "identity registered");
                    return None;
                }
            }
        };
        let previous = entry.status.lock().replace(handle);
        trace!(proxy = %id, from = previous.class_name(), "current version replaced");
        Some(previous)
    }

    /// Stop tracking an identity
    ///
    /// Threads blocked on it wake up; blocked reads then return `None`.
    pub fn delete(&self, id: ProxyId) -> Option<SharedProxy> {
        let entry = self.entries.lock().remove(&id)?;
        let mut status = entry.status.lock();
        status.retire();
        entry.unlocked.notify_all();
        debug!(proxy = %id, "identity retired");
        Some(Arc::clone(status.current()))
    }

    pub fn contains(&self, id: ProxyId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Add one lock on `handle`'s identity, tracking it first if needed
    ///
    /// With `block` set, the caller then waits until the count drops back to
    /// zero or `timeout` elapses; `None` or a zero timeout waits
    /// indefinitely. Returns `false`
    /// if the wait timed out or the identity was deleted meanwhile. The lock
    /// taken here stays in place either way.
    pub fn lock(&self, handle: &SharedProxy, block: bool, timeout: Option<Duration>) -> bool {
        self.manipulations.fetch_add(1, Ordering::Relaxed);
        let entry = self.entry_or_track(handle);
        let mut status = entry.status.lock();
        status.acquire(thread::current().id());
        trace!(proxy = %handle.id(), count = status.lock_count(), block, "lock acquired");
        if !block {
            return true;
        }

        let deadline = timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| Instant::now() + timeout);
        while status.is_locked() && !status.is_retired() {
            match deadline {
                Some(deadline) => {
                    if entry.unlocked.wait_until(&mut status, deadline).timed_out() {
                        break;
                    }
                }
                None => entry.unlocked.wait(&mut status),
            }
        }
        let released = !status.is_locked() && !status.is_retired();
        if !released {
            debug!(proxy = %handle.id(), count = status.lock_count(), "blocking lock gave up");
        }
        released
    }

    /// [`lock`](Self::lock) with the configured default timeout
    pub fn lock_default(&self, handle: &SharedProxy, block: bool) -> bool {
        self.lock(handle, block, self.config.lock_timeout())
    }

    /// Drop one lock, or every lock when `all` is set
    ///
    /// A single release prefers a lock the calling thread took. Waiters wake
    /// once the count reaches zero. Unknown identities and unlocked entries
    /// are left alone and report `false`.
    pub fn unlock(&self, id: ProxyId, all: bool) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let mut status = entry.status.lock();
        if !status.is_locked() {
            return false;
        }
        self.manipulations.fetch_add(1, Ordering::Relaxed);
        if all {
            status.release_all();
        } else {
            status.release(thread::current().id());
        }
        trace!(proxy = %id, count = status.lock_count(), all, "lock released");
        if !status.is_locked() {
            entry.unlocked.notify_all();
        }
        true
    }

    pub fn is_locked(&self, id: ProxyId) -> bool {
        self.with_status(id, ProxyStatus::is_locked).unwrap_or(false)
    }

    pub fn lock_count(&self, id: ProxyId) -> usize {
        self.with_status(id, ProxyStatus::lock_count).unwrap_or(0)
    }

    /// Stores, locks and unlocks applied to `id` since it was first tracked
    pub fn manipulations_of(&self, id: ProxyId) -> u64 {
        self.with_status(id, ProxyStatus::manipulations).unwrap_or(0)
    }

    /// Current version of `id`, waiting while it is locked
    ///
    /// A thread holding one of the locks reads straight through. Returns
    /// `None` for untracked identities, and for identities deleted while
    /// waiting.
    pub fn current_of(&self, id: ProxyId) -> Option<SharedProxy> {
        let entry = self.entry(id)?;
        let me = thread::current().id();
        let mut status = entry.status.lock();
        while status.is_locked() && !status.is_retired() && !status.is_held_by(me) {
            entry.unlocked.wait(&mut status);
        }
        if status.is_retired() {
            return None;
        }
        Some(Arc::clone(status.current()))
    }

    /// Current version of `id` without waiting on locks
    pub fn peek(&self, id: ProxyId) -> Option<SharedProxy> {
        self.with_status(id, |status| Arc::clone(status.current()))
    }

    /// Tracked identities, in no particular order
    pub fn identities(&self) -> Vec<ProxyId> {
        self.entries.lock().keys().copied().collect()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let entries: Vec<Arc<ProxyEntry>> = self.entries.lock().values().cloned().collect();
        let locked = entries
            .iter()
            .filter(|entry| entry.status.lock().is_locked())
            .count();
        CoordinatorStats {
            entries: entries.len(),
            locked,
            manipulations: self.manipulations.load(Ordering::Relaxed),
        }
    }

    fn with_status<R>(&self, id: ProxyId, f: impl FnOnce(&ProxyStatus) -> R) -> Option<R> {
        let entry = self.entry(id)?;
        let status = entry.status.lock();
        Some(f(&status))
    }

    fn entry(&self, id: ProxyId) -> Option<Arc<ProxyEntry>> {
        self.entries.lock().get(&id).cloned()
    }

    fn entry_or_track(&self, handle: &SharedProxy) -> Arc<ProxyEntry> {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(handle.id())
            .or_insert_with(|| Arc::new(ProxyEntry::new(Arc::clone(handle))));
        Arc::clone(entry)
    }
}

impl Default for ProxyCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl ProxyResolver for ProxyCoordinator {
    fn resolve(&self, id: ProxyId) -> Option<SharedProxy> {
        self.current_of(id)
    }
}

impl fmt::Debug for ProxyCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCoordinator")
            .field("stats", &self.stats())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::Proxy;
    use persona_testkit::db_proxy_class;

    #[test]
    fn test_store_replaces_current_version() {
        let coordinator = ProxyCoordinator::default();
        let first = Proxy::shared(&db_proxy_class());
        assert!(coordinator.store(first.clone()).is_none());
        assert!(coordinator.contains(first.id()));

        let previous = coordinator.store(first.clone()).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(coordinator.stats().entries, 1);
    }

    #[test]
    fn test_unknown_identity_is_noop() {
        let coordinator = ProxyCoordinator::default();
        let stray = Proxy::shared(&db_proxy_class());
        assert!(!coordinator.unlock(stray.id(), false));
        assert!(!coordinator.is_locked(stray.id()));
        assert!(coordinator.current_of(stray.id()).is_none());
        assert!(!coordinator.contains(stray.id()));
        assert!(coordinator.delete(stray.id()).is_none());
    }

    #[test]
    fn test_lock_tracks_identity_on_first_reference() {
        let coordinator = ProxyCoordinator::default();
        let handle = Proxy::shared(&db_proxy_class());
        assert!(coordinator.lock(&handle, false, None));
        assert!(coordinator.contains(handle.id()));
        assert!(coordinator.is_locked(handle.id()));
        assert!(Arc::ptr_eq(&coordinator.peek(handle.id()).unwrap(), &handle));
    }

    #[test]
    fn test_unlock_on_zero_count_reports_false() {
        let coordinator = ProxyCoordinator::default();
        let handle = Proxy::shared(&db_proxy_class());
        coordinator.store(handle.clone());
        coordinator.lock(&handle, false, None);
        assert!(coordinator.unlock(handle.id(), false));
        assert!(!coordinator.unlock(handle.id(), false));
        assert_eq!(coordinator.lock_count(handle.id()), 0);
    }

    #[test]
    fn test_holder_reads_through_own_lock() {
        let coordinator = ProxyCoordinator::default();
        let handle = Proxy::shared(&db_proxy_class());
        coordinator.store(handle.clone());
        coordinator.lock(&handle, false, None);
        let current = coordinator.current_of(handle.id()).unwrap();
        assert!(Arc::ptr_eq(&current, &handle));
    }

    #[test]
    fn test_blocking_lock_times_out_on_own_count() {
        let coordinator = ProxyCoordinator::default();
        let handle = Proxy::shared(&db_proxy_class());
        assert!(!coordinator.lock(&handle, true, Some(Duration::from_millis(20))));
        assert_eq!(coordinator.lock_count(handle.id()), 1);
    }

    #[test]
    fn test_stats_count_manipulations() {
        let coordinator = ProxyCoordinator::default();
        let handle = Proxy::shared(&db_proxy_class());
        coordinator.store(handle.clone());
        coordinator.lock(&handle, false, None);
        let stats = coordinator.stats();
        assert_eq!(stats.locked, 1);
        coordinator.unlock(handle.id(), true);
        let stats = coordinator.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.locked, 0);
        assert_eq!(stats.manipulations, 3);
    }

    #[test]
    fn test_manipulations_tracked_per_identity() {
        let coordinator = ProxyCoordinator::default();
        let busy = Proxy::shared(&db_proxy_class());
        let idle = Proxy::shared(&db_proxy_class());
        coordinator.store(busy.clone());
        coordinator.store(idle.clone());
        coordinator.lock(&busy, false, None);
        coordinator.unlock(busy.id(), false);
        coordinator.store(busy.clone());

        assert_eq!(coordinator.manipulations_of(busy.id()), 4);
        assert_eq!(coordinator.manipulations_of(idle.id()), 1);
        assert_eq!(coordinator.stats().manipulations, 5);

        // a release with nothing held changes nothing
        assert!(!coordinator.unlock(idle.id(), true));
        assert_eq!(coordinator.manipulations_of(idle.id()), 1);
        coordinator.delete(busy.id());
        assert_eq!(coordinator.manipulations_of(busy.id()), 0);
    }
}
