//! Per-identity coordination state

use persona_core::SharedProxy;
use serde::Serialize;
use std::thread::ThreadId;

/// Current handle and outstanding locks for one identity
///
/// The lock count is the number of recorded holds; it can never go negative.
/// Every store, hold and release bumps the entry's manipulation counter.
#[derive(Debug, Clone)]
pub struct ProxyStatus {
    current: SharedProxy,
    holders: Vec<ThreadId>,
    manipulations: u64,
    retired: bool,
}

impl ProxyStatus {
    pub fn new(current: SharedProxy) -> Self {
        Self {
            current,
            holders: Vec::new(),
            manipulations: 0,
            retired: false,
        }
    }

    pub fn current(&self) -> &SharedProxy {
        &self.current
    }

    /// Swap in a newer version, returning the previous one
    pub fn replace(&mut self, next: SharedProxy) -> SharedProxy {
        self.touch();
        std::mem::replace(&mut self.current, next)
    }

    pub fn manipulations(&self) -> u64 {
        self.manipulations
    }

    pub(crate) fn touch(&mut self) {
        self.manipulations += 1;
    }

    pub fn lock_count(&self) -> usize {
        self.holders.len()
    }

    pub fn is_locked(&self) -> bool {
        !self.holders.is_empty()
    }

    /// Whether `thread` holds at least one of the outstanding locks
    pub fn is_held_by(&self, thread: ThreadId) -> bool {
        self.holders.contains(&thread)
    }

    pub fn acquire(&mut self, thread: ThreadId) {
        self.touch();
        self.holders.push(thread);
    }

    /// Drop one hold, preferring one taken by `thread`
    pub fn release(&mut self, thread: ThreadId) -> bool {
        let index = self
            .holders
            .iter()
            .rposition(|holder| *holder == thread)
            .or_else(|| self.holders.len().checked_sub(1));
        match index {
            Some(index) => {
                self.holders.remove(index);
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Drop every hold, returning how many there were
    pub fn release_all(&mut self) -> usize {
        let released = self.holders.len();
        if released > 0 {
            self.holders.clear();
            self.touch();
        }
        released
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
        self.holders.clear();
    }
}

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Identities currently tracked
    pub entries: usize,
    /// Identities with at least one outstanding lock
    pub locked: usize,
    /// Stores, locks and unlocks performed since creation
    pub manipulations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::Proxy;
    use persona_testkit::db_proxy_class;
    use std::thread;

    #[test]
    fn test_release_prefers_own_hold() {
        let mut status = ProxyStatus::new(Proxy::shared(&db_proxy_class()));
        let me = thread::current().id();
        let other = thread::spawn(|| thread::current().id()).join().unwrap();

        status.acquire(me);
        status.acquire(other);
        assert_eq!(status.lock_count(), 2);

        assert!(status.release(me));
        assert!(!status.is_held_by(me));
        assert!(status.is_held_by(other));

        // no hold of ours left, so any hold goes
        assert!(status.release(me));
        assert!(!status.is_locked());
        assert!(!status.release(me));
    }

    #[test]
    fn test_release_all_and_retire() {
        let mut status = ProxyStatus::new(Proxy::shared(&db_proxy_class()));
        let me = thread::current().id();
        status.acquire(me);
        status.acquire(me);
        assert_eq!(status.release_all(), 2);
        status.acquire(me);
        status.retire();
        assert!(status.is_retired());
        assert_eq!(status.lock_count(), 0);
    }

    #[test]
    fn test_manipulations_count_effective_changes() {
        let mut status = ProxyStatus::new(Proxy::shared(&db_proxy_class()));
        let me = thread::current().id();
        assert_eq!(status.manipulations(), 0);
        status.acquire(me);
        status.acquire(me);
        status.release(me);
        assert_eq!(status.release_all(), 1);
        status.replace(Proxy::shared(&db_proxy_class()));
        assert_eq!(status.manipulations(), 5);

        // nothing left to release
        assert!(!status.release(me));
        assert_eq!(status.release_all(), 0);
        assert_eq!(status.manipulations(), 5);
    }
}
